//! Control command types
//!
//! Structured input-injection requests decoded from the pipe-delimited text
//! protocol. Field 0 of every wire command is the numeric [`CommandType`].

use std::fmt;
use std::str::FromStr;

use crate::error::ControlError;

/// Scroll deltas travel as i16 fixed point over the range [-16, 16]
pub const SCROLL_RANGE: f32 = 16.0;

/// Byte length substituted for UHID payloads, which are not decoded yet
pub const UHID_PLACEHOLDER_LEN: usize = 2;

/// Numeric command type (field 0 on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    InjectKeycode = 0,
    InjectText = 1,
    InjectTouch = 2,
    InjectScroll = 3,
    BackOrScreenOn = 4,
    GetClipboard = 5,
    SetClipboard = 6,
    SetDisplayPower = 7,
    ExpandNotificationPanel = 8,
    ExpandSettingsPanel = 9,
    CollapsePanels = 10,
    RotateDevice = 11,
    OpenHardKeyboardSettings = 12,
    ResetVideo = 13,
    UhidCreate = 14,
    UhidInput = 15,
    UhidDestroy = 16,
    StartApp = 17,
}

impl CommandType {
    /// Map a wire value to a command type
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::InjectKeycode,
            1 => Self::InjectText,
            2 => Self::InjectTouch,
            3 => Self::InjectScroll,
            4 => Self::BackOrScreenOn,
            5 => Self::GetClipboard,
            6 => Self::SetClipboard,
            7 => Self::SetDisplayPower,
            8 => Self::ExpandNotificationPanel,
            9 => Self::ExpandSettingsPanel,
            10 => Self::CollapsePanels,
            11 => Self::RotateDevice,
            12 => Self::OpenHardKeyboardSettings,
            13 => Self::ResetVideo,
            14 => Self::UhidCreate,
            15 => Self::UhidInput,
            16 => Self::UhidDestroy,
            17 => Self::StartApp,
            _ => return None,
        })
    }

    /// Snake-case name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::InjectKeycode => "inject_keycode",
            Self::InjectText => "inject_text",
            Self::InjectTouch => "inject_touch",
            Self::InjectScroll => "inject_scroll",
            Self::BackOrScreenOn => "back_or_screen_on",
            Self::GetClipboard => "get_clipboard",
            Self::SetClipboard => "set_clipboard",
            Self::SetDisplayPower => "set_display_power",
            Self::ExpandNotificationPanel => "expand_notification_panel",
            Self::ExpandSettingsPanel => "expand_settings_panel",
            Self::CollapsePanels => "collapse_panels",
            Self::RotateDevice => "rotate_device",
            Self::OpenHardKeyboardSettings => "open_hard_keyboard_settings",
            Self::ResetVideo => "reset_video",
            Self::UhidCreate => "uhid_create",
            Self::UhidInput => "uhid_input",
            Self::UhidDestroy => "uhid_destroy",
            Self::StartApp => "start_app",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point on a screen of known size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub screen_width: i32,
    pub screen_height: i32,
}

impl Position {
    pub fn new(x: i32, y: i32, screen_width: i32, screen_height: i32) -> Self {
        Self {
            x,
            y,
            screen_width,
            screen_height,
        }
    }
}

/// A decoded control command
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    InjectKeycode {
        action: i32,
        keycode: i32,
        repeat: i32,
        meta_state: i32,
    },
    InjectText {
        text: String,
    },
    InjectTouch {
        action: i32,
        pointer_id: i64,
        position: Position,
        /// Always full pressure; the wire value is ignored
        pressure: f32,
        action_button: i32,
        buttons: i32,
    },
    InjectScroll {
        position: Position,
        h_scroll: f32,
        v_scroll: f32,
        buttons: i32,
    },
    BackOrScreenOn {
        action: i32,
    },
    GetClipboard {
        copy_key: i32,
    },
    SetClipboard {
        sequence: i64,
        paste: bool,
        text: String,
    },
    SetDisplayPower {
        on: bool,
    },
    ExpandNotificationPanel,
    ExpandSettingsPanel,
    CollapsePanels,
    RotateDevice,
    OpenHardKeyboardSettings,
    ResetVideo,
    /// `report_desc` is a zeroed placeholder: the wire payload is not decoded
    UhidCreate {
        id: u16,
        vendor_id: u16,
        product_id: u16,
        name: String,
        report_desc: Vec<u8>,
    },
    /// `data` is a zeroed placeholder: the wire payload is not decoded
    UhidInput {
        id: u16,
        data: Vec<u8>,
    },
    UhidDestroy {
        id: u16,
    },
    StartApp {
        name: String,
    },
}

impl ControlCommand {
    /// The wire type of this command
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::InjectKeycode { .. } => CommandType::InjectKeycode,
            Self::InjectText { .. } => CommandType::InjectText,
            Self::InjectTouch { .. } => CommandType::InjectTouch,
            Self::InjectScroll { .. } => CommandType::InjectScroll,
            Self::BackOrScreenOn { .. } => CommandType::BackOrScreenOn,
            Self::GetClipboard { .. } => CommandType::GetClipboard,
            Self::SetClipboard { .. } => CommandType::SetClipboard,
            Self::SetDisplayPower { .. } => CommandType::SetDisplayPower,
            Self::ExpandNotificationPanel => CommandType::ExpandNotificationPanel,
            Self::ExpandSettingsPanel => CommandType::ExpandSettingsPanel,
            Self::CollapsePanels => CommandType::CollapsePanels,
            Self::RotateDevice => CommandType::RotateDevice,
            Self::OpenHardKeyboardSettings => CommandType::OpenHardKeyboardSettings,
            Self::ResetVideo => CommandType::ResetVideo,
            Self::UhidCreate { .. } => CommandType::UhidCreate,
            Self::UhidInput { .. } => CommandType::UhidInput,
            Self::UhidDestroy { .. } => CommandType::UhidDestroy,
            Self::StartApp { .. } => CommandType::StartApp,
        }
    }
}

impl FromStr for ControlCommand {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::reader::decode(s)
    }
}

/// Decode an unsigned 16-bit fixed-point value into [0, 1]
///
/// `0xFFFF` maps to exactly 1.0.
pub fn u16_fixed_point_to_f32(value: u16) -> f32 {
    if value == u16::MAX {
        1.0
    } else {
        value as f32 / 65536.0
    }
}

/// Decode a signed 16-bit fixed-point value into [-1, 1]
///
/// `0x7FFF` maps to exactly 1.0.
pub fn i16_fixed_point_to_f32(value: i16) -> f32 {
    if value == i16::MAX {
        1.0
    } else {
        value as f32 / 32768.0
    }
}
