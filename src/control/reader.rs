//! Text control command decoder
//!
//! Commands are `|`-separated fields, field 0 being the command type:
//!
//! ```text
//! 0|<action>|<keycode>|<repeat>|<meta_state>                    inject keycode
//! 1|<text...>                                                   inject text
//! 2|<action>|<pointer>|<x>|<y>|<w>|<h>|<pressure>|<btn>|<btns>  inject touch
//! 3|<x>|<y>|<w>|<h>|<hscroll>|<vscroll>|<btns>                  inject scroll
//! 6|<sequence>|<paste>|<text...>                                set clipboard
//! ```
//!
//! Field counts are checked exactly. The text of `InjectText` and
//! `SetClipboard` is everything after the fixed prefix, so it may contain `|`.

use std::str::FromStr;

use crate::error::ControlError;

use super::command::{
    i16_fixed_point_to_f32, u16_fixed_point_to_f32, CommandType, ControlCommand, Position,
    SCROLL_RANGE, UHID_PLACEHOLDER_LEN,
};

/// Decode one text command
pub fn decode(cmd: &str) -> Result<ControlCommand, ControlError> {
    if cmd.is_empty() {
        return Err(ControlError::Empty);
    }

    let type_field = cmd.split('|').next().unwrap_or_default();
    let value: i32 = type_field
        .parse()
        .map_err(|_| ControlError::InvalidType(type_field.to_string()))?;
    let ty = CommandType::from_i32(value).ok_or(ControlError::UnknownType(value))?;

    match ty {
        CommandType::InjectKeycode => {
            let f = Fields::exact(ty, cmd, 5)?;
            Ok(ControlCommand::InjectKeycode {
                action: f.parse(1, "action")?,
                keycode: f.parse(2, "keycode")?,
                repeat: f.parse(3, "repeat")?,
                meta_state: f.parse(4, "meta_state")?,
            })
        }
        CommandType::InjectText => {
            let f = Fields::prefix(ty, cmd, 1)?;
            Ok(ControlCommand::InjectText {
                text: f.remainder.to_string(),
            })
        }
        CommandType::InjectTouch => {
            let f = Fields::exact(ty, cmd, 10)?;
            Ok(ControlCommand::InjectTouch {
                action: f.parse(1, "action")?,
                pointer_id: f.parse(2, "pointer_id")?,
                position: f.position(3)?,
                // Field 7 carries pressure but is ignored: always full pressure
                pressure: u16_fixed_point_to_f32(u16::MAX),
                action_button: f.parse(8, "action_button")?,
                buttons: f.parse(9, "buttons")?,
            })
        }
        CommandType::InjectScroll => {
            let f = Fields::exact(ty, cmd, 8)?;
            let h: i16 = f.parse(5, "h_scroll")?;
            let v: i16 = f.parse(6, "v_scroll")?;
            Ok(ControlCommand::InjectScroll {
                position: f.position(1)?,
                h_scroll: i16_fixed_point_to_f32(h) * SCROLL_RANGE,
                v_scroll: i16_fixed_point_to_f32(v) * SCROLL_RANGE,
                buttons: f.parse(7, "buttons")?,
            })
        }
        CommandType::BackOrScreenOn => {
            let f = Fields::exact(ty, cmd, 2)?;
            Ok(ControlCommand::BackOrScreenOn {
                action: f.parse(1, "action")?,
            })
        }
        CommandType::GetClipboard => {
            let f = Fields::exact(ty, cmd, 2)?;
            Ok(ControlCommand::GetClipboard {
                copy_key: f.parse(1, "copy_key")?,
            })
        }
        CommandType::SetClipboard => {
            let f = Fields::prefix(ty, cmd, 3)?;
            Ok(ControlCommand::SetClipboard {
                sequence: f.parse(1, "sequence")?,
                paste: f.boolean(2, "paste")?,
                text: f.remainder.to_string(),
            })
        }
        CommandType::SetDisplayPower => {
            let f = Fields::exact(ty, cmd, 2)?;
            let on: i32 = f.parse(1, "on")?;
            Ok(ControlCommand::SetDisplayPower { on: on == 1 })
        }
        CommandType::ExpandNotificationPanel
        | CommandType::ExpandSettingsPanel
        | CommandType::CollapsePanels
        | CommandType::RotateDevice
        | CommandType::OpenHardKeyboardSettings
        | CommandType::ResetVideo => {
            Fields::exact(ty, cmd, 1)?;
            Ok(match ty {
                CommandType::ExpandNotificationPanel => ControlCommand::ExpandNotificationPanel,
                CommandType::ExpandSettingsPanel => ControlCommand::ExpandSettingsPanel,
                CommandType::CollapsePanels => ControlCommand::CollapsePanels,
                CommandType::RotateDevice => ControlCommand::RotateDevice,
                CommandType::OpenHardKeyboardSettings => ControlCommand::OpenHardKeyboardSettings,
                _ => ControlCommand::ResetVideo,
            })
        }
        CommandType::UhidCreate => {
            let f = Fields::exact(ty, cmd, 6)?;
            Ok(ControlCommand::UhidCreate {
                id: f.parse(1, "id")?,
                vendor_id: f.parse(2, "vendor_id")?,
                product_id: f.parse(3, "product_id")?,
                name: f.get(4).to_string(),
                report_desc: vec![0; UHID_PLACEHOLDER_LEN],
            })
        }
        CommandType::UhidInput => {
            let f = Fields::exact(ty, cmd, 3)?;
            Ok(ControlCommand::UhidInput {
                id: f.parse(1, "id")?,
                data: vec![0; UHID_PLACEHOLDER_LEN],
            })
        }
        CommandType::UhidDestroy => {
            let f = Fields::exact(ty, cmd, 2)?;
            Ok(ControlCommand::UhidDestroy {
                id: f.parse(1, "id")?,
            })
        }
        CommandType::StartApp => {
            let f = Fields::exact(ty, cmd, 2)?;
            Ok(ControlCommand::StartApp {
                name: f.get(1).to_string(),
            })
        }
    }
}

/// Split fields of one command, tagged with its type for error reporting
struct Fields<'a> {
    ty: CommandType,
    parts: Vec<&'a str>,
    /// Text after the fixed prefix (prefix-style commands only)
    remainder: &'a str,
}

impl<'a> Fields<'a> {
    /// Exactly `count` fields
    fn exact(ty: CommandType, cmd: &'a str, count: usize) -> Result<Self, ControlError> {
        let parts: Vec<&str> = cmd.split('|').collect();
        if parts.len() != count {
            return Err(ControlError::Arity {
                kind: ty.name(),
                expected: count,
                actual: parts.len(),
            });
        }
        Ok(Self {
            ty,
            parts,
            remainder: "",
        })
    }

    /// `prefix` fixed fields (type included) followed by free text
    fn prefix(ty: CommandType, cmd: &'a str, prefix: usize) -> Result<Self, ControlError> {
        let mut parts: Vec<&str> = cmd.splitn(prefix + 1, '|').collect();
        if parts.len() != prefix + 1 {
            return Err(ControlError::Arity {
                kind: ty.name(),
                expected: prefix + 1,
                actual: parts.len(),
            });
        }
        let remainder = parts.pop().unwrap_or_default();
        Ok(Self {
            ty,
            parts,
            remainder,
        })
    }

    fn get(&self, index: usize) -> &'a str {
        self.parts.get(index).copied().unwrap_or_default()
    }

    fn parse<T: FromStr>(&self, index: usize, field: &'static str) -> Result<T, ControlError> {
        let raw = self.get(index);
        raw.parse().map_err(|_| self.invalid(field, raw))
    }

    fn boolean(&self, index: usize, field: &'static str) -> Result<bool, ControlError> {
        let raw = self.get(index);
        if raw.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(self.invalid(field, raw))
        }
    }

    /// Four consecutive fields: x, y, screen width, screen height
    fn position(&self, start: usize) -> Result<Position, ControlError> {
        Ok(Position::new(
            self.parse(start, "x")?,
            self.parse(start + 1, "y")?,
            self.parse(start + 2, "screen_width")?,
            self.parse(start + 3, "screen_height")?,
        ))
    }

    fn invalid(&self, field: &'static str, raw: &str) -> ControlError {
        ControlError::InvalidField {
            kind: self.ty.name(),
            field,
            value: raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_keycode() {
        let cmd = decode("0|1|66|1|0").unwrap();
        assert_eq!(
            cmd,
            ControlCommand::InjectKeycode {
                action: 1,
                keycode: 66,
                repeat: 1,
                meta_state: 0,
            }
        );
    }

    #[test]
    fn test_inject_keycode_wrong_arity() {
        assert_eq!(
            decode("0|1|66|1"),
            Err(ControlError::Arity {
                kind: "inject_keycode",
                expected: 5,
                actual: 4,
            })
        );
        assert!(matches!(
            decode("0|1|66|1|0|9"),
            Err(ControlError::Arity { actual: 6, .. })
        ));
    }

    #[test]
    fn test_inject_keycode_non_integer() {
        assert_eq!(
            decode("0|1|enter|1|0"),
            Err(ControlError::InvalidField {
                kind: "inject_keycode",
                field: "keycode",
                value: "enter".into(),
            })
        );
    }

    #[test]
    fn test_inject_text_keeps_delimiters() {
        assert_eq!(
            decode("1|a|b||c").unwrap(),
            ControlCommand::InjectText {
                text: "a|b||c".into()
            }
        );
        assert_eq!(
            decode("1|").unwrap(),
            ControlCommand::InjectText { text: "".into() }
        );
        assert!(matches!(decode("1"), Err(ControlError::Arity { .. })));
    }

    #[test]
    fn test_set_clipboard_embedded_delimiter() {
        assert_eq!(
            decode("6|5|true|hello|world").unwrap(),
            ControlCommand::SetClipboard {
                sequence: 5,
                paste: true,
                text: "hello|world".into(),
            }
        );
    }

    #[test]
    fn test_set_clipboard_text_repeating_prefix() {
        // The prefix appears again inside the text and must survive
        assert_eq!(
            decode("6|5|false|6|5|false|x").unwrap(),
            ControlCommand::SetClipboard {
                sequence: 5,
                paste: false,
                text: "6|5|false|x".into(),
            }
        );
    }

    #[test]
    fn test_set_clipboard_missing_text() {
        assert!(matches!(
            decode("6|5|true"),
            Err(ControlError::Arity {
                expected: 4,
                actual: 3,
                ..
            })
        ));
        assert!(matches!(
            decode("6|5|maybe|x"),
            Err(ControlError::InvalidField { field: "paste", .. })
        ));
    }

    #[test]
    fn test_inject_touch_full_pressure() {
        let cmd = decode("2|0|-1|100|200|1080|1920|12|1|1").unwrap();
        assert_eq!(
            cmd,
            ControlCommand::InjectTouch {
                action: 0,
                pointer_id: -1,
                position: Position::new(100, 200, 1080, 1920),
                pressure: 1.0,
                action_button: 1,
                buttons: 1,
            }
        );
    }

    #[test]
    fn test_inject_scroll_range() {
        let cmd = decode("3|10|20|1080|1920|32767|-32768|0").unwrap();
        match cmd {
            ControlCommand::InjectScroll {
                position,
                h_scroll,
                v_scroll,
                buttons,
            } => {
                assert_eq!(position, Position::new(10, 20, 1080, 1920));
                assert_eq!(h_scroll, 16.0);
                assert_eq!(v_scroll, -16.0);
                assert_eq!(buttons, 0);
            }
            other => panic!("unexpected {:?}", other),
        }

        let half = decode("3|0|0|1|1|16384|0|0").unwrap();
        assert!(matches!(half, ControlCommand::InjectScroll { h_scroll, .. } if h_scroll == 8.0));

        // Outside i16
        assert!(matches!(
            decode("3|0|0|1|1|40000|0|0"),
            Err(ControlError::InvalidField { field: "h_scroll", .. })
        ));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(
            decode("4|1").unwrap(),
            ControlCommand::BackOrScreenOn { action: 1 }
        );
        assert_eq!(
            decode("5|2").unwrap(),
            ControlCommand::GetClipboard { copy_key: 2 }
        );
        assert_eq!(
            decode("7|1").unwrap(),
            ControlCommand::SetDisplayPower { on: true }
        );
        assert_eq!(
            decode("7|0").unwrap(),
            ControlCommand::SetDisplayPower { on: false }
        );
        assert_eq!(
            decode("17|com.android.settings").unwrap(),
            ControlCommand::StartApp {
                name: "com.android.settings".into()
            }
        );
    }

    #[test]
    fn test_empty_commands() {
        assert_eq!(decode("8").unwrap(), ControlCommand::ExpandNotificationPanel);
        assert_eq!(decode("9").unwrap(), ControlCommand::ExpandSettingsPanel);
        assert_eq!(decode("10").unwrap(), ControlCommand::CollapsePanels);
        assert_eq!(decode("11").unwrap(), ControlCommand::RotateDevice);
        assert_eq!(decode("12").unwrap(), ControlCommand::OpenHardKeyboardSettings);
        assert_eq!(decode("13").unwrap(), ControlCommand::ResetVideo);
        assert!(matches!(decode("10|x"), Err(ControlError::Arity { .. })));
    }

    #[test]
    fn test_uhid_placeholder_payload() {
        let create = decode("14|1|1133|49948|Keyboard|05010906").unwrap();
        assert_eq!(
            create,
            ControlCommand::UhidCreate {
                id: 1,
                vendor_id: 1133,
                product_id: 49948,
                name: "Keyboard".into(),
                report_desc: vec![0, 0],
            }
        );

        let input = decode("15|1|00040000").unwrap();
        assert_eq!(
            input,
            ControlCommand::UhidInput {
                id: 1,
                data: vec![0, 0],
            }
        );

        assert_eq!(
            decode("16|1").unwrap(),
            ControlCommand::UhidDestroy { id: 1 }
        );
    }

    #[test]
    fn test_bad_type_field() {
        assert_eq!(decode(""), Err(ControlError::Empty));
        assert_eq!(decode("x|1"), Err(ControlError::InvalidType("x".into())));
        assert_eq!(decode("99|1"), Err(ControlError::UnknownType(99)));
    }

    #[test]
    fn test_from_str() {
        let cmd: ControlCommand = "11".parse().unwrap();
        assert_eq!(cmd, ControlCommand::RotateDevice);
    }
}
