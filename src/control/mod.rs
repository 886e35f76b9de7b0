//! Remote control commands
//!
//! Decodes the pipe-delimited text protocol used by viewers into
//! [`ControlCommand`] values handed to the device's input injector.

pub mod command;
pub mod reader;

pub use command::{CommandType, ControlCommand, Position};
pub use reader::decode;
