//! Telnet 協定模組
//!
//! 命令切割、選項協商與連線 Session

pub mod framer;
pub mod negotiator;
mod protocol;
mod session;

pub use framer::{frame_chunk, Framed, Framer};
pub use protocol::{Command, TelnetCommand, TelnetOption, IAC, TERMINAL_TYPE, TERMINAL_TYPE_IS};
pub use session::{
    DataHandler, SessionConfig, SessionHandle, SessionState, TelnetError, TelnetSession,
};
