//! Telnet Client Core Library
//!
//! 提供 Telnet 客戶端的核心功能：
//! - `telnet`: IAC 命令切割、選項協商、連線 Session
//! - `wire_dump`: 原始封包傾印

pub mod telnet;
pub mod wire_dump;

pub use telnet::{
    Command, SessionConfig, SessionHandle, SessionState, TelnetCommand, TelnetError,
    TelnetOption, TelnetSession,
};
pub use wire_dump::{Direction, WireDump};
