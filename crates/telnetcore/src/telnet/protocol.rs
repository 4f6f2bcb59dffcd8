//! Telnet 協定常數與命令結構
//!
//! 實作 RFC 854 的命令碼、選項碼，以及解析後的 [`Command`]

use std::fmt;

/// Telnet IAC (Interpret As Command) - 0xFF
pub const IAC: u8 = 255;

/// 本客戶端宣告的終端機類型
pub const TERMINAL_TYPE: &[u8] = b"LINUX";

/// Terminal-Type 子選項中的 IS 代碼
pub const TERMINAL_TYPE_IS: u8 = 0;

/// Telnet 命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TelnetCommand {
    /// End of File
    Eof = 236,
    /// Suspend
    Susp = 237,
    /// Abort
    Abort = 238,
    /// End of Record
    Eor = 239,
    /// Sub-negotiation End
    Se = 240,
    /// No Operation
    Nop = 241,
    /// Data Mark
    DataMark = 242,
    /// Break
    Break = 243,
    /// Interrupt Process
    InterruptProcess = 244,
    /// Abort Output
    AbortOutput = 245,
    /// Are You There
    AreYouThere = 246,
    /// Erase Character
    EraseCharacter = 247,
    /// Erase Line
    EraseLine = 248,
    /// Go Ahead
    GoAhead = 249,
    /// Sub-negotiation Begin
    Sb = 250,
    /// Will
    Will = 251,
    /// Won't
    Wont = 252,
    /// Do
    Do = 253,
    /// Don't
    Dont = 254,
    /// Interpret As Command
    Iac = 255,
}

impl TelnetCommand {
    /// 從位元組解析 Telnet 命令
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            236 => Some(Self::Eof),
            237 => Some(Self::Susp),
            238 => Some(Self::Abort),
            239 => Some(Self::Eor),
            240 => Some(Self::Se),
            241 => Some(Self::Nop),
            242 => Some(Self::DataMark),
            243 => Some(Self::Break),
            244 => Some(Self::InterruptProcess),
            245 => Some(Self::AbortOutput),
            246 => Some(Self::AreYouThere),
            247 => Some(Self::EraseCharacter),
            248 => Some(Self::EraseLine),
            249 => Some(Self::GoAhead),
            250 => Some(Self::Sb),
            251 => Some(Self::Will),
            252 => Some(Self::Wont),
            253 => Some(Self::Do),
            254 => Some(Self::Dont),
            255 => Some(Self::Iac),
            _ => None,
        }
    }

    /// 獲取命令的位元組值
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// WILL / WONT / DO / DONT 後面固定跟著一個選項位元組
    pub fn is_negotiation(self) -> bool {
        matches!(self, Self::Will | Self::Wont | Self::Do | Self::Dont)
    }

    /// 是否攜帶選項資料（協商命令與 SB）
    pub fn takes_option(self) -> bool {
        self.is_negotiation() || self == Self::Sb
    }
}

/// Telnet 選項
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelnetOption {
    /// Binary Transmission
    BinaryTransmission,
    /// Echo
    Echo,
    /// Suppress Go Ahead
    SuppressGoAhead,
    /// Status
    Status,
    /// Timing Mark
    TimingMark,
    /// Terminal Type
    TerminalType,
    /// Window Size (NAWS)
    WindowSize,
    /// Terminal Speed
    TerminalSpeed,
    /// Remote Flow Control
    RemoteFlowControl,
    /// Linemode
    Linemode,
    /// Environment Variables
    Environment,
    /// Unknown option
    Unknown(u8),
}

impl TelnetOption {
    /// 從位元組解析 Telnet 選項
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::BinaryTransmission,
            1 => Self::Echo,
            3 => Self::SuppressGoAhead,
            5 => Self::Status,
            6 => Self::TimingMark,
            24 => Self::TerminalType,
            31 => Self::WindowSize,
            32 => Self::TerminalSpeed,
            33 => Self::RemoteFlowControl,
            34 => Self::Linemode,
            36 => Self::Environment,
            other => Self::Unknown(other),
        }
    }

    /// 獲取選項的位元組值
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::BinaryTransmission => 0,
            Self::Echo => 1,
            Self::SuppressGoAhead => 3,
            Self::Status => 5,
            Self::TimingMark => 6,
            Self::TerminalType => 24,
            Self::WindowSize => 31,
            Self::TerminalSpeed => 32,
            Self::RemoteFlowControl => 33,
            Self::Linemode => 34,
            Self::Environment => 36,
            Self::Unknown(b) => *b,
        }
    }
}

/// 解析後的 Telnet 命令
///
/// `payload` 對協商命令是單一選項位元組；對 SB 則是選項位元組、
/// 子選項資料，以及結尾的 `IAC SE`（若有收到）。其他命令的 payload 為空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    code: TelnetCommand,
    payload: Vec<u8>,
}

impl Command {
    /// 以命令碼與 payload 建立命令
    pub fn new(code: TelnetCommand, payload: Vec<u8>) -> Self {
        Self { code, payload }
    }

    /// 建立 WILL/WONT/DO/DONT 協商命令
    pub fn negotiation(code: TelnetCommand, option: TelnetOption) -> Self {
        Self::new(code, vec![option.as_byte()])
    }

    /// 命令碼
    pub fn code(&self) -> TelnetCommand {
        self.code
    }

    /// 原始 payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// payload 的第一個位元組即為選項碼
    pub fn option(&self) -> Option<TelnetOption> {
        self.payload.first().copied().map(TelnetOption::from_byte)
    }

    /// SB 區塊是否以 `IAC SE` 結尾
    pub fn is_terminated(&self) -> bool {
        if self.code != TelnetCommand::Sb {
            return true;
        }
        self.payload.ends_with(&[IAC, TelnetCommand::Se.as_byte()])
    }

    /// 序列化為線路格式：`IAC, code, payload...`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.payload.len());
        out.push(IAC);
        out.push(self.code.as_byte());
        out.extend_from_slice(&self.payload);
        out
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.option() {
            Some(option) => write!(f, "IAC {:?} {:?}", self.code, option),
            None => write!(f, "IAC {:?}", self.code),
        }
    }
}
