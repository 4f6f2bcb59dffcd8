//! 選項協商策略
//!
//! 客戶端只接受 Echo、Suppress Go Ahead、Binary Transmission、Terminal Type，
//! 其餘選項一律拒絕。策略是固定的，不保存任何狀態。

use super::protocol::{Command, TelnetCommand, TelnetOption, IAC, TERMINAL_TYPE, TERMINAL_TYPE_IS};

/// 對方 DO 時願意啟用的選項
pub fn accepts_do(option: TelnetOption) -> bool {
    matches!(
        option,
        TelnetOption::Echo
            | TelnetOption::SuppressGoAhead
            | TelnetOption::BinaryTransmission
            | TelnetOption::TerminalType
    )
}

/// 對方 WILL 時願意接受的選項（Echo 只在 DO 時接受）
pub fn accepts_will(option: TelnetOption) -> bool {
    matches!(
        option,
        TelnetOption::SuppressGoAhead | TelnetOption::BinaryTransmission | TelnetOption::TerminalType
    )
}

/// 根據收到的命令產生回應；`None` 代表不需回應
pub fn respond(request: &Command) -> Option<Command> {
    let option = request.option()?;

    let reply = match request.code() {
        TelnetCommand::Do if accepts_do(option) => TelnetCommand::Will,
        TelnetCommand::Do => TelnetCommand::Wont,
        TelnetCommand::Will if accepts_will(option) => TelnetCommand::Do,
        TelnetCommand::Will => TelnetCommand::Dont,
        TelnetCommand::Dont => TelnetCommand::Wont,
        TelnetCommand::Wont => TelnetCommand::Dont,
        TelnetCommand::Sb => return terminal_type_reply(option),
        _ => return None,
    };

    Some(Command::negotiation(reply, option))
}

/// Terminal Type 子選項回應：`SB 24 IS "LINUX" 0 5 IAC SE`
fn terminal_type_reply(option: TelnetOption) -> Option<Command> {
    if option != TelnetOption::TerminalType {
        return None;
    }

    let mut payload = Vec::with_capacity(TERMINAL_TYPE.len() + 6);
    payload.push(option.as_byte());
    payload.push(TERMINAL_TYPE_IS);
    payload.extend_from_slice(TERMINAL_TYPE);
    payload.push(0);
    payload.push(TERMINAL_TYPE.len() as u8);
    payload.push(IAC);
    payload.push(TelnetCommand::Se.as_byte());

    Some(Command::new(TelnetCommand::Sb, payload))
}
