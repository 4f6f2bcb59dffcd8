//! Telnet 命令切割
//!
//! 從一段接收緩衝區中找出 IAC 開頭的命令，剩下的位元組即為應用資料。
//!
//! 每次讀取都是獨立處理的：落在緩衝區結尾、尚未完整的命令不會被保留到
//! 下一次讀取，而是原樣留在剩餘資料中。

use tracing::trace;

use super::protocol::{Command, TelnetCommand, IAC};

/// 單一緩衝區的命令解析器
///
/// `cursor` 指向下一個尚未處理的位元組，只會往前移動，且不會超過緩衝區長度。
#[derive(Debug)]
pub struct Framer<'a> {
    buf: &'a [u8],
    cursor: usize,
    data: Vec<u8>,
    reinject_escaped_iac: bool,
}

impl<'a> Framer<'a> {
    /// 建立解析器，游標從 0 開始
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            cursor: 0,
            data: Vec::with_capacity(buf.len()),
            reinject_escaped_iac: false,
        }
    }

    /// 遇到 `IAC IAC` 時是否把字面上的 0xFF 放回資料流（預設丟棄）
    pub fn with_reinjection(mut self, enabled: bool) -> Self {
        self.reinject_escaped_iac = enabled;
        self
    }

    /// 目前的解析位置
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 解析下一個命令
    ///
    /// 略過的一般位元組會累積到剩餘資料中。回傳 `None` 代表緩衝區已處理完，
    /// 或停在一個不完整的命令上（此時游標停在該命令的 IAC）。
    pub fn next_command(&mut self) -> Option<Command> {
        let buf = self.buf;

        loop {
            let rest = &buf[self.cursor..];
            let Some(offset) = rest.iter().position(|&b| b == IAC) else {
                self.data.extend_from_slice(rest);
                self.cursor = buf.len();
                return None;
            };
            self.data.extend_from_slice(&rest[..offset]);
            self.cursor += offset;

            let start = self.cursor;
            let Some(&code_byte) = buf.get(start + 1) else {
                trace!("緩衝區結尾的 IAC，位置 {}", start);
                return None;
            };

            if code_byte == IAC {
                if self.reinject_escaped_iac {
                    self.data.push(IAC);
                }
                self.cursor = start + 2;
                continue;
            }

            let Some(code) = TelnetCommand::from_byte(code_byte) else {
                trace!("略過未知命令碼 {}", code_byte);
                self.cursor = start + 2;
                continue;
            };

            if !code.takes_option() {
                self.cursor = start + 2;
                return Some(Command::new(code, Vec::new()));
            }

            let Some(&option) = buf.get(start + 2) else {
                trace!("{:?} 缺少選項位元組，位置 {}", code, start);
                return None;
            };

            if code != TelnetCommand::Sb {
                self.cursor = start + 3;
                return Some(Command::new(code, vec![option]));
            }

            // SB：一路收集到 IAC SE，找不到就停在緩衝區結尾
            let mut payload = vec![option];
            let mut pos = start + 3;
            while pos < buf.len() {
                let byte = buf[pos];
                payload.push(byte);
                pos += 1;
                // 前一個位元組可以是選項碼本身
                if byte == TelnetCommand::Se.as_byte() && buf[pos - 2] == IAC {
                    break;
                }
            }
            self.cursor = pos;
            return Some(Command::new(TelnetCommand::Sb, payload));
        }
    }

    /// 結束解析，回傳移除命令後的應用資料
    ///
    /// 游標之後未處理的位元組（例如不完整的命令）會原樣附加在後面。
    pub fn into_residue(mut self) -> Vec<u8> {
        self.data.extend_from_slice(&self.buf[self.cursor..]);
        self.data
    }
}

/// 一段接收資料的切割結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Framed {
    /// 移除命令後的應用資料
    pub data: Vec<u8>,
    /// 依出現順序排列的命令
    pub commands: Vec<Command>,
}

/// 解析整段接收資料
pub fn frame_chunk(chunk: &[u8], reinject_escaped_iac: bool) -> Framed {
    let mut framer = Framer::new(chunk).with_reinjection(reinject_escaped_iac);
    let mut commands = Vec::new();
    while let Some(command) = framer.next_command() {
        commands.push(command);
    }
    Framed {
        data: framer.into_residue(),
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::protocol::TelnetOption;

    const SB: u8 = 250;
    const SE: u8 = 240;
    const DO: u8 = 253;
    const WILL: u8 = 251;

    #[test]
    fn test_plain_text_passes_through() {
        let input = b"Hello World";
        let mut framer = Framer::new(input);
        assert!(framer.next_command().is_none());
        assert_eq!(framer.cursor(), input.len());
        assert_eq!(framer.into_residue(), b"Hello World");
    }

    #[test]
    fn test_empty_buffer() {
        let framed = frame_chunk(&[], false);
        assert!(framed.data.is_empty());
        assert!(framed.commands.is_empty());
    }

    #[test]
    fn test_single_negotiation() {
        let input = [IAC, DO, 1];
        let mut framer = Framer::new(&input);
        let cmd = framer.next_command().unwrap();
        assert_eq!(cmd.code(), TelnetCommand::Do);
        assert_eq!(cmd.option(), Some(TelnetOption::Echo));
        assert_eq!(framer.cursor(), 3);
        assert!(framer.next_command().is_none());
        assert!(framer.into_residue().is_empty());
    }

    #[test]
    fn test_escaped_iac_dropped_by_default() {
        let input = [1, 2, IAC, IAC, 3];
        let mut framer = Framer::new(&input);
        assert!(framer.next_command().is_none());
        assert!(framer.cursor() > 3);
        assert_eq!(framer.cursor(), input.len());
        assert_eq!(framer.into_residue(), vec![1, 2, 3]);
    }

    #[test]
    fn test_escaped_iac_reinjected() {
        let framed = frame_chunk(&[1, 2, IAC, IAC, 3], true);
        assert!(framed.commands.is_empty());
        assert_eq!(framed.data, vec![1, 2, IAC, 3]);
    }

    #[test]
    fn test_escaped_iac_then_command() {
        let framed = frame_chunk(&[IAC, IAC, IAC, WILL, 3, b'x'], false);
        assert_eq!(framed.commands.len(), 1);
        assert_eq!(framed.commands[0].code(), TelnetCommand::Will);
        assert_eq!(framed.data, b"x");
    }

    #[test]
    fn test_trailing_iac_leaves_cursor_on_iac() {
        let input = [b'a', b'b', IAC];
        let mut framer = Framer::new(&input);
        assert!(framer.next_command().is_none());
        assert_eq!(framer.cursor(), 2);
        // 重複呼叫不會前進
        assert!(framer.next_command().is_none());
        assert_eq!(framer.cursor(), 2);
        assert_eq!(framer.into_residue(), vec![b'a', b'b', IAC]);
    }

    #[test]
    fn test_negotiation_missing_option_byte() {
        let input = [b'a', IAC, DO];
        let mut framer = Framer::new(&input);
        assert!(framer.next_command().is_none());
        assert_eq!(framer.cursor(), 1);
        assert_eq!(framer.into_residue(), vec![b'a', IAC, DO]);
    }

    #[test]
    fn test_data_before_first_iac_is_kept() {
        let mut input = b"login: ".to_vec();
        input.extend_from_slice(&[IAC, WILL, 1]);
        input.extend_from_slice(b"ok");
        let framed = frame_chunk(&input, false);
        assert_eq!(framed.data, b"login: ok");
        assert_eq!(framed.commands.len(), 1);
    }

    #[test]
    fn test_multiple_commands_in_order() {
        let input = [IAC, DO, 1, b'x', IAC, WILL, 3, IAC, DO, 24];
        let framed = frame_chunk(&input, false);
        let codes: Vec<_> = framed
            .commands
            .iter()
            .map(|c| (c.code(), c.payload()[0]))
            .collect();
        assert_eq!(
            codes,
            vec![
                (TelnetCommand::Do, 1),
                (TelnetCommand::Will, 3),
                (TelnetCommand::Do, 24)
            ]
        );
        assert_eq!(framed.data, b"x");
    }

    #[test]
    fn test_subnegotiation_includes_terminator() {
        let input = [IAC, SB, 24, 1, IAC, SE, b'z'];
        let mut framer = Framer::new(&input);
        let cmd = framer.next_command().unwrap();
        assert_eq!(cmd.code(), TelnetCommand::Sb);
        assert_eq!(cmd.payload(), &[24, 1, IAC, SE]);
        assert!(cmd.is_terminated());
        assert_eq!(framer.cursor(), 6);
        assert_eq!(framer.into_residue(), b"z");
    }

    #[test]
    fn test_unterminated_subnegotiation_stops_at_end() {
        let input = [IAC, SB, 24, 1, 2];
        let mut framer = Framer::new(&input);
        let cmd = framer.next_command().unwrap();
        assert_eq!(cmd.payload(), &[24, 1, 2]);
        assert!(!cmd.is_terminated());
        assert_eq!(framer.cursor(), input.len());
        assert!(framer.next_command().is_none());
        assert!(framer.into_residue().is_empty());
    }

    #[test]
    fn test_subnegotiation_ends_when_option_byte_is_iac() {
        let framed = frame_chunk(&[IAC, SB, IAC, SE, b'x', b'y'], false);
        assert_eq!(framed.commands.len(), 1);
        assert_eq!(framed.commands[0].payload(), &[IAC, SE]);
        assert!(framed.commands[0].is_terminated());
        assert_eq!(framed.data, b"xy");
    }

    #[test]
    fn test_two_byte_commands() {
        let input = [b'a', IAC, 249, b'b', IAC, 241];
        let framed = frame_chunk(&input, false);
        assert_eq!(framed.data, b"ab");
        assert_eq!(framed.commands.len(), 2);
        assert_eq!(framed.commands[0].code(), TelnetCommand::GoAhead);
        assert!(framed.commands[0].payload().is_empty());
        assert_eq!(framed.commands[1].code(), TelnetCommand::Nop);
    }

    #[test]
    fn test_unknown_command_byte_is_skipped() {
        let framed = frame_chunk(&[b'a', IAC, 10, b'b'], false);
        assert!(framed.commands.is_empty());
        assert_eq!(framed.data, b"ab");
    }

    #[test]
    fn test_cursor_never_exceeds_length() {
        let inputs: [&[u8]; 4] = [
            &[IAC],
            &[IAC, SB],
            &[IAC, SB, 24, IAC],
            &[0, IAC, IAC, IAC],
        ];
        for input in inputs {
            let mut framer = Framer::new(input);
            while framer.next_command().is_some() {}
            assert!(framer.cursor() <= input.len());
        }
    }
}
