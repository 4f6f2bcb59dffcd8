//! 原始封包傾印
//!
//! 啟用後，每次 socket 收發的位元組都會以十六進位寫入檔案，方便追查協商問題

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

lazy_static::lazy_static! {
    static ref WIRE_DUMP: Mutex<Option<WireDump>> = Mutex::new(None);
}

/// 資料方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 從伺服器收到
    Inbound,
    /// 送往伺服器
    Outbound,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Inbound => "RECV",
            Self::Outbound => "SEND",
        }
    }
}

/// 全域封包傾印器
pub struct WireDump {
    file: File,
}

impl WireDump {
    /// 開啟傾印檔案；之後的 [`WireDump::record`] 都會寫入此檔
    pub fn init(path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        if let Ok(mut dump) = WIRE_DUMP.lock() {
            *dump = Some(WireDump { file });
        }
        Ok(())
    }

    /// 關閉傾印
    pub fn disable() {
        if let Ok(mut dump) = WIRE_DUMP.lock() {
            *dump = None;
        }
    }

    /// 是否已啟用
    pub fn is_enabled() -> bool {
        WIRE_DUMP.lock().map(|d| d.is_some()).unwrap_or(false)
    }

    /// 記錄一段位元組；未啟用時不做任何事
    ///
    /// 啟用時會在持有全域鎖的情況下同步寫檔，會短暫阻塞呼叫的 async 任務，
    /// 只適合除錯時開啟。
    pub fn record(direction: Direction, bytes: &[u8]) {
        let Ok(mut dump) = WIRE_DUMP.lock() else {
            return;
        };
        if let Some(d) = dump.as_mut() {
            let _ = writeln!(
                d.file,
                "[{}] {} {}: [{}]",
                timestamp(),
                direction.label(),
                bytes.len(),
                hex(bytes)
            );
        }
    }
}

/// 以空白分隔的大寫十六進位
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn timestamp() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:03}", now.as_secs(), now.subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_format() {
        assert_eq!(hex(&[0xFF, 0xFD, 0x01]), "FF FD 01");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn test_record_writes_lines() {
        let path = std::env::temp_dir().join(format!("wire_dump_test_{}.log", std::process::id()));
        WireDump::init(&path).unwrap();
        assert!(WireDump::is_enabled());

        WireDump::record(Direction::Inbound, &[0xFF, 0xFD, 0x18]);
        WireDump::record(Direction::Outbound, &[0xFF, 0xFB, 0x18]);
        WireDump::disable();
        assert!(!WireDump::is_enabled());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("RECV 3: [FF FD 18]"));
        assert!(lines[1].ends_with("SEND 3: [FF FB 18]"));
        let _ = std::fs::remove_file(&path);
    }
}
