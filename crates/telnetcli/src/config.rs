//! 命令列客戶端設定
//!
//! 可選的 JSON 設定檔，未指定的欄位使用預設值

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use telnetcore::SessionConfig;
use thiserror::Error;

/// 設定檔錯誤
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("讀取設定檔失敗: {0}")]
    Io(#[from] io::Error),

    #[error("設定檔格式錯誤: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 客戶端設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 連線逾時（秒）
    pub connect_timeout_secs: u64,
    /// 讀取緩衝區大小
    pub read_buffer_size: usize,
    /// 內部佇列容量
    pub queue_capacity: usize,
    /// `IAC IAC` 是否還原成 0xFF
    pub reinject_escaped_iac: bool,
    /// 輸出前是否移除 ANSI 控制碼
    pub strip_ansi: bool,
    /// 原始封包傾印檔案
    pub wire_dump: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            connect_timeout_secs: session.connect_timeout.as_secs(),
            read_buffer_size: session.read_buffer_size,
            queue_capacity: session.queue_capacity,
            reinject_escaped_iac: session.reinject_escaped_iac,
            strip_ansi: true,
            wire_dump: None,
        }
    }
}

impl CliConfig {
    /// 從 JSON 檔案載入
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 轉換成 Session 配置
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_buffer_size: self.read_buffer_size,
            queue_capacity: self.queue_capacity,
            reinject_escaped_iac: self.reinject_escaped_iac,
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_matches_session_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.read_buffer_size, 512);
        assert!(config.strip_ansi);
        assert!(config.wire_dump.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "queue_capacity": 8, "reinject_escaped_iac": true }}"#).unwrap();

        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.queue_capacity, 8);
        assert!(config.reinject_escaped_iac);
        assert_eq!(config.read_buffer_size, 512);

        let session = config.session_config();
        assert_eq!(session.queue_capacity, 8);
        assert!(session.reinject_escaped_iac);
        assert_eq!(session.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(CliConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = CliConfig::load("/nonexistent/telnet.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
