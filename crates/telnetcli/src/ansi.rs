//! ANSI 控制碼過濾
//!
//! 終端機輸出前移除 ANSI 轉義序列，並把 BEL 換成空白。
//! 序列可能被切在兩次讀取之間，所以未完成的部分會保留到下一次。

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// 可跨多次輸入的 ANSI 過濾器
#[derive(Debug, Default)]
pub struct AnsiFilter {
    enabled: bool,
    /// 尚未完整的轉義序列（以 ESC 開頭）
    pending: Vec<u8>,
}

impl AnsiFilter {
    /// `enabled` 為 false 時原樣輸出
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pending: Vec::new(),
        }
    }

    /// 處理一段資料，回傳可直接顯示的位元組
    pub fn feed(&mut self, input: &[u8]) -> Vec<u8> {
        if !self.enabled {
            return input.to_vec();
        }

        let mut out = Vec::with_capacity(input.len());
        for &b in input {
            if !self.pending.is_empty() {
                self.pending.push(b);
                if self.sequence_complete(b) {
                    self.pending.clear();
                }
                continue;
            }

            match b {
                ESC => self.pending.push(b),
                BEL => out.push(b' '),
                _ => out.push(b),
            }
        }
        out
    }

    /// 是否有未完成的序列
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn sequence_complete(&self, last: u8) -> bool {
        if self.pending.len() > 1 && self.pending[1] == b'[' {
            // CSI (ESC [ ...)：以 0x40-0x7E 結尾
            self.pending.len() > 2 && (0x40..=0x7E).contains(&last)
        } else {
            // 其他 (ESC x)：兩個位元組
            self.pending.len() >= 2
        }
    }
}
