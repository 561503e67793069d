//! アドレス文字列のパース

use crate::{ParseError, Result};

/// `0x` プレフィックス付きの16進数をパースする
///
/// gdb がアドレスとして表示する値専用です。プレフィックスがなければエラーになります。
pub fn parse_hex(s: &str) -> Result<u64> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| ParseError::Address { text: s.to_string() })?;

    u64::from_str_radix(digits, 16).map_err(|_| ParseError::Address { text: s.to_string() })
}
