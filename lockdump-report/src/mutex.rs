//! pthread_mutex_t のダンプ解析

use crate::{Lwp, ParseError, Result};
use std::fmt;

/// 所有者のLWPを保持するフィールド
const OWNER_FIELD: &str = "__owner = ";

/// ミューテックスの状態
///
/// glibc の `pthread_mutex_t` を gdb で表示したテキストから作ります。
/// ```text
/// {__data = {__lock = 2, __count = 0, __owner = 39090, __nusers = 1, __kind = 0,
///  __spins = 0, __list = {__prev = 0x0, __next = 0x0}}, __size = "...", __align = 2}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutexSnapshot {
    /// ミューテックスのアドレス
    pub address: u64,
    /// gdb が表示した値（生のまま）
    pub value: String,
    /// 所有者のLWP
    pub holder: Lwp,
}

impl MutexSnapshot {
    /// ダンプされた値から所有者を取り出す
    ///
    /// `__owner` フィールドがなければ、ミューテックスのレイアウトが
    /// 想定と異なるプラットフォームなのでエラーにします。
    pub fn parse(address: u64, value: &str) -> Result<Self> {
        let layout_error = || ParseError::MutexLayout {
            dump: value.to_string(),
        };

        let start = value.find(OWNER_FIELD).ok_or_else(layout_error)? + OWNER_FIELD.len();
        let rest = &value[start..];
        let end = rest.find([',', '}']).ok_or_else(layout_error)?;
        let holder = rest[..end].trim().parse::<u32>().map_err(|_| layout_error())?;

        Ok(Self {
            address,
            value: value.to_string(),
            holder: Lwp(holder),
        })
    }
}

impl fmt::Display for MutexSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mutex 0x{:x} held by LWP {}", self.address, self.holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_followed_by_comma() {
        let value = "{__data = {__lock = 2, __count = 1, __owner = 39090, __nusers = 1, __kind = 1, __spins = 0, __list = {__prev = 0x0, __next = 0x0}}, __size = \"\\002\", '\\000' <repeats 22 times>, __align = 4294967298}";
        let mutex = MutexSnapshot::parse(0x601080, value).unwrap();
        assert_eq!(mutex.holder, Lwp(39090));
        assert_eq!(mutex.address, 0x601080);
    }

    #[test]
    fn test_owner_followed_by_brace() {
        let mutex = MutexSnapshot::parse(0x10, "{__lock = 2, __owner = 39090}").unwrap();
        assert_eq!(mutex.holder, Lwp(39090));
    }

    #[test]
    fn test_missing_owner_is_layout_error() {
        let err = MutexSnapshot::parse(0x10, "{__lock = 2, __count = 0}").unwrap_err();
        assert!(matches!(err, ParseError::MutexLayout { .. }));
    }

    #[test]
    fn test_garbage_owner_is_layout_error() {
        assert!(MutexSnapshot::parse(0x10, "{__owner = <optimized out>}").is_err());
        assert!(MutexSnapshot::parse(0x10, "{__owner = 12").is_err());
    }

    #[test]
    fn test_display() {
        let mutex = MutexSnapshot::parse(0x601080, "{__owner = 7}").unwrap();
        assert_eq!(mutex.to_string(), "mutex 0x601080 held by LWP 7");
    }
}
