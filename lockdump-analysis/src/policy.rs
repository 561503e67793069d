//! 所有者の選択ポリシー

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// どの所有者をデッドロックの説明に使うか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionPolicy {
    /// 待ちスレッド数が最小の所有者すべて（同数を含む）
    MinCount,
    /// 待ちスレッドがちょうど1つの所有者
    Singleton,
}

impl SelectionPolicy {
    /// 全てのポリシー
    pub const ALL: [SelectionPolicy; 2] = [SelectionPolicy::MinCount, SelectionPolicy::Singleton];

    /// コマンドラインで使う名前
    pub fn name(&self) -> &'static str {
        match self {
            SelectionPolicy::MinCount => "min-count",
            SelectionPolicy::Singleton => "singleton",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 不明なポリシー名
#[derive(Debug, Error)]
#[error("unknown selection policy '{0}' (expected 'min-count' or 'singleton')")]
pub struct PolicyParseError(pub String);

impl FromStr for SelectionPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "min-count" | "min" => Ok(SelectionPolicy::MinCount),
            "singleton" | "single" => Ok(SelectionPolicy::Singleton),
            other => Err(PolicyParseError(other.to_string())),
        }
    }
}
