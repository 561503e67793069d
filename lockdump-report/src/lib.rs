//! lockdump gdb レポート解析
//!
//! このクレートは、gdb が出力する半構造化テキスト（スレッド一覧、
//! バックトレース、ミューテックス構造体のダンプ）を型付きのレコードに変換します。
//! 一覧系のパースは寛容で、壊れた行は読み飛ばします。
//! 単一値のパースは厳格で、失敗はそのままエラーとして返します。

pub mod address;
pub mod backtrace;
pub mod frame;
pub mod multiline;
pub mod mutex;
pub mod thread;

pub use address::parse_hex;
pub use backtrace::{Backtrace, BacktraceParser, StackFrame};
pub use frame::{CallSite, FrameParser, Location};
pub use multiline::fold_continuations;
pub use mutex::MutexSnapshot;
pub use thread::{Lwp, Thread, ThreadCatalogParser, ThreadSlot};

use thiserror::Error;

/// レポート解析のエラー
#[derive(Debug, Error)]
pub enum ParseError {
    /// 行が文法に一致したが、必要な列が欠けている
    #[error("malformed {kind} line: {line:?}")]
    Line { kind: &'static str, line: String },

    /// バックトレースのフレーム番号が連続していない
    #[error("backtrace frame numbers are not contiguous: expected #{expected}, found #{found}")]
    FrameGap { expected: u32, found: u32 },

    /// ミューテックスのダンプに想定したフィールドがない
    #[error("unsupported mutex layout (no usable `__owner` field): {dump}")]
    MutexLayout { dump: String },

    /// アドレスとして解釈できない
    #[error("invalid address '{text}'")]
    Address { text: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// レポート解析の結果型
pub type Result<T> = std::result::Result<T, ParseError>;
