//! lockdump のコア機能
//!
//! このクレートは、gdb の対話型REPLを要求/応答プロトコルとして扱うための
//! フレーミングと、コアダンプ上のスレッド・バックトレース・ミューテックス待ちを
//! 遅延評価でキャッシュするセッションを提供します。

pub mod command;
pub mod config;
pub mod errors;
pub mod framer;
pub mod gdb;
pub mod registry;
pub mod session;

pub use command::GdbCommand;
pub use config::GdbConfig;
pub use errors::Error;
pub use framer::{CommandExecutor, DelimitedRead, Framer};
pub use gdb::Gdb;
pub use registry::ThreadRegistry;
pub use session::Session;

// 他のクレートから使用するために再エクスポート
pub use lockdump_report::{Backtrace, Lwp, MutexSnapshot, StackFrame, Thread, ThreadSlot};

/// コア機能の結果型
pub type Result<T> = std::result::Result<T, Error>;
