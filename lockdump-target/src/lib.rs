//! lockdump デバッガプロセス制御
//!
//! このクレートは、外部デバッガ（gdb）のサブプロセスを起動し、
//! 標準入出力をバイト単位で読み書きするための低レベル機能を提供します。
//! フレーミングや応答の解釈は上位のクレートが担当します。

pub mod channel;
pub mod process;

pub use channel::Channel;
pub use process::{CommandChannel, LaunchSpec};

use thiserror::Error;

/// デバッガプロセス制御のエラー
#[derive(Debug, Error)]
pub enum ChannelError {
    /// デバッガを起動できなかった
    #[error("failed to launch debugger '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// ストリームが既に閉じられている
    #[error("debugger {0} stream is already closed")]
    Closed(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// プロセス制御の結果型
pub type Result<T> = std::result::Result<T, ChannelError>;
