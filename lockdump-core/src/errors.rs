//! エラー型

use lockdump_report::{Lwp, ParseError};
use lockdump_target::ChannelError;
use thiserror::Error;

/// lockdump のエラー
#[derive(Debug, Error)]
pub enum Error {
    /// デバッガプロセスの起動・入出力の失敗
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// gdb の出力を解釈できない
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// 番兵が見つからない（gdb がクラッシュ、ハング、または想定外の出力をした）
    #[error("lost framing with the debugger: {reason}\n--- last transcript ---\n{transcript}")]
    Framing { reason: String, transcript: String },

    /// ダンプファイルを読めない
    #[error("cannot read dump '{path}': {reason}")]
    DumpUnreadable { path: String, reason: String },

    /// ダンプがプログラムに対応していない
    #[error("dump '{dump}' does not belong to program '{program}'{detail}")]
    DumpMismatch {
        program: String,
        dump: String,
        detail: String,
    },

    /// コマンドの応答が想定した形ではない
    #[error("unexpected response to `{command}`: {response}")]
    UnexpectedResponse { command: String, response: String },

    /// レジストリにないスレッド
    #[error("unknown thread (LWP {0})")]
    UnknownThread(Lwp),
}
