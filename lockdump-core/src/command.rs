//! gdb に送るコマンド

use std::fmt;

/// gdb コマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GdbCommand {
    /// スレッド一覧
    InfoThreads,
    /// 選択スレッドの切り替え
    Thread(u32),
    /// バックトレース表示
    Backtrace,
    /// フレームの選択
    Frame(u32),
    /// 選択フレームの引数表示
    InfoArgs,
    /// 式の評価
    Print(String),
    /// プロセス情報（ダンプの検証に使う）
    InfoProc,
}

impl fmt::Display for GdbCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GdbCommand::InfoThreads => write!(f, "info threads"),
            GdbCommand::Thread(n) => write!(f, "thread {}", n),
            GdbCommand::Backtrace => write!(f, "bt"),
            GdbCommand::Frame(n) => write!(f, "frame {}", n),
            GdbCommand::InfoArgs => write!(f, "info args"),
            GdbCommand::Print(expr) => write!(f, "print {}", expr),
            GdbCommand::InfoProc => write!(f, "info proc"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_commands() {
        assert_eq!(GdbCommand::InfoThreads.to_string(), "info threads");
        assert_eq!(GdbCommand::Thread(3).to_string(), "thread 3");
        assert_eq!(GdbCommand::Backtrace.to_string(), "bt");
        assert_eq!(GdbCommand::Frame(2).to_string(), "frame 2");
        assert_eq!(
            GdbCommand::Print("*(pthread_mutex_t*)0x10".into()).to_string(),
            "print *(pthread_mutex_t*)0x10"
        );
    }
}
