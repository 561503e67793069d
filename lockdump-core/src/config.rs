//! gdb セッションの設定

use lockdump_target::LaunchSpec;
use std::path::{Path, PathBuf};

/// gdb と glibc の方言に依存する値をまとめた設定
#[derive(Debug, Clone)]
pub struct GdbConfig {
    /// gdb 実行ファイル
    pub gdb_path: PathBuf,
    /// 追加のコマンドライン引数
    pub extra_args: Vec<String>,
    /// REPLのプロンプト
    pub prompt: String,
    /// 応答の区切りに使う文字列
    pub sentinel: String,
    /// ロック待ちの低レベル関数
    pub lock_wait_functions: Vec<String>,
    /// 呼び出し元フレームにあるはずのロック関数名の一部
    pub lock_function_marker: String,
    /// ロック関数を探すフレーム番号（順に試す）
    pub lock_frames: Vec<u32>,
    /// ミューテックスを受け取る引数名
    pub mutex_argument: String,
    /// ミューテックスの型名
    pub mutex_type: String,
}

impl GdbConfig {
    /// デフォルト設定を作成する
    pub fn new() -> Self {
        Self {
            gdb_path: PathBuf::from("gdb"),
            extra_args: Vec::new(),
            prompt: "(gdb) ".to_string(),
            sentinel: format!("--lockdump-sentinel-{}--", std::process::id()),
            lock_wait_functions: vec!["__lll_lock_wait".to_string()],
            lock_function_marker: "pthread_mutex_lock".to_string(),
            lock_frames: vec![1, 2],
            mutex_argument: "mutex".to_string(),
            mutex_type: "pthread_mutex_t".to_string(),
        }
    }

    /// gdb 実行ファイルを設定する
    pub fn with_gdb_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.gdb_path = path.as_ref().to_path_buf();
        self
    }

    /// 番兵文字列を設定する
    pub fn with_sentinel<S: Into<String>>(mut self, sentinel: S) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// 追加引数を設定する
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// 関数がロック待ちの低レベル関数かどうか
    pub fn is_lock_wait(&self, function: &str) -> bool {
        self.lock_wait_functions.iter().any(|f| f == function)
    }

    /// プログラムとダンプを指定して起動パラメータを組み立てる
    pub fn launch_spec<P: AsRef<Path>, D: AsRef<Path>>(&self, program: P, dump: D) -> LaunchSpec {
        LaunchSpec::new(&self.gdb_path)
            .arg("-quiet")
            .args(&self.extra_args)
            .arg(program.as_ref())
            .arg(dump.as_ref())
            .env("TERM", "dumb")
    }
}

impl Default for GdbConfig {
    fn default() -> Self {
        Self::new()
    }
}
