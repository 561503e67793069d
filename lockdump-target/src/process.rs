//! デバッガサブプロセスの制御

use crate::{Channel, ChannelError, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::ffi::{OsStr, OsString};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

/// デバッガの起動パラメータ
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
}

impl LaunchSpec {
    /// 起動するプログラムを指定して作成する
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// 引数を追加する
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// 複数の引数を追加する
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// 環境変数を設定する
    ///
    /// 子プロセスの環境は空から始まり、`PATH` だけが親から引き継がれます。
    pub fn env<K: AsRef<OsStr>, V: AsRef<OsStr>>(mut self, key: K, value: V) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// プログラムのパスを取得する
    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// デバッガプロセスとの入出力チャネル
///
/// 生成時に起動し、`close` またはドロップ時に必ず後始末します。
/// 入力と出力を閉じ、まだ終了していなければ SIGKILL で強制終了してから
/// 終了ステータスを回収します。
pub struct CommandChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    exit_status: Option<ExitStatus>,
}

impl CommandChannel {
    /// デバッガを起動する
    ///
    /// 標準エラー出力は捨てられます。
    pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }
        command.envs(spec.env.iter().map(|(k, v)| (k, v)));

        let mut child = command.spawn().map_err(|source| ChannelError::Launch {
            program: spec.program.display().to_string(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        info!(pid = child.id(), program = %spec.program.display(), "debugger started");

        Ok(Self {
            child,
            stdin,
            stdout,
            exit_status: None,
        })
    }

    /// 回収済みの終了ステータスを取得する
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// チャネルを閉じて終了ステータスを返す
    pub fn close(mut self) -> Result<ExitStatus> {
        self.release()
    }

    fn release(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        drop(self.stdin.take());
        drop(self.stdout.take());

        if self.child.try_wait()?.is_none() {
            let pid = Pid::from_raw(self.child.id() as i32);
            debug!(%pid, "debugger still running, sending SIGKILL");
            // ESRCH: 直前に自分で終了した
            if let Err(e) = kill(pid, Signal::SIGKILL) {
                if e != nix::errno::Errno::ESRCH {
                    warn!(%pid, error = %e, "failed to kill debugger");
                }
            }
        }

        let status = self.child.wait()?;
        info!(pid = self.child.id(), %status, "debugger exited");
        self.exit_status = Some(status);
        Ok(status)
    }
}

impl Channel for CommandChannel {
    fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        let stdout = self.stdout.as_mut().ok_or(ChannelError::Closed("output"))?;
        let mut buf = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(ChannelError::Closed("input"))?;
        stdin.write_all(data)?;
        stdin.flush()?;
        Ok(())
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        if self.exit_status.is_none() {
            let _ = self.release();
        }
    }
}
