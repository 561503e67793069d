//! gdb プロセスとのセッション

use crate::{CommandExecutor, Error, Framer, GdbCommand, GdbConfig, Result};
use lockdump_target::CommandChannel;
use object::{Object, ObjectKind, ReadCache};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tracing::{debug, info};

/// コアダンプを読み込んだ gdb
///
/// 起動時にバナーを読み捨て、`info proc` でダンプがプログラムに
/// 対応しているかを確認します。
pub struct Gdb {
    framer: Framer<CommandChannel>,
    program: PathBuf,
    dump: PathBuf,
}

impl Gdb {
    /// gdb を起動してダンプを開く
    pub fn open<P: AsRef<Path>, D: AsRef<Path>>(
        config: &GdbConfig,
        program: P,
        dump: D,
    ) -> Result<Self> {
        let program = program.as_ref().to_path_buf();
        let dump = dump.as_ref().to_path_buf();

        let channel = CommandChannel::spawn(&config.launch_spec(&program, &dump))?;
        let mut framer = Framer::new(channel, config.prompt.as_str(), config.sentinel.as_str());
        let banner = framer.skip_banner()?;
        debug!(%banner, "skipped gdb banner");

        let mut gdb = Self {
            framer,
            program,
            dump,
        };
        gdb.verify_dump()?;
        info!(program = %gdb.program.display(), dump = %gdb.dump.display(), "dump opened");
        Ok(gdb)
    }

    /// gdb を終了させる
    pub fn close(self) -> Result<ExitStatus> {
        Ok(self.framer.into_inner().close()?)
    }

    fn verify_dump(&mut self) -> Result<()> {
        let response = self.framer.command(&GdbCommand::InfoProc.to_string())?;
        if response
            .lines()
            .any(|line| line.trim_start().starts_with("exe = "))
        {
            return Ok(());
        }

        debug!(%response, "info proc did not report an executable");
        Err(probe_dump(&self.program, &self.dump))
    }
}

impl CommandExecutor for Gdb {
    fn command(&mut self, command: &str) -> Result<String> {
        self.framer.command(command)
    }
}

/// gdb がダンプを受け付けなかった理由をファイルを直接調べて判別する
fn probe_dump(program: &Path, dump: &Path) -> Error {
    let file = match File::open(dump) {
        Ok(file) => file,
        Err(e) => {
            return Error::DumpUnreadable {
                path: dump.display().to_string(),
                reason: e.to_string(),
            }
        }
    };

    let cache = ReadCache::new(file);
    let detail = match object::File::parse(&cache) {
        Ok(obj) if obj.kind() == ObjectKind::Core => String::new(),
        Ok(obj) => format!(" (it is a {:?} object, not a core dump)", obj.kind()),
        Err(e) => format!(" (not a recognised object file: {})", e),
    };

    Error::DumpMismatch {
        program: program.display().to_string(),
        dump: dump.display().to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_missing_dump() {
        let err = probe_dump(Path::new("./deadlock"), Path::new("/nonexistent/core.1234"));
        assert!(matches!(err, Error::DumpUnreadable { .. }));
    }

    #[test]
    fn test_probe_non_core_file() {
        // 読めるがコアダンプではない
        let path = std::env::temp_dir().join(format!("lockdump-probe-{}", std::process::id()));
        std::fs::write(&path, b"definitely not an ELF file").unwrap();

        let err = probe_dump(Path::new("./deadlock"), &path);
        std::fs::remove_file(&path).unwrap();

        match err {
            Error::DumpMismatch { detail, .. } => assert!(detail.contains("not a recognised")),
            other => panic!("expected DumpMismatch, got {:?}", other),
        }
    }
}
