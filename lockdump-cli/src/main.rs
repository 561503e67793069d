//! lockdump CLI - コマンドラインインターフェース
//!
//! コアダンプからデッドロックに関わるスレッドを選び出して表示します。

mod shell;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lockdump_analysis::{analyze, render, PolicyParseError, SelectionPolicy};
use lockdump_core::{Gdb, GdbConfig, Session};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// lockdump - post-mortem deadlock analyzer
#[derive(Parser)]
#[command(name = "lockdump")]
#[command(version = "0.1.0")]
#[command(about = "Finds the threads responsible for a deadlock in a core dump", long_about = None)]
struct Cli {
    /// gdb executable
    #[arg(long, global = true, env = "LOCKDUMP_GDB", default_value = "gdb")]
    gdb: PathBuf,

    /// Extra argument passed to gdb before the program (repeatable)
    #[arg(long = "gdb-arg", global = true, allow_hyphen_values = true)]
    gdb_args: Vec<String>,

    /// Marker used to delimit gdb responses
    #[arg(long, global = true)]
    sentinel: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: LockdumpCommand,
}

#[derive(Subcommand)]
enum LockdumpCommand {
    /// Analyze a core dump and print the threads involved in the deadlock
    Analyze {
        /// Path to the executable that produced the dump
        program: PathBuf,

        /// Path to the core dump
        core: PathBuf,

        /// Selection policy: min-count, singleton or both
        #[arg(short, long, value_parser = parse_policies)]
        policy: Policies,
    },

    /// Open an interactive shell over the gdb session
    Shell {
        /// Path to the executable that produced the dump
        program: PathBuf,

        /// Path to the core dump
        core: PathBuf,
    },
}

/// 指定されたポリシーの並び
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policies(pub Vec<SelectionPolicy>);

/// ポリシー名をパースする（`both` は全ポリシー）
pub fn parse_policies(name: &str) -> std::result::Result<Policies, PolicyParseError> {
    if name == "both" {
        return Ok(Policies(SelectionPolicy::ALL.to_vec()));
    }
    Ok(Policies(vec![name.parse()?]))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = GdbConfig::default()
        .with_gdb_path(&cli.gdb)
        .with_extra_args(cli.gdb_args.clone());
    if let Some(sentinel) = &cli.sentinel {
        config = config.with_sentinel(sentinel.as_str());
    }

    match cli.command {
        LockdumpCommand::Analyze {
            program,
            core,
            policy,
        } => run_analyze(&config, &program, &core, &policy.0),
        LockdumpCommand::Shell { program, core } => {
            let session = open_session(&config, &program, &core)?;
            let session = shell::run_repl(session)?;
            close_session(session)
        }
    }
}

/// ログ出力を初期化する
///
/// レポートは stdout に出すので、ログは stderr に書きます。
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// gdb を起動してセッションを作る
fn open_session(config: &GdbConfig, program: &Path, core: &Path) -> Result<Session<Gdb>> {
    let gdb = Gdb::open(config, program, core).with_context(|| {
        format!(
            "failed to open {} against {}",
            core.display(),
            program.display()
        )
    })?;
    Ok(Session::new(gdb, config.clone())?)
}

/// gdb を終了する
fn close_session(session: Session<Gdb>) -> Result<()> {
    let status = session
        .into_executor()
        .close()
        .context("failed to stop gdb")?;
    info!(%status, "session closed");
    Ok(())
}

fn run_analyze(
    config: &GdbConfig,
    program: &Path,
    core: &Path,
    policies: &[SelectionPolicy],
) -> Result<()> {
    let mut session = open_session(config, program, core)?;

    let report = analyze(&mut session, policies).context("analysis failed")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render(&report, &mut session, &mut out).context("failed to print report")?;
    out.flush()?;

    close_session(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policies() {
        assert_eq!(
            parse_policies("min-count").unwrap(),
            Policies(vec![SelectionPolicy::MinCount])
        );
        assert_eq!(
            parse_policies("both").unwrap(),
            Policies(vec![SelectionPolicy::MinCount, SelectionPolicy::Singleton])
        );
        assert!(parse_policies("largest").is_err());
    }

    #[test]
    fn test_policy_is_required() {
        let result = Cli::try_parse_from(["lockdump", "analyze", "./a.out", "core.1"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "lockdump", "analyze", "./a.out", "core.1", "--policy", "singleton", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.gdb_args.is_empty());
        match cli.command {
            LockdumpCommand::Analyze { policy, .. } => {
                assert_eq!(policy, Policies(vec![SelectionPolicy::Singleton]))
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_gdb_args() {
        let cli = Cli::try_parse_from([
            "lockdump", "shell", "./a.out", "core.1", "--gdb-arg", "-nx", "--gdb-arg",
            "-iex=set auto-load off",
        ])
        .unwrap();
        assert_eq!(cli.gdb_args, vec!["-nx", "-iex=set auto-load off"]);
    }
}
