//! 対話シェル
//!
//! 組み込みコマンド以外は、そのまま gdb に送って応答を表示します。

use crate::parse_policies;
use anyhow::{Context, Result};
use lockdump_analysis::{analyze, render, SelectionPolicy, WaitGraph};
use lockdump_core::{Gdb, Session};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::warn;

/// シェルコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// スレッド一覧（消滅スレッドを含む）
    Threads,
    /// ミューテックス待ちの一覧
    Waits,
    /// 指定スレッドのバックトレース
    Backtrace(u32),
    /// 解析レポート
    Report(Vec<SelectionPolicy>),
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
    /// gdb にそのまま送る
    Raw(String),
    /// 引数が不正
    Usage(&'static str),
}

impl ShellCommand {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return None;
        }

        let command = match parts[0] {
            "threads" => ShellCommand::Threads,
            "waits" => ShellCommand::Waits,
            // 番号なしの bt は gdb の bt として扱う
            "bt" if parts.len() == 2 => match parts[1].parse() {
                Ok(slot) => ShellCommand::Backtrace(slot),
                Err(_) => ShellCommand::Usage("bt <thread number>"),
            },
            "report" => match parts.get(1).map(|name| parse_policies(name)) {
                Some(Ok(policies)) => ShellCommand::Report(policies.0),
                _ => ShellCommand::Usage("report <min-count|singleton|both>"),
            },
            "help" | "h" | "?" => ShellCommand::Help,
            "quit" | "q" | "exit" => ShellCommand::Quit,
            _ => ShellCommand::Raw(input.to_string()),
        };
        Some(command)
    }
}

fn history_path() -> Option<PathBuf> {
    home::home_dir().map(|dir| dir.join(".lockdump_history"))
}

/// REPLループを実行する
///
/// 終了時にセッションを返すので、呼び出し側で gdb を閉じます。
pub fn run_repl(mut session: Session<Gdb>) -> Result<Session<Gdb>> {
    println!("lockdump shell");
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        // 初回は履歴ファイルがない
        let _ = rl.load_history(path);
    }

    loop {
        let readline = rl.readline("(lockdump) ");
        match readline {
            Ok(line) => {
                let command = match ShellCommand::parse(&line) {
                    Some(command) => command,
                    None => continue,
                };
                rl.add_history_entry(line.trim())?;

                if command == ShellCommand::Quit {
                    break;
                }
                if let Err(e) = handle_command(&mut session, command) {
                    eprintln!("Error: {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            warn!(path = %path.display(), error = %e, "failed to save history");
        }
    }
    Ok(session)
}

fn handle_command(session: &mut Session<Gdb>, command: ShellCommand) -> Result<()> {
    match command {
        ShellCommand::Threads => {
            for thread in session.all_threads()? {
                println!("{}", thread);
            }
        }
        ShellCommand::Waits => {
            let graph = WaitGraph::build(session)?;
            if graph.is_empty() {
                println!("No thread is waiting on a mutex");
            }
            for edge in graph.edges() {
                println!("{} waits for {} ({})", edge.waiter, edge.holder, edge.mutex);
            }
        }
        ShellCommand::Backtrace(slot) => {
            let thread = session
                .thread_by_slot(slot)?
                .with_context(|| format!("no thread {}", slot))?;
            println!("{}", thread);
            print!("{}", session.backtrace(thread.lwp)?);
        }
        ShellCommand::Report(policies) => {
            let report = analyze(session, &policies)?;
            render(&report, session, &mut std::io::stdout())?;
        }
        ShellCommand::Help => print_help(),
        ShellCommand::Raw(line) => {
            let response = session.raw_command(&line)?;
            if !response.is_empty() {
                println!("{}", response);
            }
        }
        ShellCommand::Usage(usage) => println!("Usage: {}", usage),
        ShellCommand::Quit => {}
    }
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help             - Show this help message");
    println!("  quit/exit/q      - Exit the shell");
    println!();
    println!("Analysis commands:");
    println!("  threads          - List threads, including dead mutex holders");
    println!("  waits            - Show which thread waits for which holder");
    println!("  bt <n>           - Show the backtrace of thread <n>");
    println!("  report <policy>  - Print the deadlock report (min-count, singleton, both)");
    println!();
    println!("Anything else is sent to gdb as is.");
    println!();
    println!("Examples:");
    println!("  report both");
    println!("  bt 3");
    println!("  info sharedlibrary");
}
