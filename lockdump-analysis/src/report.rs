//! 解析結果のテキストレポート

use crate::{DeadlockSetSelector, Result, SelectionPolicy, WaitEdge, WaitGraph};
use lockdump_core::{CommandExecutor, Session};
use lockdump_report::{Lwp, Thread};
use std::io::Write;
use tracing::info;

/// ポリシーごとの説明用スレッド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevantSection {
    pub policy: SelectionPolicy,
    pub threads: Vec<Thread>,
}

/// 消滅したスレッドを待っているスレッド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadChain {
    pub holder: Thread,
    pub waiters: Vec<Thread>,
}

/// 解析結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// 全ての待ち
    pub waiting: Vec<WaitEdge>,
    pub sections: Vec<RelevantSection>,
    pub dead_chains: Vec<DeadChain>,
}

impl Report {
    /// スレッドが待っている所有者
    pub fn holder_of(&self, lwp: Lwp) -> Option<&Thread> {
        self.waiting
            .iter()
            .find(|edge| edge.waiter.lwp == lwp)
            .map(|edge| &edge.holder)
    }
}

/// セッションを解析する
///
/// ポリシーは1つ以上指定する必要があります。指定した順にセクションを作ります。
pub fn analyze<E: CommandExecutor>(
    session: &mut Session<E>,
    policies: &[SelectionPolicy],
) -> Result<Report> {
    anyhow::ensure!(!policies.is_empty(), "no selection policy given");

    let graph = WaitGraph::build(session)?;
    let selector = DeadlockSetSelector::new(&graph);
    info!(waiting = graph.edges().len(), "built wait graph");

    let sections = policies
        .iter()
        .map(|&policy| RelevantSection {
            policy,
            threads: selector
                .relevant_threads(policy)
                .into_iter()
                .cloned()
                .collect(),
        })
        .collect();

    let dead_chains = selector
        .dead_chains()
        .into_iter()
        .map(|(holder, waiters)| DeadChain {
            holder: holder.clone(),
            waiters: waiters.to_vec(),
        })
        .collect();

    Ok(Report {
        waiting: graph.edges().to_vec(),
        sections,
        dead_chains,
    })
}

/// レポートを書き出す
///
/// バックトレースはここで初めて問い合わせます。
pub fn render<E: CommandExecutor, W: Write>(
    report: &Report,
    session: &mut Session<E>,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "-- all waiting threads --")?;
    if report.waiting.is_empty() {
        writeln!(out, "(none)")?;
    }
    for edge in &report.waiting {
        writeln!(out, "{}", edge.waiter)?;
        writeln!(out, "    waits for {} ({})", edge.holder, edge.mutex)?;
    }
    writeln!(out)?;

    for section in &report.sections {
        writeln!(out, "-- relevant threads ({}) --", section.policy)?;
        if section.threads.is_empty() {
            writeln!(out, "(none)")?;
            writeln!(out)?;
        }
        for thread in &section.threads {
            writeln!(out, "{}", thread)?;
            write!(out, "{}", session.backtrace(thread.lwp)?)?;
            if let Some(holder) = report.holder_of(thread.lwp) {
                writeln!(out, "    waits for {}", holder)?;
            }
            writeln!(out)?;
        }
    }

    for chain in &report.dead_chains {
        for waiter in &chain.waiters {
            writeln!(out, "-- waiting on {} --", chain.holder)?;
            writeln!(out, "{}", waiter)?;
            write!(out, "{}", session.backtrace(waiter.lwp)?)?;
            writeln!(out)?;
        }
    }

    Ok(())
}
