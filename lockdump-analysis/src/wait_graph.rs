//! 待ちグラフ

use crate::Result;
use lockdump_core::{CommandExecutor, Session};
use lockdump_report::{Lwp, MutexSnapshot, Thread};
use tracing::debug;

/// 待ちスレッド →（ミューテックス）→ 所有者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitEdge {
    pub waiter: Thread,
    pub mutex: MutexSnapshot,
    pub holder: Thread,
}

/// 所有者ごとの待ちスレッド
#[derive(Debug, Clone, PartialEq, Eq)]
struct HolderEntry {
    holder: Thread,
    waiters: Vec<Thread>,
}

/// 所有者 → 待ちスレッド列 の対応
///
/// 所有者と待ちスレッドはどちらも最初に現れた順に並びます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitGraph {
    edges: Vec<WaitEdge>,
    holders: Vec<HolderEntry>,
}

impl WaitGraph {
    /// 空の待ちグラフを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// セッション内の全ての生きているスレッドから待ちグラフを作る
    pub fn build<E: CommandExecutor>(session: &mut Session<E>) -> Result<Self> {
        let mut graph = Self::new();
        for waiter in session.threads()? {
            let mutex = match session.waiting_for(waiter.lwp)? {
                Some(mutex) => mutex.clone(),
                None => continue,
            };
            let Some(holder) = session.holder_of(waiter.lwp)? else {
                continue;
            };
            debug!(%waiter, %holder, "wait edge");
            graph.add(WaitEdge {
                waiter,
                mutex,
                holder,
            });
        }
        Ok(graph)
    }

    /// 辺を追加する
    pub fn add(&mut self, edge: WaitEdge) {
        match self
            .holders
            .iter_mut()
            .find(|entry| entry.holder.lwp == edge.holder.lwp)
        {
            Some(entry) => entry.waiters.push(edge.waiter.clone()),
            None => self.holders.push(HolderEntry {
                holder: edge.holder.clone(),
                waiters: vec![edge.waiter.clone()],
            }),
        }
        self.edges.push(edge);
    }

    /// 全ての辺（待ちスレッドの順）
    pub fn edges(&self) -> &[WaitEdge] {
        &self.edges
    }

    /// 所有者と、その待ちスレッド
    pub fn holders(&self) -> impl Iterator<Item = (&Thread, &[Thread])> {
        self.holders
            .iter()
            .map(|entry| (&entry.holder, entry.waiters.as_slice()))
    }

    /// スレッドが待っている辺
    pub fn edge_of(&self, waiter: Lwp) -> Option<&WaitEdge> {
        self.edges.iter().find(|edge| edge.waiter.lwp == waiter)
    }

    /// 待ちがないかどうか
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
