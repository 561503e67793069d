//! デッドロックを説明するスレッドの選択

use crate::{SelectionPolicy, WaitGraph};
use lockdump_report::Thread;

/// 待ちグラフから説明に必要なスレッドを選び出す
pub struct DeadlockSetSelector<'g> {
    graph: &'g WaitGraph,
}

impl<'g> DeadlockSetSelector<'g> {
    /// 待ちグラフに対するセレクタを作成する
    pub fn new(graph: &'g WaitGraph) -> Self {
        Self { graph }
    }

    /// ポリシーに従って所有者を選ぶ
    pub fn selected_holders(&self, policy: SelectionPolicy) -> Vec<&'g Thread> {
        let holders = self.graph.holders();
        match policy {
            SelectionPolicy::MinCount => {
                let min = match self.graph.holders().map(|(_, w)| w.len()).min() {
                    Some(min) => min,
                    None => return Vec::new(),
                };
                holders
                    .filter(|(_, waiters)| waiters.len() <= min)
                    .map(|(holder, _)| holder)
                    .collect()
            }
            SelectionPolicy::Singleton => holders
                .filter(|(_, waiters)| waiters.len() == 1)
                .map(|(holder, _)| holder)
                .collect(),
        }
    }

    /// 選んだ所有者と、その所有者自身が待っている相手（1段だけ）
    ///
    /// 同じスレッドは一度しか含めません。
    pub fn relevant_threads(&self, policy: SelectionPolicy) -> Vec<&'g Thread> {
        let mut relevant: Vec<&'g Thread> = Vec::new();
        let mut push = |thread: &'g Thread| {
            if !relevant.iter().any(|t| t.lwp == thread.lwp) {
                relevant.push(thread);
            }
        };

        for holder in self.selected_holders(policy) {
            push(holder);
            if let Some(edge) = self.graph.edge_of(holder.lwp) {
                push(&edge.holder);
            }
        }
        relevant
    }

    /// 消滅したスレッドが持つミューテックスを待っているスレッド
    ///
    /// ポリシーによる選択では漏れることがあるので、全ての所有者を調べます。
    pub fn dead_chains(&self) -> Vec<(&'g Thread, &'g [Thread])> {
        self.graph
            .holders()
            .filter(|(holder, _)| holder.is_dead())
            .collect()
    }
}
