//! スレッドレジストリ

use lockdump_report::{Lwp, Thread};
use std::collections::HashMap;
use tracing::{info, warn};

/// セッションが所有する全スレッド
///
/// 生きているスレッドに加え、所有者が見つからなかったミューテックスのために
/// 作られた消滅スレッドのプレースホルダも保持します。
/// プレースホルダは LWP ごとに高々1つです。
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: Vec<Thread>,
    index: HashMap<Lwp, usize>,
}

impl ThreadRegistry {
    /// スレッド一覧からレジストリを作成する
    pub fn new(live: Vec<Thread>) -> Self {
        let mut registry = Self::default();
        for thread in live {
            if registry.index.contains_key(&thread.lwp) {
                warn!(lwp = %thread.lwp, "duplicate LWP in thread list, keeping the first");
                continue;
            }
            registry.index.insert(thread.lwp, registry.threads.len());
            registry.threads.push(thread);
        }
        registry
    }

    /// LWP でスレッドを取得する
    pub fn get(&self, lwp: Lwp) -> Option<&Thread> {
        self.index.get(&lwp).map(|&i| &self.threads[i])
    }

    /// LWP をスレッドに解決する
    ///
    /// 生きているスレッドになければ消滅スレッドのプレースホルダを登録して返します。
    /// 同じ LWP で再度呼ぶと、前回作ったプレースホルダが返ります。
    pub fn resolve(&mut self, lwp: Lwp) -> &Thread {
        let i = match self.index.get(&lwp) {
            Some(&i) => i,
            None => {
                info!(%lwp, "mutex holder is not a live thread, registering dead thread");
                self.threads.push(Thread::dead(lwp));
                self.index.insert(lwp, self.threads.len() - 1);
                self.threads.len() - 1
            }
        };
        &self.threads[i]
    }

    /// 全てのスレッド（一覧の順、プレースホルダは末尾）
    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }

    /// 生きているスレッド
    pub fn live(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter().filter(|t| !t.is_dead())
    }

    /// 消滅スレッドのプレースホルダ
    pub fn dead(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter().filter(|t| t.is_dead())
    }

    /// スレッド数
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// スレッドがないかどうか
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}
