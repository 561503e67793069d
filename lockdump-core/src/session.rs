//! ダンプ解析セッション
//!
//! スレッド一覧、バックトレース、ミューテックス待ちを必要になった時点で
//! gdb に問い合わせ、結果をセッションの間キャッシュします。
//! ダンプは静的なので、一度得た結果が変わることはありません。
//! 問い合わせに失敗した場合は何もキャッシュせず、次のアクセスで再試行します。

use crate::{CommandExecutor, Error, GdbCommand, GdbConfig, Result, ThreadRegistry};
use lockdump_report::{
    parse_hex, Backtrace, BacktraceParser, Lwp, MutexSnapshot, Thread, ThreadCatalogParser,
    ThreadSlot,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// ダンプ解析セッション
pub struct Session<E> {
    executor: E,
    config: GdbConfig,
    catalog_parser: ThreadCatalogParser,
    backtrace_parser: BacktraceParser,
    /// スレッドレジストリ（初回アクセスで読み込む）
    registry: Option<ThreadRegistry>,
    /// gdb 側で選択中のスレッド番号
    selected: Option<u32>,
    backtraces: HashMap<Lwp, Backtrace>,
    waits: HashMap<Lwp, Option<MutexSnapshot>>,
}

impl<E: CommandExecutor> Session<E> {
    /// 新しいセッションを作成する
    pub fn new(executor: E, config: GdbConfig) -> Result<Self> {
        Ok(Self {
            executor,
            config,
            catalog_parser: ThreadCatalogParser::new()?,
            backtrace_parser: BacktraceParser::new()?,
            registry: None,
            selected: None,
            backtraces: HashMap::new(),
            waits: HashMap::new(),
        })
    }

    /// コマンド実行器を取り出す
    pub fn into_executor(self) -> E {
        self.executor
    }

    /// 任意のコマンドをそのまま実行する
    ///
    /// gdb の選択状態が変わり得るので、選択中スレッドの記憶は捨てます。
    pub fn raw_command(&mut self, command: &str) -> Result<String> {
        self.selected = None;
        self.executor.command(command)
    }

    fn registry(&mut self) -> Result<&mut ThreadRegistry> {
        if self.registry.is_none() {
            let command = GdbCommand::InfoThreads.to_string();
            let response = self.executor.command(&command)?;
            let threads = self.catalog_parser.parse(&response);
            info!(count = threads.len(), "loaded thread list");
            self.registry = Some(ThreadRegistry::new(threads));
        }
        Ok(self.registry.get_or_insert_with(ThreadRegistry::default))
    }

    /// 生きているスレッドの一覧（`info threads` の順）
    pub fn threads(&mut self) -> Result<Vec<Thread>> {
        Ok(self.registry()?.live().cloned().collect())
    }

    /// 消滅スレッドのプレースホルダを含む全スレッド
    pub fn all_threads(&mut self) -> Result<Vec<Thread>> {
        Ok(self.registry()?.iter().cloned().collect())
    }

    /// LWP でスレッドを取得する
    pub fn thread(&mut self, lwp: Lwp) -> Result<&Thread> {
        self.registry()?.get(lwp).ok_or(Error::UnknownThread(lwp))
    }

    /// gdb のスレッド番号でスレッドを取得する
    pub fn thread_by_slot(&mut self, slot: u32) -> Result<Option<Thread>> {
        Ok(self
            .registry()?
            .live()
            .find(|t| t.slot == ThreadSlot::Live(slot))
            .cloned())
    }

    /// gdb 側でスレッドを選択する（選択済みなら何もしない）
    fn select(&mut self, thread: &Thread) -> Result<()> {
        let ThreadSlot::Live(slot) = thread.slot else {
            return Ok(());
        };
        if self.selected == Some(slot) {
            return Ok(());
        }

        let command = GdbCommand::Thread(slot).to_string();
        let response = self.executor.command(&command)?;
        // gdb のエラーは stderr に出るので、成功時の表示がなければ失敗とみなす。
        // 既に選択中のスレッドを指定すると `[Current thread is N ...]` になる
        if !response.contains("[Switching to thread ") && !response.contains("[Current thread is ") {
            return Err(Error::UnexpectedResponse { command, response });
        }
        self.selected = Some(slot);
        Ok(())
    }

    /// スレッドのバックトレースを取得する
    ///
    /// 消滅スレッドのバックトレースは空です。
    pub fn backtrace(&mut self, lwp: Lwp) -> Result<&Backtrace> {
        if !self.backtraces.contains_key(&lwp) {
            let backtrace = self.load_backtrace(lwp)?;
            self.backtraces.insert(lwp, backtrace);
        }
        Ok(&self.backtraces[&lwp])
    }

    fn load_backtrace(&mut self, lwp: Lwp) -> Result<Backtrace> {
        let thread = self.thread(lwp)?.clone();
        if thread.is_dead() {
            return Ok(Backtrace::empty());
        }

        self.select(&thread)?;
        let response = self.executor.command(&GdbCommand::Backtrace.to_string())?;
        Ok(self.backtrace_parser.parse(&response)?)
    }

    /// スレッドが待っているミューテックスを取得する
    ///
    /// ロック待ちの関数にいなければ `None` です。
    pub fn waiting_for(&mut self, lwp: Lwp) -> Result<Option<&MutexSnapshot>> {
        if !self.waits.contains_key(&lwp) {
            let thread = self.thread(lwp)?.clone();
            let mutex = if !thread.is_dead() && self.config.is_lock_wait(thread.function()) {
                Some(self.read_mutex(&thread)?)
            } else {
                None
            };
            self.waits.insert(lwp, mutex);
        }
        Ok(self.waits[&lwp].as_ref())
    }

    /// スレッドが待っているミューテックスの所有者を取得する
    ///
    /// 所有者が生きているスレッドになければ、消滅スレッドのプレースホルダになります。
    pub fn holder_of(&mut self, lwp: Lwp) -> Result<Option<Thread>> {
        let holder = match self.waiting_for(lwp)? {
            Some(mutex) => mutex.holder,
            None => return Ok(None),
        };
        Ok(Some(self.registry()?.resolve(holder).clone()))
    }

    fn read_mutex(&mut self, thread: &Thread) -> Result<MutexSnapshot> {
        self.select(thread)?;

        // ロック関数の位置は gdb と glibc のバージョンで変わる
        let mut last = None;
        for frame in self.config.lock_frames.clone() {
            let command = GdbCommand::Frame(frame).to_string();
            let response = self.executor.command(&command)?;
            if response.contains(&self.config.lock_function_marker) {
                last = None;
                break;
            }
            debug!(%thread, frame, "lock function not in this frame");
            last = Some((command, response));
        }
        if let Some((command, response)) = last {
            return Err(Error::UnexpectedResponse { command, response });
        }

        let command = GdbCommand::InfoArgs.to_string();
        let args = self.executor.command(&command)?;
        let prefix = format!("{} = ", self.config.mutex_argument);
        let matches: Vec<&str> = args
            .lines()
            .filter_map(|line| line.strip_prefix(prefix.as_str()))
            .collect();
        let value = match matches.as_slice() {
            [value] => value.split_whitespace().next().unwrap_or_default(),
            _ => {
                return Err(Error::UnexpectedResponse {
                    command,
                    response: args.clone(),
                })
            }
        };
        let address = parse_hex(value)?;

        let expression = format!("*({}*)0x{:x}", self.config.mutex_type, address);
        let dump = self.executor.expression(&expression)?;
        let mutex = MutexSnapshot::parse(address, &dump)?;
        debug!(%thread, %mutex, "thread is waiting");
        Ok(mutex)
    }
}
