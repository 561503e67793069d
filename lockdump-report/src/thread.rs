//! スレッド一覧（`info threads`）のパース

use crate::{fold_continuations, parse_hex, CallSite, FrameParser, ParseError, Result};
use regex::{Captures, Regex};
use std::fmt;
use tracing::debug;

/// カーネルから見たスレッドID（LWP）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lwp(pub u32);

impl fmt::Display for Lwp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// gdb のスレッド番号
///
/// 消滅したスレッドのプレースホルダは番号を持たず `Dead` になります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadSlot {
    Live(u32),
    Dead,
}

impl ThreadSlot {
    /// 消滅したスレッドかどうか
    pub fn is_dead(&self) -> bool {
        matches!(self, ThreadSlot::Dead)
    }
}

impl fmt::Display for ThreadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadSlot::Live(n) => write!(f, "{}", n),
            ThreadSlot::Dead => write!(f, "-"),
        }
    }
}

/// ダンプ内のスレッド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub slot: ThreadSlot,
    /// pthread ハンドル（`Thread 0x...` 形式の場合のみ）
    pub handle: Option<u64>,
    pub lwp: Lwp,
    pub name: Option<String>,
    /// 現在実行中のフレーム
    pub frame: CallSite,
}

impl Thread {
    /// 関数名として使うマーカー
    pub const DEAD_FUNCTION: &'static str = "<dead>";

    /// 消滅したスレッドのプレースホルダを作成する
    ///
    /// スレッドレジストリ以外からは呼ばないでください。
    pub fn dead(lwp: Lwp) -> Self {
        Self {
            slot: ThreadSlot::Dead,
            handle: None,
            lwp,
            name: None,
            frame: CallSite {
                address: 0,
                function: Self::DEAD_FUNCTION.to_string(),
                args: String::new(),
                location: None,
            },
        }
    }

    /// 現在の関数名を取得する
    pub fn function(&self) -> &str {
        &self.frame.function
    }

    /// 消滅したスレッドかどうか
    pub fn is_dead(&self) -> bool {
        self.slot.is_dead()
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            ThreadSlot::Dead => write!(f, "dead thread (LWP {})", self.lwp),
            ThreadSlot::Live(n) => {
                write!(f, "Thread {} (LWP {}", n, self.lwp)?;
                if let Some(handle) = self.handle {
                    write!(f, ", 0x{:x}", handle)?;
                }
                write!(f, ") in {}", self.frame.function)
            }
        }
    }
}

/// スレッド一覧のパーサ
///
/// 次の2つの形式を受け付けます。
/// - `2    Thread 0x7f0e6afd5700 (LWP 39089) __lll_lock_wait () at lowlevellock.S:135`
/// - `2    LWP 39089 __lll_lock_wait () at lowlevellock.S:135`
#[derive(Debug, Clone)]
pub struct ThreadCatalogParser {
    head: Regex,
    frame: FrameParser,
}

impl ThreadCatalogParser {
    /// スレッド一覧パーサを作成する
    pub fn new() -> Result<Self> {
        let head = Regex::new(
            r#"^(?P<slot>\d+)\s+(?:Thread\s+(?P<handle>0x[0-9a-fA-F]+)\s+\(LWP\s+(?P<lwp>\d+)\)|LWP\s+(?P<bare_lwp>\d+))(?:\s+"(?P<name>[^"]*)")?\s+(?P<frame>.+)$"#,
        )?;
        Ok(Self {
            head,
            frame: FrameParser::new()?,
        })
    }

    /// 1行をパースする
    ///
    /// どちらの文法にも一致しない行（ヘッダなど）は `Ok(None)`、
    /// 文法に一致したのに列が欠けている行は `Err` になります。
    pub fn parse_line(&self, line: &str) -> Result<Option<Thread>> {
        let line = line.trim_start();
        // 選択中のスレッドの印
        let line = line.strip_prefix('*').unwrap_or(line).trim();

        let caps = match self.head.captures(line) {
            Some(caps) => caps,
            None => return Ok(None),
        };
        let malformed = || ParseError::Line {
            kind: "thread",
            line: line.to_string(),
        };

        let slot = number(&caps, "slot").ok_or_else(malformed)?;
        let lwp = number(&caps, "lwp")
            .or_else(|| number(&caps, "bare_lwp"))
            .ok_or_else(malformed)?;
        let handle = match caps.name("handle") {
            Some(m) => Some(parse_hex(m.as_str()).map_err(|_| malformed())?),
            None => None,
        };

        let frame = self.frame.parse(&caps["frame"]).ok_or_else(malformed)?;
        if frame.location.is_none() {
            return Err(malformed());
        }

        Ok(Some(Thread {
            slot: ThreadSlot::Live(slot),
            handle,
            lwp: Lwp(lwp),
            name: caps.name("name").map(|m| m.as_str().to_string()),
            frame,
        }))
    }

    /// スレッド一覧全体をパースする
    ///
    /// 解釈できない行は読み飛ばします。
    pub fn parse(&self, report: &str) -> Vec<Thread> {
        let mut threads = Vec::new();
        for line in fold_continuations(report) {
            match self.parse_line(&line) {
                Ok(Some(thread)) => threads.push(thread),
                Ok(None) => debug!(line = %line, "skipping non-thread line"),
                Err(e) => debug!(error = %e, "skipping malformed thread line"),
            }
        }
        threads
    }
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}
