//! バックトレース（`bt`）のパース

use crate::{fold_continuations, CallSite, FrameParser, ParseError, Result};
use regex::Regex;
use std::fmt;
use tracing::debug;

/// スタックフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub index: u32,
    pub site: CallSite,
}

impl StackFrame {
    /// 関数名を取得する
    pub fn function(&self) -> &str {
        &self.site.function
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:<3} {}", self.index, self.site)
    }
}

/// 1スレッド分のバックトレース
///
/// フレーム番号は必ず1ずつ増加します。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backtrace {
    frames: Vec<StackFrame>,
}

impl Backtrace {
    /// フレーム列からバックトレースを作成する
    ///
    /// フレーム番号が連続していなければエラーになります。
    pub fn new(frames: Vec<StackFrame>) -> Result<Self> {
        for pair in frames.windows(2) {
            let expected = pair[0].index + 1;
            if pair[1].index != expected {
                return Err(ParseError::FrameGap {
                    expected,
                    found: pair[1].index,
                });
            }
        }
        Ok(Self { frames })
    }

    /// 空のバックトレース（消滅したスレッド用）
    pub fn empty() -> Self {
        Self::default()
    }

    /// 全てのフレームを取得する
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// 番号でフレームを取得する
    pub fn frame(&self, index: u32) -> Option<&StackFrame> {
        self.frames.iter().find(|f| f.index == index)
    }

    /// フレームがないかどうか
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// フレーム数
    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return writeln!(f, "    (no frames)");
        }
        for frame in &self.frames {
            writeln!(f, "    {}", frame)?;
        }
        Ok(())
    }
}

/// バックトレースのパーサ
#[derive(Debug, Clone)]
pub struct BacktraceParser {
    head: Regex,
    frame: FrameParser,
}

impl BacktraceParser {
    /// バックトレースパーサを作成する
    pub fn new() -> Result<Self> {
        let head = Regex::new(r"^#(?P<index>\d+)\s+(?P<frame>.+)$")?;
        Ok(Self {
            head,
            frame: FrameParser::new()?,
        })
    }

    /// 1行（継続行は連結済み）をパースする
    pub fn parse_frame(&self, line: &str) -> Result<Option<StackFrame>> {
        let line = line.trim();
        let caps = match self.head.captures(line) {
            Some(caps) => caps,
            None => return Ok(None),
        };
        let malformed = || ParseError::Line {
            kind: "frame",
            line: line.to_string(),
        };

        let index = caps["index"].parse().map_err(|_| malformed())?;
        let site = self.frame.parse(&caps["frame"]).ok_or_else(malformed)?;
        Ok(Some(StackFrame { index, site }))
    }

    /// バックトレース全体をパースする
    ///
    /// 個々の壊れた行は読み飛ばしますが、その結果フレーム番号が
    /// 飛んだ場合はエラーになります。
    pub fn parse(&self, report: &str) -> Result<Backtrace> {
        let mut frames = Vec::new();
        for line in fold_continuations(report) {
            match self.parse_frame(&line) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => debug!(line = %line, "skipping non-frame line"),
                Err(e) => debug!(error = %e, "skipping malformed frame line"),
            }
        }
        Backtrace::new(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;

    const BT: &str = "\
#0  __lll_lock_wait () at ../sysdeps/unix/sysv/linux/x86_64/lowlevellock.S:135
#1  0x00007f0e6b3d2dbd in __GI___pthread_mutex_lock (mutex=0x601080 <globallock>)
    at ../nptl/pthread_mutex_lock.c:80
#2  0x0000000000400a5e in inverted (ptr=0x0) at deadlock.c:38
#3  0x00007f0e6b3d06ba in start_thread (arg=0x7f0e69fd3700) at pthread_create.c:333
#4  0x00007f0e6b10641d in clone () from /lib64/libc.so.6
";

    #[test]
    fn test_parse_backtrace() {
        let parser = BacktraceParser::new().unwrap();
        let bt = parser.parse(BT).unwrap();
        assert_eq!(bt.len(), 5);

        let frame = bt.frame(1).unwrap();
        assert_eq!(frame.function(), "__GI___pthread_mutex_lock");
        assert_eq!(frame.site.address, 0x7f0e6b3d2dbd);
        assert_eq!(frame.site.args, "mutex=0x601080 <globallock>");
        assert_eq!(
            frame.site.location,
            Some(Location::At("../nptl/pthread_mutex_lock.c:80".into()))
        );

        assert_eq!(bt.frame(0).unwrap().site.address, 0);
        assert_eq!(bt.frame(4).unwrap().site.location.as_ref().unwrap().keyword(), "from");
    }

    #[test]
    fn test_indices_are_contiguous() {
        let parser = BacktraceParser::new().unwrap();
        let bt = parser.parse(BT).unwrap();
        let indices: Vec<u32> = bt.frames().iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_gap_is_an_error() {
        let parser = BacktraceParser::new().unwrap();
        let report = "#0  a () at a.c:1\n#1  b () at b.c:2\n#3  d () at d.c:4\n";
        match parser.parse(report) {
            Err(ParseError::FrameGap { expected, found }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected FrameGap, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_noise_and_unknown_frames() {
        let parser = BacktraceParser::new().unwrap();
        let report = "#0  a () at a.c:1\n#1  0x0000000000000000 in ?? ()\nBacktrace stopped: previous frame inner to this frame (corrupt stack?)\n";
        let bt = parser.parse(report).unwrap();
        assert_eq!(bt.len(), 2);
        assert_eq!(bt.frame(1).unwrap().function(), "??");
    }

    #[test]
    fn test_signal_frame_keeps_numbering() {
        let parser = BacktraceParser::new().unwrap();
        let report = "\
#0  0x00007f3c1c2429fc in __pthread_kill_implementation (no_tid=0, signo=6, threadid=139895) at ./nptl/pthread_kill.c:44
#1  0x00007f3c1c1ee476 in __GI_raise (sig=sig@entry=6) at ../sysdeps/posix/raise.c:26
#2  0x00007f3c1c1d47f3 in __GI_abort () at ./stdlib/abort.c:79
#3  0x000055d1c0a4a1b9 in std::sys::pal::unix::abort_internal () at library/std/src/sys/pal/unix/mod.rs:372
#4  <signal handler called>
#5  0x00007f3c1c291117 in __futex_abstimed_wait_common64 (private=128, cancel=true, abstime=0x0, op=265, expected=39089, futex_word=0x7f3c1bbff910) at ./nptl/futex-internal.c:57
#6  0x00007f3c1c296c78 in __pthread_clockjoin_ex (threadid=139895, thread_return=0x0, clockid=0, abstime=0x0, block=true) at ./nptl/pthread_join_common.c:105
";
        let bt = parser.parse(report).unwrap();
        assert_eq!(bt.len(), 7);

        let frame = bt.frame(4).unwrap();
        assert!(frame.site.is_synthetic());
        assert_eq!(frame.to_string(), "#4   <signal handler called>");
        assert_eq!(bt.frame(3).unwrap().function(), "std::sys::pal::unix::abort_internal");
        assert_eq!(bt.frame(5).unwrap().function(), "__futex_abstimed_wait_common64");
    }

    #[test]
    fn test_empty() {
        let bt = Backtrace::empty();
        assert!(bt.is_empty());
        assert_eq!(bt.to_string(), "    (no frames)\n");
    }
}
