//! フレーム記述（`0x... in func (args) at file`）のパース

use crate::{parse_hex, Result};
use regex::Regex;
use std::fmt;

/// 呼び出し位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// ソースファイル上の位置（`at file.c:12`）
    At(String),
    /// ソースのないライブラリ（`from /lib/libc.so.6`）
    From(String),
}

impl Location {
    /// ファイル名を取得する
    pub fn file(&self) -> &str {
        match self {
            Location::At(file) | Location::From(file) => file,
        }
    }

    /// gdb が使うキーワード（`at` / `from`）
    pub fn keyword(&self) -> &'static str {
        match self {
            Location::At(_) => "at",
            Location::From(_) => "from",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.keyword(), self.file())
    }
}

/// 関数呼び出し1つ分の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// 関数アドレス（表示されなかった場合は0）
    pub address: u64,
    pub function: String,
    /// 括弧の内側の引数テキスト（生のまま）
    pub args: String,
    pub location: Option<Location>,
}

impl CallSite {
    /// gdb が合成したフレーム（`<signal handler called>` など）かどうか
    pub fn is_synthetic(&self) -> bool {
        self.function.starts_with('<')
            && self.function.ends_with('>')
            && self.args.is_empty()
            && self.location.is_none()
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address != 0 {
            write!(f, "0x{:016x} in ", self.address)?;
        }
        if self.is_synthetic() {
            return write!(f, "{}", self.function);
        }
        write!(f, "{} ({})", self.function, self.args)?;
        if let Some(location) = &self.location {
            write!(f, " {}", location)?;
        }
        Ok(())
    }
}

/// フレーム記述のパーサ
///
/// スレッド一覧とバックトレースの両方で、行末のフレーム記述に使われます。
#[derive(Debug, Clone)]
pub struct FrameParser {
    pattern: Regex,
}

impl FrameParser {
    /// フレームパーサを作成する
    pub fn new() -> Result<Self> {
        // 例: 0x00007f0e6b3d0f2d in __GI___pthread_mutex_lock (mutex=0x601080 <globallock>) at pthread_mutex_lock.c:80
        // 関数名は空白を含み得る（`<F as FnOnce<()>>::call_once`、`foo<int, char>`）ので、
        // 引数リストは空白の直後の `(` から始まるものとする。
        // 合成フレームは `<signal handler called>` のように山括弧だけで書かれる。
        let pattern = Regex::new(
            r"^(?:(?P<addr>0x[0-9a-fA-F]+)\s+in\s+)?(?:(?P<synthetic><[^<>]+>)|(?P<func>.+?)\s+\((?P<args>.*)\)(?:\s+(?P<kw>at|from)\s+(?P<file>\S+))?)\s*$",
        )?;
        Ok(Self { pattern })
    }

    /// フレーム記述をパースする
    ///
    /// 文法に一致しなければ `None` を返します。
    pub fn parse(&self, text: &str) -> Option<CallSite> {
        let caps = self.pattern.captures(text.trim())?;

        let address = match caps.name("addr") {
            Some(m) => parse_hex(m.as_str()).ok()?,
            None => 0,
        };
        let location = match (caps.name("kw"), caps.name("file")) {
            (Some(kw), Some(file)) if kw.as_str() == "at" => {
                Some(Location::At(file.as_str().to_string()))
            }
            (Some(_), Some(file)) => Some(Location::From(file.as_str().to_string())),
            _ => None,
        };

        let function = caps.name("synthetic").or_else(|| caps.name("func"))?;
        Some(CallSite {
            address,
            function: function.as_str().to_string(),
            args: caps
                .name("args")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            location,
        })
    }
}
