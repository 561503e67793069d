//! 番兵による応答の切り出し
//!
//! gdb のREPLにはメッセージ境界がありません。コマンドの直後に
//! `print "<番兵>"` を送り、gdb がその評価結果をエコーするまで読み進めることで、
//! コマンドの応答を切り出します。

use crate::{Error, GdbCommand, Result};
use lockdump_target::Channel;
use tracing::{debug, trace};

/// 区切り文字列まで読み込む機能
pub trait DelimitedRead {
    /// 区切り文字列が現れるまで読み込み、区切りを含めて返す
    fn read_until(&mut self, delimiter: &[u8]) -> Result<Vec<u8>>;
}

impl<C: Channel + ?Sized> DelimitedRead for C {
    fn read_until(&mut self, delimiter: &[u8]) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        if delimiter.is_empty() {
            return Ok(data);
        }

        loop {
            // 区切りの先頭と一致している末尾部分の長さ。
            // 一致はこの位置より前からは始まり得ないので、
            // 残りちょうどの長さだけ読めば読み過ぎない。
            let overlap = suffix_prefix_overlap(&data, delimiter);
            let want = delimiter.len() - overlap;

            let chunk = self.read(want)?;
            if chunk.is_empty() {
                return Err(Error::Framing {
                    reason: "debugger closed its output before the sentinel".to_string(),
                    transcript: String::from_utf8_lossy(&data).into_owned(),
                });
            }
            trace!(bytes = chunk.len(), "read");

            let window = data.len() - overlap;
            data.extend_from_slice(&chunk);
            if let Some(pos) = find(&data[window..], delimiter) {
                let end = window + pos + delimiter.len();
                debug_assert_eq!(end, data.len());
                data.truncate(end);
                return Ok(data);
            }
        }
    }
}

/// `data` の末尾と `delimiter` の先頭が一致する最長の長さ（区切り全体は除く）
fn suffix_prefix_overlap(data: &[u8], delimiter: &[u8]) -> usize {
    let max = delimiter.len().saturating_sub(1).min(data.len());
    (1..=max)
        .rev()
        .find(|&n| data[data.len() - n..] == delimiter[..n])
        .unwrap_or(0)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// コマンドを実行して応答テキストを得る機能
pub trait CommandExecutor {
    /// コマンドを1つ実行し、プロンプトを除いた応答を返す
    fn command(&mut self, command: &str) -> Result<String>;

    /// 式を評価し、`$N = ` を除いた値を1行にして返す
    fn expression(&mut self, expression: &str) -> Result<String> {
        let command = GdbCommand::Print(expression.to_string()).to_string();
        let response = self.command(&command)?;
        match response.split_once(" = ") {
            Some((_, value)) => Ok(value.trim_end().replace('\n', " ")),
            None => Err(Error::UnexpectedResponse { command, response }),
        }
    }
}

/// チャネルを要求/応答の組に変換するフレーマ
///
/// コマンドは必ず1つずつ直列に実行されます。
pub struct Framer<C> {
    channel: C,
    prompt: String,
    sentinel: String,
    transcript: String,
}

impl<C: Channel> Framer<C> {
    /// 新しいフレーマを作成する
    pub fn new<P: Into<String>, S: Into<String>>(channel: C, prompt: P, sentinel: S) -> Self {
        Self {
            channel,
            prompt: prompt.into(),
            sentinel: sentinel.into(),
            transcript: String::new(),
        }
    }

    /// 起動時のバナーを読み捨てる
    pub fn skip_banner(&mut self) -> Result<String> {
        self.read_until_sentinel()
    }

    /// 内部のチャネルを取り出す
    pub fn into_inner(self) -> C {
        self.channel
    }

    fn read_until_sentinel(&mut self) -> Result<String> {
        self.channel
            .write(format!("print \"{}\"\n", self.sentinel).as_bytes())?;

        let expected = format!(" = \"{}\"\n", self.sentinel);
        let raw = match self.channel.read_until(expected.as_bytes()) {
            Ok(raw) => raw,
            Err(Error::Framing { reason, transcript }) => {
                self.transcript = transcript.clone();
                return Err(Error::Framing { reason, transcript });
            }
            Err(e) => return Err(e),
        };
        self.transcript = String::from_utf8_lossy(&raw).into_owned();

        // 末尾は `(gdb) $12 = "<番兵>"` になっている
        let echo = format!("{}$", self.prompt);
        let pos = self
            .transcript
            .rfind(&echo)
            .ok_or_else(|| self.framing_error("sentinel echo without a prompt"))?;
        let body = &self.transcript[..pos];
        Ok(body.strip_suffix('\n').unwrap_or(body).to_string())
    }

    fn framing_error(&self, reason: &str) -> Error {
        Error::Framing {
            reason: reason.to_string(),
            transcript: self.transcript.clone(),
        }
    }
}

impl<C: Channel> CommandExecutor for Framer<C> {
    fn command(&mut self, command: &str) -> Result<String> {
        debug!(command, "gdb <");
        self.channel.write(format!("{}\n", command).as_bytes())?;

        let response = self.read_until_sentinel()?;
        match response.strip_prefix(&self.prompt) {
            Some(body) => Ok(body.to_string()),
            None => Err(self.framing_error(&format!(
                "response to `{}` does not start with the prompt",
                command
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockdump_target::Result as ChannelResult;
    use std::collections::VecDeque;

    /// 決められた区切り方で出力を返すチャネル
    struct ChunkedChannel {
        data: Vec<u8>,
        pos: usize,
        /// 1回の read で返す最大バイト数（順に使い、尽きたら無制限）
        limits: VecDeque<usize>,
        written: Vec<u8>,
    }

    impl ChunkedChannel {
        fn new(data: &[u8], limits: Vec<usize>) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                limits: limits.into(),
                written: Vec::new(),
            }
        }
    }

    impl Channel for ChunkedChannel {
        fn read(&mut self, size: usize) -> ChannelResult<Vec<u8>> {
            let limit = self.limits.pop_front().unwrap_or(usize::MAX);
            let n = size.min(limit).min(self.data.len() - self.pos);
            let out = self.data[self.pos..self.pos + n].to_vec();
            self.pos += n;
            Ok(out)
        }

        fn write(&mut self, data: &[u8]) -> ChannelResult<()> {
            self.written.extend_from_slice(data);
            Ok(())
        }
    }

    /// 長さ `len` の列に対する、区切り位置の全組み合わせ
    fn all_splits(len: usize) -> Vec<Vec<usize>> {
        let mut splits = Vec::new();
        for mask in 0u32..(1 << len.saturating_sub(1)) {
            let mut chunks = Vec::new();
            let mut size = 1;
            for bit in 0..len.saturating_sub(1) {
                if mask & (1 << bit) != 0 {
                    chunks.push(size);
                    size = 1;
                } else {
                    size += 1;
                }
            }
            chunks.push(size);
            splits.push(chunks);
        }
        splits
    }

    #[test]
    fn test_overlap() {
        assert_eq!(suffix_prefix_overlap(b"xxab", b"abc"), 2);
        assert_eq!(suffix_prefix_overlap(b"xxa", b"abc"), 1);
        assert_eq!(suffix_prefix_overlap(b"xxx", b"abc"), 0);
        assert_eq!(suffix_prefix_overlap(b"", b"abc"), 0);
        assert_eq!(suffix_prefix_overlap(b"aaa", b"aaab"), 3);
    }

    #[test]
    fn test_reconstruction_under_every_split() {
        let delimiter = b"<END>";
        for response in [&b""[..], b"ok", b"<EN<E>", b"a<b>c\nde"] {
            let mut stream = response.to_vec();
            stream.extend_from_slice(delimiter);
            stream.extend_from_slice(b"trailing");

            for split in all_splits(stream.len().min(14)) {
                let mut channel = ChunkedChannel::new(&stream, split.clone());
                let got = channel.read_until(delimiter).unwrap();
                assert_eq!(&got[..got.len() - delimiter.len()], response, "split {:?}", split);
                assert!(got.ends_with(delimiter));
                // 区切りの後ろは読まない
                assert_eq!(channel.pos, response.len() + delimiter.len());
            }
        }
    }

    #[test]
    fn test_self_overlapping_delimiter() {
        // "aa" を読んだ後に "aa" が来ると末尾 "aaa" が先頭と一致する
        let delimiter = b"aaab";
        for split in all_splits(8) {
            let mut channel = ChunkedChannel::new(b"xaaaaabz", split.clone());
            let got = channel.read_until(delimiter).unwrap();
            assert_eq!(got, b"xaaaaab", "split {:?}", split);
        }
    }

    #[test]
    fn test_single_byte_delimiter() {
        let mut channel = ChunkedChannel::new(b"abc\ndef\n", vec![]);
        assert_eq!(channel.read_until(b"\n").unwrap(), b"abc\n");
        assert_eq!(channel.read_until(b"\n").unwrap(), b"def\n");
    }

    #[test]
    fn test_partial_occurrence_is_not_a_match() {
        let mut channel = ChunkedChannel::new(b"<EN<END", vec![3, 1, 1, 1, 1]);
        assert!(matches!(
            channel.read_until(b"<END>"),
            Err(Error::Framing { .. })
        ));
    }

    #[test]
    fn test_eof_before_delimiter() {
        let mut channel = ChunkedChannel::new(b"gdb crashed", vec![]);
        match channel.read_until(b"<END>") {
            Err(Error::Framing { transcript, .. }) => assert_eq!(transcript, "gdb crashed"),
            other => panic!("expected Framing, got {:?}", other),
        }
    }

    #[test]
    fn test_framer_command() {
        let output = "Reading symbols from ./deadlock...done.\n(gdb) $1 = \"--S--\"\n\
                      (gdb) process 4711\nexe = '/tmp/deadlock'\n(gdb) $2 = \"--S--\"\n\
                      (gdb) (gdb) $3 = \"--S--\"\n";
        let channel = ChunkedChannel::new(output.as_bytes(), vec![7; 64]);
        let mut framer = Framer::new(channel, "(gdb) ", "--S--");

        assert_eq!(framer.skip_banner().unwrap(), "Reading symbols from ./deadlock...done.");
        assert_eq!(
            framer.command("info proc").unwrap(),
            "process 4711\nexe = '/tmp/deadlock'"
        );
        assert_eq!(framer.command("thread 1").unwrap(), "");

        let written = String::from_utf8(framer.into_inner().written).unwrap();
        assert_eq!(
            written,
            "print \"--S--\"\ninfo proc\nprint \"--S--\"\nthread 1\nprint \"--S--\"\n"
        );
    }

    #[test]
    fn test_framer_expression() {
        let output = "(gdb) $1 = {__lock = 2,\n  __owner = 7}\n(gdb) $2 = \"--S--\"\n";
        let channel = ChunkedChannel::new(output.as_bytes(), vec![]);
        let mut framer = Framer::new(channel, "(gdb) ", "--S--");

        assert_eq!(
            framer.expression("*(pthread_mutex_t*)0x10").unwrap(),
            "{__lock = 2,   __owner = 7}"
        );
    }

    #[test]
    fn test_framer_keeps_transcript_on_failure() {
        let channel = ChunkedChannel::new(b"(gdb) Segmentation fault\n", vec![]);
        let mut framer = Framer::new(channel, "(gdb) ", "--S--");

        match framer.command("bt") {
            Err(Error::Framing { transcript, .. }) => {
                assert_eq!(transcript, "(gdb) Segmentation fault\n")
            }
            other => panic!("expected Framing, got {:?}", other),
        }
    }
}
