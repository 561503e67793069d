//! バイト単位の入出力チャネル

use crate::Result;

/// デバッガとの生のバイト入出力
///
/// 応答の区切りを知らない単純なストリームです。
/// メッセージの切り出しは上位のフレーマが行います。
pub trait Channel {
    /// 最大 `size` バイトを読み込む
    ///
    /// `size` バイト揃うかEOFに達するまでブロックします。
    /// 空のベクタはEOFを意味します。
    fn read(&mut self, size: usize) -> Result<Vec<u8>>;

    /// データをすべて書き込む
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        (**self).read(size)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        (**self).read(size)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }
}
