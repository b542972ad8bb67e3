use std::io::{self, Write};

/// 1 フレーム分の出力をためておくバッファ
///
/// 端末への書き込みを 1 回にまとめてちらつきを防ぐ。追加はベストエフォートで、
/// メモリ確保に失敗したときは何も言わずにその分を捨てる。メモリ不足の状況では
/// フレームが途中で切れることがある。
#[derive(Debug, Default)]
pub struct RenderBuffer {
    bytes: Vec<u8>,
}

impl RenderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// 末尾に追加する
    pub fn append(&mut self, bytes: &[u8]) {
        if self.bytes.try_reserve(bytes.len()).is_err() {
            return;
        }
        self.bytes.extend_from_slice(bytes);
    }

    pub fn append_str(&mut self, s: &str) {
        self.append(s.as_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// ためた内容をまとめて書き出し、バッファを捨てる
    pub fn flush_to<W: Write>(self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.bytes)?;
        out.flush()
    }
}

// termion のエスケープシーケンスを write! でそのまま積めるようにする
impl Write for RenderBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
