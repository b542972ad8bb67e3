use std::io::{self, Read};

use tracing::trace;

use crate::error::{Error, Result};

const ESC: u8 = 0x1b;

/// Ctrl と同時に押したときのキーコード
pub const fn ctrl_key(k: u8) -> u8 {
    k & 0x1f
}

/// デコード済みのキー入力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(u8),
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    /// 単独の ESC、または未対応のエスケープシーケンス
    Escape,
}

/// 1 バイト読めるまでブロックする
///
/// raw mode では VTIME によって read が 0 バイトで戻ってくるので、その場合と
/// `WouldBlock` は読み直す。それ以外のエラーは致命的エラーとして返す。
pub fn read_byte<R: Read>(input: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    loop {
        match input.read(&mut byte) {
            Ok(1) => return Ok(byte[0]),
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(source) => return Err(Error::Io { op: "read", source }),
        }
    }
}

/// read を 1 回だけ試す。ちょうど 1 バイト読めなければ `None`
pub fn read_byte_once<R: Read>(input: &mut R) -> Option<u8> {
    let mut byte = [0u8; 1];
    match input.read(&mut byte) {
        Ok(1) => Some(byte[0]),
        _ => None,
    }
}

/// キー入力を 1 つ読み取る
///
/// 呼び出しをまたいで状態は持たない。エスケープシーケンスの途中で入力が
/// 途切れた場合は `Key::Escape` になる。
pub fn read_key<R: Read>(input: &mut R) -> Result<Key> {
    let c = read_byte(input)?;
    if c != ESC {
        trace!(byte = c, "key");
        return Ok(Key::Char(c));
    }

    let Some(first) = read_byte_once(input) else {
        return Ok(Key::Escape);
    };
    let Some(second) = read_byte_once(input) else {
        return Ok(Key::Escape);
    };

    let key = match (first, second) {
        (b'[', b'A') => Key::ArrowUp,
        (b'[', b'B') => Key::ArrowDown,
        (b'[', b'C') => Key::ArrowRight,
        (b'[', b'D') => Key::ArrowLeft,
        _ => Key::Escape,
    };
    trace!(?key, "escape sequence");
    Ok(key)
}
