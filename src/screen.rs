use std::fmt;
use std::io::Write;

use serde::Deserialize;
use unicode_width::UnicodeWidthChar;

use crate::VERSION;
use crate::buffer::RenderBuffer;
use crate::cursor::Cursor;
use crate::terminal::Size;

/// カーソルを左上へ
const CURSOR_HOME: &str = "\x1b[H";

/// 描画モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// カーソルを隠して再描画し、バナーとカーソル位置も描く
    #[default]
    Full,
    /// `~` の行だけを描く
    Plain,
}

/// 起動時に表示するバージョン表記
pub fn banner_text() -> String {
    format!("Kiro editor -- version {VERSION}")
}

/// 1 始まりのカーソル移動 (`ESC [ row ; col H`)
///
/// termion の `Goto` と違って 0 や負の座標もそのまま出力する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTo(pub Cursor);

impl fmt::Display for MoveTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{};{}H", self.0.y() + 1, self.0.x() + 1)
    }
}

pub struct Screen {
    mode: RenderMode,
    banner: Option<String>,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new(RenderMode::Full, Some(banner_text()))
    }
}

impl Screen {
    pub fn new(mode: RenderMode, banner: Option<String>) -> Self {
        Self { mode, banner }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// 1 フレームを組み立てる。書き出しは呼び出し側が 1 回で行う
    pub fn render_frame(&self, cursor: &Cursor, size: Size) -> RenderBuffer {
        let mut buf = RenderBuffer::with_capacity(usize::from(size.rows) * 8 + 32);

        match self.mode {
            RenderMode::Full => {
                // カーソルを隠す
                let _ = write!(buf, "{}", termion::cursor::Hide);
                buf.append_str(CURSOR_HOME);

                self.draw_rows(&mut buf, size, self.banner.as_deref());

                // カーソル位置に移動して表示
                let _ = write!(buf, "{}{}", MoveTo(*cursor), termion::cursor::Show);
            }
            RenderMode::Plain => {
                buf.append_str(CURSOR_HOME);
                self.draw_rows(&mut buf, size, None);
                buf.append_str(CURSOR_HOME);
            }
        }
        buf
    }

    fn draw_rows(&self, buf: &mut RenderBuffer, size: Size, banner: Option<&str>) {
        let banner_row = size.rows / 3;

        for y in 0..size.rows {
            match banner {
                Some(text) if y == banner_row => draw_banner(buf, text, size.cols),
                _ => buf.append_str("~"),
            }

            // 行末までクリア
            let _ = write!(buf, "{}", termion::clear::UntilNewline);
            // 最後の行は改行しない
            if y < size.rows - 1 {
                buf.append_str("\r\n");
            }
        }
    }
}

/// バナーを画面幅に切り詰め、中央に寄せて描く
fn draw_banner(buf: &mut RenderBuffer, text: &str, cols: u16) {
    let cols = usize::from(cols);
    let (text, width) = truncate_to_width(text, cols);

    let mut padding = (cols - width) / 2;
    if padding > 0 {
        buf.append_str("~");
        padding -= 1;
    }
    buf.append_str(&" ".repeat(padding));
    buf.append_str(text);
}

/// 表示幅が `max` 以下になる最長の先頭部分と、その表示幅
fn truncate_to_width(text: &str, max: usize) -> (&str, usize) {
    let mut width = 0;
    for (i, ch) in text.char_indices() {
        let w = ch.width().unwrap_or(0);
        if width + w > max {
            return (&text[..i], width);
        }
        width += w;
    }
    (text, width)
}
