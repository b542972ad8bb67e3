use std::io::{Read, Write};

use tracing::{debug, info};

use crate::buffer::RenderBuffer;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::input::{self, Key, ctrl_key};
use crate::screen::Screen;
use crate::terminal::Size;

/// 終了キー (Ctrl-Q)
pub const QUIT_KEY: u8 = ctrl_key(b'q');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Terminated,
}

/// 描画とキー入力を繰り返すエディタ本体
///
/// カーソルと画面サイズはここだけが持つ。入出力は端末に限らず
/// `Read` / `Write` であれば何でもよい。
pub struct Editor<I, O> {
    input: I,
    output: O,
    screen: Screen,
    cursor: Cursor,
    size: Size,
    state: State,
}

impl<I: Read, O: Write> Editor<I, O> {
    pub fn new(input: I, output: O, size: Size, screen: Screen) -> Self {
        Self {
            input,
            output,
            screen,
            cursor: Cursor::new(),
            size,
            state: State::Running,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// 終了キーが押されるまでループする
    pub fn run(&mut self) -> Result<()> {
        info!(rows = self.size.rows, cols = self.size.cols, "editor started");
        while self.state == State::Running {
            self.refresh_screen()?;
            self.process_keypress()?;
        }
        Ok(())
    }

    pub fn refresh_screen(&mut self) -> Result<()> {
        let frame = self.screen.render_frame(&self.cursor, self.size);
        frame
            .flush_to(&mut self.output)
            .map_err(|source| Error::Io { op: "write", source })
    }

    pub fn process_keypress(&mut self) -> Result<()> {
        let key = input::read_key(&mut self.input)?;
        self.handle_key(key)
    }

    pub fn handle_key(&mut self, key: Key) -> Result<()> {
        match key {
            Key::ArrowLeft => self.cursor.move_left(),
            Key::ArrowRight => self.cursor.move_right(),
            Key::ArrowUp => self.cursor.move_up(),
            Key::ArrowDown => self.cursor.move_down(),
            Key::Char(QUIT_KEY) => return self.quit(),
            _ => {}
        }
        debug!(x = self.cursor.x(), y = self.cursor.y(), "cursor");
        Ok(())
    }

    /// 画面をクリアしてカーソルを左上に戻し、ループを終える
    fn quit(&mut self) -> Result<()> {
        let mut buf = RenderBuffer::new();
        let _ = write!(buf, "{}\x1b[H", termion::clear::All);
        buf.flush_to(&mut self.output)
            .map_err(|source| Error::Io { op: "write", source })?;
        self.state = State::Terminated;
        info!("quit");
        Ok(())
    }
}
