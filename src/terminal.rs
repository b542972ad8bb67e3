use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, RawFd};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::input;

/// カーソル位置の問い合わせ (Device Status Report)
const DEVICE_STATUS_REPORT: &[u8] = b"\x1b[6n";

/// カーソル位置レポートとして読む最大バイト数
const CURSOR_REPORT_MAX: usize = 31;

/// 画面サイズ (文字セル単位)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub rows: u16,
    pub cols: u16,
}

impl Size {
    pub fn new(rows: u16, cols: u16) -> Option<Self> {
        (rows > 0 && cols > 0).then_some(Self { rows, cols })
    }
}

/// raw mode に切り替える前の端末設定を保持し、drop 時に書き戻す
pub struct RawMode {
    fd: RawFd,
    original: Option<libc::termios>,
}

impl RawMode {
    /// 現在の設定を保存して raw mode に切り替える
    pub fn enable(fd: RawFd) -> Result<Self> {
        // SAFETY: termios はただの C 構造体で、全ビット 0 でも有効な値
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        // SAFETY: original は有効な書き込み先
        if unsafe { libc::tcgetattr(fd, &mut original) } == -1 {
            return Err(Error::TerminalConfig {
                op: "tcgetattr",
                source: io::Error::last_os_error(),
            });
        }

        // 適用に失敗しても drop で元の設定を書き戻せるよう、先に保持しておく
        let mode = Self {
            fd,
            original: Some(original),
        };

        let attrs = raw_attributes(original);
        // SAFETY: attrs は tcgetattr で得た値をもとにしている
        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &attrs) } == -1 {
            return Err(Error::TerminalConfig {
                op: "tcsetattr",
                source: io::Error::last_os_error(),
            });
        }

        debug!(fd, "entered raw mode");
        Ok(mode)
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.original.is_some()
    }

    /// 保存しておいた設定を書き戻す。2 回目以降は何もしない
    pub fn restore(&mut self) -> Result<()> {
        let Some(original) = self.original.take() else {
            return Ok(());
        };
        // SAFETY: original は tcgetattr で取得したもの
        if unsafe { libc::tcsetattr(self.fd, libc::TCSAFLUSH, &original) } == -1 {
            return Err(Error::TerminalConfig {
                op: "tcsetattr",
                source: io::Error::last_os_error(),
            });
        }
        debug!(fd = self.fd, "restored terminal settings");
        Ok(())
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// raw mode 用の設定を作る
///
/// 入力はバイト単位で即座に届き、read は 1 デシ秒で 0 バイトのまま戻る。
pub fn raw_attributes(mut attrs: libc::termios) -> libc::termios {
    attrs.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
    attrs.c_oflag &= !libc::OPOST;
    attrs.c_cflag |= libc::CS8;
    attrs.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
    attrs.c_cc[libc::VMIN] = 0;
    attrs.c_cc[libc::VTIME] = 1;
    attrs
}

/// 制御端末のセッション
///
/// stdin / stdout を複製したバッファなしのハンドルを持つので、1 回の write が
/// そのまま 1 回のシステムコールになる。drop すると端末設定を元に戻す。
pub struct Terminal {
    raw: RawMode,
    input: File,
    output: File,
}

impl Terminal {
    pub fn enter() -> Result<Self> {
        let input = duplicate(io::stdin().as_fd())?;
        let output = duplicate(io::stdout().as_fd())?;
        let raw = RawMode::enable(input.as_raw_fd())?;
        Ok(Self { raw, input, output })
    }

    pub fn streams(&mut self) -> (&mut File, &mut File) {
        (&mut self.input, &mut self.output)
    }

    /// 画面サイズを取得する
    ///
    /// まず ioctl で問い合わせ、使えなければカーソルを右下へ飛ばして位置を問い合わせる。
    pub fn window_size(&mut self) -> Result<Size> {
        match termion::terminal_size() {
            Ok((cols, rows)) => {
                if let Some(size) = Size::new(rows, cols) {
                    info!(rows, cols, "window size from ioctl");
                    return Ok(size);
                }
                warn!(rows, cols, "ioctl reported an empty window, probing");
            }
            Err(e) => warn!(error = %e, "window size ioctl failed, probing"),
        }

        let size = probe_window_size(&mut self.input, &mut self.output)?;
        info!(rows = size.rows, cols = size.cols, "window size from cursor probe");
        Ok(size)
    }

    /// 端末設定を元に戻す
    pub fn exit(&mut self) -> Result<()> {
        self.raw.restore()
    }
}

fn duplicate(fd: std::os::fd::BorrowedFd<'_>) -> Result<File> {
    fd.try_clone_to_owned()
        .map(File::from)
        .map_err(|source| Error::Io { op: "dup", source })
}

/// カーソルを画面外まで動かし、端末に丸められた位置を画面サイズとみなす
pub fn probe_window_size<I: Read, O: Write>(input: &mut I, output: &mut O) -> Result<Size> {
    write!(
        output,
        "{}{}",
        termion::cursor::Right(999),
        termion::cursor::Down(999)
    )
    .map_err(|_| Error::ViewportUnavailable {
        reason: "cannot move the cursor to the bottom-right corner",
    })?;
    cursor_position(input, output)
}

/// 現在のカーソル位置を (行, 列) = Size として問い合わせる
pub fn cursor_position<I: Read, O: Write>(input: &mut I, output: &mut O) -> Result<Size> {
    output
        .write_all(DEVICE_STATUS_REPORT)
        .and_then(|()| output.flush())
        .map_err(|_| Error::ViewportUnavailable {
            reason: "cannot request the cursor position",
        })?;

    let mut response = Vec::with_capacity(CURSOR_REPORT_MAX);
    let mut terminated = false;
    while response.len() < CURSOR_REPORT_MAX {
        match input::read_byte_once(input) {
            Some(b'R') => {
                terminated = true;
                break;
            }
            Some(byte) => response.push(byte),
            None => break,
        }
    }

    if !terminated {
        debug!(?response, "cursor position report not terminated");
        return Err(Error::ViewportUnavailable {
            reason: "incomplete cursor position report",
        });
    }
    parse_cursor_report(&response).ok_or(Error::ViewportUnavailable {
        reason: "malformed cursor position report",
    })
}

/// `ESC [ rows ; cols` を解析する (終端の `R` は含まない)
pub fn parse_cursor_report(report: &[u8]) -> Option<Size> {
    let body = report.strip_prefix(b"\x1b[")?;
    let body = std::str::from_utf8(body).ok()?;
    let (rows, cols) = body.split_once(';')?;
    Size::new(rows.parse().ok()?, cols.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::os::fd::{FromRawFd, OwnedFd};

    fn get_attrs(fd: RawFd) -> libc::termios {
        let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
        assert_eq!(unsafe { libc::tcgetattr(fd, &mut attrs) }, 0);
        attrs
    }

    /// 疑似端末を開く。使えない環境では None
    #[cfg(target_os = "linux")]
    fn open_pty() -> Option<(File, File)> {
        let master = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
        if master < 0 {
            return None;
        }
        let master = File::from(unsafe { OwnedFd::from_raw_fd(master) });
        let fd = master.as_raw_fd();
        if unsafe { libc::grantpt(fd) } != 0 || unsafe { libc::unlockpt(fd) } != 0 {
            return None;
        }
        let mut name = [0 as libc::c_char; 128];
        if unsafe { libc::ptsname_r(fd, name.as_mut_ptr(), name.len()) } != 0 {
            return None;
        }
        let path = unsafe { std::ffi::CStr::from_ptr(name.as_ptr()) }
            .to_str()
            .ok()?
            .to_owned();
        let slave = OpenOptions::new().read(true).write(true).open(path).ok()?;
        Some((master, slave))
    }

    #[test]
    fn test_size_rejects_zero() {
        assert_eq!(Size::new(24, 80), Some(Size { rows: 24, cols: 80 }));
        assert_eq!(Size::new(0, 80), None);
        assert_eq!(Size::new(24, 0), None);
    }

    #[test]
    fn test_raw_attributes_flags() {
        let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
        attrs.c_iflag = libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON;
        attrs.c_oflag = libc::OPOST;
        attrs.c_lflag = libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG;
        attrs.c_cc[libc::VMIN] = 1;

        let raw = raw_attributes(attrs);
        assert_eq!(raw.c_iflag, 0);
        assert_eq!(raw.c_oflag, 0);
        assert_eq!(raw.c_lflag, 0);
        assert_eq!(raw.c_cflag & libc::CS8, libc::CS8);
        assert_eq!(raw.c_cc[libc::VMIN], 0);
        assert_eq!(raw.c_cc[libc::VTIME], 1);
    }

    #[test]
    fn test_raw_attributes_keeps_unrelated_flags() {
        let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
        attrs.c_iflag = libc::IXANY | libc::ICRNL;
        attrs.c_lflag = libc::ECHOE | libc::ECHO;
        let raw = raw_attributes(attrs);
        assert_eq!(raw.c_iflag, libc::IXANY);
        assert_eq!(raw.c_lflag, libc::ECHOE);
    }

    #[test]
    fn test_enable_on_non_terminal_fails() {
        let file = tempfile::tempfile().unwrap();
        match RawMode::enable(file.as_raw_fd()) {
            Err(Error::TerminalConfig { op, .. }) => assert_eq!(op, "tcgetattr"),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("a regular file is not a terminal"),
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_enable_and_restore_on_pty() {
        let Some((_master, slave)) = open_pty() else {
            return;
        };
        let fd = slave.as_raw_fd();
        let before = get_attrs(fd);

        let mut mode = RawMode::enable(fd).unwrap();
        assert!(mode.is_active());
        let raw = get_attrs(fd);
        assert_eq!(raw.c_lflag & (libc::ECHO | libc::ICANON), 0);
        assert_eq!(raw.c_cc[libc::VMIN], 0);
        assert_eq!(raw.c_cc[libc::VTIME], 1);

        mode.restore().unwrap();
        assert!(!mode.is_active());
        let after = get_attrs(fd);
        assert_eq!(after.c_lflag, before.c_lflag);
        assert_eq!(after.c_iflag, before.c_iflag);

        // 2 回目は何もしない
        mode.restore().unwrap();
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_drop_restores_on_pty() {
        let Some((_master, slave)) = open_pty() else {
            return;
        };
        let fd = slave.as_raw_fd();
        let before = get_attrs(fd);
        {
            let _mode = RawMode::enable(fd).unwrap();
            assert_eq!(get_attrs(fd).c_lflag & libc::ICANON, 0);
        }
        assert_eq!(get_attrs(fd).c_lflag, before.c_lflag);
    }

    #[test]
    fn test_parse_cursor_report() {
        assert_eq!(
            parse_cursor_report(b"\x1b[24;80"),
            Some(Size { rows: 24, cols: 80 })
        );
        assert_eq!(
            parse_cursor_report(b"\x1b[1;1"),
            Some(Size { rows: 1, cols: 1 })
        );
    }

    #[test]
    fn test_parse_cursor_report_malformed() {
        assert_eq!(parse_cursor_report(b""), None);
        assert_eq!(parse_cursor_report(b"24;80"), None);
        assert_eq!(parse_cursor_report(b"\x1b24;80"), None);
        assert_eq!(parse_cursor_report(b"\x1b[24"), None);
        assert_eq!(parse_cursor_report(b"\x1b[24;"), None);
        assert_eq!(parse_cursor_report(b"\x1b[x;80"), None);
        assert_eq!(parse_cursor_report(b"\x1b[0;80"), None);
    }

    #[test]
    fn test_probe_window_size() {
        let mut input: &[u8] = b"\x1b[24;80R";
        let mut output = Vec::new();
        let size = probe_window_size(&mut input, &mut output).unwrap();
        assert_eq!(size, Size { rows: 24, cols: 80 });
        assert_eq!(output, b"\x1b[999C\x1b[999B\x1b[6n");
    }

    #[test]
    fn test_probe_missing_terminator() {
        let mut input: &[u8] = b"\x1b[24;80";
        let mut output = Vec::new();
        match probe_window_size(&mut input, &mut output) {
            Err(Error::ViewportUnavailable { .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_probe_malformed_response() {
        let mut input: &[u8] = b"garbageR";
        let mut output = Vec::new();
        assert!(matches!(
            probe_window_size(&mut input, &mut output),
            Err(Error::ViewportUnavailable { .. })
        ));
    }

    #[test]
    fn test_probe_response_too_long() {
        let mut response = b"\x1b[".to_vec();
        response.extend(std::iter::repeat_n(b'1', 40));
        response.push(b'R');
        let mut input: &[u8] = &response;
        let mut output = Vec::new();
        assert!(matches!(
            cursor_position(&mut input, &mut output),
            Err(Error::ViewportUnavailable { .. })
        ));
    }
}
