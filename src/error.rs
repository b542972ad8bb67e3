use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// エディタ本体のエラー
///
/// どれもその場では回復できないので、呼び出し元で致命的エラーとして扱う
#[derive(Debug, Error)]
pub enum Error {
    /// 端末設定の取得 / 適用に失敗
    #[error("{op} failed")]
    TerminalConfig {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// タイムアウト以外の理由で read / write に失敗
    #[error("{op} failed")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// ioctl でもカーソル位置の問い合わせでも画面サイズが取れなかった
    #[error("window size unavailable: {reason}")]
    ViewportUnavailable { reason: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

/// 設定ファイルの読み込みエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
