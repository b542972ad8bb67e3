//! 設定ファイル
//!
//! `~/.kiro/config.toml` (または `--config` で指定したファイル) を読む。
//! すべての項目は省略できる。
//!
//! ```toml
//! # 起動画面のバージョン表記
//! banner = true
//!
//! # "full" または "plain"
//! render_mode = "full"
//!
//! # ログ (未指定ならログは出さない)
//! log_file = "/tmp/kiro.log"
//! log_level = "debug"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::screen::{RenderMode, Screen, banner_text};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub banner: bool,
    pub render_mode: RenderMode,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            banner: true,
            render_mode: RenderMode::Full,
            log_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 設定を読み込む
    ///
    /// パスを指定した場合はそのファイルが必須。指定しない場合は既定の場所を探し、
    /// なければ既定値を使う。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) => match Self::load_from(&path) {
                    Err(ConfigError::Read { source, .. })
                        if source.kind() == io::ErrorKind::NotFound =>
                    {
                        Ok(Self::default())
                    }
                    result => result,
                },
                None => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.kiro/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".kiro").join("config.toml"))
    }

    pub fn screen(&self) -> Screen {
        let banner = self.banner.then(banner_text);
        Screen::new(self.render_mode, banner)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}
