pub mod buffer;
pub mod config;
pub mod cursor;
pub mod editor;
pub mod error;
pub mod input;
pub mod logger;
pub mod screen;
pub mod terminal;

pub use error::{ConfigError, Error, Result};

/// バナーに表示するバージョン
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
