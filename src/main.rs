use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use kiro::config::Config;
use kiro::editor::Editor;
use kiro::screen::RenderMode;
use kiro::terminal::Terminal;
use kiro::{VERSION, logger};

#[derive(Debug, Parser)]
#[command(name = "kiro", version, about = "A minimal terminal screen editor")]
struct Cli {
    /// 設定ファイル (既定: ~/.kiro/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 起動画面のバージョン表記を出さない
    #[arg(long)]
    no_banner: bool,

    /// `~` の行だけを描く簡易描画
    #[arg(long)]
    plain: bool,

    /// ログの出力先
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match setup(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("kiro: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match edit(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // 端末設定は Terminal の drop で元に戻っている
            let _ = reset_screen(&mut io::stdout());

            error!(error = %err, "fatal");
            eprintln!("{:#}", anyhow::Error::from(err));
            ExitCode::FAILURE
        }
    }
}

/// 設定の読み込みとログの初期化。ここでの失敗は画面に触れずに終了する
fn setup(cli: &Cli) -> anyhow::Result<Config> {
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let config = apply_overrides(cli, config);

    if let Some(path) = &config.log_file {
        logger::init(path, &config.log_level)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
    }
    info!(version = VERSION, ?config, "starting");
    Ok(config)
}

/// コマンドライン引数で設定ファイルの値を上書きする
fn apply_overrides(cli: &Cli, mut config: Config) -> Config {
    if cli.no_banner {
        config.banner = false;
    }
    if cli.plain {
        config.render_mode = RenderMode::Plain;
    }
    if let Some(path) = &cli.log_file {
        config.log_file = Some(path.clone());
    }
    config
}

/// 画面をクリアしてカーソルを左上に戻す
fn reset_screen<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "{}\x1b[H", termion::clear::All)?;
    out.flush()
}

fn edit(config: &Config) -> kiro::Result<()> {
    let mut terminal = Terminal::enter()?;
    let size = terminal.window_size()?;

    let screen = config.screen();
    info!(mode = ?screen.mode(), "render mode");

    let (input, output) = terminal.streams();
    let mut editor = Editor::new(input, output, size, screen);
    editor.run()?;

    terminal.exit()
}
