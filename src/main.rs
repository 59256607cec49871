//! subplay - Subtitles synchronized with local playback
//!
//! Plays a stream in VLC or mpv while the subtitle manager selects,
//! downloads and renders the subtitle that matches the playback.
//!
//! # Usage
//!
//! ```bash
//! # Play with the configured subtitle language
//! subplay play https://example.com/Movie.2019.1080p.mkv --imdb tt1877830
//!
//! # Pick a subtitle file from disk
//! subplay play movie.mkv --custom --player mpv
//!
//! # List subtitles as JSON
//! subplay subtitles tt1877830 --json
//! ```

use clap::Parser;
use env_logger::Env;

use subplay::cli::{Cli, Command, ExitCode, Output};
use subplay::commands;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_filter()))
        .format_timestamp_millis()
        .init();

    run_cli(cli).await.into()
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let config = cli.config.as_deref();

    match cli.command {
        Command::Play(cmd) => commands::play_cmd(cmd, config, &output).await,

        Command::Subtitles(cmd) => commands::subtitles_cmd(cmd, config, &output).await,

        Command::Config(cmd) => commands::config_cmd(cmd, config, &output).await,
    }
}
