use std::process::ExitCode;

use clap::Parser;
use volume_slice::{
    app::{self, LoopExit},
    config::{Cli, Config, normalize_legacy_args},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse_from(normalize_legacy_args(std::env::args()));
    let config = match Config::try_from(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match app::run(&config).await {
        Ok(LoopExit::Finished(summary)) => {
            println!(
                "{:?}: {} frames, {} mismatches",
                summary.mode, summary.frames, summary.errors
            );
            if summary.passed() {
                println!("PASSED");
                ExitCode::SUCCESS
            } else {
                println!("FAILED!");
                if config.strict {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                }
            }
        }
        Ok(LoopExit::Quit | LoopExit::Closed) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("FAILED! {err}");
            ExitCode::FAILURE
        }
    }
}
