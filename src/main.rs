use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use sm_action_runner::cli::Args;
use sm_action_runner::host::{GitHubActions, Host};
use sm_action_runner::toolchain::Rustup;

fn main() {
    // Logs go to stderr; stdout carries workflow commands
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let host = GitHubActions::from_env();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            host.set_failed(&format!("Failed to create Tokio runtime: {e}"));
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(real_main(&host)) {
        error!("{e:#}");
        host.set_failed(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn real_main(host: &GitHubActions) -> Result<()> {
    let settings = Args::parse()
        .into_settings()
        .context("Failed to determine install root")?;
    info!(
        "Install root {} (strategy {:?}, output mode {:?})",
        settings.install_root.display(),
        settings.strategy,
        settings.output_mode
    );

    let result = sm_action_runner::run_action(settings, Rustup::locate(), host).await?;
    info!("sm-action finished with exit code {:?}", result.exit_code);
    Ok(())
}
