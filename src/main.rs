mod cli;
mod ui;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{Cli, Command};
use gallog_cleaner::config::{CleanerConfig, MAX_CONCURRENCY};
use gallog_cleaner::model::{ContentKind, GalleryFilter};
use gallog_cleaner::service::CleanerService;
use gallog_cleaner::state_machine::RunState;
use ui::RunProgressView;

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("invalid log filter")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .context("failed to initialise logging")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => CleanerConfig::load_from(path)?,
        None => CleanerConfig::load()?,
    };
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
    }

    let user = cli.user.clone().context("--user is required")?;
    let password = cli
        .password
        .clone()
        .context("--password or GALLOG_PASSWORD is required")?;

    let service = CleanerService::from_config(config);
    if !service.login(&user, &password).await? {
        bail!("login rejected for {user}");
    }
    info!(%user, "logged in");

    match cli.command {
        Command::Login => {
            println!("  ✓ logged in as {user}");
        }
        Command::Galleries { kind } => {
            let kind: ContentKind = kind.into();
            let galleries = service
                .get_galleries(kind.as_path())
                .await
                .map_err(anyhow::Error::msg)?;
            ui::print_galleries(&galleries);
        }
        Command::Clean {
            kind,
            gallery,
            captcha_key,
            captcha_type,
        } => {
            let (tx, mut rx) = unbounded_channel();
            let view = RunProgressView::start("logging in");

            let outcome = {
                let run = service.run_cleaning(
                    kind.into(),
                    GalleryFilter::from_option(gallery.as_deref()),
                    captcha_key.as_deref(),
                    captcha_type.map(|c| c.as_str()),
                    &tx,
                );
                tokio::pin!(run);
                loop {
                    tokio::select! {
                        outcome = &mut run => break outcome,
                        Some(progress) = rx.recv() => view.update(&progress),
                        _ = tokio::signal::ctrl_c() => {
                            if service.cancel() {
                                info!("stopping after in-flight deletes");
                            }
                        }
                    }
                }
            };
            drop(tx);
            view.follow(&mut rx).await;

            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    view.abandon(&e.to_string());
                    return Err(e.into());
                }
            };
            view.complete(&result);
            ui::print_summary(&result);
            if matches!(result.terminal_state, RunState::Aborted(_)) {
                bail!("run aborted: {}", result.last_message);
            }
        }
    }

    Ok(())
}
