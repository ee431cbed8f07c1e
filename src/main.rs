//! Binary entrypoint: flag parsing, startup validation, rotation loop.

use std::process;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gitlab_rotor::models::ReviewerPanel;
use gitlab_rotor::services::{
    GitLabClient, GitLabClientConfig, ReviewEngine, DEFAULT_POLL_INTERVAL_SECS,
};

/// Reviewer rotation daemon for GitLab merge requests.
#[derive(Debug, Parser)]
#[command(name = "gitlab-rotor", version, about)]
struct Cli {
    /// Base URL of the GitLab instance.
    #[arg(long, default_value = "https://gitlab.com")]
    gitlab_host: String,

    /// Personal access token for the acting account.
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true, default_value = "")]
    gitlab_token: String,

    /// Ordered reviewer IDs; the first is the account the daemon acts as,
    /// the rest are the rotation candidates in rotation order.
    #[arg(long, value_delimiter = ',', required = true)]
    reviewer_ids: Vec<i64>,

    /// Seconds between polling cycles.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    interval_secs: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if cli.reviewer_ids.len() < 2 {
        log::error!("incorrect reviewer list: must contain at least 2 ids");
        process::exit(1);
    }

    let client = match GitLabClient::new(GitLabClientConfig {
        base_url: cli.gitlab_host.clone(),
        token: cli.gitlab_token.clone(),
        timeout_secs: 30,
    }) {
        Ok(client) => client,
        Err(e) => {
            log::error!("client error: {}", e);
            process::exit(1);
        }
    };

    let user = match client.current_user().await {
        Ok(user) => user,
        Err(e) => {
            log::error!("current user error: {}", e);
            process::exit(1);
        }
    };

    log::info!(
        "current user: id={} username={} name={}",
        user.id,
        user.username,
        user.name
    );

    for &id in &cli.reviewer_ids {
        if let Err(e) = client.get_user(id).await {
            log::error!("get reviewer {} error: {}", id, e);
            process::exit(1);
        }
    }

    log::info!("use reviewers: ids={:?}", cli.reviewer_ids);

    let panel = ReviewerPanel::new(cli.reviewer_ids[0], &cli.reviewer_ids[1..]);
    let engine = ReviewEngine::new(client, panel);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, shutting down");
            signal_cancel.cancel();
        }
    });

    engine
        .run(Duration::from_secs(cli.interval_secs), cancel)
        .await;
}
