use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt};

use custodian::advisory::{AdvisoryService, HttpAdvisoryClient};
use custodian::config::read_config_file;
use custodian::healing::Collaborators;
use custodian::messages::HealthEvent;
use custodian::metrics::SystemMetricsSource;
use custodian::orchestrator::OrchestratorHandle;
use custodian::remote::RemoteExecutor;

#[derive(Parser, Debug)]
#[command(version, about = "Self-healing health monitor")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    file: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = Targets::new()
        .with_target("custodian", LevelFilter::TRACE)
        .with_default(LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();

    let config = read_config_file(&args.file)?;

    let remote = config.remote.as_ref().map(RemoteExecutor::new);
    let advisory = config
        .advisory
        .as_ref()
        .map(|c| Box::new(HttpAdvisoryClient::new(c)) as Box<dyn AdvisoryService>);

    let (handle, mut events) = OrchestratorHandle::spawn(
        config,
        SystemMetricsSource::new(),
        remote,
        advisory,
        Collaborators::default(),
    );

    info!("custodian started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                handle.shutdown().await?;
                break;
            }
            event = events.recv() => match event {
                Ok(HealthEvent::CycleCompleted { health, open_issues, .. }) => {
                    info!("health: {health}, {open_issues} open issue(s)");
                }
                Ok(HealthEvent::IssueDetected { issue }) => {
                    warn!(
                        "issue detected in {}: {} ({})",
                        issue.component, issue.description, issue.kind
                    );
                }
                Ok(HealthEvent::HealingAttempted { action }) => {
                    info!("healing attempt: {} -> {:?}", action.action, action.status);
                }
                Ok(HealthEvent::MetricsSampled { .. }) => {}
                Err(RecvError::Lagged(n)) => {
                    warn!("event stream lagged, {n} event(s) dropped");
                }
                Err(RecvError::Closed) => {
                    error!("orchestrator stopped unexpectedly");
                    break;
                }
            }
        }
    }

    Ok(())
}
