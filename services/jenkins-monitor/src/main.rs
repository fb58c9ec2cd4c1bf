//! Jenkins monitor CLI
//!
//! Watches a Jenkins server and logs build health and build failures.

use std::path::PathBuf;

use clap::Parser;
use jenkins_monitor::run_service_loop;
use tracing::Level;

#[derive(Parser)]
#[command(name = "jenkins-monitor")]
#[command(about = "Jenkins build health monitor")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, log_level={:?}",
        args.config,
        args.log_level
    );

    run_service_loop(
        &args.config,
        || {
            Box::pin(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
        },
        || {
            // reload via SIGHUP (`kill -HUP <pid>`)
            #[cfg(unix)]
            {
                Box::pin(async {
                    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                        Ok(mut sig) => {
                            sig.recv().await;
                        }
                        Err(e) => {
                            tracing::error!("Failed to register SIGHUP handler: {}", e);
                            std::future::pending::<()>().await;
                        }
                    }
                })
            }
            #[cfg(not(unix))]
            {
                Box::pin(std::future::pending())
            }
        },
    )
    .await?;

    Ok(())
}
