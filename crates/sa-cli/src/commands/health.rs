use anyhow::{bail, Context, Result};
use sa_config::ClientConfig;
use sa_schemas::{HealthReport, NodeHealth};
use sa_session::{spawn_health_poller, CommandChannel, CommandError, HealthClient, HttpCommands};

pub async fn once(cfg: &ClientConfig) -> Result<()> {
    let report = HealthClient::new(cfg.server.health_url())
        .check()
        .await
        .context("health check failed")?;
    print_report(&report);
    Ok(())
}

/// Poll until ctrl-c. Failed checks are reported but keep the last good
/// node list on screen.
pub async fn watch(cfg: &ClientConfig) -> Result<()> {
    let client = HealthClient::new(cfg.server.health_url());
    let (mut rx, task) = spawn_health_poller(client, cfg.health.poll_interval());

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = rx.borrow_and_update().clone();
                if let Some(err) = &status.last_error {
                    println!("check failed: {err}");
                }
                if let Some(report) = &status.report {
                    print_report(report);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                break;
            }
        }
    }

    task.abort();
    Ok(())
}

pub async fn stop(cfg: &ClientConfig) -> Result<()> {
    let commands = HttpCommands::new(cfg.server.start_url(), cfg.server.stop_url());
    match commands.stop_job().await {
        Ok(()) => {
            println!("stop requested");
            Ok(())
        }
        Err(CommandError::Status { status: 404, .. }) => bail!("no job running (http 404)"),
        Err(err) => Err(err).context("stop command failed"),
    }
}

fn print_report(report: &HealthReport) {
    println!(
        "checked_at={} up={}/{}",
        report.checked_at.to_rfc3339(),
        report.up_count(),
        report.nodes.len()
    );
    for (node, health) in &report.nodes {
        let word = match health {
            NodeHealth::Up => "up",
            NodeHealth::Down => "down",
            NodeHealth::Unknown => "unknown",
        };
        println!("  {node} {word}");
    }
}
