use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use sa_config::ClientConfig;
use sa_schemas::SessionOutcome;
use sa_session::{
    CancelOutcome, HttpCommands, HttpTransport, SessionConfig, SessionController, StartOutcome,
};
use tracing::{info, warn};

use crate::render::{exit_code, Renderer};

pub fn session_config(cfg: &ClientConfig) -> SessionConfig {
    SessionConfig {
        protocol: cfg.stream.protocol,
        decoder_options: cfg.stream.decoder_options(),
        log_capacity: cfg.session.log_capacity,
        job_timeout_secs: cfg.session.job_timeout_secs,
        cancel_grace: cfg.session.cancel_grace(),
        subjects: cfg.session.subjects.clone(),
    }
}

/// One session from start to outcome. Ctrl-C once requests a cancel, a
/// second Ctrl-C force-closes without waiting for the server.
pub async fn run(cfg: ClientConfig, json: bool) -> Result<ExitCode> {
    let transport = Arc::new(HttpTransport::new(cfg.server.stream_url()));
    let commands = Arc::new(HttpCommands::new(
        cfg.server.start_url(),
        cfg.server.stop_url(),
    ));
    let mut session = SessionController::new(transport, commands, session_config(&cfg));
    let mut renderer = Renderer::new(io::stdout().lock(), json);
    let mut views = session.subscribe();

    match session.start().await.context("start command rejected")? {
        StartOutcome::Streaming => {}
        StartOutcome::Errored(err) => {
            let outcome = SessionOutcome::Errored {
                cause: err.to_string(),
            };
            renderer.finish(&session.view(), &outcome)?;
            return Ok(ExitCode::from(exit_code(&outcome)));
        }
        StartOutcome::AlreadyActive(state) => {
            warn!(state = %state, "session already active");
        }
    }
    renderer.render(&views.borrow_and_update())?;

    let handle = session.cancel_handle();
    let mut runner = tokio::spawn(async move {
        let outcome = session.run().await;
        (outcome, session.view())
    });

    let mut interrupts = 0u32;
    let (outcome, last) = loop {
        tokio::select! {
            joined = &mut runner => break joined.context("session task failed")?,
            changed = views.changed() => match changed {
                Ok(()) => {
                    let view = views.borrow_and_update().clone();
                    renderer.render(&view)?;
                }
                Err(_) => break (&mut runner).await.context("session task failed")?,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                interrupts += 1;
                if interrupts == 1 {
                    info!("interrupt: requesting cancel");
                    match handle.cancel().await {
                        Ok(CancelOutcome::Requested) => {}
                        Ok(other) => {
                            // Not applied, so the next ctrl-c asks again.
                            warn!(outcome = ?other, "cancel not applied");
                            interrupts = 0;
                        }
                        Err(err) => warn!(error = %err, "stop command failed; ctrl-c again to force close"),
                    }
                } else {
                    info!("second interrupt: force closing");
                    handle.force_close("interrupted").await;
                }
            }
        }
    };

    let outcome = outcome.context("session ended without an outcome")?;
    renderer.render(&last)?;
    renderer.finish(&last, &outcome)?;
    Ok(ExitCode::from(exit_code(&outcome)))
}
