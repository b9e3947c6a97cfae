//! Session inspection commands.

use super::controller;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use stride_auth::{AppLifecycleEvent, AuthView, SessionController, SessionRefreshResult};
use stride_config::Paths;
use tokio::sync::mpsc;
use tracing::info;

/// Auth state as printed by `status`, `refresh` and `watch`.
#[derive(Serialize)]
struct StatusReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'static str>,
    user: Option<String>,
    email: Option<String>,
    roles: Vec<String>,
}

impl StatusReport {
    fn new(view: &AuthView, outcome: Option<&SessionRefreshResult>) -> Self {
        Self {
            status: view.status.as_str(),
            outcome: outcome.map(SessionRefreshResult::label),
            user: view.user.as_ref().map(|u| u.display_name()),
            email: view.user.as_ref().and_then(|u| u.email.clone()),
            roles: view.roles.iter().map(|r| r.name.clone()).collect(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", output::row("Auth", self.status))?;
        if let Some(outcome) = self.outcome {
            write!(f, "\n{}", output::row("Outcome", outcome))?;
        }
        if let Some(user) = &self.user {
            write!(f, "\n{}", output::row("User", user))?;
        }
        if let Some(email) = &self.email {
            write!(f, "\n{}", output::row("Email", email))?;
        }
        if !self.roles.is_empty() {
            write!(f, "\n{}", output::row("Roles", &self.roles.join(", ")))?;
        }
        Ok(())
    }
}

async fn started(paths: &Paths) -> Result<(SessionController, Option<SessionRefreshResult>)> {
    let (controller, _network) = controller(paths)?;
    let outcome = controller.start().await;
    Ok((controller, outcome))
}

/// Verify the stored session and show the auth state.
pub async fn status(paths: &Paths, format: &OutputFormat) -> Result<()> {
    let (controller, outcome) = started(paths).await?;
    format.emit(&StatusReport::new(&controller.state(), outcome.as_ref()));
    Ok(())
}

/// Refresh the session now.
pub async fn refresh(paths: &Paths, format: &OutputFormat) -> Result<()> {
    let (controller, _network) = controller(paths)?;
    let outcome = controller.refresh().await;
    format.emit(&StatusReport::new(&controller.state(), Some(&outcome)));
    Ok(())
}

/// Show the signed-in user.
pub async fn whoami(paths: &Paths, format: &OutputFormat) -> Result<()> {
    let (controller, _) = started(paths).await?;
    let view = controller.state();

    let Some(user) = view.user.as_ref().filter(|_| view.is_authenticated()) else {
        bail!("Not logged in. Run 'stride login' first");
    };

    match format {
        OutputFormat::Text => println!("{}", user.display_name()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(user)?),
    }
    Ok(())
}

/// Check whether the signed-in user holds any of `names`.
pub async fn has_role(paths: &Paths, names: &[String], format: &OutputFormat) -> Result<()> {
    let (controller, _) = started(paths).await?;
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let granted = controller.has_any_role(&names);

    match format {
        OutputFormat::Text => println!("{}", if granted { "yes" } else { "no" }),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "roles": names, "granted": granted })
        ),
    }

    if !granted {
        std::process::exit(1);
    }
    Ok(())
}

/// Keep the session alive, re-verifying it every `interval_secs`, and print
/// each state change until Ctrl-C.
pub async fn watch(paths: &Paths, interval_secs: u64, format: &OutputFormat) -> Result<()> {
    if interval_secs == 0 {
        bail!("--interval must be at least 1 second");
    }

    let (controller, network) = controller(paths)?;
    let mut views = controller.subscribe();

    let (lifecycle_tx, lifecycle_rx) = mpsc::channel(4);
    let triggers = controller.spawn_triggers(network.as_ref(), Some(lifecycle_rx));

    let outcome = controller.start().await;
    format.emit(&StatusReport::new(&controller.state(), outcome.as_ref()));
    views.borrow_and_update();

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
            _ = ticker.tick() => {
                // After an inferred outage, the reprobe is itself a
                // reconnect and triggers the refresh.
                if network.reprobe() {
                    continue;
                }
                // Otherwise treated like the app returning to the foreground.
                if lifecycle_tx.send(AppLifecycleEvent::Foreground).await.is_err() {
                    break;
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                format.emit(&StatusReport::new(&view, None));
            }
        }
    }

    triggers.abort();
    Ok(())
}
