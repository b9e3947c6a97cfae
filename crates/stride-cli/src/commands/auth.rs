//! Authentication commands.

use super::controller;
use crate::output::OutputFormat;
use anyhow::{bail, Result};
use std::io::{self, Write};
use stride_auth::{AuthView, RegisterRequest};
use stride_config::Paths;

/// Consent flags collected for registration.
pub struct Consent {
    pub privacy: bool,
    pub privacy_policy_version: String,
    pub health_data: bool,
    pub health_data_policy_version: String,
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    let value = value.trim().to_string();
    if value.is_empty() {
        bail!("{} is required", label);
    }
    Ok(value)
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

fn signed_in_as(view: &AuthView) -> String {
    view.user
        .as_ref()
        .map(|user| user.display_name())
        .unwrap_or_else(|| "user".to_string())
}

/// Login with username and password.
pub async fn login(paths: &Paths, username: Option<String>, format: &OutputFormat) -> Result<()> {
    let (controller, _network) = controller(paths)?;

    let username = match username {
        Some(username) => username,
        None => prompt("Username")?,
    };
    let password = prompt_password()?;

    let view = controller.login(&username, &password).await?;
    format.success(&format!("Logged in as {}", signed_in_as(&view)));
    Ok(())
}

/// Create an account, then sign it in.
pub async fn register(
    paths: &Paths,
    username: Option<String>,
    email: Option<String>,
    consent: Consent,
    format: &OutputFormat,
) -> Result<()> {
    if !consent.privacy {
        bail!("Registration requires --accept-privacy");
    }

    let (controller, _network) = controller(paths)?;

    let username = match username {
        Some(username) => username,
        None => prompt("Username")?,
    };
    let email = match email {
        Some(email) => email,
        None => prompt("Email")?,
    };
    let password = prompt_password()?;

    let request = RegisterRequest {
        username,
        email,
        password,
        privacy_consent: consent.privacy,
        privacy_policy_version: consent.privacy_policy_version,
        health_data_consent: consent.health_data,
        health_data_policy_version: consent.health_data_policy_version,
    };

    let view = controller.register(&request).await?;
    format.success(&format!("Registered and logged in as {}", signed_in_as(&view)));
    Ok(())
}

/// Logout and clear the stored session.
pub async fn logout(paths: &Paths, format: &OutputFormat) -> Result<()> {
    let (controller, _network) = controller(paths)?;

    // Wait for the server call so the process does not exit under it.
    if let Some(server_logout) = controller.logout().await {
        server_logout.await?;
    }

    format.success("Logged out successfully");
    Ok(())
}
