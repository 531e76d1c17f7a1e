//! Command implementations.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use portal_session_client::{
    ApiRequest, ApiResponse, ClientError, Method, RecordingNavigator, SessionClient,
};
use portal_session_core::{CredentialStore, Identity, Secret, SlotName, create_store};
use serde::Serialize;
use tracing::info;

use crate::OutputFormat;
use crate::config::CliConfig;

/// Open the configured store with the configured slot layout.
pub fn open_credentials(config: &CliConfig) -> Result<CredentialStore> {
    let store = create_store(&config.store_backend()).context("Failed to open credential store")?;
    Ok(CredentialStore::new(store, config.session.slots.clone()))
}

pub async fn login(
    credentials: &CredentialStore,
    slot: &str,
    token: &str,
    profile: Option<&str>,
) -> Result<()> {
    let slot = SlotName::new(slot);
    let identity = profile
        .map(serde_json::from_str::<Identity>)
        .transpose()
        .context("Profile is not a valid identity JSON object")?;

    credentials
        .store_slot(&slot, &Secret::new(token), identity.as_ref())
        .await?;

    println!("Logged in to slot {}", slot);
    Ok(())
}

pub async fn logout(credentials: &CredentialStore) -> Result<()> {
    credentials.clear_all().await;
    println!("Cleared all credential slots");
    Ok(())
}

#[derive(Serialize)]
struct Whoami<'a> {
    slot: Option<&'a str>,
    identity: Option<&'a Identity>,
}

pub async fn whoami(credentials: &CredentialStore, format: OutputFormat) -> Result<()> {
    let winner = credentials.resolve().await.map(|(slot, _token)| slot);
    let identity = match &winner {
        Some(slot) => credentials.identity(slot).await,
        None => None,
    };

    match format {
        OutputFormat::Json => {
            let output = Whoami {
                slot: winner.as_ref().map(SlotName::as_str),
                identity: identity.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => match &winner {
            None => println!("Not logged in"),
            Some(slot) => {
                println!("Slot: {}", slot);
                if let Some(identity) = &identity {
                    if let Some(name) = identity.display_name() {
                        println!("  User: {}", name);
                    }
                    if let Some(role) = &identity.role {
                        println!("  Role: {}", role);
                    }
                    println!("  Since: {}", identity.stored_at.format("%Y-%m-%d %H:%M UTC"));
                }
            }
        },
    }
    Ok(())
}

pub async fn request(
    config: &CliConfig,
    credentials: CredentialStore,
    method: &str,
    target: &str,
    body: Option<&str>,
    page: Option<&str>,
) -> Result<()> {
    let method: Method = method
        .to_ascii_uppercase()
        .parse()
        .with_context(|| format!("Invalid HTTP method {:?}", method))?;

    let navigator = Arc::new(RecordingNavigator::new(config.page(page)?));
    let client = SessionClient::builder(config.session.clone())
        .credentials(credentials)
        .navigator(navigator.clone())
        .build()?;

    let mut request = ApiRequest::new(method, target);
    if let Some(body) = body {
        let value: serde_json::Value =
            serde_json::from_str(body).context("Body is not valid JSON")?;
        request = request.with_json(&value)?;
    }

    let result = client.send(request).await;

    for destination in navigator.navigations() {
        info!(%destination, "Redirected to login");
        eprintln!("Redirected to {}", destination);
    }

    match result {
        Ok(response) => {
            print_response(&response);
            Ok(())
        }
        Err(ClientError::Business(response)) => {
            print_response(&response);
            bail!("Request failed with status {}", response.status)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_response(response: &ApiResponse) {
    println!("{}", response.status);
    match serde_json::from_str::<serde_json::Value>(response.text()) {
        Ok(json) => match serde_json::to_string_pretty(&json) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", response.text()),
        },
        Err(_) if response.text().is_empty() => {}
        Err(_) => println!("{}", response.text()),
    }
}
