//! LuisBank Client - interactive demo
//!
//! Drives the credential and transfer flows against a live ledger service
//! from the terminal:
//!
//! ```text
//! ┌────────┐    ┌───────────┐    ┌─────────┐    ┌────────────────┐
//! │ Config │───▶│ LoginFlow │───▶│ Session │───▶│ TransferFlow   │
//! │ (YAML) │    │ (step-up) │    │ (store) │    │ (step-up + key)│
//! └────────┘    └───────────┘    └─────────┘    └────────────────┘
//! ```

use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;

use luisbank_client::config::ClientConfig;
use luisbank_client::gateway::HttpGateway;
use luisbank_client::idempotency::{KeySource, detect_key_source};
use luisbank_client::logging::init_logging;
use luisbank_client::login::{LoginFlow, LoginStep};
use luisbank_client::session::SessionStore;
use luisbank_client::transfer::{SUCCESS_DISPLAY, TransferDraft, TransferFlow, TransferStep};

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn load_config() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let path = args
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| w[1].clone())
        .unwrap_or_else(|| "config.yaml".to_string());
    match ClientConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("({e}; using defaults)");
            ClientConfig::default()
        }
    }
}

async fn run_login(
    gateway: Arc<HttpGateway>,
    session: Arc<SessionStore>,
) -> anyhow::Result<()> {
    let mut flow = LoginFlow::new(gateway, session);
    loop {
        match flow.step() {
            LoginStep::Credentials => {
                let username = prompt("Email or CPF")?;
                let password = prompt("Password")?;
                flow.submit_credentials(&username, &password).await;
            }
            LoginStep::Mfa => {
                let code = prompt("Security code (empty to go back)")?;
                if code.is_empty() {
                    flow.back_to_password();
                } else {
                    flow.submit_code(&code).await;
                }
            }
            LoginStep::Authenticated => {
                println!("Logged in.");
                return Ok(());
            }
        }
        if let Some(message) = flow.error() {
            eprintln!("! {message}");
        }
    }
}

async fn run_transfer(
    gateway: Arc<HttpGateway>,
    session: Arc<SessionStore>,
) -> anyhow::Result<()> {
    let balance = Decimal::from_str(&prompt("Available balance")?)
        .context("balance must be a decimal number")?;
    let keys: Arc<dyn KeySource> = Arc::from(detect_key_source());
    let mut flow = TransferFlow::new(gateway, session, keys, balance)
        .on_dismiss(|| println!("(transfer confirmed, closing)"));

    loop {
        match flow.step() {
            TransferStep::Form => {
                let to_account = prompt("Destination account id (empty to quit)")?;
                if to_account.is_empty() {
                    flow.close();
                    return Ok(());
                }
                let amount = Decimal::from_str(&prompt("Amount")?)
                    .context("amount must be a decimal number")?;
                let description = prompt("Description (optional)")?;
                flow.submit(TransferDraft::Payout {
                    amount,
                    to_account: to_account.parse().context("destination must be numeric")?,
                    description: Some(description),
                })
                .await;
            }
            TransferStep::Mfa => {
                let code = prompt("2FA code (empty to go back)")?;
                if code.is_empty() {
                    flow.back_to_form();
                } else {
                    flow.submit_code(&code).await;
                }
            }
            TransferStep::Success => {
                println!("Transfer accepted.");
                tokio::time::sleep(SUCCESS_DISPLAY).await;
                return Ok(());
            }
        }
        if let Some(message) = flow.error() {
            eprintln!("! {message}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();
    let _log_guard = init_logging(&config);

    let session = Arc::new(SessionStore::open(&config.storage_dir));
    let gateway = Arc::new(HttpGateway::new(config.api_url.clone(), session.clone()));

    if session.is_authenticated() {
        println!("Session rehydrated from storage.");
    } else {
        run_login(gateway.clone(), session.clone()).await?;
    }

    if prompt("Make a transfer? [y/N]")?.eq_ignore_ascii_case("y") {
        run_transfer(gateway, session.clone()).await?;
    }

    if prompt("Log out? [y/N]")?.eq_ignore_ascii_case("y") {
        session.logout();
        println!("Logged out.");
    }
    Ok(())
}
