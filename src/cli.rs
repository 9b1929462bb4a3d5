use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::domain::TransactionReference;
use crate::services::ReconcileOutcome;
use crate::AppState;

#[derive(Parser)]
#[command(name = "bitesized-payments")]
#[command(about = "BiteSized Payments - checkout initiation and payment reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Configuration validation
    Config,

    /// Verify one transaction with the provider and record it if paid
    Reconcile {
        /// Transaction reference (tx_ref)
        #[arg(value_name = "TX_REF")]
        tx_ref: String,
    },
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Hasura Endpoint: {}", config.hasura_graphql_endpoint);
    println!("  Chapa Base URL: {}", config.chapa_base_url);
    println!("  Webhook URL: {}", config.webhook_url());
    println!("  Status Page: {}", config.status_page_url());
    println!("  Currency: {}", config.payment_currency);
    println!("  Push Re-verify: {}", config.push_reverify);
    println!(
        "  Action Secret: {}",
        if config.action_secret.is_some() { "set" } else { "not set" }
    );
    println!("{:#?}", config);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

pub async fn handle_reconcile(config: &Config, tx_ref: &str) -> anyhow::Result<()> {
    let reference = TransactionReference::parse(tx_ref)
        .ok_or_else(|| anyhow::anyhow!("'{}' is not a valid transaction reference", tx_ref))?;

    let state = AppState::from_config(config);
    let outcome = state
        .reconciler
        .reconcile_redirect(&reference)
        .await
        .map_err(|e| anyhow::anyhow!("Reconciliation of {} failed: {}", reference, e))?;

    match outcome {
        ReconcileOutcome::Confirmed { record, outcome } => {
            println!(
                "✓ {} confirmed: user {} owns item {} ({} {}, {:?})",
                reference, record.user_id, record.item_id, record.amount, record.currency, outcome
            );
        }
        ReconcileOutcome::Failed { status, .. } => {
            println!("✗ {} not paid (provider status: {})", reference, status);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_reconcile_takes_reference() {
        let cli = Cli::try_parse_from(["bitesized-payments", "reconcile", "tx-abc"]).unwrap();
        match cli.command {
            Some(Commands::Reconcile { tx_ref }) => assert_eq!(tx_ref, "tx-abc"),
            _ => panic!("expected reconcile command"),
        }
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["bitesized-payments"]).unwrap();
        assert!(cli.command.is_none());
    }
}
