//! Exchange maintenance tool
//!
//! Runs against the snapshot in `EXCHANGE_DATA_DIR` while the gateway is
//! stopped.
//!
//! ```text
//! exchange-maintenance backfill                  record opening balances
//! exchange-maintenance grant-superadmin <email>  bootstrap a superadmin
//! exchange-maintenance verify-audit              check the audit hash chain
//! ```

use anyhow::{bail, Context};
use exchange_core::{audit::verify_chain, Config, Exchange};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("backfill");

    let config = Config::from_env().context("Failed to load exchange configuration")?;
    if !config.snapshot.enabled {
        bail!("Snapshots are disabled; maintenance would not persist anything");
    }

    let exchange = Exchange::open(config).await?;
    tracing::info!(command, "Exchange opened for maintenance");

    let outcome = run(&exchange, command, &args[args.len().min(1)..]).await;

    exchange.shutdown().await?;
    outcome
}

async fn run(exchange: &Exchange, command: &str, rest: &[String]) -> anyhow::Result<()> {
    match command {
        "backfill" => {
            let migrated = exchange.backfill_opening_balances().await?;
            tracing::info!(migrated, "Opening balance backfill finished");
        }
        "grant-superadmin" => {
            let email = rest.first().context("Usage: grant-superadmin <email>")?;
            let account = exchange.grant_superadmin(email).await?;
            tracing::info!(account_id = %account.id, email = %account.email, "Superadmin granted");
        }
        "verify-audit" => {
            let chain = exchange.storage().audit_chain();
            verify_chain(&chain)?;
            tracing::info!(entries = chain.len(), "Audit chain intact");
        }
        other => bail!("Unknown command: {}", other),
    }
    Ok(())
}
