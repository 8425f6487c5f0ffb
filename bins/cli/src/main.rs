//! Tally operator CLI.
//!
//! Runs posting-engine operations against the configured database:
//!
//! ```text
//! tally post         --company C01 --document <uuid> --user <uuid>
//! tally void         --company C01 --document <uuid> --date 2024-04-30 --user <uuid>
//! tally close-period --company C01 --module AP --year 2024 --month 3 --user <uuid>
//! tally recalc-cost  --company C01 --product PET001 --from 2024-04-01 --user <uuid>
//! tally revise-cost  --company C01 --document <uuid> --unit-cost 55 --user <uuid>
//! tally balance      --company C01 --account 101040100 --year 2024 --month 4
//! tally next-number  --company C01 --type SI
//! tally is-closed    --company C01 --module AR --date 2024-03-15
//! ```
//!
//! Results are printed as JSON. Ctrl-C cancels the running operation before
//! it commits.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tally_core::document::DocumentType;
use tally_core::fiscal::Module;
use tally_db::{PgStore, PostingEngine, connect_with};
use tally_shared::{AppConfig, AppError};
use tally_shared::types::{CompanyId, DocumentId, UserId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "tally", version, about = "Document posting and ledger engine")]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Post a pending document.
    Post {
        #[arg(long)]
        company: String,
        #[arg(long)]
        document: DocumentId,
        #[arg(long)]
        user: UserId,
    },
    /// Void a posted document.
    Void {
        #[arg(long)]
        company: String,
        #[arg(long)]
        document: DocumentId,
        /// Date of the offsetting lines.
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        user: UserId,
    },
    /// Close a module for a month.
    ClosePeriod {
        #[arg(long)]
        company: String,
        /// AP, AR, GL or INV.
        #[arg(long)]
        module: Module,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        user: UserId,
    },
    /// Replay a product's cost chain from a date.
    RecalcCost {
        #[arg(long)]
        company: String,
        #[arg(long)]
        product: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        user: UserId,
    },
    /// Revise the unit cost of a posted receiving report.
    ReviseCost {
        #[arg(long)]
        company: String,
        #[arg(long)]
        document: DocumentId,
        #[arg(long)]
        unit_cost: Decimal,
        #[arg(long)]
        user: UserId,
    },
    /// Show an account's balance for a month.
    Balance {
        #[arg(long)]
        company: String,
        #[arg(long)]
        account: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    /// Issue the next document number.
    NextNumber {
        #[arg(long)]
        company: String,
        /// Prefix (SI) or code (sales_invoice).
        #[arg(long = "type")]
        document_type: DocumentType,
    },
    /// Check whether a module is closed for a date.
    IsClosed {
        #[arg(long)]
        company: String,
        #[arg(long)]
        module: Module,
        #[arg(long)]
        date: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = AppConfig::load_with_dotenv().context("Failed to load configuration")?;
    let db = connect_with(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let engine = PostingEngine::with_config(PgStore::new(db), &config.posting, &config.sequence);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(&engine, cli.command, &cancel).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            error!(code = err.error_code(), error = %err, "Command failed");
            std::process::exit(err.exit_code());
        }
    }
}

async fn run(
    engine: &PostingEngine<PgStore>,
    command: Command,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, AppError> {
    let value = match command {
        Command::Post {
            company,
            document,
            user,
        } => to_json(
            &engine
                .post_document(&CompanyId::new(company), document, user, cancel)
                .await?,
        )?,
        Command::Void {
            company,
            document,
            date,
            user,
        } => to_json(
            &engine
                .void_document(&CompanyId::new(company), document, user, date, cancel)
                .await?,
        )?,
        Command::ClosePeriod {
            company,
            module,
            year,
            month,
            user,
        } => to_json(
            &engine
                .close_period(&CompanyId::new(company), module, year, month, user, cancel)
                .await?,
        )?,
        Command::RecalcCost {
            company,
            product,
            from,
            user,
        } => to_json(
            &engine
                .recalculate_inventory_cost(&CompanyId::new(company), &product, from, user, cancel)
                .await?,
        )?,
        Command::ReviseCost {
            company,
            document,
            unit_cost,
            user,
        } => to_json(
            &engine
                .revise_purchase_cost(&CompanyId::new(company), document, unit_cost, user, cancel)
                .await?,
        )?,
        Command::Balance {
            company,
            account,
            year,
            month,
        } => to_json(
            &engine
                .get_account_balance(&CompanyId::new(company), &account, year, month)
                .await?,
        )?,
        Command::NextNumber {
            company,
            document_type,
        } => {
            let number = engine
                .generate_document_number(&CompanyId::new(company), document_type, cancel)
                .await?;
            json!({ "document_type": document_type, "document_no": number })
        }
        Command::IsClosed {
            company,
            module,
            date,
        } => {
            let closed = engine
                .is_period_closed(&CompanyId::new(company), module, date)
                .await?;
            json!({ "module": module, "date": date, "closed": closed })
        }
    };
    Ok(value)
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tally=info,tally_db=info,sea_orm=warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
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
    fn test_parses_close_period() {
        let cli = Cli::try_parse_from([
            "tally",
            "close-period",
            "--company",
            "c01",
            "--module",
            "gl",
            "--year",
            "2024",
            "--month",
            "3",
            "--user",
            "0191a0c0-0000-7000-8000-000000000001",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::ClosePeriod {
                module: Module::Gl,
                year: 2024,
                month: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_parses_document_type_prefix() {
        let cli =
            Cli::try_parse_from(["tally", "next-number", "--company", "C01", "--type", "SI"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::NextNumber {
                document_type: DocumentType::SalesInvoice,
                ..
            }
        ));
    }
}
