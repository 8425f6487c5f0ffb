//! Database migration runner for Tally.
//!
//! Usage:
//!   migrator up      - Apply the posting schema
//!   migrator down    - Drop the posting schema
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop everything and re-apply
//!
//! The connection string comes from `DATABASE_URL`.

use sea_orm_migration::prelude::*;
use tally_db::migration::Migrator;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The migrator CLI sets up its own tracing.
    cli::run_cli(Migrator).await;
}
