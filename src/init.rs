use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use sqlx::PgPool;

use crate::telemetry::{self};
use crate::telemetry::ops::init::Phase as InitPhase;

/// subsync init: create or upgrade the schema
#[derive(Args)]
pub struct InitCmd {}

#[derive(Serialize)]
struct InitResult {
    migrations: usize,
}

pub async fn run(pool: &PgPool, _args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log.root_span().entered();
    let _s = log.span(&InitPhase::Migrate).entered();

    // Apply any pending migrations (idempotent)
    let migrator = sqlx::migrate!();
    migrator.run(pool).await.context("apply migrations")?;

    log.info("✅ Database initialized");
    if telemetry::config::json_mode() {
        log.result(&InitResult { migrations: migrator.iter().count() })?;
    }
    Ok(())
}
