use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use sqlx::PgPool;
use url::Url;

use crate::descriptor::ParseContext;
use crate::fetch::HttpFetcher;
use crate::profile::PgProfileStore;
use crate::store::ProfileStore;
use crate::sync::Reconciler;
use crate::telemetry::{self};
use crate::telemetry::ops::sub::Phase as SubPhase;

mod db;
pub mod types;

pub use db::PgSubscriptionStore;

type PgReconciler = Reconciler<PgSubscriptionStore, PgProfileStore, HttpFetcher>;

/// subsync sub add/ls/rm/update/update-all
#[derive(Args)]
pub struct SubCmd {
    /// Copy routing settings from this profile onto synced profiles
    #[arg(global = true, long)]
    pub template: Option<i64>,

    #[command(subcommand)]
    pub cmd: SubSub,
}

#[derive(Subcommand)]
pub enum SubSub {
    /// Subscribe to a URL and sync it once
    Add { url: String },
    /// List subscriptions and their last status
    Ls,
    /// Remove a subscription and its profiles (plan-only by default; use --apply to delete)
    Rm {
        id: i64,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
    /// Re-sync one subscription
    Update { id: i64 },
    /// Re-sync every subscription
    UpdateAll,
}

pub async fn run(pool: &PgPool, args: SubCmd) -> Result<()> {
    let log = telemetry::sub();
    let _g = log.root_span().entered();
    let rec = reconciler(pool, args.template).await?;
    match args.cmd {
        SubSub::Add { url } => add_sub(&rec, url).await?,
        SubSub::Ls => ls_subs(&rec).await?,
        SubSub::Rm { id, apply } => rm_sub(&rec, pool, id, apply).await?,
        SubSub::Update { id } => update_sub(&rec, id).await?,
        SubSub::UpdateAll => update_all(&rec).await?,
    }
    Ok(())
}

async fn reconciler(pool: &PgPool, template: Option<i64>) -> Result<PgReconciler> {
    let subs = Arc::new(PgSubscriptionStore::new(pool.clone()));
    let profiles = Arc::new(PgProfileStore::new(pool.clone()));
    let ctx = match template {
        Some(id) => {
            let Some(p) = profiles.get(id).await? else { bail!("Template profile {} not found", id) };
            ParseContext::with_template(p.routing())
        }
        None => ParseContext::default(),
    };
    let fetcher = HttpFetcher::new().context("build http client")?;
    Ok(Reconciler::new(subs, profiles, fetcher).with_context(ctx))
}

async fn add_sub(rec: &PgReconciler, url: String) -> Result<()> {
    let log = telemetry::sub();
    let _s = log.span_kv(&SubPhase::Add, [("url", url.clone())]).entered();

    // URL validation (friendly error before any network I/O)
    if Url::parse(url.trim()).is_err() { bail!("Invalid URL: {}", url); }

    let created = rec.create(&url).await;
    match &created {
        Some(sub) => log.info(format!("➕ Subscription [{}] {} → group {:?}", sub.id, sub.url, sub.url_group)),
        None => log.warn("↩️ No subscription created (see log above)"),
    }
    if telemetry::config::json_mode() {
        let result = types::SubAddResult { created: created.is_some(), url, subscription: created };
        log.result(&result)?;
    }
    Ok(())
}

async fn ls_subs(rec: &PgReconciler) -> Result<()> {
    let log = telemetry::sub();
    let _s = log.span(&SubPhase::List).entered();
    let subscriptions = rec.list().await?;
    log.info("📡 Subscriptions:");
    for s in &subscriptions {
        log.info(format!("[{}] {} group={:?} status={}", s.id, s.url, s.url_group, s.status.label()));
    }
    if telemetry::config::json_mode() {
        log.result(&types::SubList { subscriptions })?;
    }
    Ok(())
}

async fn rm_sub(rec: &PgReconciler, pool: &PgPool, id: i64, apply: bool) -> Result<()> {
    let log = telemetry::sub();
    let Some(subscription) = rec.get(id).await? else { bail!("Subscription {} not found", id) };

    if !apply {
        let _s = log.span(&SubPhase::Plan).entered();
        let profiles = PgProfileStore::new(pool.clone()).list_by_group(&subscription.url_group).await?.len();
        log.info(format!("📝 Remove plan — sub [{}] {} group={:?} profiles={}", id, subscription.url, subscription.url_group, profiles));
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            log.plan(&types::SubRmPlan { action: "remove", subscription, profiles })?;
        }
        return Ok(());
    }

    let _s = log.span(&SubPhase::Remove).entered();
    let Some(profiles_removed) = rec.delete(id).await? else { bail!("Subscription {} not found", id) };
    log.info(format!("🗑️ Removed subscription [{}] and {} profile(s)", id, profiles_removed));
    if telemetry::config::json_mode() {
        log.result(&types::SubRmResult { id, profiles_removed })?;
    }
    Ok(())
}

async fn update_sub(rec: &PgReconciler, id: i64) -> Result<()> {
    let log = telemetry::sub();
    let _s = log.span_kv(&SubPhase::Update, [("id", id.to_string())]).entered();
    let Some(mut sub) = rec.get(id).await? else { bail!("Subscription {} not found", id) };

    let out = rec.update(&mut sub).await.with_context(|| format!("update subscription {}", id))?;
    let m = out.materialized.unwrap_or_default();
    log.info(format!(
        "✅ Subscription [{}] {} — descriptors={} kept={} inserted={} removed={}",
        id, out.status.label(), out.descriptors, m.kept, m.inserted, m.removed
    ));
    if telemetry::config::json_mode() {
        let result = types::SubUpdateResult {
            id,
            status: out.status,
            descriptors: out.descriptors,
            kept: m.kept,
            inserted: m.inserted,
            removed: m.removed,
        };
        log.result(&result)?;
    }
    Ok(())
}

async fn update_all(rec: &PgReconciler) -> Result<()> {
    let log = telemetry::sub();
    let _s = log.span(&SubPhase::UpdateAll).entered();
    let outcomes = rec.update_all().await?;

    let per_sub: Vec<types::SubOutcomeRow> = outcomes
        .into_iter()
        .map(|o| types::SubOutcomeRow {
            id: o.subscription.id,
            url_group: o.subscription.url_group,
            status: o.subscription.status,
            error: o.result.err().map(|e| e.to_string()),
        })
        .collect();
    let failed = per_sub.iter().filter(|r| r.error.is_some()).count();
    for r in &per_sub {
        match &r.error {
            None => log.info(format!("✅ [{}] {} → {}", r.id, r.url_group, r.status.label())),
            Some(e) => log.warn(format!("❌ [{}] {} → {} ({})", r.id, r.url_group, r.status.label(), e)),
        }
    }
    if telemetry::config::json_mode() {
        log.result(&types::SubUpdateAllResult { total: per_sub.len(), failed, per_sub })?;
    }
    Ok(())
}
