//! Subscription reconciliation.
//!
//! Every call is one sequential pipeline: fetch → parse → decide → persist.
//! Status writes and profile replacement go through separate stores; the
//! only cross-call state lives in those stores.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::descriptor::{self, ParseContext, Parsed};
use crate::error::SyncError;
use crate::fetch::Fetch;
use crate::store::{Materialized, ProfileStore, SubscriptionStore};
use crate::subscription::types::{SubStatus, Subscription};
use crate::telemetry::{self};
use crate::telemetry::ops::sync::Phase as SyncPhase;

pub mod cap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub status: SubStatus,
    /// Descriptors found in the payload, before any cap.
    pub descriptors: usize,
    /// Size the set was sampled down to, when a cap was binding.
    pub capped_to: Option<usize>,
    /// Profile changes; `None` when the group was left untouched.
    pub materialized: Option<Materialized>,
}

/// Result of one subscription within [`Reconciler::update_all`].
#[derive(Debug)]
pub struct SyncOutcome {
    pub subscription: Subscription,
    pub result: Result<UpdateOutcome, SyncError>,
}

pub struct Reconciler<S, P, F> {
    subs: Arc<S>,
    profiles: Arc<P>,
    fetcher: F,
    ctx: ParseContext,
}

impl<S, P, F> Reconciler<S, P, F>
where
    S: SubscriptionStore,
    P: ProfileStore,
    F: Fetch,
{
    pub fn new(subs: Arc<S>, profiles: Arc<P>, fetcher: F) -> Self {
        Reconciler { subs, profiles, fetcher, ctx: ParseContext::default() }
    }

    pub fn with_context(mut self, ctx: ParseContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Subscribe to `url`. Returns `None` when nothing was created.
    ///
    /// Creation is user-initiated and retryable, so failures are logged and
    /// folded into `None` instead of being returned.
    pub async fn create(&self, url: &str) -> Option<Subscription> {
        let log = telemetry::sync();
        let url = url.trim();
        if url.is_empty() {
            log.warn("↩️ create skipped: empty url");
            return None;
        }
        match self.try_create(url).await {
            Ok(sub) => sub,
            Err(e) => {
                log.error_kv("❌ subscription not created", [("url", url.to_string()), ("error", e.to_string())]);
                None
            }
        }
    }

    async fn try_create(&self, url: &str) -> Result<Option<Subscription>, SyncError> {
        let log = telemetry::sync();
        let text = self.fetcher.fetch(url).instrument(log.span(&SyncPhase::Fetch)).await?;
        let parsed = self.parse(&text)?;

        let group = match parsed.descriptors.first() {
            None => {
                log.info_kv("↩️ create skipped: no descriptors", [("url", url.to_string())]);
                return Ok(None);
            }
            Some(d) if d.url_group.is_empty() => {
                log.info_kv("↩️ create skipped: descriptors carry no group", [("url", url.to_string())]);
                return Ok(None);
            }
            Some(d) => d.url_group.clone(),
        };

        if self.list().await?.iter().any(|s| s.url_group == group) {
            log.info_kv("↩️ create skipped: group already subscribed", [("group", group)]);
            return Ok(None);
        }

        let mut sub = Subscription::new(url, group);
        sub.id = self.subs.create(&sub).await?;
        log.info_kv("➕ subscription created", [("id", sub.id.to_string()), ("group", sub.url_group.clone())]);

        if let Err(e) = self.reconcile(&mut sub, parsed).await {
            // drop the half-made row so the user can retry the same group
            if let Err(cleanup) = self.subs.delete(sub.id).await {
                log.warn_kv("⚠️ could not remove subscription after failed sync", [("id", sub.id.to_string()), ("error", cleanup.to_string())]);
            }
            return Err(e);
        }
        Ok(Some(sub))
    }

    /// Fetch `sub.url` and reconcile the group against it.
    pub async fn update(&self, sub: &mut Subscription) -> Result<UpdateOutcome, SyncError> {
        self.update_with(sub, None, &CancellationToken::new()).await
    }

    /// Like [`update`](Self::update); firing `cancel` abandons the fetch.
    pub async fn update_cancellable(&self, sub: &mut Subscription, cancel: &CancellationToken) -> Result<UpdateOutcome, SyncError> {
        self.update_with(sub, None, cancel).await
    }

    /// Reconcile against `payload` when the caller already holds the decoded
    /// text, otherwise fetch it.
    pub async fn update_with(&self, sub: &mut Subscription, payload: Option<&str>, cancel: &CancellationToken) -> Result<UpdateOutcome, SyncError> {
        let log = telemetry::sync();
        let parsed = match payload {
            Some(text) => self.parse(text)?,
            None => {
                let text = self.fetcher.fetch_with(&sub.url, cancel).instrument(log.span(&SyncPhase::Fetch)).await?;
                self.parse(&text)?
            }
        };
        self.reconcile(sub, parsed).await
    }

    fn parse(&self, text: &str) -> Result<Parsed, SyncError> {
        let log = telemetry::sync();
        let _s = log.span(&SyncPhase::Parse).entered();
        let parsed = descriptor::parse(text, &self.ctx)?;
        if parsed.skipped > 0 {
            log.warn_kv("⚠️ skipped malformed descriptors", [("skipped", parsed.skipped.to_string())]);
        }
        Ok(parsed)
    }

    async fn reconcile(&self, sub: &mut Subscription, parsed: Parsed) -> Result<UpdateOutcome, SyncError> {
        let log = telemetry::sync();
        let Parsed { descriptors, cap: limit, .. } = parsed;
        let count = descriptors.len();

        let first_group = descriptors.first().map(|d| d.url_group.clone());
        let decide = log.span(&SyncPhase::Decide);
        match first_group {
            None => {
                let removed = self.clear_group(&sub.url_group).instrument(log.span(&SyncPhase::Materialize)).await?;
                sub.status = SubStatus::Empty;
                self.persist(sub).instrument(decide).await?;
                log.status(sub.id, &sub.url_group, sub.status);
                return Ok(UpdateOutcome {
                    status: sub.status,
                    descriptors: 0,
                    capped_to: None,
                    materialized: Some(Materialized { removed: usize::try_from(removed).unwrap_or(usize::MAX), ..Default::default() }),
                });
            }
            Some(g) if g != sub.url_group => {
                log.warn_kv("⚠️ group name changed", [("expected", sub.url_group.clone()), ("found", g)]);
                sub.status = SubStatus::NameChanged;
                self.persist(sub).instrument(decide).await?;
                log.status(sub.id, &sub.url_group, sub.status);
                return Ok(UpdateOutcome { status: sub.status, descriptors: count, capped_to: None, materialized: None });
            }
            Some(_) => {
                sub.status = SubStatus::Normal;
                self.persist(sub).instrument(decide).await?;
                log.status(sub.id, &sub.url_group, sub.status);
            }
        }

        let capped_to = if cap::is_binding(limit, count) { limit } else { None };
        let chosen = {
            let _s = log.span(&SyncPhase::Cap).entered();
            let chosen = cap::apply_cap(descriptors, limit);
            if let Some(n) = capped_to {
                log.info_kv("✂️ cap applied", [("offered", count.to_string()), ("kept", n.to_string())]);
            }
            chosen
        };

        let materialized = self
            .profiles
            .materialize_for_group(&sub.url_group, &chosen)
            .instrument(log.span(&SyncPhase::Materialize))
            .await?;
        log.info_kv(
            "✅ profiles replaced",
            [
                ("group", sub.url_group.clone()),
                ("kept", materialized.kept.to_string()),
                ("inserted", materialized.inserted.to_string()),
                ("removed", materialized.removed.to_string()),
            ],
        );

        Ok(UpdateOutcome { status: sub.status, descriptors: count, capped_to, materialized: Some(materialized) })
    }

    /// Update every stored subscription, one at a time.
    ///
    /// A failing subscription is marked `NETWORK_ERROR` and reported in its
    /// own outcome; the rest of the batch still runs.
    pub async fn update_all(&self) -> Result<Vec<SyncOutcome>, SyncError> {
        let log = telemetry::sync();
        let subs = self.list().await?;
        let mut outcomes = Vec::with_capacity(subs.len());

        for mut sub in subs {
            let span = log.span(&SyncPhase::Subscription);
            let result = self.update(&mut sub).instrument(span).await;
            if let Err(e) = &result {
                log.warn_kv("⚠️ update failed", [("id", sub.id.to_string()), ("url", sub.url.clone()), ("error", e.to_string())]);
                log.debug_kv("marking subscription", [("id", sub.id.to_string()), ("previous", sub.status.label().to_string())]);
                sub.status = SubStatus::NetworkError;
                match self.persist(&sub).await {
                    Ok(()) => log.status(sub.id, &sub.url_group, sub.status),
                    Err(pe) => log.error_kv("❌ could not record NETWORK_ERROR", [("id", sub.id.to_string()), ("error", pe.to_string())]),
                }
            }
            outcomes.push(SyncOutcome { subscription: sub, result });
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        log.batch_totals(outcomes.len(), failed);
        Ok(outcomes)
    }

    /// Delete a subscription together with its group's profiles.
    /// Returns the number of profiles removed, or `None` if `id` is unknown.
    pub async fn delete(&self, id: i64) -> Result<Option<u64>, SyncError> {
        let log = telemetry::sync();
        let Some(sub) = self.get(id).await? else { return Ok(None) };
        let removed = self.clear_group(&sub.url_group).await?;
        let rows = self.subs.delete(id).await?;
        if rows != 1 {
            return Err(SyncError::StorageInvariantViolation(format!("expected to delete 1 subscription row for id={}, deleted {}", id, rows)));
        }
        log.info_kv("🗑️ subscription deleted", [("id", id.to_string()), ("profiles", removed.to_string())]);
        Ok(Some(removed))
    }

    /// Look up one subscription. Query failures other than an unreachable
    /// backend are logged and read as "absent".
    pub async fn get(&self, id: i64) -> Result<Option<Subscription>, SyncError> {
        match self.subs.get(id).await {
            Ok(sub) => Ok(sub),
            Err(e) if e.is_storage_unavailable() => Err(e),
            Err(e) => {
                telemetry::sync().warn_kv("⚠️ subscription lookup failed", [("id", id.to_string()), ("error", e.to_string())]);
                Ok(None)
            }
        }
    }

    /// All subscriptions, with the same error policy as [`get`](Self::get).
    pub async fn list(&self) -> Result<Vec<Subscription>, SyncError> {
        match self.subs.list_all().await {
            Ok(subs) => Ok(subs),
            Err(e) if e.is_storage_unavailable() => Err(e),
            Err(e) => {
                telemetry::sync().warn_kv("⚠️ subscription listing failed", [("error", e.to_string())]);
                Ok(Vec::new())
            }
        }
    }

    async fn clear_group(&self, group: &str) -> Result<u64, SyncError> {
        let profiles = self.profiles.list_by_group(group).await?;
        self.profiles.delete_all(&profiles).await
    }

    async fn persist(&self, sub: &Subscription) -> Result<(), SyncError> {
        let log = telemetry::sync();
        let rows = self.subs.update(sub).instrument(log.span(&SyncPhase::Persist)).await?;
        if rows != 1 {
            return Err(SyncError::StorageInvariantViolation(format!("expected to update 1 subscription row for id={}, updated {}", sub.id, rows)));
        }
        Ok(())
    }
}
