use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::{info, debug, warn, error, Span};

use crate::output::{self, types::Meta};
use crate::subscription::types::SubStatus;

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) started: Instant,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> LogCtx<O> {
    fn op_name(&self) -> &'static str { O::NAME }

    pub fn root_span(&self) -> Span { O::root_span() }

    pub fn span(&self, ph: &O::Phase) -> Span { ph.span() }

    pub fn span_kv<'a, T>(&self, ph: &O::Phase, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.span(ph);
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %self.op_name(), phase = ph.name(), "span_start");
        } else {
            info!(op = %self.op_name(), phase = ph.name(), details = %details, "span_start");
        }
        span
    }

    pub fn info(&self, msg: impl AsRef<str>) { if self.json { info!(op = %self.op_name(), "{}", msg.as_ref()); } else { info!("{}", msg.as_ref()); } }
    pub fn warn(&self, msg: impl AsRef<str>) { if self.json { warn!(op = %self.op_name(), "{}", msg.as_ref()); } else { warn!("{}", msg.as_ref()); } }

    pub fn info_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); info!(op = %self.op_name(), details = %details, "{}", msg); }
        else { info!("{}", msg); }
    }

    pub fn debug_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); debug!(op = %self.op_name(), details = %details, "{}", msg); }
        else { debug!("{}", msg); }
    }

    pub fn warn_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); warn!(op = %self.op_name(), details = %details, "{}", msg); }
        else { warn!("{}", msg); }
    }

    pub fn error_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); error!(op = %self.op_name(), details = %details, "{}", msg); }
        else { error!("{}", msg); }
    }

    /// Envelope metadata for this command so far.
    pub fn meta(&self) -> Meta { Meta::since(self.started) }

    pub fn plan<T: Serialize>(&self, plan: &T) -> Result<()> { output::emit_plan(self.op_name(), plan, self.meta()) }
    pub fn result<T: Serialize>(&self, result: &T) -> Result<()> { output::emit_result(self.op_name(), result, self.meta()) }
}

impl LogCtx<crate::telemetry::ops::sync::SyncOp> {
    pub fn status(&self, sub_id: i64, group: &str, status: SubStatus) {
        if self.json { info!(op = %self.op_name(), sub_id, group, status = status.label(), "status"); }
        else { info!("🔖 Subscription {} ({}) → {}", sub_id, group, status.label()); }
    }

    pub fn batch_totals(&self, total: usize, failed: usize) {
        if self.json { info!(op = %self.op_name(), total, failed, "update_all_totals"); }
        else { info!("📊 Update-all totals — subscriptions={} failed={}", total, failed); }
    }
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    let mut parts: Vec<String> = Vec::new();
    for (k, v) in kv { parts.push(format!("{}={}", k, v)); }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_pairs_render_in_order() {
        let s = kv_to_string([("id", "3".to_string()), ("group", "Acme".to_string())]);
        assert_eq!(s, "id=3 group=Acme");
        assert_eq!(kv_to_string(Vec::<(&str, String)>::new()), "");
    }

    #[test]
    fn meta_reports_elapsed_time() {
        let log = crate::telemetry::sync();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(log.meta().duration_ms >= 5);
    }
}
