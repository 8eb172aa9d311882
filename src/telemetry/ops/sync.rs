use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct SyncOp;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Fetch, Parse, Decide, Cap, Materialize, Persist, Subscription }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Fetch => "fetch",
        Phase::Parse => "parse",
        Phase::Decide => "decide",
        Phase::Cap => "cap",
        Phase::Materialize => "materialize",
        Phase::Persist => "persist",
        Phase::Subscription => "subscription",
    }}
    fn span(&self) -> Span { match self {
        Phase::Fetch => info_span!("fetch"),
        Phase::Parse => info_span!("parse"),
        Phase::Decide => info_span!("decide"),
        Phase::Cap => info_span!("cap"),
        Phase::Materialize => info_span!("materialize"),
        Phase::Persist => info_span!("persist"),
        Phase::Subscription => info_span!("subscription"),
    }}
}

impl OpMarker for SyncOp {
    const NAME: &'static str = "sync";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("sync") }
}
