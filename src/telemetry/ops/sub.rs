use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Sub;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Add, List, Plan, Remove, Update, UpdateAll }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Add => "add",
        Phase::List => "list",
        Phase::Plan => "plan",
        Phase::Remove => "remove",
        Phase::Update => "update",
        Phase::UpdateAll => "update_all",
    }}
    fn span(&self) -> Span { match self {
        Phase::Add => info_span!("add"),
        Phase::List => info_span!("list"),
        Phase::Plan => info_span!("plan"),
        Phase::Remove => info_span!("remove"),
        Phase::Update => info_span!("update"),
        Phase::UpdateAll => info_span!("update_all"),
    }}
}

impl OpMarker for Sub {
    const NAME: &'static str = "sub";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("sub") }
}
