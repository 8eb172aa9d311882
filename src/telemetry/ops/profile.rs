use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Profile;

#[derive(Copy, Clone, Debug)]
pub enum Phase { List, Export }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::List => "list", Phase::Export => "export" } }
    fn span(&self) -> Span { match self { Phase::List => info_span!("list"), Phase::Export => info_span!("export") } }
}

impl OpMarker for Profile {
    const NAME: &'static str = "profile";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("profile") }
}
