use anyhow::Result;
use serde::Serialize;

pub mod config;
pub mod presenter;
pub mod types;

pub use presenter::Emitter;

use config::{OutputConfig, OutputFormat};
use types::{Envelope, Meta};

fn emitter() -> Emitter {
    let mut cfg = OutputConfig::from_env();
    if crate::telemetry::config::json_mode() {
        cfg.format = OutputFormat::Json;
    }
    Emitter::from_config(cfg)
}

pub fn emit_plan<T: Serialize>(op: &'static str, plan: &T, meta: Meta) -> Result<()> {
    let env = Envelope::plan(op, plan, meta)?;
    emitter().emit(&env)?;
    Ok(())
}

pub fn emit_result<T: Serialize>(op: &'static str, result: &T, meta: Meta) -> Result<()> {
    let env = Envelope::result(op, result, meta)?;
    emitter().emit(&env)?;
    Ok(())
}
