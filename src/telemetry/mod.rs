pub mod config;
pub mod ctx;
pub mod ops;

use std::marker::PhantomData;
use std::time::Instant;

use ctx::{LogCtx, OpMarker};

fn ctx<O: OpMarker>() -> LogCtx<O> {
    LogCtx { json: config::logs_are_json(), started: Instant::now(), _marker: PhantomData }
}

pub fn init() -> LogCtx<ops::init::Init> { ctx() }
pub fn sub() -> LogCtx<ops::sub::Sub> { ctx() }
pub fn sync() -> LogCtx<ops::sync::SyncOp> { ctx() }
pub fn profile() -> LogCtx<ops::profile::Profile> { ctx() }
