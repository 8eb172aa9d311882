use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "subsync.v1";

/// Timing attached to every envelope.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Meta {
    pub duration_ms: u128,
}

impl Meta {
    pub fn since(started: Instant) -> Self {
        Meta { duration_ms: started.elapsed().as_millis() }
    }
}

/// One JSON document per command on stdout. `plan` and `result` are exclusive.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub request_id: Uuid,
    pub op: &'static str,
    pub apply: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub meta: Meta,
}

impl Envelope {
    pub fn plan<T: Serialize>(op: &'static str, plan: &T, meta: Meta) -> Result<Self, serde_json::Error> {
        Ok(Self::build(op, false, Some(serde_json::to_value(plan)?), None, meta))
    }

    pub fn result<T: Serialize>(op: &'static str, result: &T, meta: Meta) -> Result<Self, serde_json::Error> {
        Ok(Self::build(op, true, None, Some(serde_json::to_value(result)?), meta))
    }

    fn build(op: &'static str, apply: bool, plan: Option<Value>, result: Option<Value>, meta: Meta) -> Self {
        Envelope { schema_version: SCHEMA_VERSION, time: Utc::now(), request_id: Uuid::new_v4(), op, apply, plan, result, meta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plan_envelope_is_not_applied() {
        let env = Envelope::plan("sub", &json!({"profiles": 5}), Meta { duration_ms: 12 }).expect("to serialize plan");
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["schema_version"], "subsync.v1");
        assert_eq!(v["op"], "sub");
        assert_eq!(v["apply"], false);
        assert_eq!(v["plan"]["profiles"], 5);
        assert!(v.get("result").is_none());
        assert_eq!(v["meta"]["duration_ms"], 12);
    }

    #[test]
    fn result_envelope_is_applied() {
        let env = Envelope::result("sync", &json!({"total": 3, "failed": 1}), Meta { duration_ms: 0 }).expect("to serialize result");
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["apply"], true);
        assert_eq!(v["result"]["failed"], 1);
        assert!(v.get("plan").is_none());
    }
}
