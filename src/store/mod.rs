use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::descriptor::{Descriptor, ServerKey};
use crate::error::SyncError;
use crate::profile::Profile;
use crate::subscription::types::Subscription;

pub mod memory;

/// Durable subscription rows.
///
/// Unreachable backends surface as [`SyncError::StorageUnavailable`]; row
/// counts are returned as-is and judged by the caller.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert `sub` and return the id the store assigned.
    async fn create(&self, sub: &Subscription) -> Result<i64, SyncError>;
    async fn update(&self, sub: &Subscription) -> Result<u64, SyncError>;
    async fn get(&self, id: i64) -> Result<Option<Subscription>, SyncError>;
    async fn delete(&self, id: i64) -> Result<u64, SyncError>;
    async fn list_all(&self) -> Result<Vec<Subscription>, SyncError>;
}

/// Durable profile rows, grouped by subscription group name.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Profile>, SyncError>;
    async fn list_by_group(&self, group: &str) -> Result<Vec<Profile>, SyncError>;
    async fn delete_all(&self, profiles: &[Profile]) -> Result<u64, SyncError>;
    /// Make `descriptors` the complete profile list of `group`, atomically.
    async fn materialize_for_group(&self, group: &str, descriptors: &[Descriptor]) -> Result<Materialized, SyncError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Materialized {
    pub kept: usize,
    pub inserted: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
pub struct ReplacementPlan {
    /// Existing rows that stay, with their refreshed contents.
    pub keep: Vec<(i64, Descriptor)>,
    pub insert: Vec<Descriptor>,
    pub remove: Vec<i64>,
}

impl ReplacementPlan {
    pub fn summary(&self) -> Materialized {
        Materialized { kept: self.keep.len(), inserted: self.insert.len(), removed: self.remove.len() }
    }
}

/// Work out how to turn `existing` into exactly `incoming` for `group`.
///
/// Rows are reused one-to-one by server identity so their ids survive a
/// re-sync. Every incoming descriptor is rewritten into `group`.
pub fn plan_replacement(group: &str, existing: &[Profile], incoming: &[Descriptor]) -> ReplacementPlan {
    let mut unclaimed: HashMap<ServerKey, Vec<i64>> = HashMap::new();
    // reverse so pop() hands out the oldest row first
    for p in existing.iter().rev() {
        unclaimed.entry(p.descriptor.server_key()).or_default().push(p.id);
    }

    let mut plan = ReplacementPlan::default();
    for d in incoming {
        let mut d = d.clone();
        d.url_group = group.to_string();
        match unclaimed.get_mut(&d.server_key()).and_then(|ids| ids.pop()) {
            Some(id) => plan.keep.push((id, d)),
            None => plan.insert.push(d),
        }
    }
    plan.remove = unclaimed.into_values().flatten().collect();
    plan.remove.sort_unstable();
    plan
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::descriptor::{Descriptor, DEFAULT_REMOTE_DNS, DEFAULT_ROUTE};

    pub fn descriptor(group: &str, host: &str) -> Descriptor {
        Descriptor {
            name: host.to_string(),
            host: host.to_string(),
            remote_port: 443,
            password: "pw".to_string(),
            protocol: "origin".to_string(),
            protocol_param: String::new(),
            method: "aes-128-ctr".to_string(),
            obfs: "plain".to_string(),
            obfs_param: String::new(),
            url_group: group.to_string(),
            route: DEFAULT_ROUTE.to_string(),
            remote_dns: DEFAULT_REMOTE_DNS.to_string(),
            ipv6: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::descriptor;
    use super::*;

    fn profile(id: i64, group: &str, host: &str) -> Profile {
        Profile { id, descriptor: descriptor(group, host) }
    }

    #[test]
    fn reuses_matching_rows_and_drops_the_rest() {
        let existing = vec![profile(1, "G", "a"), profile(2, "G", "b"), profile(3, "G", "c")];
        let mut renamed_b = descriptor("G", "b");
        renamed_b.name = "B prime".into();
        let incoming = vec![renamed_b.clone(), descriptor("G", "d")];

        let plan = plan_replacement("G", &existing, &incoming);
        assert_eq!(plan.keep, vec![(2, renamed_b)]);
        assert_eq!(plan.insert, vec![descriptor("G", "d")]);
        assert_eq!(plan.remove, vec![1, 3]);
        assert_eq!(plan.summary(), Materialized { kept: 1, inserted: 1, removed: 2 });
    }

    #[test]
    fn duplicates_claim_rows_one_to_one() {
        let existing = vec![profile(7, "G", "a")];
        let incoming = vec![descriptor("G", "a"), descriptor("G", "a")];
        let plan = plan_replacement("G", &existing, &incoming);
        assert_eq!(plan.keep.len(), 1);
        assert_eq!(plan.keep[0].0, 7);
        assert_eq!(plan.insert.len(), 1);
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn incoming_descriptors_are_moved_into_the_group() {
        let incoming = vec![descriptor("Other", "a")];
        let plan = plan_replacement("G", &[], &incoming);
        assert_eq!(plan.insert[0].url_group, "G");
    }

    #[test]
    fn empty_incoming_removes_everything() {
        let existing = vec![profile(1, "G", "a"), profile(2, "G", "b")];
        let plan = plan_replacement("G", &existing, &[]);
        assert!(plan.keep.is_empty() && plan.insert.is_empty());
        assert_eq!(plan.remove, vec![1, 2]);
    }
}
