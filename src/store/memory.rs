// In-process stores. Each call holds the lock for its whole mutation, which
// gives the same single-write atomicity the Postgres backends provide.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::descriptor::Descriptor;
use crate::error::SyncError;
use crate::profile::Profile;
use crate::subscription::types::Subscription;

use super::{plan_replacement, Materialized, ProfileStore, SubscriptionStore};

struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table { rows: BTreeMap::new(), next_id: 1 }
    }
}

impl<T> Table<T> {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Default)]
pub struct MemorySubscriptionStore {
    table: Mutex<Table<Subscription>>,
    offline: AtomicBool,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable backend for every subsequent call.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), SyncError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::StorageUnavailable("subscription store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn create(&self, sub: &Subscription) -> Result<i64, SyncError> {
        self.check_online()?;
        let mut t = self.table.lock().expect("subscription table mutex poisoned");
        let id = t.allocate();
        let mut row = sub.clone();
        row.id = id;
        t.rows.insert(id, row);
        Ok(id)
    }

    async fn update(&self, sub: &Subscription) -> Result<u64, SyncError> {
        self.check_online()?;
        let mut t = self.table.lock().expect("subscription table mutex poisoned");
        match t.rows.get_mut(&sub.id) {
            Some(row) => {
                *row = sub.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn get(&self, id: i64) -> Result<Option<Subscription>, SyncError> {
        self.check_online()?;
        let t = self.table.lock().expect("subscription table mutex poisoned");
        Ok(t.rows.get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<u64, SyncError> {
        self.check_online()?;
        let mut t = self.table.lock().expect("subscription table mutex poisoned");
        Ok(u64::from(t.rows.remove(&id).is_some()))
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, SyncError> {
        self.check_online()?;
        let t = self.table.lock().expect("subscription table mutex poisoned");
        Ok(t.rows.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryProfileStore {
    table: Mutex<Table<Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows directly, bypassing group replacement.
    pub fn seed(&self, descriptors: &[Descriptor]) -> Vec<i64> {
        let mut t = self.table.lock().expect("profile table mutex poisoned");
        descriptors
            .iter()
            .map(|d| {
                let id = t.allocate();
                t.rows.insert(id, Profile { id, descriptor: d.clone() });
                id
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.lock().expect("profile table mutex poisoned").rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, id: i64) -> Result<Option<Profile>, SyncError> {
        let t = self.table.lock().expect("profile table mutex poisoned");
        Ok(t.rows.get(&id).cloned())
    }

    async fn list_by_group(&self, group: &str) -> Result<Vec<Profile>, SyncError> {
        let t = self.table.lock().expect("profile table mutex poisoned");
        Ok(t.rows.values().filter(|p| p.descriptor.url_group == group).cloned().collect())
    }

    async fn delete_all(&self, profiles: &[Profile]) -> Result<u64, SyncError> {
        let mut t = self.table.lock().expect("profile table mutex poisoned");
        let removed = profiles.iter().filter(|p| t.rows.remove(&p.id).is_some()).count();
        Ok(removed as u64)
    }

    async fn materialize_for_group(&self, group: &str, descriptors: &[Descriptor]) -> Result<Materialized, SyncError> {
        let mut t = self.table.lock().expect("profile table mutex poisoned");
        let existing: Vec<Profile> = t.rows.values().filter(|p| p.descriptor.url_group == group).cloned().collect();
        let plan = plan_replacement(group, &existing, descriptors);

        for id in &plan.remove {
            t.rows.remove(id);
        }
        for (id, d) in &plan.keep {
            t.rows.insert(*id, Profile { id: *id, descriptor: d.clone() });
        }
        for d in &plan.insert {
            let id = t.allocate();
            t.rows.insert(id, Profile { id, descriptor: d.clone() });
        }
        Ok(plan.summary())
    }
}
