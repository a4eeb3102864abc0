//! Object lifecycle auditing.
//!
//! A [`LifecycleAuditor`] is snapshotted before and after every test-body
//! invocation. Objects created during the invocation that are still alive
//! afterwards are reported as warnings, and a non-zero change in the live
//! count becomes one failed outcome.
//!
//! [`LiveObjectCounter`] is the stock auditor: test code registers the
//! objects it wants watched with [`LiveObjectCounter::track`] and keeps the
//! returned [`TrackedObject`] next to them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Point-in-time view of the audited population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSnapshot {
    pub live_objects: i64,
    /// Identifier the next tracked object will get.
    pub next_id: u64,
}

pub trait LifecycleAuditor {
    fn snapshot(&self) -> AuditSnapshot;

    /// Descriptions of objects created after `since` that are still alive.
    fn survivors(&self, _since: &AuditSnapshot) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
struct Population {
    next_id: u64,
    live: BTreeMap<u64, String>,
}

/// Counts live objects registered through [`track`](Self::track).
#[derive(Debug, Clone, Default)]
pub struct LiveObjectCounter {
    population: Rc<RefCell<Population>>,
}

impl LiveObjectCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, description: impl Into<String>) -> TrackedObject {
        let mut population = self.population.borrow_mut();
        let id = population.next_id;
        population.next_id += 1;
        population.live.insert(id, description.into());
        TrackedObject {
            id,
            population: Rc::clone(&self.population),
        }
    }

    pub fn live_count(&self) -> usize {
        self.population.borrow().live.len()
    }
}

impl LifecycleAuditor for LiveObjectCounter {
    fn snapshot(&self) -> AuditSnapshot {
        let population = self.population.borrow();
        AuditSnapshot {
            live_objects: population.live.len() as i64,
            next_id: population.next_id,
        }
    }

    fn survivors(&self, since: &AuditSnapshot) -> Vec<String> {
        self.population
            .borrow()
            .live
            .range(since.next_id..)
            .map(|(_, description)| description.clone())
            .collect()
    }
}

/// Registration handle; the object counts as alive until this is dropped.
#[derive(Debug)]
pub struct TrackedObject {
    id: u64,
    population: Rc<RefCell<Population>>,
}

impl Drop for TrackedObject {
    fn drop(&mut self) {
        if let Ok(mut population) = self.population.try_borrow_mut() {
            population.live.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survivors_are_those_created_after_the_snapshot() {
        let counter = LiveObjectCounter::new();
        let _old = counter.track("old");
        let before = counter.snapshot();
        let _kept = counter.track("kept buffer");
        {
            let _temporary = counter.track("temporary");
        }
        let after = counter.snapshot();
        assert_eq!(after.live_objects - before.live_objects, 1);
        assert_eq!(counter.survivors(&before), vec!["kept buffer".to_string()]);
    }

    #[test]
    fn dropping_handles_restores_the_count() {
        let counter = LiveObjectCounter::new();
        let before = counter.snapshot();
        let handles: Vec<_> = (0..3).map(|i| counter.track(format!("node {}", i))).collect();
        assert_eq!(counter.live_count(), 3);
        drop(handles);
        assert_eq!(counter.snapshot().live_objects, before.live_objects);
        assert!(counter.survivors(&before).is_empty());
    }
}
