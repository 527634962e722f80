//! The shared-context store.
//!
//! Locking layout: one mutex over the bead map, one mutex per bead context.
//! Every critical section is bounded — the only work done under a per-bead
//! lock is field mutation and non-blocking channel sends. Fan-out is
//! "live-only": a subscriber whose bounded buffer is full loses that event
//! rather than stalling the writer or the other subscribers. There is no
//! replay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use taiga_core::context::ProjectId;
use taiga_core::error::ContextError;

use crate::types::{ActivityEntry, ContextEvent, ContextEventKind, SharedBeadContext};

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live event feed for one bead.
///
/// Dropping the receiver is enough to stop receiving; calling
/// [`SharedContextStore::unsubscribe`] additionally closes the sending side
/// immediately (exactly once) instead of waiting for the next publish to
/// prune it.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub receiver: flume::Receiver<ContextEvent>,
}

struct SubscriberSlot {
    id: u64,
    tx: flume::Sender<ContextEvent>,
}

// ---------------------------------------------------------------------------
// Store internals
// ---------------------------------------------------------------------------

struct BeadSlot {
    ctx: SharedBeadContext,
    subscribers: Vec<SubscriberSlot>,
}

impl BeadSlot {
    /// Fan an event out to every subscriber without blocking. Full buffers
    /// drop the event for that subscriber; disconnected subscribers are
    /// pruned.
    fn publish(&mut self, event: ContextEvent) {
        self.subscribers.retain(|slot| match slot.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(_)) => {
                debug!(
                    bead_id = %event.bead_id,
                    subscriber = slot.id,
                    version = event.version,
                    "subscriber lagging, dropping event"
                );
                true
            }
            Err(flume::TrySendError::Disconnected(_)) => false,
        });
    }
}

/// Store of all live shared bead contexts.
pub struct SharedContextStore {
    beads: Mutex<HashMap<String, Arc<Mutex<BeadSlot>>>>,
    activity_capacity: usize,
    subscriber_buffer: usize,
    next_sub_id: AtomicU64,
}

impl Default for SharedContextStore {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

impl SharedContextStore {
    pub fn new(activity_capacity: usize, subscriber_buffer: usize) -> Self {
        Self {
            beads: Mutex::new(HashMap::new()),
            activity_capacity: activity_capacity.max(1),
            subscriber_buffer: subscriber_buffer.max(1),
            next_sub_id: AtomicU64::new(1),
        }
    }

    fn slot(&self, bead_id: &str) -> Result<Arc<Mutex<BeadSlot>>, ContextError> {
        self.beads
            .lock()
            .expect("context store lock poisoned")
            .get(bead_id)
            .cloned()
            .ok_or_else(|| ContextError::NotFound(bead_id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Return the context for `bead_id`, creating it (version 0, no agents,
    /// empty activity) on first sight. Idempotent.
    pub fn get_or_create(&self, bead_id: &str, project_id: &ProjectId) -> SharedBeadContext {
        let slot = {
            let mut beads = self.beads.lock().expect("context store lock poisoned");
            beads
                .entry(bead_id.to_string())
                .or_insert_with(|| {
                    debug!(bead_id, project_id = %project_id, "creating shared context");
                    Arc::new(Mutex::new(BeadSlot {
                        ctx: SharedBeadContext::new(bead_id, project_id.clone()),
                        subscribers: Vec::new(),
                    }))
                })
                .clone()
        };
        let guard = slot.lock().expect("bead context lock poisoned");
        guard.ctx.clone()
    }

    /// Deep-copy snapshot of an existing context.
    pub fn get(&self, bead_id: &str) -> Result<SharedBeadContext, ContextError> {
        let slot = self.slot(bead_id)?;
        let guard = slot.lock().expect("bead context lock poisoned");
        Ok(guard.ctx.clone())
    }

    /// Alias of [`get`](Self::get) kept for API symmetry: snapshots handed to
    /// HTTP responses are deep copies, never references into the store.
    pub fn export(&self, bead_id: &str) -> Result<SharedBeadContext, ContextError> {
        self.get(bead_id)
    }

    /// Tear down one bead's context, closing all its subscriber channels.
    /// Returns `false` when the bead was not present.
    pub fn close(&self, bead_id: &str) -> bool {
        let removed = self
            .beads
            .lock()
            .expect("context store lock poisoned")
            .remove(bead_id);
        match removed {
            Some(slot) => {
                // Dropping the slot drops every sender, which closes the
                // subscriber channels.
                let n = slot.lock().expect("bead context lock poisoned").subscribers.len();
                if n > 0 {
                    debug!(bead_id, subscribers = n, "closing shared context");
                }
                true
            }
            None => false,
        }
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.beads.lock().expect("context store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add `agent_id` to the collaborator set. Idempotent: joining twice does
    /// not bump the version a second time. Returns the current version.
    pub fn join_bead(&self, bead_id: &str, agent_id: &str) -> Result<u64, ContextError> {
        let slot = self.slot(bead_id)?;
        let mut guard = slot.lock().expect("bead context lock poisoned");
        if !guard.ctx.collaborating_agents.insert(agent_id.to_string()) {
            return Ok(guard.ctx.data_version);
        }
        let version = bump(&mut guard.ctx);
        let event = ContextEvent::new(bead_id, ContextEventKind::AgentJoined, agent_id, version);
        guard.publish(event);
        Ok(version)
    }

    /// Remove `agent_id` from the collaborator set. Idempotent on absence.
    pub fn leave_bead(&self, bead_id: &str, agent_id: &str) -> Result<u64, ContextError> {
        let slot = self.slot(bead_id)?;
        let mut guard = slot.lock().expect("bead context lock poisoned");
        if !guard.ctx.collaborating_agents.remove(agent_id) {
            return Ok(guard.ctx.data_version);
        }
        let version = bump(&mut guard.ctx);
        let event = ContextEvent::new(bead_id, ContextEventKind::AgentLeft, agent_id, version);
        guard.publish(event);
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Data + activity
    // -----------------------------------------------------------------------

    /// Set one shared key with optimistic concurrency.
    ///
    /// `expected_version == 0` means "don't check" — concurrent unchecked
    /// writers are first-writer-wins. Any other value must equal the current
    /// version or the call fails with [`ContextError::Conflict`].
    ///
    /// A writer that is not yet a collaborator is joined implicitly, which
    /// bumps the version once before the data bump.
    pub fn update_data(
        &self,
        bead_id: &str,
        agent_id: &str,
        key: &str,
        value: Value,
        expected_version: u64,
    ) -> Result<u64, ContextError> {
        let slot = self.slot(bead_id)?;
        let mut guard = slot.lock().expect("bead context lock poisoned");

        let actual = guard.ctx.data_version;
        if expected_version != 0 && expected_version != actual {
            warn!(
                bead_id,
                agent_id, expected = expected_version, actual, "version conflict"
            );
            return Err(ContextError::Conflict {
                bead_id: bead_id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        if guard.ctx.collaborating_agents.insert(agent_id.to_string()) {
            let version = bump(&mut guard.ctx);
            let event =
                ContextEvent::new(bead_id, ContextEventKind::AgentJoined, agent_id, version);
            guard.publish(event);
        }

        guard
            .ctx
            .shared_data
            .insert(key.to_string(), value.clone());
        let version = bump(&mut guard.ctx);
        let mut event = ContextEvent::new(bead_id, ContextEventKind::DataUpdated, agent_id, version);
        event.key = Some(key.to_string());
        event.value = Some(value);
        guard.publish(event);
        Ok(version)
    }

    /// Append one activity entry. Always succeeds when the bead exists; the
    /// ring drops its oldest entry past capacity.
    pub fn add_activity(
        &self,
        bead_id: &str,
        agent_id: &str,
        activity_type: &str,
        description: &str,
        data: Option<Value>,
    ) -> Result<u64, ContextError> {
        let slot = self.slot(bead_id)?;
        let mut guard = slot.lock().expect("bead context lock poisoned");

        let entry = ActivityEntry {
            agent_id: agent_id.to_string(),
            timestamp: Utc::now(),
            activity_type: activity_type.to_string(),
            description: description.to_string(),
            data,
        };
        guard.ctx.activity.push_back(entry.clone());
        while guard.ctx.activity.len() > self.activity_capacity {
            guard.ctx.activity.pop_front();
        }

        let version = bump(&mut guard.ctx);
        let mut event = ContextEvent::new(bead_id, ContextEventKind::Activity, agent_id, version);
        event.activity = Some(entry);
        guard.publish(event);
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Open a bounded live event feed on an existing bead.
    pub fn subscribe(&self, bead_id: &str) -> Result<Subscription, ContextError> {
        let slot = self.slot(bead_id)?;
        let (tx, rx) = flume::bounded(self.subscriber_buffer);
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        slot.lock()
            .expect("bead context lock poisoned")
            .subscribers
            .push(SubscriberSlot { id, tx });
        Ok(Subscription { id, receiver: rx })
    }

    /// Close one subscription's sending side. Returns `true` when the
    /// subscription was present; a second call for the same id is a no-op.
    pub fn unsubscribe(&self, bead_id: &str, sub_id: u64) -> bool {
        let Ok(slot) = self.slot(bead_id) else {
            return false;
        };
        let mut guard = slot.lock().expect("bead context lock poisoned");
        let before = guard.subscribers.len();
        guard.subscribers.retain(|s| s.id != sub_id);
        guard.subscribers.len() != before
    }
}

fn bump(ctx: &mut SharedBeadContext) -> u64 {
    ctx.data_version += 1;
    ctx.updated_at = Utc::now();
    ctx.data_version
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SharedContextStore {
        SharedContextStore::default()
    }

    fn pid() -> ProjectId {
        ProjectId::new("proj-1")
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let s = store();
        let a = s.get_or_create("b1", &pid());
        let b = s.get_or_create("b1", &pid());
        assert_eq!(a.created_at, b.created_at);
        assert_eq!(s.len(), 1);
        assert_eq!(a.data_version, 0);
    }

    #[test]
    fn get_missing_bead_fails() {
        let s = store();
        assert_eq!(
            s.get("ghost").unwrap_err(),
            ContextError::NotFound("ghost".into())
        );
    }

    #[test]
    fn join_bumps_version_once() {
        let s = store();
        s.get_or_create("b1", &pid());
        assert_eq!(s.join_bead("b1", "a1").unwrap(), 1);
        // Second join is idempotent.
        assert_eq!(s.join_bead("b1", "a1").unwrap(), 1);
        let ctx = s.get("b1").unwrap();
        assert_eq!(ctx.collaborating_agents.len(), 1);
    }

    #[test]
    fn leave_is_idempotent() {
        let s = store();
        s.get_or_create("b1", &pid());
        s.join_bead("b1", "a1").unwrap();
        assert_eq!(s.leave_bead("b1", "a1").unwrap(), 2);
        assert_eq!(s.leave_bead("b1", "a1").unwrap(), 2);
    }

    #[test]
    fn update_data_with_implicit_join_reaches_version_two() {
        let s = store();
        s.get_or_create("b1", &pid());
        let v = s
            .update_data("b1", "a1", "k", json!("v1"), 0)
            .unwrap();
        assert!(v >= 2, "join + update should bump at least twice, got {v}");

        let err = s
            .update_data("b1", "a1", "k", json!("v2"), 1)
            .unwrap_err();
        match err {
            ContextError::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert!(actual >= 2);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn expected_version_zero_skips_the_check() {
        let s = store();
        s.get_or_create("b1", &pid());
        s.update_data("b1", "a1", "k", json!(1), 0).unwrap();
        s.update_data("b1", "a1", "k", json!(2), 0).unwrap();
        let ctx = s.get("b1").unwrap();
        assert_eq!(ctx.shared_data["k"], json!(2));
    }

    #[test]
    fn matching_expected_version_succeeds() {
        let s = store();
        s.get_or_create("b1", &pid());
        let v1 = s.update_data("b1", "a1", "k", json!(1), 0).unwrap();
        let v2 = s.update_data("b1", "a1", "k", json!(2), v1).unwrap();
        assert_eq!(v2, v1 + 1);
    }

    #[test]
    fn activity_ring_drops_oldest() {
        let s = SharedContextStore::new(3, 64);
        s.get_or_create("b1", &pid());
        for i in 0..5 {
            s.add_activity("b1", "a1", "note", &format!("entry {i}"), None)
                .unwrap();
        }
        let ctx = s.get("b1").unwrap();
        assert_eq!(ctx.activity.len(), 3);
        assert_eq!(ctx.activity[0].description, "entry 2");
        assert_eq!(ctx.activity[2].description, "entry 4");
    }

    #[test]
    fn subscriber_sees_ordered_increasing_versions() {
        let s = store();
        s.get_or_create("b1", &pid());
        let sub_a = s.subscribe("b1").unwrap();
        let sub_b = s.subscribe("b1").unwrap();

        s.join_bead("b1", "a1").unwrap();
        s.update_data("b1", "a1", "k", json!("v"), 0).unwrap();

        for sub in [&sub_a, &sub_b] {
            let events: Vec<ContextEvent> = sub.receiver.drain().collect();
            assert!(events.len() >= 2, "expected at least two events");
            let versions: Vec<u64> = events.iter().map(|e| e.version).collect();
            let mut sorted = versions.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(versions, sorted, "versions must be strictly increasing");
        }
    }

    #[test]
    fn data_event_carries_key_and_value() {
        let s = store();
        s.get_or_create("b1", &pid());
        s.join_bead("b1", "a1").unwrap();
        let sub = s.subscribe("b1").unwrap();
        s.update_data("b1", "a1", "phase", json!("review"), 0)
            .unwrap();
        let event = sub.receiver.recv().unwrap();
        assert_eq!(event.kind, ContextEventKind::DataUpdated);
        assert_eq!(event.key.as_deref(), Some("phase"));
        assert_eq!(event.value, Some(json!("review")));
    }

    #[test]
    fn slow_subscriber_drops_events_without_blocking() {
        let s = SharedContextStore::new(256, 2);
        s.get_or_create("b1", &pid());
        s.join_bead("b1", "a1").unwrap();
        let sub = s.subscribe("b1").unwrap();

        for i in 0..10 {
            s.add_activity("b1", "a1", "note", &format!("n{i}"), None)
                .unwrap();
        }

        // Buffer held only two events; writers never blocked.
        let events: Vec<ContextEvent> = sub.receiver.drain().collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].version < events[1].version);
        // The store still has the full state.
        assert_eq!(s.get("b1").unwrap().activity.len(), 10);
    }

    #[test]
    fn unsubscribe_closes_channel_exactly_once() {
        let s = store();
        s.get_or_create("b1", &pid());
        let sub = s.subscribe("b1").unwrap();
        assert!(s.unsubscribe("b1", sub.id));
        assert!(!s.unsubscribe("b1", sub.id));
        // Sender dropped: the receiver reports disconnection once drained.
        assert!(sub.receiver.recv().is_err());
    }

    #[test]
    fn close_tears_down_subscriber_channels() {
        let s = store();
        s.get_or_create("b1", &pid());
        let sub = s.subscribe("b1").unwrap();
        assert!(s.close("b1"));
        assert!(!s.close("b1"));
        assert!(sub.receiver.recv().is_err());
        assert!(s.get("b1").is_err());
    }

    #[test]
    fn export_is_a_deep_copy() {
        let s = store();
        s.get_or_create("b1", &pid());
        s.update_data("b1", "a1", "k", json!(1), 0).unwrap();
        let snapshot = s.export("b1").unwrap();
        s.update_data("b1", "a1", "k", json!(2), 0).unwrap();
        assert_eq!(snapshot.shared_data["k"], json!(1));
    }

    #[test]
    fn concurrent_unchecked_writers_are_first_writer_wins() {
        let s = Arc::new(store());
        s.get_or_create("b1", &pid());
        let mut handles = Vec::new();
        for i in 0..8 {
            let s = Arc::clone(&s);
            handles.push(std::thread::spawn(move || {
                s.update_data("b1", &format!("a{i}"), "winner", json!(i), 0)
                    .unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let ctx = s.get("b1").unwrap();
        // Eight agents joined (8 bumps) + eight updates (8 bumps).
        assert_eq!(ctx.data_version, 16);
        assert_eq!(ctx.collaborating_agents.len(), 8);
        assert!(ctx.shared_data.contains_key("winner"));
    }
}
