//! Active call registry
//!
//! One record per in-flight call id, with per-key exclusive access through
//! the sharded map. Create events are upserts: a duplicate CHANNEL_CREATE
//! merges into the existing record instead of duplicating it, and removal is
//! idempotent. Reconnects do not clear the registry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::models::{ActiveCall, CallState, CallUpdate};

#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: DashMap<String, ActiveCall>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
        }
    }

    /// Insert or merge a call record; returns a snapshot of the result.
    pub fn upsert(&self, call_id: &str, update: CallUpdate) -> ActiveCall {
        let entry = self
            .calls
            .entry(call_id.to_string())
            .and_modify(|call| update.apply_to(call))
            .or_insert_with(|| update.clone().into_call(call_id.to_string()));
        entry.value().clone()
    }

    /// Mark a call answered. A missing record is tolerated: the call may
    /// have been created before this process attached to the switch.
    pub fn mark_answered(&self, call_id: &str, at: DateTime<Utc>) -> Option<ActiveCall> {
        match self.calls.get_mut(call_id) {
            Some(mut call) => {
                call.state = CallState::Answered;
                call.answer_time = Some(at);
                Some(call.value().clone())
            }
            None => {
                debug!("Answer for unknown call {}, ignoring", call_id);
                None
            }
        }
    }

    /// Remove a call from the active set. Absence is not an error.
    pub fn remove(&self, call_id: &str) -> Option<ActiveCall> {
        self.calls.remove(call_id).map(|(_, call)| call)
    }

    pub fn get(&self, call_id: &str) -> Option<ActiveCall> {
        self.calls.get(call_id).map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Snapshot of every in-flight call
    pub fn snapshots(&self) -> Vec<ActiveCall> {
        self.calls.iter().map(|c| c.value().clone()).collect()
    }
}
