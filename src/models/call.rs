//! Active call model
//!
//! One record per call id while the call is in flight, owned by the call
//! registry. Create events upsert through [`CallUpdate`] so duplicate
//! CHANNEL_CREATEs merge instead of duplicating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call direction as reported by the switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
    Internal,
    Transit,
    #[default]
    Unknown,
}

impl CallDirection {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "inbound" => CallDirection::Inbound,
            "outbound" => CallDirection::Outbound,
            "internal" => CallDirection::Internal,
            "transit" => CallDirection::Transit,
            _ => CallDirection::Unknown,
        }
    }

    /// Only outbound legs are authorized and billed
    pub fn is_billable(&self) -> bool {
        matches!(self, CallDirection::Outbound)
    }
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallDirection::Inbound => "inbound",
            CallDirection::Outbound => "outbound",
            CallDirection::Internal => "internal",
            CallDirection::Transit => "transit",
            CallDirection::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state of an in-flight call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    /// Created, not yet answered
    #[default]
    Ringing,
    /// Answered, billable time accumulating
    Answered,
}

/// In-flight call record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveCall {
    /// Switch-assigned call id (globally unique per leg)
    pub call_id: String,

    /// Calling number (ANI)
    pub calling_number: String,

    /// Called number
    pub called_number: String,

    /// Call direction
    pub direction: CallDirection,

    /// Lifecycle state
    pub state: CallState,

    /// When the channel was created
    pub start_time: DateTime<Utc>,

    /// When the call was answered, if it was
    pub answer_time: Option<DateTime<Utc>>,

    /// Connection reference (which switch this leg came from)
    pub connection_id: String,
}

impl ActiveCall {
    /// Seconds elapsed since the channel was created
    pub fn current_duration(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().max(0)
    }
}

/// Typed merge for call upserts
///
/// Present fields overwrite the stored record, absent fields keep existing
/// values. Replaces the source's iterate-and-setattr pattern.
#[derive(Debug, Clone, Default)]
pub struct CallUpdate {
    pub calling_number: Option<String>,
    pub called_number: Option<String>,
    pub direction: Option<CallDirection>,
    pub start_time: Option<DateTime<Utc>>,
    pub connection_id: Option<String>,
}

impl CallUpdate {
    /// Apply this update to an existing record
    pub fn apply_to(&self, call: &mut ActiveCall) {
        if let Some(ref v) = self.calling_number {
            call.calling_number = v.clone();
        }
        if let Some(ref v) = self.called_number {
            call.called_number = v.clone();
        }
        if let Some(v) = self.direction {
            call.direction = v;
        }
        if let Some(v) = self.start_time {
            call.start_time = v;
        }
        if let Some(ref v) = self.connection_id {
            call.connection_id = v.clone();
        }
    }

    /// Materialize a fresh record in state `Ringing`
    pub fn into_call(self, call_id: String) -> ActiveCall {
        ActiveCall {
            call_id,
            calling_number: self.calling_number.unwrap_or_default(),
            called_number: self.called_number.unwrap_or_default(),
            direction: self.direction.unwrap_or_default(),
            state: CallState::Ringing,
            start_time: self.start_time.unwrap_or_else(Utc::now),
            answer_time: None,
            connection_id: self.connection_id.unwrap_or_default(),
        }
    }
}
