//! Event view over decoded frames
//!
//! Event fields arrive in the frame body for `text/event-plain` frames and
//! in the header block for command replies; accessors look in the body
//! first, then the headers, with the switch's usual fallback names.

use chrono::{DateTime, TimeZone, Utc};

use crate::esl::codec::EslFrame;

/// Event kinds the engine subscribes to
pub const LIFECYCLE_EVENTS: &[&str] = &[
    "CHANNEL_CREATE",
    "CHANNEL_ANSWER",
    "CHANNEL_HANGUP",
    "CHANNEL_HANGUP_COMPLETE",
];

/// A decoded frame interpreted as a switch event
#[derive(Debug, Clone, Default)]
pub struct EslEvent {
    frame: EslFrame,
}

impl EslEvent {
    pub fn new(frame: EslFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &EslFrame {
        &self.frame
    }

    /// Field lookup: body first, then the outer header block
    pub fn get(&self, name: &str) -> Option<&str> {
        self.frame.body_field(name).or_else(|| self.frame.header(name))
    }

    pub fn event_name(&self) -> Option<&str> {
        self.get("Event-Name")
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.get("Unique-ID")
            .or_else(|| self.get("Channel-Call-UUID"))
    }

    pub fn caller_number(&self) -> Option<&str> {
        self.get("Caller-Caller-ID-Number")
            .or_else(|| self.get("variable_sip_from_user"))
    }

    pub fn destination_number(&self) -> Option<&str> {
        self.get("Caller-Destination-Number")
            .or_else(|| self.get("variable_sip_to_user"))
    }

    pub fn direction(&self) -> Option<&str> {
        self.get("Call-Direction")
            .or_else(|| self.get("Caller-Direction"))
            .or_else(|| self.get("variable_direction"))
    }

    pub fn duration(&self) -> Option<i32> {
        self.get("variable_duration").and_then(|s| s.parse().ok())
    }

    pub fn billsec(&self) -> Option<i32> {
        self.get("variable_billsec").and_then(|s| s.parse().ok())
    }

    pub fn hangup_cause(&self) -> Option<&str> {
        self.get("Hangup-Cause")
            .or_else(|| self.get("variable_hangup_cause"))
    }

    /// Channel creation time (switch emits epoch microseconds)
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.epoch_micros("Caller-Channel-Created-Time")
    }

    pub fn answer_time(&self) -> Option<DateTime<Utc>> {
        self.epoch_micros("Caller-Channel-Answered-Time")
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.epoch_micros("Caller-Channel-Hangup-Time")
    }

    fn epoch_micros(&self, name: &str) -> Option<DateTime<Utc>> {
        let micros: i64 = self.get(name)?.parse().ok()?;
        if micros <= 0 {
            return None;
        }
        Utc.timestamp_micros(micros).single()
    }

    // Reply / handshake helpers

    pub fn content_type(&self) -> Option<&str> {
        self.frame.header("Content-Type")
    }

    pub fn reply_text(&self) -> Option<&str> {
        self.frame.header("Reply-Text")
    }

    pub fn is_auth_request(&self) -> bool {
        self.content_type() == Some("auth/request")
    }

    pub fn is_event(&self) -> bool {
        self.content_type() == Some("text/event-plain") || self.event_name().is_some()
    }

    pub fn is_ok(&self) -> bool {
        self.reply_text().map_or(false, |t| t.starts_with("+OK"))
    }

    pub fn is_error(&self) -> bool {
        self.reply_text().map_or(false, |t| t.starts_with("-ERR"))
    }
}
