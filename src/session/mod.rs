//! Exam sessions and the single-active-session rule.
//!
//! A [`Session`] ties a student to the device they are sitting the exam on.
//! [`SessionRegistry`] guarantees that at most one session per student is
//! active; starting elsewhere takes the old one over.

pub mod heartbeat;
pub mod registry;

pub use registry::SessionRegistry;

use crate::{credential::same_student, store::StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Seconds between heartbeats sent by a held session.
pub const DEFAULT_HEARTBEAT_SECONDS: u64 = 60;
/// A session with no heartbeat for this long is reported as stale.
pub const DEFAULT_STALE_AFTER_SECONDS: i64 = 180;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Ulid,
    pub student_id: String,
    #[serde(default)]
    pub exam_id: String,
    pub device_id: String,
    #[serde(default)]
    pub computer_name: String,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken_over_by: Option<String>,
}

impl Session {
    #[must_use]
    pub fn belongs_to(&self, student_id: &str) -> bool {
        same_student(&self.student_id, student_id)
    }

    /// Active but silent for longer than `stale_after`. Diagnostic only;
    /// nothing is deactivated because of it.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.is_active && now - self.last_heartbeat_at > stale_after
    }

    pub(crate) fn close(&mut self, now: DateTime<Utc>, reason: EndReason) {
        self.is_active = false;
        self.ended_at = Some(now);
        self.end_reason = Some(reason);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The student handed in.
    Submitted,
    /// Ended without a submission.
    Abandoned,
    /// Replaced by a session on another device.
    TakenOver,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Submitted => "submitted",
            Self::Abandoned => "abandoned",
            Self::TakenOver => "taken over",
        })
    }
}

/// Parameters for [`SessionRegistry::start`].
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub student_id: String,
    pub exam_id: String,
    pub device_id: String,
    pub computer_name: String,
}

impl StartRequest {
    #[must_use]
    pub fn new(
        student_id: impl Into<String>,
        exam_id: impl Into<String>,
        device_id: impl Into<String>,
        computer_name: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            exam_id: exam_id.into(),
            device_id: device_id.into(),
            computer_name: computer_name.into(),
        }
    }
}

/// Result of [`SessionRegistry::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    /// The active session for the requesting device.
    pub session: Session,
    /// `true` when an existing session on the same device was picked up.
    pub resumed: bool,
    /// Sessions deactivated by this start, as they were saved.
    pub taken_over: Vec<Session>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {0} not found")]
    NotFound(Ulid),
    #[error("Session {session_id} has ended ({reason})")]
    Ended { session_id: Ulid, reason: EndReason },
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::timestamp;

    fn sample() -> Session {
        let started_at = timestamp::parse("2025-03-01T10:00:00Z").unwrap();
        Session {
            session_id: Ulid::new(),
            student_id: "S1".to_string(),
            exam_id: "EXAM001".to_string(),
            device_id: "deviceA".to_string(),
            computer_name: "PC-1".to_string(),
            started_at,
            last_heartbeat_at: started_at,
            is_active: true,
            ended_at: None,
            end_reason: None,
            taken_over_by: None,
        }
    }

    #[test]
    fn staleness_is_measured_from_last_heartbeat() {
        let session = sample();
        let stale_after = Duration::seconds(DEFAULT_STALE_AFTER_SECONDS);
        let at_limit = session.last_heartbeat_at + stale_after;
        assert!(!session.is_stale(at_limit, stale_after));
        assert!(session.is_stale(at_limit + Duration::seconds(1), stale_after));
    }

    #[test]
    fn ended_sessions_are_never_stale() {
        let mut session = sample();
        let now = session.started_at + Duration::hours(5);
        session.close(now, EndReason::Abandoned);
        assert!(!session.is_stale(now, Duration::seconds(1)));
        assert_eq!(session.ended_at, Some(now));
    }

    #[test]
    fn end_reason_wire_names() {
        let mut session = sample();
        session.close(session.started_at, EndReason::TakenOver);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["end_reason"], "taken_over");
        assert_eq!(json["session_id"], session.session_id.to_string());
        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn end_reason_display() {
        assert_eq!(EndReason::TakenOver.to_string(), "taken over");
        let err = SessionError::Ended {
            session_id: Ulid::nil(),
            reason: EndReason::Submitted,
        };
        assert!(err.to_string().ends_with("(submitted)"));
    }
}
