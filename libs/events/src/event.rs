//! The audited event record and its cancel transition.

use chrono::{DateTime, Utc};
use evauth_id::EventId;
use serde::{Deserialize, Serialize};

use crate::{EventError, Target};

/// A cancel request recorded on an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInfo {
    /// Human-readable reason supplied by the requester.
    pub reason: String,
    /// Identity of the actor that asked for the cancel.
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
}

/// One audited action against a target.
///
/// Events are created by the component performing the action and updated as
/// it progresses. The authorization layer reads them and may only request a
/// cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub target: Target,
    /// Permission scheme name that triggered the action (e.g. `app.deploy`).
    pub kind: String,
    /// Identity of the actor that started the action.
    pub owner: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub running: bool,
    pub cancelable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_info: Option<CancelInfo>,
    #[serde(default)]
    pub custom_data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Event {
    /// Starts a new running, non-cancelable event.
    pub fn start(target: Target, kind: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            target,
            kind: kind.into(),
            owner: owner.into(),
            start_time: Utc::now(),
            end_time: None,
            running: true,
            cancelable: false,
            cancel_info: None,
            custom_data: serde_json::Value::Null,
            error: None,
        }
    }

    /// Marks the action as one that may be interrupted while running.
    #[must_use]
    pub fn cancelable(mut self) -> Self {
        self.cancelable = true;
        self
    }

    #[must_use]
    pub fn with_custom_data(mut self, data: serde_json::Value) -> Self {
        self.custom_data = data;
        self
    }

    /// Records the end of the action.
    pub fn finish(&mut self, at: DateTime<Utc>, error: Option<String>) {
        self.running = false;
        self.end_time = Some(at);
        self.error = error;
    }

    /// True while a cancel request would still be accepted.
    pub fn accepts_cancel(&self) -> bool {
        self.cancelable && self.running && self.cancel_info.is_none()
    }

    /// Requests cancellation of the running action.
    ///
    /// Fails with [`EventError::NotCancelable`] when the event finished, was
    /// never cancelable, or already carries a cancel request.
    pub fn try_cancel(
        &mut self,
        reason: &str,
        requested_by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), EventError> {
        if !self.accepts_cancel() {
            return Err(EventError::NotCancelable);
        }
        self.cancel_info = Some(CancelInfo {
            reason: reason.to_string(),
            requested_by: requested_by.to_string(),
            requested_at: at,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TargetKind;

    fn running_deploy() -> Event {
        Event::start(Target::new(TargetKind::App, "web"), "app.deploy", "alice").cancelable()
    }

    #[test]
    fn cancel_records_reason_and_requester() {
        let mut event = running_deploy();
        let now = Utc::now();
        event.try_cancel("stuck build", "bob", now).unwrap();

        let info = event.cancel_info.as_ref().unwrap();
        assert_eq!(info.reason, "stuck build");
        assert_eq!(info.requested_by, "bob");
        assert_eq!(info.requested_at, now);
    }

    #[test]
    fn second_cancel_is_rejected() {
        let mut event = running_deploy();
        event.try_cancel("first", "bob", Utc::now()).unwrap();
        assert_eq!(
            event.try_cancel("second", "bob", Utc::now()),
            Err(EventError::NotCancelable)
        );
        assert_eq!(event.cancel_info.unwrap().reason, "first");
    }

    #[test]
    fn finished_event_is_not_cancelable() {
        let mut event = running_deploy();
        event.finish(Utc::now(), None);
        assert_eq!(
            event.try_cancel("late", "bob", Utc::now()),
            Err(EventError::NotCancelable)
        );
    }

    #[test]
    fn non_cancelable_event_is_rejected() {
        let mut event = Event::start(Target::new(TargetKind::Pool, "p1"), "pool.create", "root");
        assert!(!event.accepts_cancel());
        assert!(event.try_cancel("why", "root", Utc::now()).is_err());
    }

    #[test]
    fn serialized_event_omits_unset_optionals() {
        let event = running_deploy();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["target"]["type"], "app");
        assert!(json.get("end_time").is_none());
        assert!(json.get("cancel_info").is_none());
    }
}
