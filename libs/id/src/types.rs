//! Identifier types used across the service.

use crate::define_id;

define_id!(
    /// Identifier of one audited event in the event store.
    EventId,
    "evt"
);

define_id!(
    /// Correlation identifier attached to every HTTP request and log line.
    RequestId,
    "req"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdError;

    #[test]
    fn event_id_display_parses_back() {
        let id = EventId::new();
        let s = id.to_string();
        assert!(s.starts_with("evt_"));
        assert_eq!(s.parse::<EventId>().unwrap(), id);
    }

    #[test]
    fn rejects_request_id_as_event_id() {
        let req = RequestId::new().to_string();
        let err = req.parse::<EventId>().unwrap_err();
        assert!(err.is_prefix_error());
    }

    #[test]
    fn rejects_malformed_inputs() {
        assert_eq!("".parse::<EventId>().unwrap_err(), IdError::Empty);
        assert_eq!(
            "evt01HV4Z2WQXKJNM8GPQY6VBKC3D".parse::<EventId>().unwrap_err(),
            IdError::MissingSeparator
        );
        assert!(matches!(
            "evt_not-a-ulid".parse::<EventId>().unwrap_err(),
            IdError::InvalidUlid(_)
        ));
        assert!(!EventId::is_valid("57a0f1b2c3d4e5f6a7b8c9d0"));
    }

    #[test]
    fn event_id_serializes_as_string() {
        let id = EventId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let first = EventId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = EventId::new();
        assert!(first < second);
    }
}
