use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ============================================================================
// Customer Lifecycle Events
// ============================================================================
//
// Wire payloads (JSON, camelCase) for the three customer transitions the
// identity provider has to follow. Each kind travels on its own routing key.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Created, EventKind::Updated, EventKind::Deleted];

    pub fn routing_key(&self) -> &'static str {
        match self {
            EventKind::Created => "customer.created",
            EventKind::Updated => "customer.updated",
            EventKind::Deleted => "customer.deleted",
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::Created => "CustomerCreatedEvent",
            EventKind::Updated => "CustomerUpdatedEvent",
            EventKind::Deleted => "CustomerDeletedEvent",
        }
    }

    pub fn from_routing_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.routing_key() == key)
    }
}

/// Implemented by each wire payload so consumers can decode typed messages.
pub trait LifecycleMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EventKind;

    fn customer_id(&self) -> i64;
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerCreatedEvent {
    pub customer_id: i64,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

// Keeps the credential out of logs.
impl std::fmt::Debug for CustomerCreatedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerCreatedEvent")
            .field("customer_id", &self.customer_id)
            .field("name", &self.name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdatedEvent {
    pub customer_id: i64,
    pub name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDeletedEvent {
    pub customer_id: i64,
    /// Identity reference captured before the row was removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl LifecycleMessage for CustomerCreatedEvent {
    const KIND: EventKind = EventKind::Created;

    fn customer_id(&self) -> i64 {
        self.customer_id
    }
}

impl LifecycleMessage for CustomerUpdatedEvent {
    const KIND: EventKind = EventKind::Updated;

    fn customer_id(&self) -> i64 {
        self.customer_id
    }
}

impl LifecycleMessage for CustomerDeletedEvent {
    const KIND: EventKind = EventKind::Deleted;

    fn customer_id(&self) -> i64 {
        self.customer_id
    }
}

/// Union of the three payloads, as staged by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Created(CustomerCreatedEvent),
    Updated(CustomerUpdatedEvent),
    Deleted(CustomerDeletedEvent),
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::Created(_) => EventKind::Created,
            LifecycleEvent::Updated(_) => EventKind::Updated,
            LifecycleEvent::Deleted(_) => EventKind::Deleted,
        }
    }

    pub fn customer_id(&self) -> i64 {
        match self {
            LifecycleEvent::Created(e) => e.customer_id,
            LifecycleEvent::Updated(e) => e.customer_id,
            LifecycleEvent::Deleted(e) => e.customer_id,
        }
    }

    /// The bare wire payload, without any enum tagging.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        match self {
            LifecycleEvent::Created(e) => serde_json::to_string(e),
            LifecycleEvent::Updated(e) => serde_json::to_string(e),
            LifecycleEvent::Deleted(e) => serde_json::to_string(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_wire_shape() {
        let event = LifecycleEvent::Created(CustomerCreatedEvent {
            customer_id: 42,
            name: "Ana".to_string(),
            last_name: "Lima".to_string(),
            email: "ana@x.com".to_string(),
            password: "p1".to_string(),
        });

        let json: serde_json::Value = serde_json::from_str(&event.to_payload().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "customerId": 42,
                "name": "Ana",
                "lastName": "Lima",
                "email": "ana@x.com",
                "password": "p1"
            })
        );
        assert_eq!(event.kind().routing_key(), "customer.created");
    }

    #[test]
    fn test_deleted_without_reference_is_bare() {
        let event = LifecycleEvent::Deleted(CustomerDeletedEvent {
            customer_id: 9,
            external_id: None,
        });

        assert_eq!(event.to_payload().unwrap(), r#"{"customerId":9}"#);
    }

    #[test]
    fn test_deleted_decodes_legacy_payload() {
        let event: CustomerDeletedEvent = serde_json::from_str(r#"{"customerId":3}"#).unwrap();
        assert_eq!(event.customer_id, 3);
        assert!(event.external_id.is_none());
    }

    #[test]
    fn test_routing_key_lookup() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_routing_key(kind.routing_key()), Some(kind));
        }
        assert_eq!(EventKind::from_routing_key("customer.unknown"), None);
    }

    #[test]
    fn test_debug_masks_password() {
        let event = CustomerCreatedEvent {
            customer_id: 1,
            name: "Ana".to_string(),
            last_name: "Lima".to_string(),
            email: "ana@x.com".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{:?}", event).contains("secret"));
    }
}
