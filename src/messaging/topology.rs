use crate::domain::customer::EventKind;

// ============================================================================
// Broker topology
// ============================================================================
//
// One logical exchange, three routing keys, one durable queue per key and a
// dead-letter queue per primary queue. On Kafka every queue is a topic of
// the same name; the routing key travels as a header.
//
// ============================================================================

pub const EXCHANGE: &str = "CustomerExchange";

pub const ROUTING_KEY_HEADER: &str = "x-routing-key";
pub const EVENT_TYPE_HEADER: &str = "x-event-type";
pub const MESSAGE_ID_HEADER: &str = "x-message-id";

pub const ORIGINAL_QUEUE_HEADER: &str = "x-original-queue";
pub const ERROR_HEADER: &str = "x-error";
pub const ATTEMPTS_HEADER: &str = "x-attempts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub kind: EventKind,
    pub queue: &'static str,
    pub dead_letter_queue: &'static str,
}

pub static ROUTES: [Route; 3] = [
    Route {
        kind: EventKind::Created,
        queue: "CustomerCreateQueue",
        dead_letter_queue: "CustomerCreateQueue.DLQ",
    },
    Route {
        kind: EventKind::Updated,
        queue: "CustomerUpdateQueue",
        dead_letter_queue: "CustomerUpdateQueue.DLQ",
    },
    Route {
        kind: EventKind::Deleted,
        queue: "CustomerDeleteQueue",
        dead_letter_queue: "CustomerDeleteQueue.DLQ",
    },
];

impl Route {
    pub fn routing_key(&self) -> &'static str {
        self.kind.routing_key()
    }

    pub fn for_kind(kind: EventKind) -> &'static Route {
        match kind {
            EventKind::Created => &ROUTES[0],
            EventKind::Updated => &ROUTES[1],
            EventKind::Deleted => &ROUTES[2],
        }
    }

    /// Binding lookup, as the exchange would do it.
    pub fn for_routing_key(routing_key: &str) -> Option<&'static Route> {
        EventKind::from_routing_key(routing_key).map(Self::for_kind)
    }
}
