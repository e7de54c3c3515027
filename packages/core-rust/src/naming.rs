//! Deterministic resource names derived from broker and trigger identities.
//!
//! Layout: `<kind>.<namespace>.<name>[.dlx].<uid>`. The UID is always the last
//! segment so every resource owned by an object shares the prefix returned by
//! [`broker_resource_prefix`] / [`trigger_resource_prefix`]. Callers must pass
//! complete identities; see [`Identity::validate`].

use crate::identity::Identity;

/// Leading segment of every broker-owned resource.
pub const BROKER_PREFIX: &str = "b";

/// Leading segment of every trigger-owned resource.
pub const TRIGGER_PREFIX: &str = "t";

/// Segment marking a dead-letter exchange.
pub const DEAD_LETTER_SEGMENT: &str = "dlx";

const SEPARATOR: char = '.';

fn join(kind: &str, identity: &Identity, dead_letter: bool) -> String {
    let mut name = resource_prefix(kind, identity);
    if dead_letter {
        name.push_str(DEAD_LETTER_SEGMENT);
        name.push(SEPARATOR);
    }
    name.push_str(&identity.uid);
    name
}

fn resource_prefix(kind: &str, identity: &Identity) -> String {
    let mut prefix = String::with_capacity(
        kind.len() + identity.namespace.len() + identity.name.len() + identity.uid.len() + 8,
    );
    prefix.push_str(kind);
    prefix.push(SEPARATOR);
    prefix.push_str(&identity.namespace);
    prefix.push(SEPARATOR);
    prefix.push_str(&identity.name);
    prefix.push(SEPARATOR);
    prefix
}

/// Primary exchange of a broker: `b.<ns>.<name>.<uid>`.
#[must_use]
pub fn broker_exchange_name(broker: &Identity) -> String {
    join(BROKER_PREFIX, broker, false)
}

/// Dead-letter exchange of a broker: `b.<ns>.<name>.dlx.<uid>`.
#[must_use]
pub fn broker_dead_letter_exchange_name(broker: &Identity) -> String {
    join(BROKER_PREFIX, broker, true)
}

/// Subscription queue of a trigger: `t.<ns>.<name>.<uid>`.
#[must_use]
pub fn trigger_queue_name(trigger: &Identity) -> String {
    join(TRIGGER_PREFIX, trigger, false)
}

/// Dead-letter exchange of a trigger: `t.<ns>.<name>.dlx.<uid>`.
#[must_use]
pub fn trigger_dead_letter_exchange_name(trigger: &Identity) -> String {
    join(TRIGGER_PREFIX, trigger, true)
}

/// `b.<ns>.<name>.`, shared by every resource of the broker.
///
/// Also matches brokers whose name merely extends this one with further
/// dot-separated segments; filter on the UID when that matters.
#[must_use]
pub fn broker_resource_prefix(broker: &Identity) -> String {
    resource_prefix(BROKER_PREFIX, broker)
}

/// `t.<ns>.<name>.`, shared by every resource of the trigger.
#[must_use]
pub fn trigger_resource_prefix(trigger: &Identity) -> String {
    resource_prefix(TRIGGER_PREFIX, trigger)
}
