//! Header-match binding arguments.
//!
//! A binding against a headers exchange forwards a message only when every
//! argument (other than `x-match` itself) is present in the message headers
//! with an equal value. Each argument set also carries exactly one owner key
//! naming the broker or trigger that requested the binding. Message headers
//! never carry these keys, so the owner tag is inert for routing and only
//! shows up in broker introspection.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::RequestError;

/// Owner key for trigger subscriptions and broker-level dead-letter bindings.
pub const BINDING_KEY: &str = "x-knative-trigger";

/// Owner key for trigger-level dead-letter bindings.
pub const TRIGGER_DLQ_BINDING_KEY: &str = "x-knative-trigger-dlq";

/// Headers-exchange match mode argument.
pub const X_MATCH_KEY: &str = "x-match";

/// Every header argument must match.
pub const X_MATCH_ALL: &str = "all";

const RESERVED_KEYS: [&str; 3] = [X_MATCH_KEY, BINDING_KEY, TRIGGER_DLQ_BINDING_KEY];

/// Which owner key tags a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    /// [`BINDING_KEY`]
    Binding,
    /// [`TRIGGER_DLQ_BINDING_KEY`]
    TriggerDeadLetter,
}

impl OwnerKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binding => BINDING_KEY,
            Self::TriggerDeadLetter => TRIGGER_DLQ_BINDING_KEY,
        }
    }

    /// Looks up the owner key for a literal argument name.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            BINDING_KEY => Some(Self::Binding),
            TRIGGER_DLQ_BINDING_KEY => Some(Self::TriggerDeadLetter),
            _ => None,
        }
    }
}

/// Returns `true` for argument names the builder owns.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Ordered header-match arguments of one binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderArguments {
    entries: BTreeMap<String, String>,
}

impl HeaderArguments {
    /// Builds `x-match: all`, the owner tag and one literal entry per filter
    /// attribute.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::ReservedFilterKey` if a filter attribute would
    /// overwrite `x-match` or an owner key.
    pub fn build<'a, I>(owner: OwnerKey, owner_name: &str, filter: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut entries = BTreeMap::new();
        for (key, value) in filter {
            if is_reserved_key(key) {
                return Err(RequestError::ReservedFilterKey { key: key.clone() });
            }
            entries.insert(key.clone(), value.clone());
        }
        entries.insert(X_MATCH_KEY.to_string(), X_MATCH_ALL.to_string());
        entries.insert(owner.as_str().to_string(), owner_name.to_string());
        Ok(Self { entries })
    }

    /// Arguments with no filter attributes, as used by dead-letter bindings.
    #[must_use]
    pub fn owner_only(owner: OwnerKey, owner_name: &str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(X_MATCH_KEY.to_string(), X_MATCH_ALL.to_string());
        entries.insert(owner.as_str().to_string(), owner_name.to_string());
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The owner key and its value.
    #[must_use]
    pub fn owner(&self) -> Option<(OwnerKey, &str)> {
        self.entries
            .iter()
            .find_map(|(k, v)| OwnerKey::from_key(k).map(|owner| (owner, v.as_str())))
    }

    /// Filter attributes only, without `x-match` and the owner tag.
    pub fn filter_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !is_reserved_key(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
