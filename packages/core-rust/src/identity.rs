//! Broker and trigger identities as seen by the caller at declaration time.

use std::collections::BTreeMap;

use crate::error::RequestError;

/// Identifies a broker or trigger object.
///
/// `uid` is unique for the object's lifetime; `namespace` and `name` may be
/// reused after the object is deleted and recreated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl Identity {
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    /// Returns the first empty field, in `namespace`, `name`, `uid` order.
    #[must_use]
    pub fn first_empty_field(&self) -> Option<&'static str> {
        if self.namespace.is_empty() {
            Some("namespace")
        } else if self.name.is_empty() {
            Some("name")
        } else if self.uid.is_empty() {
            Some("uid")
        } else {
            None
        }
    }

    /// All three fields are populated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.first_empty_field().is_none()
    }

    /// All three fields are empty.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.namespace.is_empty() && self.name.is_empty() && self.uid.is_empty()
    }

    /// Rejects identities with any empty field.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::IncompleteIdentity` naming `role` and the first
    /// empty field.
    pub fn validate(&self, role: &'static str) -> Result<(), RequestError> {
        match self.first_empty_field() {
            None => Ok(()),
            Some(field) => Err(RequestError::IncompleteIdentity { role, field }),
        }
    }
}

/// A broker: accepts published events and fans them out to its triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Broker {
    pub identity: Identity,
}

impl Broker {
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }
}

/// A trigger: subscribes to the subset of a broker's events matching `filter`.
///
/// `filter` is `None` when the trigger carries no attributes map at all, which
/// is distinct from `Some` empty map ("match everything").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trigger {
    pub identity: Identity,
    /// Name of the owning broker.
    pub broker: String,
    pub filter: Option<BTreeMap<String, String>>,
}

impl Trigger {
    #[must_use]
    pub fn new(identity: Identity, broker: impl Into<String>) -> Self {
        Self {
            identity,
            broker: broker.into(),
            filter: Some(BTreeMap::new()),
        }
    }

    /// Replaces the filter with the given attributes.
    #[must_use]
    pub fn with_filter<I, K, V>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.filter = Some(
            attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }
}
