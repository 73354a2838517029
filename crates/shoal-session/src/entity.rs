//! The session record stored in and exchanged through the cache.
//!
//! Attributes live in exactly one of two forms: a map of live values, or
//! the serialized payload received from a networked cache. Converting
//! between them is idempotent in both directions.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Session attributes, either live or passivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", content = "data", rename_all = "snake_case")]
pub enum Attributes {
    Live(BTreeMap<String, Value>),
    Serialized(Vec<u8>),
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes::Live(BTreeMap::new())
    }
}

/// A clustered session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntity {
    pub id: String,
    pub context_path: String,
    pub virtual_host: String,

    /// Creation time, epoch ms.
    pub created: i64,
    /// Time of the current access, epoch ms.
    pub accessed: i64,
    /// Time of the previous access, epoch ms.
    pub last_accessed: i64,
    /// Idle budget; `<= 0` means the session never times out.
    pub max_inactive_ms: i64,
    /// Absolute deadline in epoch ms, `0` for never.
    pub expiry: i64,
    /// When the cookie was last set, `0` if never.
    pub cookie_set: i64,
    /// When the record was last written to the cache, `0` if never.
    pub last_saved: i64,

    /// Worker that last wrote this record. Advisory owner for expiry.
    pub last_node: Option<String>,

    attributes: Attributes,
}

impl SessionEntity {
    /// Create a fresh entity with live, empty attributes.
    pub fn new(
        id: impl Into<String>,
        context_path: impl Into<String>,
        virtual_host: impl Into<String>,
        created: i64,
        accessed: i64,
        last_accessed: i64,
        max_inactive_ms: i64,
    ) -> Self {
        let mut entity = Self {
            id: id.into(),
            context_path: context_path.into(),
            virtual_host: virtual_host.into(),
            created,
            accessed,
            last_accessed,
            max_inactive_ms,
            expiry: 0,
            cookie_set: 0,
            last_saved: 0,
            last_node: None,
            attributes: Attributes::default(),
        };
        entity.expiry = entity.calc_expiry(created);
        entity
    }

    /// Expiry deadline if the session were accessed at `time`.
    pub fn calc_expiry(&self, time: i64) -> i64 {
        if self.max_inactive_ms <= 0 {
            0
        } else {
            time + self.max_inactive_ms
        }
    }

    /// Record an access at `now` and push the expiry forward.
    pub fn touch(&mut self, now: i64) {
        self.last_accessed = self.accessed;
        self.accessed = now;
        self.expiry = self.calc_expiry(now);
    }

    /// Never expires.
    pub fn is_immortal(&self) -> bool {
        self.expiry <= 0
    }

    /// Expired at `time`. Immortal sessions never are.
    pub fn is_expired_at(&self, time: i64) -> bool {
        self.expiry > 0 && self.expiry <= time
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn is_passivated(&self) -> bool {
        matches!(self.attributes, Attributes::Serialized(_))
    }

    /// Read an attribute. Fails if the attributes are still serialized.
    pub fn attribute(&self, name: &str) -> Result<Option<&Value>> {
        Ok(self.live()?.get(name))
    }

    /// Read an attribute and convert it into `T`.
    pub fn attribute_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.attribute(name)? {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Set an attribute, deserializing a passivated payload first.
    /// Returns the previous value.
    pub fn set_attribute<T: Serialize>(&mut self, name: &str, value: T) -> Result<Option<Value>> {
        let value = serde_json::to_value(value)?;
        self.deserialize_attributes()?;
        Ok(self.live_mut()?.insert(name.to_string(), value))
    }

    pub fn remove_attribute(&mut self, name: &str) -> Result<Option<Value>> {
        self.deserialize_attributes()?;
        Ok(self.live_mut()?.remove(name))
    }

    pub fn attribute_names(&self) -> Result<Vec<&str>> {
        Ok(self.live()?.keys().map(String::as_str).collect())
    }

    /// Turn a serialized payload into live values. No-op when already live.
    pub fn deserialize_attributes(&mut self) -> Result<()> {
        if let Attributes::Serialized(bytes) = &self.attributes {
            let live: BTreeMap<String, Value> = serde_json::from_slice(bytes)?;
            self.attributes = Attributes::Live(live);
        }
        Ok(())
    }

    /// Turn live values into a serialized payload. No-op when already serialized.
    pub fn serialize_attributes(&mut self) -> Result<()> {
        if let Attributes::Live(live) = &self.attributes {
            let bytes = serde_json::to_vec(live)?;
            self.attributes = Attributes::Serialized(bytes);
        }
        Ok(())
    }

    /// Encode for transport to a networked cache. Attributes are passivated.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut passivated = self.clone();
        passivated.serialize_attributes()?;
        Ok(serde_json::to_vec(&passivated)?)
    }

    /// Decode a record received from a networked cache. Attributes stay
    /// serialized until [`deserialize_attributes`](Self::deserialize_attributes).
    pub fn from_wire(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn live(&self) -> Result<&BTreeMap<String, Value>> {
        match &self.attributes {
            Attributes::Live(live) => Ok(live),
            Attributes::Serialized(_) => Err(Error::Passivated(self.id.clone())),
        }
    }

    fn live_mut(&mut self) -> Result<&mut BTreeMap<String, Value>> {
        match &mut self.attributes {
            Attributes::Live(live) => Ok(live),
            Attributes::Serialized(_) => Err(Error::Passivated(self.id.clone())),
        }
    }
}
