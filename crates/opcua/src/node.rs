//! Node addressing and typed values.
//!
//! A [`NodeAddress`] is the static, textual identity of a node
//! (`ns=1;i=1000`, `ns=2;s=Line1.Counter`). A [`NodeHandle`] is what a live
//! session hands out after checking the node exists; it remembers which
//! session produced it and is refused by any other.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(String),
}

/// Namespace-qualified node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeAddress {
    pub fn numeric(namespace: u16, id: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(id),
        }
    }

    pub fn string(namespace: u16, id: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(id.into()),
        }
    }
}

impl FromStr for NodeAddress {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SessionError::InvalidAddress(s.to_string());
        let text = s.trim();

        let (namespace, rest) = match text.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail.split_once(';').ok_or_else(invalid)?;
                (ns.parse::<u16>().map_err(|_| invalid())?, rest)
            }
            None => (0, text),
        };

        if let Some(id) = rest.strip_prefix("i=") {
            let id = id.parse::<u32>().map_err(|_| invalid())?;
            Ok(Self::numeric(namespace, id))
        } else if let Some(id) = rest.strip_prefix("s=") {
            if id.is_empty() {
                return Err(invalid());
            }
            Ok(Self::string(namespace, id))
        } else {
            Err(invalid())
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(id) => write!(f, "ns={};i={}", self.namespace, id),
            Identifier::String(id) => write!(f, "ns={};s={}", self.namespace, id),
        }
    }
}

impl Serialize for NodeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A node resolved within one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    address: NodeAddress,
    session_id: u64,
}

impl NodeHandle {
    pub fn new(address: NodeAddress, session_id: u64) -> Self {
        Self {
            address,
            session_id,
        }
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Fails with `StaleHandle` unless the handle came from `session_id`.
    pub fn check_session(&self, session_id: u64) -> Result<(), SessionError> {
        if self.session_id == session_id {
            Ok(())
        } else {
            Err(SessionError::StaleHandle {
                address: self.address.to_string(),
                handle_session: self.session_id,
                active_session: session_id,
            })
        }
    }
}

/// Values the gateway exchanges with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeValue {
    Boolean(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
}

impl NodeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeValue::Boolean(_) => "Boolean",
            NodeValue::Int16(_) => "Int16",
            NodeValue::Int32(_) => "Int32",
            NodeValue::Int64(_) => "Int64",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NodeValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer variant that fits in `i32`.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NodeValue::Int16(v) => Some(i32::from(*v)),
            NodeValue::Int32(v) => Some(*v),
            NodeValue::Int64(v) => i32::try_from(*v).ok(),
            NodeValue::Boolean(_) => None,
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Boolean(v) => write!(f, "{v}"),
            NodeValue::Int16(v) => write!(f, "{v}"),
            NodeValue::Int32(v) => write!(f, "{v}"),
            NodeValue::Int64(v) => write!(f, "{v}"),
        }
    }
}
