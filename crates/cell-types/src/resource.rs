use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Opaque namespaced identity for a fungible resource.
///
/// A `ResourceKey` is a `namespace:path` pair, e.g. `metal:iron_ingot`. The
/// engine never interprets the components; it only compares keys for equality
/// and round-trips them through the persisted record. Keys with no explicit
/// namespace parse into the `"core"` namespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    namespace: String,
    path: String,
}

impl ResourceKey {
    /// Default namespace applied when parsing a bare path.
    pub const DEFAULT_NAMESPACE: &'static str = "core";

    /// Build a key from explicit components.
    pub fn from_parts(
        namespace: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let namespace = namespace.into();
        let path = path.into();
        if namespace.is_empty() {
            return Err(TypeError::EmptyComponent("namespace"));
        }
        if path.is_empty() {
            return Err(TypeError::EmptyComponent("path"));
        }
        Ok(Self { namespace, path })
    }

    /// Parse a `namespace:path` string; a bare path gets the default namespace.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s.split_once(':') {
            Some((ns, path)) => Self::from_parts(ns, path),
            None => Self::from_parts(Self::DEFAULT_NAMESPACE, s),
        }
        .map_err(|_| TypeError::InvalidResourceKey(s.to_string()))
    }

    /// The namespace component.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The path component.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({}:{})", self.namespace, self.path)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for ResourceKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
