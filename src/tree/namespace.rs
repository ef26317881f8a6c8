// src/tree/namespace.rs

use std::fmt;

use crate::error::{Error, Result};
use crate::tree::Name;

/// Column holding a class's super-class source name.
pub const SUPERCLASS_NAMESPACE: &str = "superclass";

/// Column holding a class's interface source names, joined by `,`.
pub const INTERFACES_NAMESPACE: &str = "interfaces";

/// Separator used inside the [`INTERFACES_NAMESPACE`] column.
pub const INTERFACE_SEPARATOR: char = ',';

/// Returns true for the columns that hold type structure rather than names.
pub fn is_structural(namespace: &str) -> bool {
    namespace == SUPERCLASS_NAMESPACE || namespace == INTERFACES_NAMESPACE
}

/// Positional index of a destination namespace within one tree.
///
/// IDs are only meaningful for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub(crate) usize);

impl NamespaceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only registry of a tree's namespaces.
#[derive(Debug, Clone)]
pub struct Namespaces {
    source: Name,
    dst: Vec<Name>,
}

impl Namespaces {
    pub fn new(source: impl Into<Name>) -> Self {
        Self { source: source.into(), dst: Vec::new() }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dst(&self) -> &[Name] {
        &self.dst
    }

    pub fn len(&self) -> usize {
        self.dst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dst.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<NamespaceId> {
        self.dst.iter().position(|ns| &**ns == name).map(NamespaceId)
    }

    pub fn id(&self, name: &str) -> Result<NamespaceId> {
        self.find(name).ok_or_else(|| Error::NamespaceNotFound(name.to_string()))
    }

    pub fn name(&self, id: NamespaceId) -> Option<&str> {
        self.dst.get(id.0).map(|ns| &**ns)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NamespaceId, &str)> + '_ {
        self.dst.iter().enumerate().map(|(i, ns)| (NamespaceId(i), &**ns))
    }

    /// Destination namespaces that hold names rather than structure.
    pub fn naming(&self) -> impl Iterator<Item = (NamespaceId, &str)> + '_ {
        self.iter().filter(|(_, ns)| !is_structural(ns))
    }

    pub(crate) fn push(&mut self, name: Name) -> Result<NamespaceId> {
        if name == self.source {
            return Err(Error::InvalidNamespace(name.to_string()));
        }
        if self.find(&name).is_some() {
            return Err(Error::DuplicateNamespace(name.to_string()));
        }
        self.dst.push(name);
        Ok(NamespaceId(self.dst.len() - 1))
    }
}
