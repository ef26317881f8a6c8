// src/ancestry/mod.rs

//! Cross-version identity of classes, fields and methods.
//!
//! An [`AncestryTree`] groups the per-version elements that represent one
//! logical element into a [`Node`]. Trees themselves stay in the caller's
//! [`VersionedTrees`](crate::version::VersionedTrees); nodes address elements
//! by version and [`ElementRef`].

mod builder;
mod index;

pub use builder::{build_class_ancestry, build_full_ancestry, build_member_ancestry, ClassLineage, FullAncestry};

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tree::{ElementKind, ElementRef};
use crate::version::Version;

/// How elements of one kind are matched between adjacent versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchStrategy {
    /// Namespaces compared by name equality, in preference order.
    pub namespaces: Vec<String>,
    /// Also require equal descriptors, compared in the matching namespace.
    pub require_descriptor: bool,
}

impl MatchStrategy {
    pub fn by_name<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { namespaces: namespaces.into_iter().map(Into::into).collect(), require_descriptor: false }
    }

    pub fn with_descriptor(mut self) -> Self {
        self.require_descriptor = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestryConfig {
    pub classes: MatchStrategy,
    pub fields: MatchStrategy,
    pub methods: MatchStrategy,
}

impl AncestryConfig {
    /// Same namespaces for every kind. Fields and methods also match on
    /// descriptor: fields can be renamed into collisions, methods overload.
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes = MatchStrategy::by_name(namespaces);
        Self {
            fields: classes.clone().with_descriptor(),
            methods: classes.clone().with_descriptor(),
            classes,
        }
    }

    pub fn strategy(&self, kind: ElementKind) -> &MatchStrategy {
        match kind {
            ElementKind::Class => &self.classes,
            ElementKind::Field => &self.fields,
            ElementKind::Method | ElementKind::Param => &self.methods,
        }
    }

    /// Every ancestry namespace must also be a display namespace.
    pub fn validate(&self, display: &[&str]) -> Result<()> {
        [&self.classes, &self.fields, &self.methods]
            .into_iter()
            .flat_map(|s| s.namespaces.iter())
            .find(|ns| !display.contains(&ns.as_str()))
            .map_or(Ok(()), |ns| Err(Error::UnknownAncestryNamespace(ns.clone())))
    }
}

/// One logical element over its lifetime: version to element, in ascending
/// version order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    entries: IndexMap<Version, ElementRef>,
}

impl Node {
    pub(crate) fn new(version: Version, element: ElementRef) -> Self {
        let mut entries = IndexMap::new();
        entries.insert(version, element);
        Self { entries }
    }

    /// Appends a newer version. Insertion order is the version order.
    pub(crate) fn push(&mut self, version: Version, element: ElementRef) {
        debug_assert!(self.last().0 < &version, "ancestry entries must be appended in version order");
        self.entries.insert(version, element);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true; a node is created with its first entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Version, &ElementRef)> + '_ {
        self.entries.iter()
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> + '_ {
        self.entries.keys()
    }

    pub fn get(&self, version: &Version) -> Option<&ElementRef> {
        self.entries.get(version)
    }

    pub fn first(&self) -> (&Version, &ElementRef) {
        self.entries.first().expect("nodes are never empty")
    }

    pub fn last(&self) -> (&Version, &ElementRef) {
        self.entries.last().expect("nodes are never empty")
    }

    pub fn introduced_in(&self) -> &Version {
        self.first().0
    }

    pub fn last_seen(&self) -> &Version {
        self.last().0
    }

    /// The last version the element appeared in, if that is older than
    /// `latest`.
    pub fn removed_after(&self, latest: &Version) -> Option<&Version> {
        let last = self.last_seen();
        (last < latest).then_some(last)
    }
}

/// Nodes of one element kind, in first-seen order.
#[derive(Debug, Clone)]
pub struct AncestryTree {
    kind: ElementKind,
    versions: Vec<Version>,
    nodes: Vec<Node>,
    lookup: HashMap<(Version, ElementRef), usize>,
}

impl AncestryTree {
    pub(crate) fn new(kind: ElementKind, versions: Vec<Version>, nodes: Vec<Node>) -> Self {
        let lookup = nodes
            .iter()
            .enumerate()
            .flat_map(|(i, node)| node.entries().map(move |(v, e)| ((v.clone(), e.clone()), i)))
            .collect();
        Self { kind, versions, nodes, lookup }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// The versions this tree was built from, ascending.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node containing `element` as it appears in `version`.
    pub fn node_of(&self, version: &Version, element: &ElementRef) -> Option<&Node> {
        self.node_index(version, element).map(|i| &self.nodes[i])
    }

    pub fn node_index(&self, version: &Version, element: &ElementRef) -> Option<usize> {
        self.lookup.get(&(version.clone(), element.clone())).copied()
    }
}
