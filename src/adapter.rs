// src/adapter.rs

//! Record adapters applied while contributors populate a tree.
//!
//! An [`AdapterChain`] is an ordered list of adapters. Wrapping a visitor with
//! it feeds each record through the adapters in insertion order before the
//! surviving records reach the visitor.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::tree::{ElementRef, MappingVisitor, Name, Record};

/// One stage of the record pipeline. Pushing nothing to `out` drops the
/// record; pushing several duplicates it.
pub trait RecordAdapter: Send {
    fn adapt(&mut self, record: Record, out: &mut Vec<Record>) -> Result<()>;
}

impl<F> RecordAdapter for F
where
    F: FnMut(Record, &mut Vec<Record>) -> Result<()> + Send,
{
    fn adapt(&mut self, record: Record, out: &mut Vec<Record>) -> Result<()> {
        self(record, out)
    }
}

#[derive(Default)]
pub struct AdapterChain {
    adapters: Vec<Box<dyn RecordAdapter>>,
}

impl AdapterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: impl RecordAdapter + 'static) -> Self {
        self.push(adapter);
        self
    }

    pub fn push(&mut self, adapter: impl RecordAdapter + 'static) {
        self.adapters.push(Box::new(adapter));
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Wraps `sink` so that every visited record passes through the chain.
    pub fn wrap<'a, V: MappingVisitor + ?Sized>(&'a mut self, sink: &'a mut V) -> ChainedVisitor<'a, V> {
        ChainedVisitor { chain: self, sink, current: Vec::new(), next: Vec::new() }
    }
}

pub struct ChainedVisitor<'a, V: ?Sized> {
    chain: &'a mut AdapterChain,
    sink: &'a mut V,
    current: Vec<Record>,
    next: Vec<Record>,
}

impl<V: MappingVisitor + ?Sized> MappingVisitor for ChainedVisitor<'_, V> {
    fn visit(&mut self, record: Record) -> Result<()> {
        self.current.clear();
        self.current.push(record);
        for adapter in &mut self.chain.adapters {
            self.next.clear();
            for record in self.current.drain(..) {
                adapter.adapt(record, &mut self.next)?;
            }
            std::mem::swap(&mut self.current, &mut self.next);
            if self.current.is_empty() {
                return Ok(());
            }
        }
        for record in self.current.drain(..) {
            self.sink.visit(record)?;
        }
        Ok(())
    }
}

/// Replaces every string with a shared copy so identical names across
/// contributors and versions occupy memory once.
#[derive(Debug, Default, Clone)]
pub struct NameInterner {
    pool: HashSet<Name>,
}

impl NameInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn intern(&mut self, name: &Name) -> Name {
        match self.pool.get(name) {
            Some(shared) => shared.clone(),
            None => {
                self.pool.insert(name.clone());
                name.clone()
            }
        }
    }
}

impl RecordAdapter for NameInterner {
    fn adapt(&mut self, mut record: Record, out: &mut Vec<Record>) -> Result<()> {
        record.for_each_name_mut(|name| *name = self.intern(name));
        out.push(record);
        Ok(())
    }
}

/// Maps a contributor's namespace names onto the tree's. Unlisted names pass
/// through unchanged.
#[derive(Debug, Default, Clone)]
pub struct NamespaceRenamer {
    renames: HashMap<Name, Name>,
}

impl NamespaceRenamer {
    pub fn new<I, A, B>(renames: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<Name>,
        B: Into<Name>,
    {
        Self { renames: renames.into_iter().map(|(a, b)| (a.into(), b.into())).collect() }
    }
}

impl RecordAdapter for NamespaceRenamer {
    fn adapt(&mut self, mut record: Record, out: &mut Vec<Record>) -> Result<()> {
        if let Some(namespace) = record.namespace_mut() {
            if let Some(renamed) = self.renames.get(&*namespace) {
                *namespace = renamed.clone();
            }
        }
        out.push(record);
        Ok(())
    }
}

/// Prepends a fixed prefix to every namespace name, e.g. to keep two
/// revisions of the same vendor's names in separate columns.
#[derive(Debug, Clone)]
pub struct NamespacePrefixer {
    prefix: String,
}

impl NamespacePrefixer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl RecordAdapter for NamespacePrefixer {
    fn adapt(&mut self, mut record: Record, out: &mut Vec<Record>) -> Result<()> {
        if let Some(namespace) = record.namespace_mut() {
            *namespace = format!("{}{}", self.prefix, namespace).into();
        }
        out.push(record);
        Ok(())
    }
}

/// Drops every record addressed to an element the predicate rejects.
pub struct ElementFilter<F> {
    keep: F,
}

impl<F> ElementFilter<F>
where
    F: FnMut(&ElementRef) -> bool + Send,
{
    pub fn new(keep: F) -> Self {
        Self { keep }
    }
}

impl<F> RecordAdapter for ElementFilter<F>
where
    F: FnMut(&ElementRef) -> bool + Send,
{
    fn adapt(&mut self, record: Record, out: &mut Vec<Record>) -> Result<()> {
        if record.element().map_or(true, |element| (self.keep)(element)) {
            out.push(record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MappingTree;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn chain_applies_adapters_in_order() {
        let mut tree = MappingTree::new("official", ["v1_mojang"]).unwrap();
        let mut chain = AdapterChain::new()
            .with(NamespaceRenamer::new([("named", "mojang")]))
            .with(NamespacePrefixer::new("v1_"));

        chain
            .wrap(&mut tree)
            .visit(Record::dst_name(ElementRef::class("a"), "named", "Foo"))
            .unwrap();

        let ns = tree.namespace_id("v1_mojang").unwrap();
        assert_eq!(tree.name_of(&ElementRef::class("a"), ns), Some("Foo"));
    }

    #[test]
    fn adapters_can_drop_and_duplicate() {
        let mut tree = MappingTree::new("official", ["mojang", "copy"]).unwrap();
        let mut chain = AdapterChain::new()
            .with(ElementFilter::new(|element: &ElementRef| &**element.owner() != "dropped"))
            .with(|record: Record, out: &mut Vec<Record>| -> Result<()> {
                let mut copy = record.clone();
                if let Some(ns) = copy.namespace_mut() {
                    *ns = "copy".into();
                }
                out.push(record);
                out.push(copy);
                Ok(())
            });

        {
            let mut visitor = chain.wrap(&mut tree);
            visitor.visit(Record::dst_name(ElementRef::class("a"), "mojang", "Foo")).unwrap();
            visitor.visit(Record::dst_name(ElementRef::class("dropped"), "mojang", "Bar")).unwrap();
        }

        let copy = tree.namespace_id("copy").unwrap();
        assert_eq!(tree.name_of(&ElementRef::class("a"), copy), Some("Foo"));
        assert!(!tree.contains(&ElementRef::class("dropped")));
    }

    #[test]
    fn interner_shares_identical_names() {
        let mut interner = NameInterner::new();
        let mut out = Vec::new();
        interner.adapt(Record::dst_name(ElementRef::class("a"), "mojang", "Foo"), &mut out).unwrap();
        interner.adapt(Record::dst_name(ElementRef::class("b"), "mojang", "Foo"), &mut out).unwrap();

        let names: Vec<Name> = out
            .iter()
            .filter_map(|r| match r {
                Record::DstName { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert!(Arc::ptr_eq(&names[0], &names[1]));
        assert_eq!(interner.len(), 4);
    }

    #[test]
    fn unknown_namespace_surfaces_through_the_chain() {
        let mut tree = MappingTree::new("official", ["mojang"]).unwrap();
        let mut chain = AdapterChain::new().with(NamespacePrefixer::new("x_"));
        let result = chain
            .wrap(&mut tree)
            .visit(Record::dst_name(ElementRef::class("a"), "mojang", "Foo"));
        assert!(matches!(result, Err(crate::error::Error::NamespaceNotFound(ns)) if ns == "x_mojang"));
    }
}
