// src/tree/visitor.rs

use crate::error::Result;
use crate::tree::{ElementRef, Name};
use crate::version::Version;

/// One unit of mapping data pushed from a contributor towards a tree.
///
/// Records are self-contained: each one names the element it applies to, so
/// adapters can rewrite, drop or duplicate them without tracking a cursor.
/// Namespaces are referred to by name; the receiving tree resolves them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Declares that an element exists.
    Element(ElementRef),
    DstName { element: ElementRef, namespace: Name, name: Name },
    DstDesc { element: ElementRef, namespace: Name, desc: Name },
    /// Metadata on an element, or on the tree itself when `element` is `None`.
    Metadata { element: Option<ElementRef>, key: Name, value: Name },
}

impl Record {
    pub fn dst_name(element: ElementRef, namespace: &str, name: &str) -> Self {
        Self::DstName { element, namespace: namespace.into(), name: name.into() }
    }

    pub fn metadata(element: ElementRef, key: &str, value: &str) -> Self {
        Self::Metadata { element: Some(element), key: key.into(), value: value.into() }
    }

    pub fn element(&self) -> Option<&ElementRef> {
        match self {
            Self::Element(element)
            | Self::DstName { element, .. }
            | Self::DstDesc { element, .. } => Some(element),
            Self::Metadata { element, .. } => element.as_ref(),
        }
    }

    pub fn namespace_mut(&mut self) -> Option<&mut Name> {
        match self {
            Self::DstName { namespace, .. } | Self::DstDesc { namespace, .. } => Some(namespace),
            _ => None,
        }
    }

    /// Visits every string the record carries, element path included.
    pub fn for_each_name_mut(&mut self, mut f: impl FnMut(&mut Name)) {
        let element = match self {
            Self::Element(element) => Some(element),
            Self::DstName { element, namespace, name } => {
                f(namespace);
                f(name);
                Some(element)
            }
            Self::DstDesc { element, namespace, desc } => {
                f(namespace);
                f(desc);
                Some(element)
            }
            Self::Metadata { element, key, value } => {
                f(key);
                f(value);
                element.as_mut()
            }
        };
        match element {
            Some(ElementRef::Class(name)) => f(name),
            Some(
                ElementRef::Field { owner, key }
                | ElementRef::Method { owner, key }
                | ElementRef::Param { owner, key, .. },
            ) => {
                f(owner);
                f(&mut key.name);
                f(&mut key.desc);
            }
            None => {}
        }
    }
}

/// Receives records; implemented by [`MappingTree`](crate::tree::MappingTree)
/// and by every adapter wrapper.
pub trait MappingVisitor {
    fn visit(&mut self, record: Record) -> Result<()>;
}

impl<V: MappingVisitor + ?Sized> MappingVisitor for &mut V {
    fn visit(&mut self, record: Record) -> Result<()> {
        (**self).visit(record)
    }
}

/// A source of mapping records for one version.
///
/// How the data is obtained (network, disk cache, fixture) is the
/// contributor's business.
pub trait MappingContributor: Send + Sync {
    fn name(&self) -> &str;

    /// Tree namespaces this contributor writes into.
    fn namespaces(&self) -> Vec<Name>;

    fn contribute(&self, version: &Version, visitor: &mut dyn MappingVisitor) -> Result<()>;
}

/// Contributor replaying a fixed record list for every version.
#[derive(Debug, Clone)]
pub struct StaticContributor {
    name: String,
    namespaces: Vec<Name>,
    records: Vec<Record>,
}

impl StaticContributor {
    pub fn new<I, S>(name: impl Into<String>, namespaces: I, records: Vec<Record>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        Self {
            name: name.into(),
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            records,
        }
    }
}

impl MappingContributor for StaticContributor {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespaces(&self) -> Vec<Name> {
        self.namespaces.clone()
    }

    fn contribute(&self, _version: &Version, visitor: &mut dyn MappingVisitor) -> Result<()> {
        for record in &self.records {
            visitor.visit(record.clone())?;
        }
        Ok(())
    }
}
