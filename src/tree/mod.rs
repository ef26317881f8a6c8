// src/tree/mod.rs

//! The in-memory mapping tree shared by every stage of the pipeline.
//!
//! A tree holds one version's classes, fields, methods and parameters, each
//! with one optional name per destination namespace. Elements are keyed by
//! their source (obfuscated) identity and kept in insertion order so that
//! everything downstream iterates deterministically.

mod element;
mod namespace;
mod visitor;

pub use element::{
    Access, ClassMapping, Element, ElementKind, ElementRef, FieldMapping, MemberKey, Metadata,
    MethodMapping, Names, ParamMapping, ACCESS_KEY, LICENSE_KEY, LICENSE_URL_KEY,
};
pub use namespace::{
    is_structural, NamespaceId, Namespaces, INTERFACES_NAMESPACE, INTERFACE_SEPARATOR,
    SUPERCLASS_NAMESPACE,
};
pub use visitor::{MappingContributor, MappingVisitor, Record, StaticContributor};

use indexmap::IndexMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Shared, immutable string used for every name and descriptor.
pub type Name = Arc<str>;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of one tree instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree-{}", self.0)
    }
}

/// Column IDs of the structural namespaces in one tree.
#[derive(Debug, Clone, Copy)]
pub struct Structure {
    pub superclass: NamespaceId,
    pub interfaces: NamespaceId,
}

#[derive(Debug)]
pub struct MappingTree {
    id: TreeId,
    namespaces: Namespaces,
    extensible: bool,
    classes: IndexMap<Name, ClassMapping>,
    metadata: Metadata,
}

impl MappingTree {
    /// Creates a tree that accepts new namespaces at runtime.
    pub fn new<I, S>(source: impl Into<Name>, dst: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        let mut namespaces = Namespaces::new(source);
        for ns in dst {
            namespaces.push(ns.into())?;
        }
        Ok(Self {
            id: TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)),
            namespaces,
            extensible: true,
            classes: IndexMap::new(),
            metadata: Metadata::default(),
        })
    }

    /// Creates a tree whose namespace list is fixed at construction.
    pub fn fixed<I, S>(source: impl Into<Name>, dst: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        let mut tree = Self::new(source, dst)?;
        tree.extensible = false;
        Ok(tree)
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn namespace_id(&self, name: &str) -> Result<NamespaceId> {
        self.namespaces.id(name)
    }

    pub fn find_namespace(&self, name: &str) -> Option<NamespaceId> {
        self.namespaces.find(name)
    }

    pub fn add_namespace(&mut self, name: impl Into<Name>) -> Result<NamespaceId> {
        let name = name.into();
        if !self.extensible {
            return Err(Error::NamespaceAdditionUnsupported(name.to_string()));
        }
        self.namespaces.push(name)
    }

    /// Returns the namespace, appending it if the tree allows that.
    pub fn ensure_namespace(&mut self, name: &str) -> Result<NamespaceId> {
        match self.namespaces.find(name) {
            Some(id) => Ok(id),
            None => self.add_namespace(name),
        }
    }

    pub fn structure(&self) -> Result<Structure> {
        let superclass = self
            .find_namespace(SUPERCLASS_NAMESPACE)
            .ok_or(Error::MissingStructuralNamespace(SUPERCLASS_NAMESPACE))?;
        let interfaces = self
            .find_namespace(INTERFACES_NAMESPACE)
            .ok_or(Error::MissingStructuralNamespace(INTERFACES_NAMESPACE))?;
        Ok(Structure { superclass, interfaces })
    }

    pub fn classes(&self) -> impl ExactSizeIterator<Item = &ClassMapping> + '_ {
        self.classes.values()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn class(&self, name: &str) -> Option<&ClassMapping> {
        self.classes.get(name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut ClassMapping> {
        self.classes.get_mut(name)
    }

    pub fn class_or_insert(&mut self, name: impl Into<Name>) -> &mut ClassMapping {
        let name = name.into();
        self.classes.entry(name.clone()).or_insert_with(|| ClassMapping::new(name))
    }

    pub fn field(&self, owner: &str, name: &str, desc: &str) -> Option<&FieldMapping> {
        self.class(owner)?.field(name, desc)
    }

    pub fn method(&self, owner: &str, name: &str, desc: &str) -> Option<&MethodMapping> {
        self.class(owner)?.method(name, desc)
    }

    /// Direct supertypes of a class as recorded in the structural columns,
    /// super-class first.
    pub fn supertypes<'a>(
        &'a self,
        class: &'a ClassMapping,
        structure: Structure,
    ) -> impl Iterator<Item = &'a str> + 'a {
        let superclass = class.names.get(structure.superclass);
        let interfaces = class
            .names
            .get(structure.interfaces)
            .into_iter()
            .flat_map(|list| list.split(INTERFACE_SEPARATOR))
            .map(str::trim)
            .filter(|name| !name.is_empty());
        superclass.into_iter().chain(interfaces)
    }

    pub fn contains(&self, element: &ElementRef) -> bool {
        self.names_of(element).is_some()
    }

    pub fn names_of(&self, element: &ElementRef) -> Option<&Names> {
        match element {
            ElementRef::Class(name) => self.class(name).map(|c| &c.names),
            ElementRef::Field { owner, key } => {
                self.class(owner)?.fields.get(key).map(|f| &f.names)
            }
            ElementRef::Method { owner, key } => {
                self.class(owner)?.methods.get(key).map(|m| &m.names)
            }
            ElementRef::Param { owner, key, lv_index } => self
                .class(owner)?
                .methods
                .get(key)?
                .params
                .get(lv_index)
                .map(|p| &p.names),
        }
    }

    pub fn metadata_of(&self, element: &ElementRef) -> Option<&Metadata> {
        match element {
            ElementRef::Class(name) => self.class(name).map(|c| &c.metadata),
            ElementRef::Field { owner, key } => {
                self.class(owner)?.fields.get(key).map(|f| &f.metadata)
            }
            ElementRef::Method { owner, key } => {
                self.class(owner)?.methods.get(key).map(|m| &m.metadata)
            }
            ElementRef::Param { owner, key, lv_index } => self
                .class(owner)?
                .methods
                .get(key)?
                .params
                .get(lv_index)
                .map(|p| &p.metadata),
        }
    }

    fn element_mut(&mut self, element: &ElementRef) -> Option<&mut dyn Element> {
        match element {
            ElementRef::Class(name) => self.classes.get_mut(name).map(|c| c as &mut dyn Element),
            ElementRef::Field { owner, key } => self
                .classes
                .get_mut(owner)?
                .fields
                .get_mut(key)
                .map(|f| f as &mut dyn Element),
            ElementRef::Method { owner, key } => self
                .classes
                .get_mut(owner)?
                .methods
                .get_mut(key)
                .map(|m| m as &mut dyn Element),
            ElementRef::Param { owner, key, lv_index } => self
                .classes
                .get_mut(owner)?
                .methods
                .get_mut(key)?
                .params
                .get_mut(lv_index)
                .map(|p| p as &mut dyn Element),
        }
    }

    /// Creates the element (and its owners) if it does not exist yet.
    fn element_or_insert(&mut self, element: &ElementRef) -> &mut dyn Element {
        match element {
            ElementRef::Class(name) => self.class_or_insert(name.clone()),
            ElementRef::Field { owner, key } => {
                self.class_or_insert(owner.clone()).field_or_insert(key.clone())
            }
            ElementRef::Method { owner, key } => {
                self.class_or_insert(owner.clone()).method_or_insert(key.clone())
            }
            ElementRef::Param { owner, key, lv_index } => self
                .class_or_insert(owner.clone())
                .method_or_insert(key.clone())
                .param_or_insert(*lv_index),
        }
    }

    /// Creates the element, and its owners, if missing.
    pub fn declare(&mut self, element: &ElementRef) {
        self.element_or_insert(element);
    }

    pub fn name_of(&self, element: &ElementRef, ns: NamespaceId) -> Option<&str> {
        self.names_of(element)?.get(ns)
    }

    pub fn access_of(&self, element: &ElementRef) -> Option<Access> {
        self.metadata_of(element)?.access()
    }

    pub fn set_name(&mut self, element: &ElementRef, ns: NamespaceId, name: impl Into<Name>) -> Result<()> {
        let target = self
            .element_mut(element)
            .ok_or_else(|| Error::ElementNotFound(element.clone()))?;
        target.names_mut().set(ns, name);
        Ok(())
    }

    pub fn set_metadata(
        &mut self,
        element: &ElementRef,
        key: impl Into<Name>,
        value: impl Into<Name>,
    ) -> Result<()> {
        let target = self
            .element_mut(element)
            .ok_or_else(|| Error::ElementNotFound(element.clone()))?;
        target.metadata_mut().insert(key, value);
        Ok(())
    }

    /// Stores an explicit destination descriptor on a field or method.
    pub fn set_desc(&mut self, element: &ElementRef, ns: NamespaceId, desc: impl Into<Name>) -> Result<()> {
        let class = self
            .classes
            .get_mut(element.owner())
            .ok_or_else(|| Error::ElementNotFound(element.clone()))?;
        let descs = match element {
            ElementRef::Field { key, .. } => class.fields.get_mut(key).map(|f| &mut f.descs),
            ElementRef::Method { key, .. } => class.methods.get_mut(key).map(|m| &mut m.descs),
            _ => None,
        };
        descs
            .ok_or_else(|| Error::ElementNotFound(element.clone()))?
            .set(ns, desc);
        Ok(())
    }

    /// Removes an element and everything it owns. Returns false if it was
    /// already gone.
    pub fn remove(&mut self, element: &ElementRef) -> bool {
        match element {
            ElementRef::Class(name) => self.classes.shift_remove(name).is_some(),
            ElementRef::Field { owner, key } => self
                .classes
                .get_mut(owner)
                .is_some_and(|c| c.fields.shift_remove(key).is_some()),
            ElementRef::Method { owner, key } => self
                .classes
                .get_mut(owner)
                .is_some_and(|c| c.methods.shift_remove(key).is_some()),
            ElementRef::Param { owner, key, lv_index } => self
                .classes
                .get_mut(owner)
                .and_then(|c| c.methods.get_mut(key))
                .is_some_and(|m| m.params.remove(lv_index).is_some()),
        }
    }

    /// Removes every element matching `predicate`, classes first so that
    /// members of dropped classes are never visited. Returns the count.
    pub fn retain_elements<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&ElementRef, &dyn Element) -> bool,
    {
        let before = self.element_count();
        self.classes.retain(|name, class| predicate(&ElementRef::Class(name.clone()), &*class));
        for (owner, class) in self.classes.iter_mut() {
            class.fields.retain(|key, field| {
                predicate(&ElementRef::Field { owner: owner.clone(), key: key.clone() }, &*field)
            });
            class.methods.retain(|key, method| {
                predicate(&ElementRef::Method { owner: owner.clone(), key: key.clone() }, &*method)
            });
        }
        before - self.element_count()
    }

    /// Classes plus their fields and methods.
    pub fn element_count(&self) -> usize {
        self.classes.values().map(|c| 1 + c.fields.len() + c.methods.len()).sum()
    }

    /// First name found in `preference` order, falling back to the source
    /// name. Unknown namespaces in `preference` are skipped.
    pub fn display_name<'a>(&'a self, element: &'a ElementRef, preference: &[&str]) -> Option<&'a str> {
        let names = self.names_of(element)?;
        let preferred = preference
            .iter()
            .filter_map(|ns| self.find_namespace(ns))
            .find_map(|ns| names.get(ns));
        Some(preferred.unwrap_or_else(|| match element {
            ElementRef::Class(name) => name,
            ElementRef::Field { key, .. } | ElementRef::Method { key, .. } => &key.name,
            ElementRef::Param { .. } => "",
        }))
    }

    /// Rewrites the class names in a JVM descriptor into namespace `ns`.
    /// Classes without a name in `ns` keep their source name.
    pub fn map_desc(&self, desc: &str, ns: NamespaceId) -> String {
        let mut out = String::with_capacity(desc.len());
        let mut rest = desc;
        while let Some(start) = rest.find('L') {
            out.push_str(&rest[..=start]);
            rest = &rest[start + 1..];
            let Some(end) = rest.find(';') else {
                break;
            };
            let class = &rest[..end];
            let mapped = self.class(class).and_then(|c| c.names.get(ns)).unwrap_or(class);
            out.push_str(mapped);
            rest = &rest[end..];
        }
        out.push_str(rest);
        out
    }

    /// Descriptor of a member in `ns`: the explicit one if present, else the
    /// source descriptor remapped through the class names.
    pub fn member_desc(&self, element: &ElementRef, ns: NamespaceId) -> Option<String> {
        let class = self.class(element.owner())?;
        let (descs, key) = match element {
            ElementRef::Field { key, .. } => (&class.fields.get(key)?.descs, key),
            ElementRef::Method { key, .. } => (&class.methods.get(key)?.descs, key),
            _ => return None,
        };
        Some(match descs.get(ns) {
            Some(desc) => desc.to_string(),
            None => self.map_desc(&key.desc, ns),
        })
    }
}

impl MappingVisitor for MappingTree {
    fn visit(&mut self, record: Record) -> Result<()> {
        match record {
            Record::Element(element) => {
                self.element_or_insert(&element);
            }
            Record::DstName { element, namespace, name } => {
                let ns = self.namespace_id(&namespace)?;
                self.element_or_insert(&element).names_mut().set(ns, name);
            }
            Record::DstDesc { element, namespace, desc } => {
                let ns = self.namespace_id(&namespace)?;
                self.element_or_insert(&element);
                self.set_desc(&element, ns, desc)?;
            }
            Record::Metadata { element: Some(element), key, value } => {
                self.element_or_insert(&element).metadata_mut().insert(key, value);
            }
            Record::Metadata { element: None, key, value } => {
                self.metadata.insert(key, value);
            }
        }
        Ok(())
    }
}
