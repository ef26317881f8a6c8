// src/inheritance.rs

//! Method-override completion.
//!
//! Mapping sources often name a method on the class that declares it but not
//! on the subclasses overriding it, or name the override differently. This
//! pass copies the nearest supertype's name onto the override. Matching is by
//! source name and full source descriptor, so covariant-return overrides stay
//! separate methods.

use std::collections::HashSet;
use tracing::debug;

use crate::error::Result;
use crate::tree::{
    is_structural, ClassMapping, Element, ElementRef, MappingTree, MemberKey, MethodMapping, Name,
    NamespaceId, Structure,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Only fill names that are absent.
    Missing,
    /// Also overwrite names that differ from the nearest supertype's.
    Incorrect,
}

/// Walks supertype chains through the structural columns of one tree.
#[derive(Clone, Copy)]
pub struct SupertypeWalker<'t> {
    tree: &'t MappingTree,
    structure: Structure,
}

impl<'t> SupertypeWalker<'t> {
    pub fn new(tree: &'t MappingTree) -> Result<Self> {
        Ok(Self { tree, structure: tree.structure()? })
    }

    /// Transitive supertypes of `class`, depth-first with the super-class
    /// before the interfaces. Each type appears once; the class itself never
    /// does.
    pub fn chain(&self, class: &'t ClassMapping) -> Vec<&'t str> {
        let mut visited = HashSet::new();
        visited.insert(class.src_name());
        let mut chain = Vec::new();
        self.collect(class, &mut visited, &mut chain);
        chain
    }

    fn collect(
        &self,
        class: &'t ClassMapping,
        visited: &mut HashSet<&'t str>,
        chain: &mut Vec<&'t str>,
    ) {
        for supertype in self.tree.supertypes(class, self.structure) {
            if !visited.insert(supertype) {
                continue;
            }
            chain.push(supertype);
            if let Some(declared) = self.tree.class(supertype) {
                self.collect(declared, visited, chain);
            }
        }
    }

    /// Supertype methods with the same source signature, nearest first.
    pub fn overridden<'c>(
        &'c self,
        chain: &'c [&'t str],
        key: &'c MemberKey,
    ) -> impl Iterator<Item = &'t MethodMapping> + 'c {
        let tree = self.tree;
        chain
            .iter()
            .filter_map(move |name| tree.class(name))
            .filter_map(move |class| class.method_by_key(key))
    }

    /// The first name found in `ns` among the overridden methods. Supertypes
    /// that declare the method without naming it are skipped.
    pub fn inherited_name(&self, chain: &[&'t str], key: &MemberKey, ns: NamespaceId) -> Option<&'t Name> {
        self.overridden(chain, key).find_map(|method| method.names().get_shared(ns))
    }
}

fn wants_update(current: Option<&str>, inherited: &str, mode: CompletionMode) -> bool {
    match (current, mode) {
        (None, _) => true,
        (Some(_), CompletionMode::Missing) => false,
        (Some(current), CompletionMode::Incorrect) => current != inherited,
    }
}

fn naming_only(tree: &MappingTree, namespaces: &[NamespaceId]) -> Vec<NamespaceId> {
    namespaces
        .iter()
        .copied()
        .filter(|&ns| tree.namespaces().name(ns).is_some_and(|name| !is_structural(name)))
        .collect()
}

/// Runs override completion for one namespace.
pub fn complete_overrides(tree: &mut MappingTree, ns: NamespaceId, mode: CompletionMode) -> Result<usize> {
    complete_overrides_batch(tree, &[ns], mode)
}

/// Runs override completion for several namespaces, walking each class's
/// supertype chain once. Structural namespaces are ignored. Returns the number
/// of names written.
pub fn complete_overrides_batch(
    tree: &mut MappingTree,
    namespaces: &[NamespaceId],
    mode: CompletionMode,
) -> Result<usize> {
    let namespaces = naming_only(tree, namespaces);
    let mut updates: Vec<(ElementRef, NamespaceId, Name)> = Vec::new();
    {
        let walker = SupertypeWalker::new(tree)?;
        for class in tree.classes() {
            if class.methods.is_empty() {
                continue;
            }
            let chain = walker.chain(class);
            if chain.is_empty() {
                continue;
            }
            for method in class.methods().filter(|m| !m.is_initializer()) {
                for &ns in &namespaces {
                    let Some(inherited) = walker.inherited_name(&chain, method.key(), ns) else {
                        continue;
                    };
                    if wants_update(method.names().get(ns), inherited, mode) {
                        let element = ElementRef::Method {
                            owner: class.src.clone(),
                            key: method.key().clone(),
                        };
                        updates.push((element, ns, inherited.clone()));
                    }
                }
            }
        }
    }

    let count = updates.len();
    for (element, ns, name) in updates {
        tree.set_name(&element, ns, name)?;
    }
    debug!(tree = %tree.id(), count, "completed overrides");
    Ok(count)
}

/// Override completion for a single method. Returns true if any name changed.
pub fn complete_method(
    tree: &mut MappingTree,
    method: &ElementRef,
    namespaces: &[NamespaceId],
    mode: CompletionMode,
) -> Result<bool> {
    let ElementRef::Method { owner, key } = method else {
        return Ok(false);
    };
    if key.name.starts_with('<') {
        return Ok(false);
    }
    let namespaces = naming_only(tree, namespaces);
    let mut updates = Vec::new();
    {
        let walker = SupertypeWalker::new(tree)?;
        let Some(class) = tree.class(owner) else {
            return Ok(false);
        };
        let Some(declared) = class.method_by_key(key) else {
            return Ok(false);
        };
        let chain = walker.chain(class);
        for &ns in &namespaces {
            if let Some(inherited) = walker.inherited_name(&chain, key, ns) {
                if wants_update(declared.names().get(ns), inherited, mode) {
                    updates.push((ns, inherited.clone()));
                }
            }
        }
    }
    let changed = !updates.is_empty();
    for (ns, name) in updates {
        tree.set_name(method, ns, name)?;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tree::{INTERFACES_NAMESPACE, SUPERCLASS_NAMESPACE};
    use pretty_assertions::assert_eq;

    const DESC: &str = "(Ltest/Class;)V";

    fn hierarchy() -> MappingTree {
        let mut tree =
            MappingTree::new("official", [SUPERCLASS_NAMESPACE, INTERFACES_NAMESPACE, "ns"]).unwrap();
        let superclass = tree.namespace_id(SUPERCLASS_NAMESPACE).unwrap();
        let ns = tree.namespace_id("ns").unwrap();

        tree.class_or_insert("SuperClass");
        tree.class_or_insert("ConcreteClass").names.set(superclass, "SuperClass");
        let overridden = ElementRef::method("SuperClass", "overriddenMethod", DESC);
        let overriding = ElementRef::method("ConcreteClass", "overriddenMethod", DESC);
        tree.declare(&overridden);
        tree.declare(&overriding);
        tree.set_name(&overridden, ns, "correctName").unwrap();
        tree
    }

    #[test]
    fn fills_missing_override_name_from_superclass() {
        let mut tree = hierarchy();
        let ns = tree.namespace_id("ns").unwrap();

        let written = complete_overrides(&mut tree, ns, CompletionMode::Missing).unwrap();

        assert_eq!(written, 1);
        let overriding = ElementRef::method("ConcreteClass", "overriddenMethod", DESC);
        assert_eq!(tree.name_of(&overriding, ns), Some("correctName"));
    }

    #[test]
    fn missing_mode_keeps_existing_names() {
        let mut tree = hierarchy();
        let ns = tree.namespace_id("ns").unwrap();
        let overriding = ElementRef::method("ConcreteClass", "overriddenMethod", DESC);
        tree.set_name(&overriding, ns, "wrongName").unwrap();

        complete_overrides(&mut tree, ns, CompletionMode::Missing).unwrap();
        assert_eq!(tree.name_of(&overriding, ns), Some("wrongName"));

        complete_overrides(&mut tree, ns, CompletionMode::Incorrect).unwrap();
        assert_eq!(tree.name_of(&overriding, ns), Some("correctName"));
    }

    #[test]
    fn covariant_overrides_are_not_unified() {
        let mut tree = hierarchy();
        let ns = tree.namespace_id("ns").unwrap();
        let covariant = ElementRef::method("ConcreteClass", "overriddenMethod", "(Ltest/Class;)I");
        tree.declare(&covariant);

        complete_overrides(&mut tree, ns, CompletionMode::Missing).unwrap();
        assert_eq!(tree.name_of(&covariant, ns), None);
    }

    #[test]
    fn nearest_named_supertype_wins_and_interfaces_are_walked() {
        let mut tree = hierarchy();
        let superclass = tree.namespace_id(SUPERCLASS_NAMESPACE).unwrap();
        let interfaces = tree.namespace_id(INTERFACES_NAMESPACE).unwrap();
        let ns = tree.namespace_id("ns").unwrap();

        // Leaf -> Middle (declares, unnamed) -> ConcreteClass -> SuperClass (named)
        tree.class_or_insert("Middle").names.set(superclass, "ConcreteClass");
        tree.class_or_insert("Leaf").names.set(superclass, "Middle");
        tree.declare(&ElementRef::method("Middle", "overriddenMethod", DESC));
        tree.declare(&ElementRef::method("Leaf", "overriddenMethod", DESC));

        // An interface-only method reached through a second interface.
        tree.class_or_insert("Iface");
        tree.class_or_insert("Leaf").names.set(interfaces, "Other, Iface");
        let iface_method = ElementRef::method("Iface", "run", "()V");
        tree.declare(&iface_method);
        tree.set_name(&iface_method, ns, "run").unwrap();
        let leaf_run = ElementRef::method("Leaf", "run", "()V");
        tree.declare(&leaf_run);

        complete_overrides(&mut tree, ns, CompletionMode::Missing).unwrap();

        let leaf = ElementRef::method("Leaf", "overriddenMethod", DESC);
        assert_eq!(tree.name_of(&leaf, ns), Some("correctName"));
        assert_eq!(tree.name_of(&leaf_run, ns), Some("run"));
    }

    #[test]
    fn cyclic_hierarchies_terminate() {
        let mut tree = hierarchy();
        let superclass = tree.namespace_id(SUPERCLASS_NAMESPACE).unwrap();
        tree.class_or_insert("SuperClass").names.set(superclass, "ConcreteClass");

        let walker = SupertypeWalker::new(&tree).unwrap();
        let class = tree.class("ConcreteClass").unwrap();
        assert_eq!(walker.chain(class), vec!["SuperClass"]);
    }

    #[test]
    fn batch_matches_per_namespace_runs() {
        let mut batch = hierarchy();
        let other = batch.add_namespace("other").unwrap();
        let ns = batch.namespace_id("ns").unwrap();
        let overridden = ElementRef::method("SuperClass", "overriddenMethod", DESC);
        batch.set_name(&overridden, other, "otherName").unwrap();

        complete_overrides_batch(&mut batch, &[ns, other], CompletionMode::Missing).unwrap();

        let overriding = ElementRef::method("ConcreteClass", "overriddenMethod", DESC);
        assert_eq!(batch.name_of(&overriding, ns), Some("correctName"));
        assert_eq!(batch.name_of(&overriding, other), Some("otherName"));
    }

    #[test]
    fn single_method_completion() {
        let mut tree = hierarchy();
        let ns = tree.namespace_id("ns").unwrap();
        let overriding = ElementRef::method("ConcreteClass", "overriddenMethod", DESC);

        assert!(complete_method(&mut tree, &overriding, &[ns], CompletionMode::Missing).unwrap());
        assert!(!complete_method(&mut tree, &overriding, &[ns], CompletionMode::Missing).unwrap());
        assert_eq!(tree.name_of(&overriding, ns), Some("correctName"));
    }

    #[test]
    fn requires_structural_namespaces() {
        let mut tree = MappingTree::new("official", ["ns"]).unwrap();
        let ns = tree.namespace_id("ns").unwrap();
        assert!(matches!(
            complete_overrides(&mut tree, ns, CompletionMode::Missing),
            Err(Error::MissingStructuralNamespace(SUPERCLASS_NAMESPACE))
        ));
    }
}
