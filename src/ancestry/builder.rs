// src/ancestry/builder.rs

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::ancestry::{AncestryConfig, AncestryTree, MatchStrategy, Node};
use crate::tree::{ElementKind, ElementRef, MappingTree};
use crate::version::{Version, VersionedTrees};

/// What two elements must share to be the same entity under one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    preference: usize,
    name: String,
    desc: Option<String>,
}

fn match_key(
    tree: &MappingTree,
    element: &ElementRef,
    strategy: &MatchStrategy,
    preference: usize,
) -> Option<MatchKey> {
    let ns = tree.find_namespace(&strategy.namespaces[preference])?;
    let name = tree.name_of(element, ns)?.to_string();
    let desc = if strategy.require_descriptor { Some(tree.member_desc(element, ns)?) } else { None };
    Some(MatchKey { preference, name, desc })
}

/// Links the candidates of each version to the open nodes, oldest version
/// first. Only a node's most recent entry is compared.
struct Linker<'a> {
    trees: &'a VersionedTrees,
    strategy: &'a MatchStrategy,
    nodes: Vec<Node>,
}

impl<'a> Linker<'a> {
    fn new(trees: &'a VersionedTrees, strategy: &'a MatchStrategy) -> Self {
        Self { trees, strategy, nodes: Vec::new() }
    }

    fn step(&mut self, version: &Version, tree: &MappingTree, candidates: Vec<ElementRef>) {
        // 1. Index every open node under each namespace its latest entry is named in
        let mut open: HashMap<MatchKey, Vec<usize>> = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let (last_version, last) = node.last();
            let Some(last_tree) = self.trees.get(last_version) else {
                continue;
            };
            for preference in 0..self.strategy.namespaces.len() {
                if let Some(key) = match_key(last_tree, last, self.strategy, preference) {
                    open.entry(key).or_default().push(i);
                }
            }
        }

        // 2. First namespace with an unclaimed node wins; otherwise open a new node
        let mut claimed = vec![false; self.nodes.len()];
        let mut linked = 0usize;
        for candidate in candidates {
            let matched = (0..self.strategy.namespaces.len())
                .filter_map(|preference| match_key(tree, &candidate, self.strategy, preference))
                .filter_map(|key| open.get(&key))
                .find_map(|nodes| nodes.iter().copied().find(|&i| !claimed[i]));
            match matched {
                Some(i) => {
                    claimed[i] = true;
                    linked += 1;
                    self.nodes[i].push(version.clone(), candidate);
                }
                None => self.nodes.push(Node::new(version.clone(), candidate)),
            }
        }
        debug!(%version, linked, nodes = self.nodes.len(), "linked ancestry step");
    }

    fn finish(self, kind: ElementKind, versions: Vec<Version>) -> AncestryTree {
        AncestryTree::new(kind, versions, self.nodes)
    }
}

/// Links every class across all versions of `trees`.
pub fn build_class_ancestry(trees: &VersionedTrees, config: &AncestryConfig) -> AncestryTree {
    let mut linker = Linker::new(trees, &config.classes);
    for (version, tree) in trees {
        let candidates = tree.classes().map(|c| c.to_ref()).collect();
        linker.step(version, tree, candidates);
    }
    let ancestry = linker.finish(ElementKind::Class, trees.keys().cloned().collect());
    info!(versions = trees.len(), nodes = ancestry.len(), "built class ancestry");
    ancestry
}

/// Links the fields or methods of one class node across the versions that
/// node covers. Members are only matched against members of the same node.
pub fn build_member_ancestry(
    trees: &VersionedTrees,
    class: &Node,
    kind: ElementKind,
    config: &AncestryConfig,
) -> AncestryTree {
    let mut linker = Linker::new(trees, config.strategy(kind));
    let mut versions = Vec::new();
    for (version, element) in class.entries() {
        let Some(tree) = trees.get(version) else {
            continue;
        };
        let Some(mapping) = tree.class(element.owner()) else {
            continue;
        };
        let candidates = match kind {
            ElementKind::Field => mapping
                .fields()
                .map(|f| ElementRef::Field { owner: element.owner().clone(), key: f.key().clone() })
                .collect(),
            ElementKind::Method => mapping
                .methods()
                .map(|m| ElementRef::Method { owner: element.owner().clone(), key: m.key().clone() })
                .collect(),
            ElementKind::Class | ElementKind::Param => Vec::new(),
        };
        linker.step(version, tree, candidates);
        versions.push(version.clone());
    }
    linker.finish(kind, versions)
}

/// Member ancestry of one class node.
#[derive(Debug, Clone)]
pub struct ClassLineage {
    /// Index into the class ancestry's nodes.
    pub class: usize,
    pub fields: AncestryTree,
    pub methods: AncestryTree,
}

#[derive(Debug, Clone)]
pub struct FullAncestry {
    pub classes: AncestryTree,
    pub members: Vec<ClassLineage>,
}

/// Class ancestry plus the member ancestry of every class node. Class scopes
/// are independent, so members are linked in parallel.
pub fn build_full_ancestry(trees: &VersionedTrees, config: &AncestryConfig) -> FullAncestry {
    let classes = build_class_ancestry(trees, config);
    let members = classes
        .nodes()
        .par_iter()
        .enumerate()
        .map(|(class, node)| ClassLineage {
            class,
            fields: build_member_ancestry(trees, node, ElementKind::Field, config),
            methods: build_member_ancestry(trees, node, ElementKind::Method, config),
        })
        .collect();
    FullAncestry { classes, members }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ancestry::AncestryConfig;
    use pretty_assertions::assert_eq;

    fn version(id: &str, time: i64) -> Version {
        Version::from_timestamp(id, time)
    }

    fn tree_with(namespaces: &[&str], classes: &[(&str, &[(&str, &str)])]) -> MappingTree {
        let mut tree = MappingTree::new("official", namespaces.iter().copied()).unwrap();
        for (class, names) in classes {
            let element = ElementRef::class(*class);
            tree.declare(&element);
            for (ns, name) in names.iter() {
                let ns = tree.namespace_id(ns).unwrap();
                tree.set_name(&element, ns, *name).unwrap();
            }
        }
        tree
    }

    fn entries(node: &Node) -> Vec<(String, String)> {
        node.entries().map(|(v, e)| (v.id().to_string(), e.to_string())).collect()
    }

    #[test]
    fn renamed_obfuscation_links_by_mapped_name() {
        let mut trees = VersionedTrees::new();
        trees.insert(version("v1", 1), tree_with(&["mojang"], &[("a", &[("mojang", "Foo")])]));
        trees.insert(version("v2", 2), tree_with(&["mojang"], &[("b", &[("mojang", "Foo")])]));

        let ancestry = build_class_ancestry(&trees, &AncestryConfig::new(["mojang"]));

        assert_eq!(ancestry.len(), 1);
        assert_eq!(
            entries(&ancestry.nodes()[0]),
            vec![("v1".into(), "a".into()), ("v2".into(), "b".into())]
        );
    }

    #[test]
    fn different_names_open_separate_nodes() {
        let mut trees = VersionedTrees::new();
        trees.insert(version("v1", 1), tree_with(&["mojang"], &[("a", &[("mojang", "Foo")])]));
        trees.insert(version("v2", 2), tree_with(&["mojang"], &[("b", &[("mojang", "Bar")])]));

        let ancestry = build_class_ancestry(&trees, &AncestryConfig::new(["mojang"]));

        assert_eq!(ancestry.len(), 2);
        assert!(ancestry.nodes().iter().all(|n| n.len() == 1));
    }

    #[test]
    fn versions_are_processed_by_release_time_not_insertion() {
        let mut trees = VersionedTrees::new();
        trees.insert(version("b-newer", 20), tree_with(&["mojang"], &[("y", &[("mojang", "Foo")])]));
        trees.insert(version("a-older", 10), tree_with(&["mojang"], &[("x", &[("mojang", "Foo")])]));

        let ancestry = build_class_ancestry(&trees, &AncestryConfig::new(["mojang"]));
        let node = &ancestry.nodes()[0];

        assert_eq!(node.introduced_in().id(), "a-older");
        assert_eq!(node.last_seen().id(), "b-newer");
    }

    #[test]
    fn compares_against_most_recent_entry_and_falls_back_across_namespaces() {
        let ns = ["mojang", "yarn"];
        let mut trees = VersionedTrees::new();
        trees.insert(version("v1", 1), tree_with(&ns, &[("a", &[("yarn", "Foo")])]));
        // Renamed in yarn, but mojang now covers it.
        trees.insert(version("v2", 2), tree_with(&ns, &[("b", &[("yarn", "Foo"), ("mojang", "Baz")])]));
        // Only mojang agrees with v2 now; v1's yarn name is no longer compared.
        trees.insert(version("v3", 3), tree_with(&ns, &[("c", &[("yarn", "Qux"), ("mojang", "Baz")])]));

        let ancestry = build_class_ancestry(&trees, &AncestryConfig::new(ns));

        assert_eq!(ancestry.len(), 1);
        assert_eq!(ancestry.nodes()[0].len(), 3);
    }

    #[test]
    fn gaps_keep_nodes_open_and_report_removal() {
        let mut trees = VersionedTrees::new();
        trees.insert(version("v1", 1), tree_with(&["mojang"], &[("a", &[("mojang", "Foo")]), ("b", &[("mojang", "Gone")])]));
        trees.insert(version("v2", 2), tree_with(&["mojang"], &[]));
        trees.insert(version("v3", 3), tree_with(&["mojang"], &[("q", &[("mojang", "Foo")])]));

        let ancestry = build_class_ancestry(&trees, &AncestryConfig::new(["mojang"]));
        let latest = ancestry.latest().unwrap().clone();

        assert_eq!(ancestry.len(), 2);
        assert_eq!(entries(&ancestry.nodes()[0]), vec![("v1".into(), "a".into()), ("v3".into(), "q".into())]);
        assert_eq!(ancestry.nodes()[1].removed_after(&latest).map(Version::id), Some("v1"));
        assert_eq!(ancestry.nodes()[0].removed_after(&latest), None);
    }

    #[test]
    fn duplicate_candidates_first_match_wins() {
        let mut trees = VersionedTrees::new();
        trees.insert(version("v1", 1), tree_with(&["mojang"], &[("a", &[("mojang", "Foo")])]));
        trees.insert(
            version("v2", 2),
            tree_with(&["mojang"], &[("b", &[("mojang", "Foo")]), ("c", &[("mojang", "Foo")])]),
        );

        let ancestry = build_class_ancestry(&trees, &AncestryConfig::new(["mojang"]));

        assert_eq!(ancestry.len(), 2);
        assert_eq!(entries(&ancestry.nodes()[0]), vec![("v1".into(), "a".into()), ("v2".into(), "b".into())]);
        assert_eq!(entries(&ancestry.nodes()[1]), vec![("v2".into(), "c".into())]);
    }

    #[test]
    fn node_versions_are_a_subset_in_order() {
        let mut trees = VersionedTrees::new();
        for (i, class) in ["a", "b", "c", "d"].iter().enumerate() {
            let name = if i % 2 == 0 { "Even" } else { "Odd" };
            trees.insert(
                version(&format!("v{i}"), i as i64),
                tree_with(&["mojang"], &[(*class, &[("mojang", name)])]),
            );
        }

        let ancestry = build_class_ancestry(&trees, &AncestryConfig::new(["mojang"]));

        for node in ancestry.nodes() {
            assert!(node.versions().all(|v| ancestry.versions().contains(v)));
            assert!(node.last_seen().released() >= node.introduced_in().released());
        }
        assert_eq!(ancestry.len(), 2);
    }

    #[test]
    fn members_link_within_their_class_node() {
        let mut trees = VersionedTrees::new();
        for (id, time, class, field, ty) in [("v1", 1, "a", "x", "Lb;"), ("v2", 2, "c", "y", "Ld;")] {
            let mut tree = tree_with(&["mojang"], &[(class, &[("mojang", "Foo")])]);
            let ty_class = &ty[1..ty.len() - 1];
            let mojang = tree.namespace_id("mojang").unwrap();
            tree.declare(&ElementRef::class(ty_class));
            tree.set_name(&ElementRef::class(ty_class), mojang, "Bar").unwrap();
            let field_ref = ElementRef::field(class, field, ty);
            tree.declare(&field_ref);
            tree.set_name(&field_ref, mojang, "count").unwrap();
            // Same mapped name, different type: must stay apart.
            let other = ElementRef::field(class, "z", "I");
            tree.declare(&other);
            tree.set_name(&other, mojang, if time == 1 { "count" } else { "other" }).unwrap();
            trees.insert(version(id, time), tree);
        }

        let config = AncestryConfig::new(["mojang"]);
        let full = build_full_ancestry(&trees, &config);
        let foo_index = full.classes.node_index(&version("v1", 1), &ElementRef::class("a")).unwrap();
        let foo = &full.members[foo_index];
        assert_eq!(foo.class, foo_index);
        assert_eq!(full.classes.nodes()[foo_index].len(), 2);

        let linked: Vec<_> = foo.fields.nodes().iter().filter(|n| n.len() == 2).collect();
        assert_eq!(linked.len(), 1);
        assert_eq!(
            entries(linked[0]),
            vec![("v1".into(), "a.x:Lb;".into()), ("v2".into(), "c.y:Ld;".into())]
        );
        assert_eq!(foo.fields.len(), 3);
        assert!(foo.methods.is_empty());
    }

    #[test]
    fn overloads_sharing_a_name_stay_apart() {
        let mut trees = VersionedTrees::new();
        for (id, time, class, [int_method, long_method]) in [("v1", 1, "a", ["m", "n"]), ("v2", 2, "c", ["x", "y"])] {
            let mut tree = tree_with(&["mojang"], &[(class, &[("mojang", "Foo")])]);
            let mojang = tree.namespace_id("mojang").unwrap();
            for (method, desc) in [(int_method, "(I)V"), (long_method, "(J)V")] {
                let method = ElementRef::method(class, method, desc);
                tree.declare(&method);
                tree.set_name(&method, mojang, "run").unwrap();
            }
            trees.insert(version(id, time), tree);
        }

        let full = build_full_ancestry(&trees, &AncestryConfig::new(["mojang"]));

        assert_eq!(full.classes.len(), 1);
        let methods = &full.members[0].methods;
        assert_eq!(methods.len(), 2);
        assert_eq!(
            entries(&methods.nodes()[0]),
            vec![("v1".into(), "a.m(I)V".into()), ("v2".into(), "c.x(I)V".into())]
        );
        assert_eq!(
            entries(&methods.nodes()[1]),
            vec![("v1".into(), "a.n(J)V".into()), ("v2".into(), "c.y(J)V".into())]
        );
        assert!(full.members[0].fields.is_empty());
    }

    #[test]
    fn reverse_lookup_finds_nodes() {
        let mut trees = VersionedTrees::new();
        let v1 = version("v1", 1);
        let v2 = version("v2", 2);
        trees.insert(v1.clone(), tree_with(&["mojang"], &[("a", &[("mojang", "Foo")])]));
        trees.insert(v2.clone(), tree_with(&["mojang"], &[("b", &[("mojang", "Foo")])]));

        let ancestry = build_class_ancestry(&trees, &AncestryConfig::new(["mojang"]));
        let node = ancestry.node_of(&v2, &ElementRef::class("b")).unwrap();

        assert_eq!(node.get(&v1), Some(&ElementRef::class("a")));
        assert!(ancestry.node_of(&v1, &ElementRef::class("b")).is_none());
    }
}
