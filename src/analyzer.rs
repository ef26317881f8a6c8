// src/analyzer.rs

//! Structural analysis of finalized mapping trees.
//!
//! Detection and repair are separate steps: [`MappingAnalyzer::accept`]
//! records [`Problem`]s, and the `accept_*resolutions` methods apply their
//! fixes in controlled batches so callers choose which kinds to repair and
//! when.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::inheritance::{complete_method, CompletionMode, SupertypeWalker};
use crate::tree::{
    ClassMapping, Element, ElementRef, FieldMapping, MappingTree, MethodMapping, NamespaceId,
    TreeId,
};

/// Category of a problem. The set is open: callers may define their own
/// kinds with [`ProblemKind::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProblemKind {
    name: &'static str,
    deletes_element: bool,
}

impl ProblemKind {
    /// An override whose name disagrees with the method it overrides.
    pub const INHERITANCE_ERROR: Self = Self::new("inheritance-error", false);
    /// An element the compiler generated; it cannot be referenced from source.
    pub const SYNTHETIC: Self = Self::new("synthetic", true);
    /// An element absent from the version's class files.
    pub const NON_EXISTENT: Self = Self::new("non-existent", true);

    pub const fn new(name: &'static str, deletes_element: bool) -> Self {
        Self { name, deletes_element }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Kinds whose resolution removes the element from its tree.
    pub fn deletes_element(&self) -> bool {
        self.deletes_element
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub type CustomResolution = dyn Fn(&mut MappingTree, &ElementRef) -> Result<()> + Send + Sync;

/// How a problem is fixed, bound when the problem is recorded.
#[derive(Clone)]
pub enum Resolution {
    /// Remove the element from its parent.
    Delete,
    /// Re-run override completion for this one method.
    CompleteOverrides { namespaces: Vec<NamespaceId>, mode: CompletionMode },
    Custom(Arc<CustomResolution>),
}

impl Resolution {
    pub fn custom(f: impl Fn(&mut MappingTree, &ElementRef) -> Result<()> + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => f.write_str("Delete"),
            Self::CompleteOverrides { namespaces, mode } => f
                .debug_struct("CompleteOverrides")
                .field("namespaces", namespaces)
                .field("mode", mode)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A defect found on one element of one tree.
#[derive(Debug, Clone)]
pub struct Problem {
    tree: TreeId,
    element: ElementRef,
    namespace: Option<NamespaceId>,
    kind: ProblemKind,
    resolution: Resolution,
}

impl Problem {
    pub fn new(
        tree: &MappingTree,
        element: ElementRef,
        namespace: Option<NamespaceId>,
        kind: ProblemKind,
        resolution: Resolution,
    ) -> Self {
        Self { tree: tree.id(), element, namespace, kind, resolution }
    }

    pub fn tree(&self) -> TreeId {
        self.tree
    }

    pub fn element(&self) -> &ElementRef {
        &self.element
    }

    /// `None` when the problem is not tied to a single namespace.
    pub fn namespace(&self) -> Option<NamespaceId> {
        self.namespace
    }

    pub fn kind(&self) -> ProblemKind {
        self.kind
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    fn resolve(&self, tree: &mut MappingTree) -> Result<()> {
        match &self.resolution {
            Resolution::Delete => {
                // Already gone when an enclosing class went in the same batch.
                tree.remove(&self.element);
                Ok(())
            }
            Resolution::CompleteOverrides { namespaces, mode } => {
                complete_method(tree, &self.element, namespaces, *mode).map(|_| ())
            }
            Resolution::Custom(f) => f(tree, &self.element),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.kind, self.element)?;
        if let Some(ns) = self.namespace {
            write!(f, " in namespace {ns}")?;
        }
        Ok(())
    }
}

/// Per-class state shared across the class, field and method callbacks.
pub struct ClassContext<'t> {
    pub tree: &'t MappingTree,
    pub class: &'t ClassMapping,
    walker: Option<SupertypeWalker<'t>>,
    chain: Vec<&'t str>,
}

impl<'t> ClassContext<'t> {
    fn new(tree: &'t MappingTree, class: &'t ClassMapping, walker: Option<SupertypeWalker<'t>>) -> Self {
        let chain = walker.map(|w| w.chain(class)).unwrap_or_default();
        Self { tree, class, walker, chain }
    }

    /// Transitive supertypes; empty when the tree has no structural columns.
    pub fn supertypes(&self) -> &[&'t str] {
        &self.chain
    }

    pub fn walker(&self) -> Option<&SupertypeWalker<'t>> {
        self.walker.as_ref()
    }

    pub fn field_ref(&self, field: &FieldMapping) -> ElementRef {
        ElementRef::Field { owner: self.class.src.clone(), key: field.key().clone() }
    }

    pub fn method_ref(&self, method: &MethodMapping) -> ElementRef {
        ElementRef::Method { owner: self.class.src.clone(), key: method.key().clone() }
    }
}

/// Detection logic run by the analyzer. Callbacks for one tree arrive
/// class, then its fields, then its methods, and never concurrently, so an
/// implementation may keep scratch state between them.
pub trait ProblemDetector: Send {
    fn visit_class(&mut self, _cx: &ClassContext<'_>, _out: &mut Vec<Problem>) {}

    fn visit_field(&mut self, _cx: &ClassContext<'_>, _field: &FieldMapping, _out: &mut Vec<Problem>) {}

    fn visit_method(&mut self, _cx: &ClassContext<'_>, _method: &MethodMapping, _out: &mut Vec<Problem>) {}
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Namespaces skipped by inheritance checks; known to be incomplete.
    pub inheritance_exempt: HashSet<String>,
    pub detect_synthetics: bool,
    pub detect_non_existent: bool,
    pub detect_inheritance: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            inheritance_exempt: HashSet::new(),
            detect_synthetics: true,
            detect_non_existent: true,
            detect_inheritance: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn exempt<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inheritance_exempt.extend(namespaces.into_iter().map(Into::into));
        self
    }
}

/// The synthetic, non-existent and inheritance checks.
#[derive(Debug, Clone, Default)]
pub struct StandardDetector {
    config: AnalyzerConfig,
}

impl StandardDetector {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    fn checked_namespaces(&self, tree: &MappingTree) -> Vec<NamespaceId> {
        tree.namespaces()
            .naming()
            .filter(|(_, name)| !self.config.inheritance_exempt.contains(*name))
            .map(|(id, _)| id)
            .collect()
    }

    fn existence(&self, cx: &ClassContext<'_>, element: ElementRef, mapping: &dyn Element, out: &mut Vec<Problem>) {
        if self.config.detect_synthetics && mapping.is_synthetic() {
            out.push(Problem::new(cx.tree, element, None, ProblemKind::SYNTHETIC, Resolution::Delete));
        } else if self.config.detect_non_existent && mapping.access().is_none() {
            out.push(Problem::new(cx.tree, element, None, ProblemKind::NON_EXISTENT, Resolution::Delete));
        }
    }
}

impl ProblemDetector for StandardDetector {
    fn visit_class(&mut self, cx: &ClassContext<'_>, out: &mut Vec<Problem>) {
        self.existence(cx, cx.class.to_ref(), cx.class, out);
    }

    fn visit_field(&mut self, cx: &ClassContext<'_>, field: &FieldMapping, out: &mut Vec<Problem>) {
        self.existence(cx, cx.field_ref(field), field, out);
    }

    fn visit_method(&mut self, cx: &ClassContext<'_>, method: &MethodMapping, out: &mut Vec<Problem>) {
        let element = cx.method_ref(method);
        let walker = cx.walker().filter(|_| self.config.detect_inheritance && !method.is_initializer());
        let Some(walker) = walker else {
            self.existence(cx, element, method, out);
            return;
        };
        let namespaces = self.checked_namespaces(cx.tree);

        // A method missing its flags that overrides one carrying them exists;
        // only its names need to come from the supertype.
        let inherits_access = method.access().is_none()
            && walker.overridden(cx.supertypes(), method.key()).any(|m| m.access().is_some());
        if inherits_access {
            out.push(Problem::new(
                cx.tree,
                element,
                None,
                ProblemKind::INHERITANCE_ERROR,
                Resolution::CompleteOverrides { namespaces, mode: CompletionMode::Incorrect },
            ));
            return;
        }
        self.existence(cx, element.clone(), method, out);

        for ns in namespaces {
            let Some(expected) = walker.inherited_name(cx.supertypes(), method.key(), ns) else {
                continue;
            };
            if method.names().get(ns) != Some(&**expected) {
                out.push(Problem::new(
                    cx.tree,
                    element.clone(),
                    Some(ns),
                    ProblemKind::INHERITANCE_ERROR,
                    Resolution::CompleteOverrides { namespaces: vec![ns], mode: CompletionMode::Incorrect },
                ));
            }
        }
    }
}

/// Collects problems across any number of trees and resolves them in
/// batches. Reusable indefinitely.
pub struct MappingAnalyzer {
    detectors: Mutex<Vec<Box<dyn ProblemDetector>>>,
    problems: Mutex<Vec<Problem>>,
}

impl Default for MappingAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl MappingAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self::with_detectors(vec![Box::new(StandardDetector::new(config))])
    }

    pub fn with_detectors(detectors: Vec<Box<dyn ProblemDetector>>) -> Self {
        Self { detectors: Mutex::new(detectors), problems: Mutex::new(Vec::new()) }
    }

    pub fn add_detector(&self, detector: impl ProblemDetector + 'static) {
        self.detectors.lock().push(Box::new(detector));
    }

    /// Scans `tree` and records what it finds. Returns the number of new
    /// problems.
    pub fn accept(&self, tree: &MappingTree) -> usize {
        let walker = SupertypeWalker::new(tree).ok();
        let mut found = Vec::new();
        {
            let mut detectors = self.detectors.lock();
            for class in tree.classes() {
                let cx = ClassContext::new(tree, class, walker);
                for detector in detectors.iter_mut() {
                    detector.visit_class(&cx, &mut found);
                }
                for field in class.fields() {
                    for detector in detectors.iter_mut() {
                        detector.visit_field(&cx, field, &mut found);
                    }
                }
                for method in class.methods() {
                    for detector in detectors.iter_mut() {
                        detector.visit_method(&cx, method, &mut found);
                    }
                }
            }
        }
        let count = found.len();
        info!(tree = %tree.id(), problems = count, "analyzed mapping tree");
        self.problems.lock().extend(found);
        count
    }

    pub fn problems(&self) -> Vec<Problem> {
        self.problems.lock().clone()
    }

    pub fn problems_for(&self, tree: &MappingTree, element: &ElementRef) -> Vec<Problem> {
        self.problems
            .lock()
            .iter()
            .filter(|p| p.tree == tree.id() && &p.element == element)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.problems.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.lock().is_empty()
    }

    /// Drops every pending problem of `tree` without resolving it.
    pub fn discard(&self, tree: &MappingTree) -> usize {
        let mut problems = self.problems.lock();
        let before = problems.len();
        problems.retain(|p| p.tree != tree.id());
        before - problems.len()
    }

    /// Resolves every problem of `kind` recorded for `tree`.
    pub fn accept_resolutions(&self, tree: &mut MappingTree, kind: ProblemKind) -> Result<Vec<Problem>> {
        self.resolve_kind(tree, kind, |_| true)
    }

    /// Resolves every known kind for `tree`, deleting kinds first.
    pub fn accept_all_resolutions(&self, tree: &mut MappingTree) -> Result<Vec<Problem>> {
        let kinds = self.pending_kinds(tree.id(), |_| true);
        let mut accepted = Vec::new();
        for kind in kinds {
            accepted.extend(self.accept_resolutions(tree, kind)?);
        }
        Ok(accepted)
    }

    /// The same protocol narrowed to one element. With `kind` unset, every
    /// kind pending on the element is processed, deleting kinds first.
    pub fn accept_element_resolutions(
        &self,
        tree: &mut MappingTree,
        element: &ElementRef,
        kind: Option<ProblemKind>,
    ) -> Result<Vec<Problem>> {
        let kinds = match kind {
            Some(kind) => vec![kind],
            None => self.pending_kinds(tree.id(), |p| &p.element == element),
        };
        let mut accepted = Vec::new();
        for kind in kinds {
            accepted.extend(self.resolve_kind(tree, kind, |p| &p.element == element)?);
        }
        Ok(accepted)
    }

    /// Distinct kinds in first-recorded order, deleting kinds moved first.
    fn pending_kinds(&self, tree: TreeId, scope: impl Fn(&Problem) -> bool) -> Vec<ProblemKind> {
        let mut kinds: Vec<ProblemKind> = Vec::new();
        for problem in self.problems.lock().iter().filter(|p| p.tree == tree && scope(p)) {
            if !kinds.contains(&problem.kind) {
                kinds.push(problem.kind);
            }
        }
        kinds.sort_by_key(|kind| !kind.deletes_element());
        kinds
    }

    fn resolve_kind(
        &self,
        tree: &mut MappingTree,
        kind: ProblemKind,
        scope: impl Fn(&Problem) -> bool,
    ) -> Result<Vec<Problem>> {
        let id = tree.id();
        let selected = {
            let mut problems = self.problems.lock();
            let (selected, rest): (Vec<_>, Vec<_>) = problems
                .drain(..)
                .partition(|p| p.tree == id && p.kind == kind && scope(p));
            *problems = rest;

            if kind.deletes_element() {
                let selected = earliest_per_element(selected);
                purge_moot(&mut problems, id, &selected);
                selected
            } else {
                selected
            }
        };

        if kind.deletes_element() {
            for problem in &selected {
                problem.resolve(tree)?;
            }
            debug!(tree = %id, %kind, deleted = selected.len(), "accepted deletions");
            return Ok(selected);
        }

        for (i, problem) in selected.iter().enumerate() {
            if let Err(err) = problem.resolve(tree) {
                self.problems.lock().extend(selected[i..].iter().cloned());
                return Err(err);
            }
        }
        debug!(tree = %id, %kind, resolved = selected.len(), "accepted resolutions");
        Ok(selected)
    }
}

impl fmt::Debug for MappingAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingAnalyzer")
            .field("detectors", &self.detectors.lock().len())
            .field("problems", &self.problems.lock().len())
            .finish()
    }
}

fn earliest_per_element(problems: Vec<Problem>) -> Vec<Problem> {
    let mut seen = HashSet::new();
    problems.into_iter().filter(|p| seen.insert(p.element.clone())).collect()
}

/// Removes every pending problem on an element that is about to be deleted,
/// including problems on members of deleted classes.
fn purge_moot(problems: &mut Vec<Problem>, tree: TreeId, deleted: &[Problem]) {
    let elements: HashSet<&ElementRef> = deleted.iter().map(|p| &p.element).collect();
    let classes: HashSet<&str> = deleted
        .iter()
        .filter_map(|p| match &p.element {
            ElementRef::Class(name) => Some(&**name),
            _ => None,
        })
        .collect();
    problems.retain(|p| {
        if p.tree != tree {
            return true;
        }
        let method_of_param = match &p.element {
            ElementRef::Param { owner, key, .. } => {
                elements.contains(&ElementRef::Method { owner: owner.clone(), key: key.clone() })
            }
            _ => false,
        };
        !(elements.contains(&p.element) || classes.contains(&**p.element.owner()) || method_of_param)
    });
}
