// src/builder.rs

//! Per-version tree construction: contributors are replayed through the
//! adapter chain into a fresh tree, then the post-population hooks run in
//! insertion order.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::adapter::AdapterChain;
use crate::error::Result;
use crate::inheritance::{complete_overrides_batch, CompletionMode};
use crate::tree::{ElementRef, MappingContributor, MappingTree, Name};
use crate::version::Version;

/// A mutation applied to a fully populated tree.
pub trait TreeHook: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the number of elements touched, for logging.
    fn apply(&self, tree: &mut MappingTree) -> Result<usize>;
}

/// Drops elements that carry no access flags, plus static initializers.
///
/// Access flags come from the class files of the version itself, so an
/// element without them does not exist there. The usual culprit is a
/// client-only class leaking into a server mapping set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveNonExistent;

impl TreeHook for RemoveNonExistent {
    fn name(&self) -> &str {
        "remove-non-existent"
    }

    fn apply(&self, tree: &mut MappingTree) -> Result<usize> {
        Ok(tree.retain_elements(|element, mapping| {
            let clinit = matches!(element, ElementRef::Method { key, .. } if &*key.name == "<clinit>");
            !clinit && mapping.access().is_some()
        }))
    }
}

/// Drops elements flagged synthetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveSynthetics;

impl TreeHook for RemoveSynthetics {
    fn name(&self) -> &str {
        "remove-synthetics"
    }

    fn apply(&self, tree: &mut MappingTree) -> Result<usize> {
        Ok(tree.retain_elements(|_, mapping| !mapping.is_synthetic()))
    }
}

/// Override completion over every naming namespace of the tree.
#[derive(Debug, Clone, Copy)]
pub struct CompleteOverrides {
    pub mode: CompletionMode,
}

impl Default for CompleteOverrides {
    fn default() -> Self {
        Self { mode: CompletionMode::Missing }
    }
}

impl TreeHook for CompleteOverrides {
    fn name(&self) -> &str {
        "complete-overrides"
    }

    fn apply(&self, tree: &mut MappingTree) -> Result<usize> {
        let namespaces: Vec<_> = tree.namespaces().naming().map(|(id, _)| id).collect();
        complete_overrides_batch(tree, &namespaces, self.mode)
    }
}

type ChainFactory = dyn Fn() -> AdapterChain + Send + Sync;

/// Builds one tree per version from a fixed set of contributors.
///
/// The builder is shared across worker threads; adapters carry per-build
/// state, so a fresh chain is made for every tree.
pub struct TreeBuilder {
    source: Name,
    namespaces: Vec<Name>,
    contributors: Vec<Arc<dyn MappingContributor>>,
    adapters: Arc<ChainFactory>,
    hooks: Vec<Box<dyn TreeHook>>,
}

impl TreeBuilder {
    pub fn new<I, S>(source: impl Into<Name>, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        Self {
            source: source.into(),
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            contributors: Vec::new(),
            adapters: Arc::new(AdapterChain::new),
            hooks: Vec::new(),
        }
    }

    pub fn contributor(mut self, contributor: impl MappingContributor + 'static) -> Self {
        self.contributors.push(Arc::new(contributor));
        self
    }

    pub fn adapters(mut self, factory: impl Fn() -> AdapterChain + Send + Sync + 'static) -> Self {
        self.adapters = Arc::new(factory);
        self
    }

    pub fn hook(mut self, hook: impl TreeHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Non-existent element removal, optional synthetic removal, then
    /// override completion.
    pub fn standard_hooks(self, remove_synthetics: bool) -> Self {
        let builder = self.hook(RemoveNonExistent);
        let builder = if remove_synthetics { builder.hook(RemoveSynthetics) } else { builder };
        builder.hook(CompleteOverrides::default())
    }

    pub fn contributor_count(&self) -> usize {
        self.contributors.len()
    }

    pub fn build(&self, version: &Version) -> Result<MappingTree> {
        // 1. Lay out namespaces: configured ones first, then any a contributor adds
        let mut tree = MappingTree::new(self.source.clone(), self.namespaces.iter().cloned())?;
        for contributor in &self.contributors {
            for ns in contributor.namespaces() {
                tree.ensure_namespace(&ns)?;
            }
        }

        // 2. Replay every contributor through the adapter chain
        let mut chain = (self.adapters)();
        for contributor in &self.contributors {
            debug!(%version, contributor = contributor.name(), "visiting contributor");
            contributor.contribute(version, &mut chain.wrap(&mut tree))?;
        }

        // 3. Post-population hooks
        for hook in &self.hooks {
            let touched = hook.apply(&mut tree)?;
            debug!(%version, hook = hook.name(), touched, "applied tree hook");
        }

        info!(%version, classes = tree.class_count(), elements = tree.element_count(), "built mapping tree");
        Ok(tree)
    }
}

impl fmt::Debug for TreeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("source", &self.source)
            .field("namespaces", &self.namespaces)
            .field("contributors", &self.contributors.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}
