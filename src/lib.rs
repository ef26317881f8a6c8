// src/lib.rs

//! Reconciles name-mapping sets across released versions of a codebase.
//!
//! Contributors populate one [`MappingTree`] per [`Version`] through an
//! [`AdapterChain`]; the [`MappingAnalyzer`] finds and repairs inconsistent
//! names; the ancestry builder then links each class, field and method to its
//! counterparts in every other version.

pub mod adapter;
pub mod analyzer;
pub mod ancestry;
pub mod builder;
pub mod error;
pub mod inheritance;
pub mod pipeline;
pub mod tiny;
pub mod tree;
pub mod version;

pub use adapter::{AdapterChain, RecordAdapter};
pub use analyzer::{AnalyzerConfig, MappingAnalyzer, Problem, ProblemKind, Resolution};
pub use ancestry::{AncestryConfig, AncestryTree, MatchStrategy, Node};
pub use builder::{TreeBuilder, TreeHook};
pub use error::{Error, Result};
pub use tree::{ElementRef, MappingContributor, MappingTree, MappingVisitor, Record};
pub use version::{Version, VersionedTrees};
