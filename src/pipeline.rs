// src/pipeline.rs

use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::builder::TreeBuilder;
use crate::error::Error;
use crate::version::{Version, VersionedTrees};

/// Trees that were built, plus the versions that failed.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub trees: VersionedTrees,
    pub failures: Vec<(Version, Error)>,
}

/// Builds one tree per version in parallel. A failing version is reported
/// and left out; it never stops the others.
pub fn build_trees(builder: &TreeBuilder, versions: &[Version], bar: ProgressBar) -> BuildOutcome {
    bar.set_message("Building mapping trees");

    let results: Vec<_> = versions
        .par_iter()
        .progress_with(bar)
        .map(|version| (version.clone(), builder.build(version)))
        .collect();

    let mut outcome = BuildOutcome::default();
    for (version, result) in results {
        match result {
            Ok(tree) => {
                outcome.trees.insert(version, tree);
            }
            Err(err) => {
                warn!(%version, error = %err, "excluding version");
                outcome.failures.push((version, err));
            }
        }
    }
    info!(built = outcome.trees.len(), failed = outcome.failures.len(), "per-version build finished");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{MappingContributor, MappingVisitor, Name, Record, ElementRef};
    use crate::error::Result;
    use pretty_assertions::assert_eq;

    /// Fails for one version id, otherwise declares a class named after the version.
    struct Flaky(&'static str);

    impl MappingContributor for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn namespaces(&self) -> Vec<Name> {
            vec!["named".into()]
        }

        fn contribute(&self, version: &Version, visitor: &mut dyn MappingVisitor) -> Result<()> {
            if version.id() == self.0 {
                return Err(Error::Parse { line: 1, message: "broken".into() });
            }
            visitor.visit(Record::dst_name(ElementRef::class(version.id()), "named", "Foo"))
        }
    }

    #[test]
    fn failures_are_per_version() {
        let builder = TreeBuilder::new("official", ["named"]).contributor(Flaky("1.1"));
        let versions: Vec<_> = (0..4).map(|i| Version::from_timestamp(format!("1.{i}"), i)).collect();

        let outcome = build_trees(&builder, &versions, ProgressBar::hidden());

        assert_eq!(outcome.trees.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0.id(), "1.1");
        let ids: Vec<_> = outcome.trees.keys().map(|v| v.id().to_string()).collect();
        assert_eq!(ids, vec!["1.0", "1.2", "1.3"]);
        assert!(outcome.trees.iter().all(|(v, t)| t.contains(&ElementRef::class(v.id()))));
    }
}
