// src/main.rs

mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Args;
use indicatif::ProgressBar;
use std::time::Instant;
use tracing::Level;

use mapping_ancestry::adapter::NameInterner;
use mapping_ancestry::ancestry::build_full_ancestry;
use mapping_ancestry::builder::{CompleteOverrides, RemoveNonExistent, RemoveSynthetics};
use mapping_ancestry::pipeline::build_trees;
use mapping_ancestry::tiny::TinyContributor;
use mapping_ancestry::{AdapterChain, AnalyzerConfig, AncestryConfig, MappingAnalyzer, TreeBuilder};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .init();

    let start_time = Instant::now();

    // 1. Configuration
    let display: Vec<&str> = args.namespaces.iter().map(String::as_str).collect();
    let ancestry_config = AncestryConfig::new(args.allowed_namespaces().iter().cloned());
    ancestry_config.validate(&display).context("invalid ancestry configuration")?;

    let mut builder = TreeBuilder::new(args.source.as_str(), args.namespaces.iter().map(String::as_str))
        .adapters(|| AdapterChain::new().with(NameInterner::new()));
    for (name, dir) in &args.mappings {
        let namespaces = args.namespaces.iter().map(String::as_str);
        builder = builder.contributor(TinyContributor::new(name.as_str(), dir, args.source.as_str(), namespaces));
    }
    if args.require_access {
        builder = builder.hook(RemoveNonExistent);
    }
    if args.remove_synthetics {
        builder = builder.hook(RemoveSynthetics);
    }
    if args.complete_overrides {
        builder = builder.hook(CompleteOverrides::default());
    }

    // 2. Per-version trees
    let bar = ProgressBar::new(args.versions.len() as u64);
    let outcome = build_trees(&builder, &args.versions, bar);
    for (version, err) in &outcome.failures {
        eprintln!("Skipping {}: {}", version, err);
    }
    let mut trees = outcome.trees;
    if trees.is_empty() {
        bail!("no version could be built");
    }
    println!(
        "Built {} trees in {:.2?} from {} mapping sets.",
        trees.len(),
        start_time.elapsed(),
        builder.contributor_count()
    );

    // 3. Analysis
    let analyzer_config = AnalyzerConfig {
        detect_non_existent: args.require_access,
        detect_synthetics: args.remove_synthetics,
        ..AnalyzerConfig::default()
    }
    .exempt(args.exempt.iter().cloned());
    let analyzer = MappingAnalyzer::new(analyzer_config);
    let mut resolved = 0;
    for tree in trees.values_mut() {
        analyzer.accept(tree);
        resolved += analyzer.accept_all_resolutions(tree)?.len();
    }
    println!("Resolved {} problems.", resolved);

    // 4. Ancestry
    let ancestry_start = Instant::now();
    let ancestry = build_full_ancestry(&trees, &ancestry_config);
    let members: usize = ancestry.members.iter().map(|m| m.fields.len() + m.methods.len()).sum();
    let removed = match ancestry.classes.latest() {
        Some(latest) => ancestry.classes.nodes().iter().filter(|n| n.removed_after(latest).is_some()).count(),
        None => 0,
    };
    println!(
        "Linked {} classes ({} removed before the latest version) and {} members in {:.2?}.",
        ancestry.classes.len(),
        removed,
        members,
        ancestry_start.elapsed()
    );
    println!("Class ancestry hash: {}", ancestry.classes.hash());

    // 5. Indices
    if let Some(namespace) = &args.index_namespace {
        let mut next = ancestry.classes.assign_indices(&mut trees, namespace, args.index_start)?;
        for lineage in &ancestry.members {
            next = lineage.fields.assign_indices(&mut trees, namespace, next)?;
            next = lineage.methods.assign_indices(&mut trees, namespace, next)?;
        }
        println!("Assigned indices {}..{} in namespace {}.", args.index_start, next, namespace);
    }

    println!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}
