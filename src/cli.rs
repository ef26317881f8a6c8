// src/cli.rs

use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

use mapping_ancestry::Version;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Mapping set as NAME=DIR; DIR holds one `<version>.tiny` file per version
    #[arg(short, long = "mappings", value_parser = parse_mapping_set, required = true)]
    pub mappings: Vec<(String, PathBuf)>,

    /// Release to load as ID@RFC3339, e.g. 1.20@2023-06-07T09:00:00Z
    #[arg(short = 'r', long = "release", value_parser = parse_version, required = true)]
    pub versions: Vec<Version>,

    /// Source (obfuscated) namespace of every tree
    #[arg(long, default_value = "official")]
    pub source: String,

    /// Destination namespaces, in display preference order
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub namespaces: Vec<String>,

    /// Namespaces used to link elements across versions; defaults to --namespaces
    #[arg(short, long, value_delimiter = ',')]
    pub allowed: Vec<String>,

    /// Namespaces skipped by the inheritance checks
    #[arg(long, value_delimiter = ',')]
    pub exempt: Vec<String>,

    /// Write ancestry indices into this namespace
    #[arg(long)]
    pub index_namespace: Option<String>,

    /// First index handed out
    #[arg(long, default_value_t = 0)]
    pub index_start: u64,

    /// Drop elements without access flags (needs a source that provides them)
    #[arg(long)]
    pub require_access: bool,

    /// Drop synthetic elements
    #[arg(long)]
    pub remove_synthetics: bool,

    /// Propagate supertype method names onto unnamed overrides; needs the
    /// superclass and interfaces columns among --namespaces
    #[arg(long)]
    pub complete_overrides: bool,

    /// Log every step
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn allowed_namespaces(&self) -> &[String] {
        if self.allowed.is_empty() {
            &self.namespaces
        } else {
            &self.allowed
        }
    }
}

fn parse_mapping_set(value: &str) -> Result<(String, PathBuf), String> {
    let (name, dir) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=DIR, got {value:?}"))?;
    if name.is_empty() {
        return Err("mapping set name is empty".to_string());
    }
    Ok((name.to_string(), PathBuf::from(dir)))
}

fn parse_version(value: &str) -> Result<Version, String> {
    let (id, released) = value
        .rsplit_once('@')
        .ok_or_else(|| format!("expected ID@RFC3339, got {value:?}"))?;
    let released = DateTime::parse_from_rfc3339(released).map_err(|e| format!("bad release time: {e}"))?;
    Ok(Version::new(id, released.with_timezone(&Utc)))
}
