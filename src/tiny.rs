// src/tiny.rs

//! Reader for Tiny v2 mapping files.
//!
//! ```text
//! tiny	2	0	official	named
//! c	a	net/example/Foo
//! 	f	I	b	count
//! 	m	(I)V	c	tick
//! 		p	1		amount
//! ```
//!
//! The first header column is the source namespace; the rest become
//! destination names. Empty columns mean "no name".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::tree::{ElementRef, MappingContributor, MappingVisitor, MemberKey, Name, Record};
use crate::version::Version;

const ESCAPED_NAMES: &str = "escaped-names";

/// Parsed first line of a Tiny v2 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TinyHeader {
    pub minor: u32,
    pub source: Name,
    pub destinations: Vec<Name>,
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse { line, message: message.into() }
}

fn parse_header(line: &str) -> Result<TinyHeader> {
    let mut parts = line.split('\t');
    if parts.next() != Some("tiny") || parts.next() != Some("2") {
        return Err(parse_error(1, "not a tiny v2 file"));
    }
    let minor = parts
        .next()
        .and_then(|m| m.parse().ok())
        .ok_or_else(|| parse_error(1, "missing minor version"))?;
    let source: Name = parts.next().ok_or_else(|| parse_error(1, "missing source namespace"))?.into();
    let destinations = parts.map(Name::from).collect();
    Ok(TinyHeader { minor, source, destinations })
}

fn unescape(value: &str, line: usize) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(match chars.next() {
            Some('\\') => '\\',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('0') => '\0',
            other => return Err(parse_error(line, format!("invalid escape \\{}", other.unwrap_or(' ')))),
        });
    }
    Ok(out)
}

struct Reader<'v> {
    visitor: &'v mut dyn MappingVisitor,
    /// Tree namespace for each destination column, `None` if not wanted.
    columns: Vec<Option<Name>>,
    escaped: bool,
    class: Option<Name>,
    method: Option<MemberKey>,
    records: usize,
}

impl Reader<'_> {
    fn name(&self, raw: &str, line: usize) -> Result<Name> {
        if self.escaped {
            Ok(unescape(raw, line)?.into())
        } else {
            Ok(raw.into())
        }
    }

    fn emit(&mut self, record: Record) -> Result<()> {
        self.records += 1;
        self.visitor.visit(record)
    }

    /// Declares `element`, then writes every non-empty wanted column.
    fn entry(&mut self, element: ElementRef, names: &[&str], line: usize) -> Result<()> {
        self.emit(Record::Element(element.clone()))?;
        for (column, raw) in names.iter().enumerate() {
            let Some(Some(namespace)) = self.columns.get(column).cloned() else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            let name = self.name(raw, line)?;
            self.emit(Record::DstName { element: element.clone(), namespace, name })?;
        }
        Ok(())
    }

    fn line(&mut self, number: usize, line: &str) -> Result<()> {
        let depth = line.bytes().take_while(|&b| b == b'\t').count();
        let parts: Vec<&str> = line[depth..].split('\t').collect();
        let tag = parts[0];

        match (depth, tag) {
            (0, "c") => {
                let src = parts.get(1).ok_or_else(|| parse_error(number, "class without a name"))?;
                let src = self.name(src, number)?;
                self.class = Some(src.clone());
                self.method = None;
                self.entry(ElementRef::Class(src), &parts[2..], number)
            }
            // Properties sit between the header and the first class.
            (1, key) if self.class.is_none() => {
                if key == ESCAPED_NAMES {
                    self.escaped = true;
                }
                let value = parts.get(1).copied().unwrap_or_default();
                self.emit(Record::Metadata { element: None, key: key.into(), value: value.into() })
            }
            (1, "f" | "m") => {
                let owner = self.class.clone().ok_or_else(|| parse_error(number, "member outside a class"))?;
                if parts.len() < 3 {
                    return Err(parse_error(number, "member needs a descriptor and a name"));
                }
                let key = MemberKey::new(self.name(parts[2], number)?, self.name(parts[1], number)?);
                let element = if tag == "f" {
                    self.method = None;
                    ElementRef::Field { owner, key }
                } else {
                    self.method = Some(key.clone());
                    ElementRef::Method { owner, key }
                };
                self.entry(element, &parts[3..], number)
            }
            (2, "p") => {
                let (Some(owner), Some(key)) = (self.class.clone(), self.method.clone()) else {
                    return Err(parse_error(number, "parameter outside a method"));
                };
                let lv_index = parts
                    .get(1)
                    .and_then(|i| i.parse::<u16>().ok())
                    .ok_or_else(|| parse_error(number, "invalid local variable index"))?;
                // Column 2 is the source name, which parameters do not have.
                let names = parts.get(3..).unwrap_or_default();
                self.entry(ElementRef::Param { owner, key, lv_index }, names, number)
            }
            // Comments and local variables.
            (1 | 2, "c" | "v") | (3.., _) => Ok(()),
            _ => Err(parse_error(number, format!("unexpected entry {tag:?} at depth {depth}"))),
        }
    }
}

/// Streams the records of a Tiny v2 document into `visitor`. The file must be
/// keyed on `source`; only the destination columns named in `wanted` are
/// kept. Returns the header and the number of records emitted.
pub fn read_tiny(
    text: &str,
    source: &str,
    wanted: &[Name],
    visitor: &mut dyn MappingVisitor,
) -> Result<(TinyHeader, usize)> {
    let mut lines = text.lines();
    let header = parse_header(lines.next().unwrap_or_default())?;
    if &*header.source != source {
        return Err(parse_error(1, format!("file is keyed on {}, expected {source}", header.source)));
    }
    let columns = header
        .destinations
        .iter()
        .map(|ns| wanted.contains(ns).then(|| ns.clone()))
        .collect();

    let mut reader = Reader { visitor, columns, escaped: false, class: None, method: None, records: 0 };
    for (i, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        reader.line(i + 2, line)?;
    }
    Ok((header, reader.records))
}

/// Contributor reading `<dir>/<version id>.tiny` for each version.
///
/// A version without a file contributes nothing. Files keyed on another
/// source namespace are rejected.
#[derive(Debug, Clone)]
pub struct TinyContributor {
    name: String,
    dir: PathBuf,
    source: Name,
    namespaces: Vec<Name>,
}

impl TinyContributor {
    pub fn new<I, S>(name: impl Into<String>, dir: impl Into<PathBuf>, source: impl Into<Name>, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        Self {
            name: name.into(),
            dir: dir.into(),
            source: source.into(),
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }

    pub fn path_for(&self, version: &Version) -> PathBuf {
        self.dir.join(format!("{}.tiny", version.id()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MappingContributor for TinyContributor {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespaces(&self) -> Vec<Name> {
        self.namespaces.clone()
    }

    fn contribute(&self, version: &Version, visitor: &mut dyn MappingVisitor) -> Result<()> {
        let path = self.path_for(version);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(contributor = %self.name, %version, path = %path.display(), "no mapping file");
                return Ok(());
            }
            Err(source) => return Err(Error::Io { path, source }),
        };
        let (header, records) = read_tiny(&text, &self.source, &self.namespaces, visitor)?;
        debug!(contributor = %self.name, %version, source = %header.source, records, "read tiny file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MappingTree;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "tiny\t2\t0\tofficial\tnamed\tother\n\
        \tescaped-names\n\
        c\ta\tnet/example/Foo\tIgnored\n\
        \tc\ta class comment\n\
        \tf\tI\tb\tcount\n\
        \tm\t(I)V\tc\ttick\n\
        \t\tp\t1\t\tamount\n\
        \t\t\tc\tparam comment\n\
        \tm\t()V\td\t\n\
        c\tb\tweird\\tname\n";

    fn tree() -> MappingTree {
        MappingTree::new("official", ["named"]).unwrap()
    }

    #[test]
    fn reads_classes_members_and_params() {
        let mut tree = tree();
        let (header, _) = read_tiny(SAMPLE, "official", &["named".into()], &mut tree).unwrap();
        let named = tree.namespace_id("named").unwrap();

        assert_eq!(header.source.as_ref(), "official");
        assert_eq!(header.destinations.len(), 2);
        assert_eq!(tree.name_of(&ElementRef::class("a"), named), Some("net/example/Foo"));
        assert_eq!(tree.name_of(&ElementRef::field("a", "b", "I"), named), Some("count"));
        assert_eq!(tree.name_of(&ElementRef::method("a", "c", "(I)V"), named), Some("tick"));
        assert_eq!(tree.name_of(&ElementRef::param("a", "c", "(I)V", 1), named), Some("amount"));
        assert!(tree.contains(&ElementRef::method("a", "d", "()V")));
        assert_eq!(tree.name_of(&ElementRef::method("a", "d", "()V"), named), None);
        assert_eq!(tree.name_of(&ElementRef::class("b"), named), Some("weird\tname"));
        assert_eq!(tree.metadata().get(ESCAPED_NAMES), Some(""));
    }

    #[test]
    fn unwanted_columns_are_skipped() {
        let mut tree = MappingTree::new("official", ["named", "other"]).unwrap();
        read_tiny(SAMPLE, "official", &["other".into()], &mut tree).unwrap();

        let named = tree.namespace_id("named").unwrap();
        let other = tree.namespace_id("other").unwrap();
        assert_eq!(tree.name_of(&ElementRef::class("a"), named), None);
        assert_eq!(tree.name_of(&ElementRef::class("a"), other), Some("Ignored"));
    }

    #[test]
    fn rejects_bad_input_with_line_numbers() {
        let mut tree = tree();
        assert!(matches!(
            read_tiny("tiny\t1\t0\tofficial", "official", &[], &mut tree),
            Err(Error::Parse { line: 1, .. })
        ));

        let member_first = "tiny\t2\t0\tofficial\tnamed\nc\ta\tA\n\t\tp\t1\t\tx\n";
        assert!(matches!(
            read_tiny(member_first, "official", &["named".into()], &mut tree),
            Err(Error::Parse { line: 3, .. })
        ));

        let bad_index = "tiny\t2\t0\tofficial\tnamed\nc\ta\tA\n\tm\t()V\tb\tc\n\t\tp\tx\t\ty\n";
        assert!(matches!(
            read_tiny(bad_index, "official", &["named".into()], &mut tree),
            Err(Error::Parse { line: 4, .. })
        ));
    }

    #[test]
    fn files_keyed_on_another_source_are_rejected() {
        let mut tree = tree();
        let intermediary = "tiny\t2\t0\tintermediary\tnamed\nc\tclass_1\tFoo\n";

        assert!(matches!(
            read_tiny(intermediary, "official", &["named".into()], &mut tree),
            Err(Error::Parse { line: 1, message }) if message.contains("intermediary")
        ));
        assert_eq!(tree.class_count(), 0);
    }

    #[test]
    fn missing_file_contributes_nothing() {
        let contributor = TinyContributor::new("yarn", "/nonexistent/mappings", "official", ["named"]);
        let mut tree = tree();

        contributor.contribute(&Version::from_timestamp("1.0", 0), &mut tree).unwrap();

        assert_eq!(tree.class_count(), 0);
        assert!(contributor.path_for(&Version::from_timestamp("1.0", 0)).ends_with("1.0.tiny"));
    }
}
