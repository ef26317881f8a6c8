// src/ancestry/index.rs

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::ancestry::AncestryTree;
use crate::error::{Error, Result};
use crate::version::VersionedTrees;

impl AncestryTree {
    /// Gives node `i` the index `start + i` and writes it as the name of every
    /// element of that node in `namespace`. Returns the next free index.
    ///
    /// The namespace is appended to trees that lack it, which fails for
    /// fixed trees.
    pub fn assign_indices(&self, trees: &mut VersionedTrees, namespace: &str, start: u64) -> Result<u64> {
        // 1. Every covered tree must accept the namespace before any is changed
        for version in self.versions() {
            match trees.get(version) {
                Some(tree) if tree.find_namespace(namespace).is_none() && !tree.is_extensible() => {
                    return Err(Error::NamespaceAdditionUnsupported(namespace.to_string()));
                }
                Some(_) => {}
                None => warn!(%version, "no tree for version, its entries get no index"),
            }
        }
        for version in self.versions() {
            if let Some(tree) = trees.get_mut(version) {
                tree.ensure_namespace(namespace)?;
            }
        }

        // 2. Write the indices node by node
        let mut written = 0usize;
        for (offset, node) in self.nodes().iter().enumerate() {
            let index = (start + offset as u64).to_string();
            for (version, element) in node.entries() {
                let Some(tree) = trees.get_mut(version) else {
                    continue;
                };
                let ns = tree.ensure_namespace(namespace)?;
                if tree.contains(element) {
                    tree.set_name(element, ns, index.as_str())?;
                    written += 1;
                } else {
                    debug!(%version, %element, "element left the tree after linking");
                }
            }
        }

        debug!(kind = ?self.kind(), namespace, start, nodes = self.len(), written, "assigned ancestry indices");
        Ok(start + self.len() as u64)
    }

    /// Lowercase hex SHA-256 of the node count and the sorted version ids.
    ///
    /// Only the shape of the ancestry is hashed, so the result does not
    /// depend on which namespace produced each match.
    pub fn hash(&self) -> String {
        let mut ids: Vec<&str> = self.versions().iter().map(|v| v.id()).collect();
        ids.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update((self.len() as u64).to_le_bytes());
        for id in ids {
            hasher.update(id.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}
