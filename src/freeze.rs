//! Repository pinning.
//!
//! `freeze` records, for every repository, the commit each merge target
//! currently points to. The result has the shape of a configuration overlay:
//!
//! ```yaml
//! repos:
//!   odoo:
//!     merges:
//!     - origin 4f1c0a7...
//! ```
//!
//! Loaded on top of the project configuration, it makes later `init` runs
//! reproduce exactly those commits.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::error::Result;
use crate::merge::MERGES_KEY;
use crate::path::absolutize;
use crate::repository::RefQuery;
use crate::tree::{Mapping, Node, Scalar};

/// What to do when the pin file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FreezeMode {
    /// Overwrite.
    All,
    /// Ask for confirmation.
    #[default]
    Ask,
    /// Keep the existing file.
    Skip,
}

/// Merge targets of one entry as `(remote, ref)` pairs.
fn merge_pairs(merges: &Node) -> Vec<(String, String)> {
    let Some(items) = merges.as_sequence() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Node::Scalar(Scalar::String(text)) => {
                let (remote, reference) = text.trim().split_once(char::is_whitespace)?;
                Some((remote.to_string(), reference.trim().to_string()))
            }
            Node::Mapping(map) => Some((
                map.get("remote")?.as_str()?.to_string(),
                map.get("ref")?.render(),
            )),
            _ => None,
        })
        .collect()
}

/// Build the pin overlay for every repository in `tree`.
///
/// Returns `None` when no merge target of any repository could be pinned.
pub fn collect_pins(tree: &Node, root: &Path, refs: &dyn RefQuery) -> Result<Option<Node>> {
    let version = tree
        .get(&["bootstrap", "version"])
        .filter(|node| !node.is_null())
        .map(Node::render)
        .unwrap_or_else(|| "0.0".to_string());
    let default_merges = tree
        .get(&["bootstrap", "repo", MERGES_KEY])
        .cloned()
        .unwrap_or_else(|| Node::Sequence(vec![Node::from(format!("origin {}", version))]));

    let Some(repos) = tree.get(&["repos"]).and_then(Node::as_mapping) else {
        return Ok(None);
    };

    let mut pinned = Mapping::new();
    for (key, entry) in repos {
        let path = absolutize(root, key);
        if !path.join(".git").exists() {
            warn!("{} is not a git repository, not freezing it", path.display());
            continue;
        }

        let heads = refs.branch_heads(&path)?;
        let merges = entry.get(&[MERGES_KEY]).unwrap_or(&default_merges);
        let pins: Vec<Node> = merge_pairs(merges)
            .into_iter()
            .filter_map(|(remote, reference)| {
                let name = format!("refs/remotes/{}/{}", remote, reference);
                heads
                    .get(&name)
                    .map(|sha| Node::from(format!("{} {}", remote, sha)))
            })
            .collect();

        if !pins.is_empty() {
            let mut repo = Mapping::new();
            repo.insert(MERGES_KEY.to_string(), Node::Sequence(pins));
            pinned.insert(key.clone(), Node::Mapping(repo));
        }
    }

    if pinned.is_empty() {
        return Ok(None);
    }
    let mut overlay = Node::mapping();
    overlay.set(&["repos"], Node::Mapping(pinned));
    Ok(Some(overlay))
}

/// Decide whether `file` should be (over)written.
///
/// A missing file is always written. `confirm` is only consulted in
/// [`FreezeMode::Ask`].
pub fn should_write<F>(file: &Path, mode: FreezeMode, confirm: F) -> bool
where
    F: FnOnce(&Path) -> bool,
{
    if !file.exists() {
        return true;
    }
    match mode {
        FreezeMode::All => true,
        FreezeMode::Skip => false,
        FreezeMode::Ask => confirm(file),
    }
}

/// Write the pin overlay as YAML.
pub fn write_pins(file: &Path, pins: &Node) -> Result<()> {
    info!("Freezing repositories into {}", file.display());
    fs::write(file, serde_yaml::to_string(pins)?)?;
    Ok(())
}
