//! Generation of the Odoo server configuration file.
//!
//! Every key of `odoo:options` becomes one INI entry, in key order. Keys of
//! the form `section.key` go to `[section]`, all others to `[options]`.
//! `load_language` is consumed by the database setup and never written.

use std::fs;
use std::path::Path;

use ini::Ini;
use log::info;

use crate::error::{Error, Result};
use crate::tree::Node;

/// Location of the generated file, relative to the project root.
pub const ODOO_CONFIG: &str = "etc/odoo.cfg";

const DEFAULT_SECTION: &str = "options";
const SKIPPED_OPTIONS: [&str; 1] = ["load_language"];

/// Build the INI document for a resolved tree.
pub fn render(tree: &Node) -> Result<Ini> {
    let mut ini = Ini::new();
    let options = match tree.get(&["odoo", "options"]) {
        None => return Ok(ini),
        Some(node) if node.is_null() => return Ok(ini),
        Some(Node::Mapping(options)) => options,
        Some(other) => {
            return Err(Error::ConfigSyntax {
                message: format!("odoo:options must be a mapping, found {}", other.kind()),
                hint: None,
            })
        }
    };

    for (key, value) in options {
        if SKIPPED_OPTIONS.contains(&key.as_str()) {
            continue;
        }
        let (section, key) = key.split_once('.').unwrap_or((DEFAULT_SECTION, key.as_str()));
        ini.with_section(Some(section)).set(key, value.render());
    }
    Ok(ini)
}

/// Write the configuration file for `tree` to `path`.
pub fn write(tree: &Node, path: &Path) -> Result<()> {
    info!("Generating configuration file {}", path.display());
    let ini = render(tree)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    ini.write_to_file(path)?;
    Ok(())
}
