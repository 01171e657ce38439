//! Shared test utilities for the CLI end-to-end tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_config(configs::MINIMAL);
//! fixture.command().arg("config").assert().success();
//! ```

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Project configurations used across tests.
#[allow(dead_code)]
pub mod configs {
    /// Options only, no repositories.
    pub const MINIMAL: &str = r#"
bootstrap:
  mode: dev
  version: "15.0"
odoo:
  version: "15.0"
  options:
    db_name: ${bootstrap:mode}_db
    http_port: 8069
    log_level: info
"#;

    /// Base document extended by [`LOCAL`].
    pub const BASE: &str = r#"
bootstrap:
  version: "14.0"
  repo:
    remotes:
      origin: https://example.com/odoo.git
    merges:
      - origin ${bootstrap:version}
repos:
  odoo:
    addon_path: odoo/addons
  oca/web: ~
"#;

    /// Local document extending `odoo.base.yaml`.
    pub const LOCAL: &str = r#"
bootstrap:
  extend: odoo.base.yaml
  mode: dev
odoo:
  options:
    db_name: local
repos:
  oca/web:
    merges:
      - origin feature
"#;

    /// Two documents extending each other.
    pub const CYCLE_A: &str = "bootstrap:\n  extend: odoo.b.yaml\n";
    pub const CYCLE_B: &str = "bootstrap:\n  extend: odoo.project.yaml\n";
}

/// A temporary project directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `odoo.project.yaml`.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file("odoo.project.yaml", content)
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("odoo.project.yaml")
    }

    /// The binary running in the fixture directory, isolated from the
    /// variables that would override the configuration.
    pub fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("odoo-bootstrap");
        cmd.current_dir(self.path())
            .env_remove("ODOO_VERSION")
            .env_remove("BOOTSTRAP_MODE")
            .env_remove("ODOO_DB_NAME")
            .env_remove("ODOO_BOOTSTRAP_CONFIG")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
