//! # Odoo Bootstrap Library
//!
//! This library assembles a multi-repository Odoo project from one layered
//! YAML configuration. It is used by the `odoo-bootstrap` command-line tool
//! but can be embedded wherever the resolved configuration or the repository
//! synchronization is needed.
//!
//! ## Quick Example
//!
//! ```
//! use odoo_bootstrap::environment::Environment;
//! use odoo_bootstrap::resolve::EnvVars;
//! use odoo_bootstrap::tree::Node;
//!
//! let tree = odoo_bootstrap::config::parse(
//!     r#"
//! bootstrap:
//!   mode: dev
//! odoo:
//!   options:
//!     db_name: ${bootstrap:mode}_db
//! "#,
//!     "inline",
//! )
//! .unwrap();
//!
//! let env = Environment::from_tree(tree, "/srv/project", EnvVars::new()).unwrap();
//! assert_eq!(env.opt("db_name"), Some(&Node::from("dev_db")));
//! ```
//!
//! ## Pipeline
//!
//! Data flows strictly downward, and each step produces a new value:
//!
//! 1. **Loading (`config`)**: read a document and its `bootstrap:extend`
//!    chain, merging parents first (`merge`), then the optional pin overlay.
//! 2. **Resolution (`resolve`)**: overlay environment variables, substitute
//!    `${a:b}` placeholders and collect the addon paths.
//! 3. **Planning (`planner`)**: turn every `repos` entry into a `RepoSpec`.
//! 4. **Aggregation (`aggregate`)**: synchronize the planned repositories on a
//!    bounded worker pool through a `repository::RepoSync` implementation,
//!    collecting failures per repository.
//!
//! `environment` wraps these steps. `odoo_config` and `freeze` produce the
//! server configuration file and the repository pins from a resolved tree.

pub mod aggregate;
pub mod config;
pub mod environment;
pub mod error;
pub mod freeze;
pub mod git;
pub mod hooks;
pub mod merge;
pub mod odoo_config;
pub mod output;
pub mod path;
pub mod planner;
pub mod repository;
pub mod resolve;
pub mod tree;

#[cfg(test)]
mod merge_proptest;
