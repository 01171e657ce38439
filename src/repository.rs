//! # Repository Synchronization
//!
//! The orchestrator does not know how a repository is brought up to date. It
//! hands each [`AggregationJob`] to a [`RepoSync`] implementation and only
//! cares whether the call succeeded. Freezing works the same way through
//! [`RefQuery`].
//!
//! [`GitAggregator`] is the implementation used by the binary. It drives the
//! system `git` command through [`crate::git`]:
//!
//! 1. create and initialize the directory if it is missing
//! 2. check out the target branch (`checkout -B`)
//! 3. add or re-point every declared remote
//! 4. fetch the first merge target and hard-reset onto it
//! 5. fetch and merge every further merge target
//! 6. run the `shell_command_after` hooks
//!
//! A working tree with local changes is refused before the reset unless the
//! job is forced, in which case the changes are stashed first.
//!
//! Tests replace both traits with mocks so no real git runs.

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info};

use crate::aggregate::AggregationJob;
use crate::error::{Error, Result};
use crate::git;

/// Brings one repository in line with its [`RepoSpec`](crate::planner::RepoSpec).
pub trait RepoSync: Send + Sync {
    fn aggregate(&self, job: &AggregationJob) -> Result<()>;
}

/// Reads the branch heads of a local repository.
pub trait RefQuery {
    /// `refname -> sha` for every local and remote-tracking branch.
    fn branch_heads(&self, repo: &Path) -> Result<BTreeMap<String, String>>;
}

/// The default collaborator, backed by the system git command.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitAggregator;

impl RepoSync for GitAggregator {
    fn aggregate(&self, job: &AggregationJob) -> Result<()> {
        let spec = &job.spec;
        let repo = spec.path.as_path();
        info!("Aggregating {}", repo.display());

        git::init(repo)?;
        git::checkout_branch(repo, &spec.target.branch)?;

        let existing = git::remotes(repo)?;
        for remote in &spec.remotes {
            git::set_remote(repo, &existing, &remote.name, &remote.url)?;
        }

        let (first, rest) = match spec.merges.split_first() {
            Some(split) => split,
            None => {
                return Err(Error::RepoConfig {
                    repo: spec.key.clone(),
                    message: "no merges declared".to_string(),
                })
            }
        };

        debug!("{}: fetching {} {}", spec.key, first.remote, first.reference);
        git::fetch(repo, &first.remote, &first.reference, spec.depth)?;

        if git::is_dirty(repo)? {
            if !job.force {
                return Err(Error::DirtyWorkingTree {
                    repo: repo.display().to_string(),
                });
            }
            info!("Stashing local changes in {}", repo.display());
            git::stash(repo)?;
        }
        git::reset_hard(repo, "FETCH_HEAD")?;

        for merge in rest {
            debug!("{}: merging {} {}", spec.key, merge.remote, merge.reference);
            git::fetch(repo, &merge.remote, &merge.reference, spec.depth)?;
            git::merge_fetch_head(repo)?;
        }

        for command in &spec.shell_commands {
            debug!("{}: running `{}`", spec.key, command);
            git::run_shell(repo, command)?;
        }
        Ok(())
    }
}

impl RefQuery for GitAggregator {
    fn branch_heads(&self, repo: &Path) -> Result<BTreeMap<String, String>> {
        git::branch_heads(repo)
    }
}
