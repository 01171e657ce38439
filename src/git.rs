use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::error::Error;

/// Run `git <args>` inside `repo` and return its stdout.
///
/// This uses the system git command, so SSH keys, credential helpers and
/// anything else configured in ~/.gitconfig apply as usual.
pub fn run_git(repo: &Path, args: &[&str]) -> Result<String, Error> {
    let command = args.join(" ");
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .map_err(|e| Error::GitCommand {
            command: command.clone(),
            repo: repo.display().to_string(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Authentication problems are the most common reason for fetch failures
        let stderr = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Make sure you have access to the repository.\n\
                Error: {}",
                stderr.trim()
            )
        } else {
            stderr.trim().to_string()
        };

        return Err(Error::GitCommand {
            command,
            repo: repo.display().to_string(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Create `repo` if needed and initialize it unless it already is a repository.
pub fn init(repo: &Path) -> Result<(), Error> {
    if !repo.exists() {
        fs::create_dir_all(repo)?;
    }
    if !repo.join(".git").exists() {
        run_git(repo, &["init", "--quiet"])?;
    }
    Ok(())
}

/// Create or reset the local `branch` and check it out.
pub fn checkout_branch(repo: &Path, branch: &str) -> Result<(), Error> {
    run_git(repo, &["checkout", "--quiet", "-B", branch])?;
    Ok(())
}

/// Configured remotes as `name -> fetch url`.
pub fn remotes(repo: &Path) -> Result<BTreeMap<String, String>, Error> {
    let stdout = run_git(repo, &["remote", "-v"])?;
    Ok(parse_remotes(&stdout))
}

fn parse_remotes(stdout: &str) -> BTreeMap<String, String> {
    // Format: <name>\t<url> (fetch|push)
    stdout
        .lines()
        .filter(|line| line.ends_with("(fetch)"))
        .filter_map(|line| {
            let (name, rest) = line.split_once('\t')?;
            let url = rest.rsplit_once(' ').map(|(url, _)| url).unwrap_or(rest);
            Some((name.to_string(), url.to_string()))
        })
        .collect()
}

/// Add `name`, or point it at `url` if it exists with another url.
pub fn set_remote(
    repo: &Path,
    existing: &BTreeMap<String, String>,
    name: &str,
    url: &str,
) -> Result<(), Error> {
    match existing.get(name) {
        Some(current) if current == url => Ok(()),
        Some(_) => run_git(repo, &["remote", "set-url", name, url]).map(|_| ()),
        None => run_git(repo, &["remote", "add", name, url]).map(|_| ()),
    }
}

/// Fetch `reference` from `remote` into FETCH_HEAD.
pub fn fetch(repo: &Path, remote: &str, reference: &str, depth: Option<u64>) -> Result<(), Error> {
    let depth = depth.map(|d| format!("--depth={}", d));
    let mut args = vec!["fetch", "--quiet"];
    if let Some(depth) = depth.as_deref() {
        args.push(depth);
    }
    args.extend([remote, reference]);
    run_git(repo, &args)?;
    Ok(())
}

/// Whether the working tree has uncommitted changes.
pub fn is_dirty(repo: &Path) -> Result<bool, Error> {
    let stdout = run_git(repo, &["status", "--porcelain", "--untracked-files=no"])?;
    Ok(!stdout.trim().is_empty())
}

/// Stash local changes.
pub fn stash(repo: &Path) -> Result<(), Error> {
    run_git(repo, &["stash", "--quiet"])?;
    Ok(())
}

pub fn reset_hard(repo: &Path, reference: &str) -> Result<(), Error> {
    run_git(repo, &["reset", "--quiet", "--hard", reference])?;
    Ok(())
}

/// Merge the last fetched head into the current branch.
pub fn merge_fetch_head(repo: &Path) -> Result<(), Error> {
    run_git(repo, &["merge", "--quiet", "--no-edit", "FETCH_HEAD"])?;
    Ok(())
}

/// Heads of every local and remote-tracking branch as `refname -> sha`.
pub fn branch_heads(repo: &Path) -> Result<BTreeMap<String, String>, Error> {
    let stdout = run_git(
        repo,
        &["branch", "-va", "--format=%(refname) %(objectname)"],
    )?;
    Ok(parse_branch_heads(&stdout))
}

fn parse_branch_heads(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| {
            let (refname, sha) = line.trim().split_once(' ')?;
            if sha.is_empty() {
                return None;
            }
            Some((refname.to_string(), sha.to_string()))
        })
        .collect()
}

/// Run a shell hook with `sh -c` inside `repo`.
pub fn run_shell(repo: &Path, command: &str) -> Result<(), Error> {
    let status = Command::new("sh")
        .args(["-c", command])
        .current_dir(repo)
        .status()
        .map_err(|e| Error::ShellCommand {
            command: command.to_string(),
            repo: repo.display().to_string(),
            message: e.to_string(),
        })?;

    if !status.success() {
        return Err(Error::ShellCommand {
            command: command.to_string(),
            repo: repo.display().to_string(),
            message: status.to_string(),
        });
    }
    Ok(())
}
