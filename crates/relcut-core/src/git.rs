//! Git operations for the release sequence.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! SSH keys, GPG signing, hooks, and other configuration.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed (exit {code}): {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "push").
        command: String,
        /// Process exit status, `-1` when killed by a signal.
        code: i32,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,

    /// No `git` executable on `PATH`.
    #[error("git executable not found on PATH")]
    NotInstalled,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Author identity applied to the repository before tagging and committing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Value for `user.name`.
    pub name: String,
    /// Value for `user.email`.
    pub email: String,
}

/// The version-control operations a release needs.
///
/// Every call is synchronous and returns only once the underlying command
/// has finished.
pub trait Vcs {
    /// `true` when tracked files have no staged or unstaged changes.
    fn is_clean(&self) -> GitResult<bool>;

    /// Set the identity used for the tag and commit.
    fn configure_identity(&self, identity: &Identity) -> GitResult<()>;

    /// Create an annotated tag at `HEAD`.
    fn create_tag(&self, name: &str, message: &str) -> GitResult<()>;

    /// Push a single tag to `remote`.
    fn push_tag(&self, remote: &str, name: &str) -> GitResult<()>;

    /// Stage one file.
    fn stage(&self, path: &Utf8Path) -> GitResult<()>;

    /// Commit staged changes, returning the short hash of the new commit.
    fn commit(&self, message: &str) -> GitResult<String>;

    /// Push the current branch to `remote`.
    fn push_branch(&self, remote: &str) -> GitResult<()>;
}

/// [`Vcs`] backed by the system `git` binary, run inside `root`.
#[derive(Debug, Clone)]
pub struct SystemGit {
    root: Utf8PathBuf,
}

impl SystemGit {
    /// Operate on the repository containing `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Like [`SystemGit::new`], but fail early when `git` is missing or
    /// `root` is not inside a work tree.
    #[instrument(skip_all, fields(root = %root.as_ref()))]
    pub fn discover(root: impl AsRef<Utf8Path>) -> GitResult<Self> {
        which::which("git").map_err(|_| GitError::NotInstalled)?;
        let git = Self::new(root.as_ref());
        if !git.is_inside_repo()? {
            return Err(GitError::NotARepo);
        }
        Ok(git)
    }

    /// The directory git commands run in.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Check if the root is inside a git work tree.
    #[instrument(skip(self))]
    pub fn is_inside_repo(&self) -> GitResult<bool> {
        match self.git(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => Ok(output.trim() == "true"),
            Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the URL of a named remote, `None` if it is not configured.
    #[instrument(skip(self))]
    pub fn remote_url(&self, remote: &str) -> GitResult<Option<String>> {
        match self.git(&["remote", "get-url", remote]) {
            Ok(url) => {
                let url = url.trim().to_string();
                debug!(%remote, %url, "remote URL");
                Ok(Some(url))
            }
            Err(GitError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether a tag with this name exists locally.
    #[instrument(skip(self))]
    pub fn tag_exists(&self, name: &str) -> GitResult<bool> {
        let output = self.git(&["tag", "--list", name])?;
        Ok(output.lines().any(|line| line.trim() == name))
    }

    /// Run a git command in the root directory and return its stdout.
    fn git(&self, args: &[&str]) -> GitResult<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root.as_std_path())
            .output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

            if stderr.contains("not a git repository") {
                return Err(GitError::NotARepo);
            }

            Err(GitError::Command {
                command: args.first().unwrap_or(&"").to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr,
            })
        }
    }
}

impl Vcs for SystemGit {
    #[instrument(skip(self))]
    fn is_clean(&self) -> GitResult<bool> {
        // Untracked files don't block a release; only tracked modifications do
        let output = self.git(&["status", "--porcelain", "--untracked-files=no"])?;
        let clean = output.trim().is_empty();
        debug!(clean, "working tree status");
        Ok(clean)
    }

    #[instrument(skip(self))]
    fn configure_identity(&self, identity: &Identity) -> GitResult<()> {
        self.git(&["config", "user.name", &identity.name])?;
        self.git(&["config", "user.email", &identity.email])?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    fn create_tag(&self, name: &str, message: &str) -> GitResult<()> {
        self.git(&["tag", "-a", name, "-m", message])?;
        debug!(%name, "created annotated tag");
        Ok(())
    }

    #[instrument(skip(self))]
    fn push_tag(&self, remote: &str, name: &str) -> GitResult<()> {
        let refspec = format!("refs/tags/{name}");
        self.git(&["push", remote, &refspec])?;
        debug!(%remote, %name, "pushed tag");
        Ok(())
    }

    #[instrument(skip(self))]
    fn stage(&self, path: &Utf8Path) -> GitResult<()> {
        self.git(&["add", "--", path.as_str()])?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    fn commit(&self, message: &str) -> GitResult<String> {
        self.git(&["commit", "-m", message])?;
        let hash = self.git(&["rev-parse", "--short", "HEAD"])?.trim().to_string();
        debug!(%hash, "committed");
        Ok(hash)
    }

    #[instrument(skip(self))]
    fn push_branch(&self, remote: &str) -> GitResult<()> {
        self.git(&["push", remote, "HEAD"])?;
        debug!(%remote, "pushed branch");
        Ok(())
    }
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
/// - `ssh://git@github.com/owner/repo.git`
///
/// Returns `None` if the URL cannot be parsed.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn has_git() -> bool {
        which::which("git").is_ok()
    }

    /// Run git in `dir` with a throwaway identity.
    fn run(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo() -> (TempDir, SystemGit) {
        let tmp = TempDir::new().unwrap();
        run(tmp.path(), &["init", "--quiet"]);
        fs::write(tmp.path().join("README.md"), "hello\n").unwrap();
        run(tmp.path(), &["add", "."]);
        run(tmp.path(), &["commit", "--quiet", "-m", "init"]);
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        (tmp, SystemGit::new(root))
    }

    #[test]
    fn outside_repo_is_not_inside() {
        if !has_git() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        assert!(!SystemGit::new(root).is_inside_repo().unwrap());
    }

    #[test]
    fn discover_rejects_non_repo() {
        if !has_git() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        assert!(matches!(
            SystemGit::discover(&root).unwrap_err(),
            GitError::NotARepo
        ));
    }

    #[test]
    fn clean_then_dirty() {
        if !has_git() {
            return;
        }
        let (tmp, git) = init_repo();
        assert!(git.is_clean().unwrap());

        // Untracked files are ignored
        fs::write(tmp.path().join("scratch.txt"), "x").unwrap();
        assert!(git.is_clean().unwrap());

        fs::write(tmp.path().join("README.md"), "changed\n").unwrap();
        assert!(!git.is_clean().unwrap());
    }

    #[test]
    fn tag_and_commit() {
        if !has_git() {
            return;
        }
        let (tmp, git) = init_repo();
        git.configure_identity(&Identity {
            name: "Release Bot".into(),
            email: "bot@example.com".into(),
        })
        .unwrap();

        git.create_tag("v0.1.0", "ci: Release version 0.1.0").unwrap();
        assert!(git.tag_exists("v0.1.0").unwrap());
        assert!(!git.tag_exists("v0.2.0").unwrap());

        fs::write(tmp.path().join("README.md"), "bumped\n").unwrap();
        git.stage(Utf8Path::new("README.md")).unwrap();
        let hash = git.commit("Bump version to 0.1.0").unwrap();
        assert!(!hash.is_empty());
        assert!(git.is_clean().unwrap());
    }

    #[test]
    fn duplicate_tag_fails_with_command_error() {
        if !has_git() {
            return;
        }
        let (_tmp, git) = init_repo();
        git.configure_identity(&Identity {
            name: "Release Bot".into(),
            email: "bot@example.com".into(),
        })
        .unwrap();
        git.create_tag("v1.0.0", "first").unwrap();
        let err = git.create_tag("v1.0.0", "again").unwrap_err();
        assert!(matches!(err, GitError::Command { ref command, .. } if command == "tag"));
    }

    #[test]
    fn push_without_remote_fails() {
        if !has_git() {
            return;
        }
        let (_tmp, git) = init_repo();
        assert!(git.push_branch("origin").is_err());
        assert_eq!(git.remote_url("origin").unwrap(), None);
    }

    #[test]
    fn parse_owner_repo_https() {
        let result = parse_owner_repo("https://github.com/claylo/relcut.git");
        assert_eq!(result, Some(("claylo".into(), "relcut".into())));
    }

    #[test]
    fn parse_owner_repo_https_no_suffix() {
        let result = parse_owner_repo("https://github.com/claylo/relcut");
        assert_eq!(result, Some(("claylo".into(), "relcut".into())));
    }

    #[test]
    fn parse_owner_repo_ssh() {
        let result = parse_owner_repo("git@github.com:claylo/relcut.git");
        assert_eq!(result, Some(("claylo".into(), "relcut".into())));
    }

    #[test]
    fn parse_owner_repo_ssh_scheme() {
        let result = parse_owner_repo("ssh://git@github.com/claylo/relcut.git");
        assert_eq!(result, Some(("claylo".into(), "relcut".into())));
    }

    #[test]
    fn parse_owner_repo_invalid() {
        assert!(parse_owner_repo("not-a-url").is_none());
        assert!(parse_owner_repo("").is_none());
        assert!(parse_owner_repo("https://github.com/only-owner").is_none());
    }
}
