use crate::backend::{ChangeKind, ChangedFile, VcsBackend, VcsError};
use crate::detection::find_repo_root;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::UNIX_EPOCH;

const FALLBACK_DEFAULT_BRANCHES: [&str; 2] = ["main", "master"];

pub struct GitBackend;

impl VcsBackend for GitBackend {
    fn repo_root(path: &Path) -> Result<PathBuf, VcsError> {
        find_repo_root(path).map(|(root, _)| root)
    }

    fn current_branch(repo_path: &Path) -> Result<String, VcsError> {
        let repo = open_repo(repo_path)?;
        let head = repo.head_name().map_err(map_backend_error("head name"))?;
        // Detached HEAD has no symbolic name.
        Ok(head.map_or_else(|| "HEAD".to_string(), |name| name.shorten().to_string()))
    }

    fn default_branch(repo_path: &Path) -> Result<String, VcsError> {
        if let Ok(remote_head) = run_git(
            repo_path,
            &["symbolic-ref", "--quiet", "--short", "refs/remotes/origin/HEAD"],
        ) {
            let name = remote_head.trim();
            if let Some(branch) = name.strip_prefix("origin/") {
                return Ok(branch.to_string());
            }
        }
        let repo = open_repo(repo_path)?;
        for candidate in FALLBACK_DEFAULT_BRANCHES {
            if repo.find_reference(&ref_full_name(candidate)).is_ok() {
                return Ok(candidate.to_string());
            }
        }
        Self::current_branch(repo_path)
    }

    fn merge_base(repo_path: &Path, reference: &str) -> Result<String, VcsError> {
        let output = run_git(repo_path, &["merge-base", "HEAD", reference]).map_err(|err| {
            match err {
                VcsError::CommandFailed { .. } => VcsError::RefNotFound {
                    name: reference.to_string(),
                },
                other => other,
            }
        })?;
        Ok(output.trim().to_string())
    }

    fn changed_files(repo_path: &Path, base: &str) -> Result<Vec<ChangedFile>, VcsError> {
        let tracked = run_git(repo_path, &["diff", "--name-status", "--no-renames", base])?;
        let mut files = parse_name_status(&tracked);
        let untracked = run_git(repo_path, &["ls-files", "--others", "--exclude-standard"])?;
        for path in untracked.lines().filter(|line| !line.is_empty()) {
            if files.iter().any(|file| file.path == path) {
                continue;
            }
            files.push(ChangedFile {
                path: path.to_string(),
                kind: ChangeKind::Untracked,
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn diff_unified(repo_path: &Path, path: &str, base: &str) -> Result<String, VcsError> {
        run_git(
            repo_path,
            &["diff", "--no-color", "--no-ext-diff", base, "--", path],
        )
        .map_err(|err| VcsError::DiffFailed {
            reason: err.to_string(),
        })
    }

    fn fingerprint(repo_path: &Path) -> Result<String, VcsError> {
        let status = run_git(repo_path, &["status", "--porcelain=v1", "--untracked-files=all"])?;
        let head = run_git(repo_path, &["rev-parse", "--verify", "--quiet", "HEAD"])
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(head.trim().as_bytes());
        for line in status.lines() {
            hasher.update(line.as_bytes());
            // Porcelain only says a file is dirty; size and mtime catch repeated edits.
            if let Some(path) = porcelain_path(line) {
                if let Ok(meta) = std::fs::metadata(repo_path.join(path)) {
                    hasher.update(meta.len().to_le_bytes());
                    let modified = meta
                        .modified()
                        .ok()
                        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                        .map_or(0, |elapsed| elapsed.as_nanos());
                    hasher.update(modified.to_le_bytes());
                }
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn open_repo(repo_path: &Path) -> Result<gix::Repository, VcsError> {
    gix::open(repo_path).map_err(|_| VcsError::RepoNotFound)
}

fn ref_full_name(name: &str) -> String {
    format!("refs/heads/{name}")
}

fn map_backend_error<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> VcsError {
    move |err| VcsError::BackendError {
        reason: format!("{context}: {err}"),
    }
}

fn run_git(repo_path: &Path, args: &[&str]) -> Result<String, VcsError> {
    tracing::trace!(?args, "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .map_err(|err| VcsError::CommandFailed {
            args: args.join(" "),
            reason: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(VcsError::CommandFailed {
            args: args.join(" "),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `git diff --name-status` output. Unknown status letters are
/// reported as modifications.
pub fn parse_name_status(output: &str) -> Vec<ChangedFile> {
    output
        .lines()
        .filter_map(|line| {
            let (status, path) = line.split_once('\t')?;
            let kind = match status.chars().next()? {
                'A' => ChangeKind::Added,
                'D' => ChangeKind::Deleted,
                _ => ChangeKind::Modified,
            };
            Some(ChangedFile {
                path: path.trim().to_string(),
                kind,
            })
        })
        .collect()
}

fn porcelain_path(line: &str) -> Option<&str> {
    let path = line.get(3..)?;
    // Renames are reported as "old -> new".
    Some(path.rsplit(" -> ").next().unwrap_or(path).trim_matches('"'))
}
