//! Where review files come from.
//!
//! A session is bound to exactly one [`ChangeSource`] for its lifetime:
//! either a fixed list of files given on the command line, or the changed
//! files of a version-controlled working tree.

use crate::error::SourceError;
use crate::hunks::{parse_unified_diff, whole_file_hunk};
use crate::types::{DiffHunk, FileStatus, SessionMode};
use rl_vcs::backend::VcsBackend;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    "venv",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "pdf", "zip", "gz", "tgz", "tar",
    "bz2", "xz", "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "wasm",
    "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "mov", "avi", "webm", "sqlite", "db",
    "bin",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub abs_path: PathBuf,
    pub status: FileStatus,
}

pub trait ChangeSource: Send + Sync {
    fn mode(&self) -> SessionMode;
    fn branch(&self) -> &str;
    fn base_ref(&self) -> &str;

    fn list_files(&self) -> Result<Vec<SourceFile>, SourceError>;

    fn read_content(&self, file: &SourceFile) -> Result<String, SourceError> {
        if file.status == FileStatus::Deleted {
            return Ok(String::new());
        }
        std::fs::read_to_string(&file.abs_path).map_err(|err| SourceError::ReadFailed {
            path: file.path.clone(),
            reason: err.to_string(),
        })
    }

    fn diff_hunks(&self, file: &SourceFile, content: &str) -> Result<Vec<DiffHunk>, SourceError>;

    /// Cheap summary of the whole tree, or `None` when changes have to be
    /// detected file by file.
    fn fingerprint(&self) -> Result<Option<String>, SourceError>;

    /// Whether the file list is re-queried at every round transition.
    fn rediscovers(&self) -> bool {
        self.mode() == SessionMode::Git
    }
}

pub fn is_reviewable(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if name.ends_with(".min.js") || name.ends_with(".min.css") {
        return false;
    }
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    !BINARY_EXTENSIONS.contains(&ext.as_str())
}

fn is_skipped_entry(name: &str, is_dir: bool) -> bool {
    name.starts_with('.') || (is_dir && SKIPPED_DIRS.contains(&name))
}

/// Files named explicitly on the command line. Directories are expanded.
pub struct ExplicitSource {
    root: PathBuf,
    inputs: Vec<PathBuf>,
}

impl ExplicitSource {
    pub fn new(root: impl Into<PathBuf>, inputs: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inputs,
        }
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl ChangeSource for ExplicitSource {
    fn mode(&self) -> SessionMode {
        SessionMode::Files
    }

    fn branch(&self) -> &str {
        ""
    }

    fn base_ref(&self) -> &str {
        ""
    }

    fn list_files(&self) -> Result<Vec<SourceFile>, SourceError> {
        let mut paths = Vec::new();
        for input in &self.inputs {
            let abs = if input.is_absolute() {
                input.clone()
            } else {
                self.root.join(input)
            };
            if abs.is_dir() {
                collect_dir(&abs, &mut paths).map_err(|err| SourceError::ReadFailed {
                    path: abs.display().to_string(),
                    reason: err.to_string(),
                })?;
            } else if abs.is_file() {
                paths.push(abs);
            } else {
                return Err(SourceError::ReadFailed {
                    path: input.display().to_string(),
                    reason: "no such file or directory".to_string(),
                });
            }
        }
        paths.retain(|path| is_reviewable(path));
        paths.sort();
        paths.dedup();
        if paths.is_empty() {
            return Err(SourceError::NoFiles);
        }
        Ok(paths
            .into_iter()
            .map(|abs_path| SourceFile {
                path: self.relative(&abs_path),
                abs_path,
                status: FileStatus::Untracked,
            })
            .collect())
    }

    fn diff_hunks(&self, _file: &SourceFile, content: &str) -> Result<Vec<DiffHunk>, SourceError> {
        Ok(whole_file_hunk(content))
    }

    fn fingerprint(&self) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
}

fn collect_dir(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), std::io::Error> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        if is_skipped_entry(&name.to_string_lossy(), file_type.is_dir()) {
            continue;
        }
        if file_type.is_dir() {
            collect_dir(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Changed files of a working tree relative to a base revision.
///
/// Off the default branch the base is the merge-base with it; on the default
/// branch it is the last commit.
pub struct VcsSource<B> {
    root: PathBuf,
    branch: String,
    base_ref: String,
    _backend: PhantomData<fn() -> B>,
}

impl<B: VcsBackend> VcsSource<B> {
    pub fn detect(start: &Path) -> Result<Self, SourceError> {
        let root = B::repo_root(start)?;
        let branch = B::current_branch(&root)?;
        let default_branch = B::default_branch(&root).unwrap_or_else(|_| branch.clone());
        let base_ref = if branch == default_branch {
            "HEAD".to_string()
        } else {
            B::merge_base(&root, &default_branch)?
        };
        tracing::info!(%branch, %default_branch, %base_ref, "detected repository");
        Ok(Self {
            root,
            branch,
            base_ref,
            _backend: PhantomData,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl<B: VcsBackend> ChangeSource for VcsSource<B> {
    fn mode(&self) -> SessionMode {
        SessionMode::Git
    }

    fn branch(&self) -> &str {
        &self.branch
    }

    fn base_ref(&self) -> &str {
        &self.base_ref
    }

    fn list_files(&self) -> Result<Vec<SourceFile>, SourceError> {
        let changed = B::changed_files(&self.root, &self.base_ref)?;
        Ok(changed
            .into_iter()
            .filter(|file| is_reviewable(Path::new(&file.path)))
            .map(|file| SourceFile {
                abs_path: self.root.join(&file.path),
                path: file.path,
                status: file.kind.into(),
            })
            .collect())
    }

    fn diff_hunks(&self, file: &SourceFile, content: &str) -> Result<Vec<DiffHunk>, SourceError> {
        if file.status == FileStatus::Untracked {
            return Ok(whole_file_hunk(content));
        }
        let unified = B::diff_unified(&self.root, &file.path, &self.base_ref)?;
        Ok(parse_unified_diff(&unified))
    }

    fn fingerprint(&self) -> Result<Option<String>, SourceError> {
        Ok(Some(B::fingerprint(&self.root)?))
    }
}
