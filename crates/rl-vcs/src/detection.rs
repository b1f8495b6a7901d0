use crate::backend::{VcsError, VcsType};
use std::path::{Path, PathBuf};

/// Walks up from `start` until a directory holding `.git` is found.
pub fn find_repo_root(start: &Path) -> Result<(PathBuf, VcsType), VcsError> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Ok((dir.to_path_buf(), VcsType::Git));
        }
        current = dir.parent();
    }
    Err(VcsError::RepoNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_root_from_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (root, vcs) = find_repo_root(&nested).unwrap();
        assert_eq!(root, dir.path());
        assert_eq!(vcs, VcsType::Git);
    }
}
