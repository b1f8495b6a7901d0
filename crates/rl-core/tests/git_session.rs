use rl_core::types::{DiffLineKind, FileStatus, NewComment, SessionMode};
use rl_core::watcher::PollState;
use rl_core::{Session, SessionConfig, VcsSource};
use rl_events::bus::EventBus;
use rl_vcs::git::GitBackend;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

const DOC: &str = "doc.md";

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

/// A repository on `main` with `files` committed.
fn repo(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "--quiet", "--initial-branch=main"]);
    git(dir.path(), &["config", "user.email", "reviewer@example.com"]);
    git(dir.path(), &["config", "user.name", "Reviewer"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);
    for (path, content) in files {
        std::fs::write(dir.path().join(path), content).unwrap();
    }
    git(dir.path(), &["add", "--all"]);
    git(dir.path(), &["commit", "--quiet", "-m", "initial"]);
    dir
}

fn open(dir: &TempDir) -> Arc<Session> {
    let source = VcsSource::<GitBackend>::detect(dir.path()).unwrap();
    let config = SessionConfig::new(source.root());
    Session::open(config, Box::new(source), EventBus::new()).unwrap()
}

fn comment(line: u32, body: &str) -> NewComment {
    NewComment {
        start_line: line,
        end_line: line,
        side: None,
        body: body.to_string(),
    }
}

fn reviewed_paths(session: &Session) -> Vec<String> {
    session
        .snapshot()
        .files
        .into_iter()
        .map(|file| file.path)
        .collect()
}

#[test]
fn test_git_session_reviews_working_tree_changes() {
    let dir = repo(&[(DOC, "one\ntwo\nthree\n"), ("keep.md", "same\n")]);
    std::fs::write(dir.path().join(DOC), "one\n2\nthree\n").unwrap();

    let session = open(&dir);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.mode, SessionMode::Git);
    assert_eq!(snapshot.branch, "main");
    assert_eq!(snapshot.base_ref, "HEAD");
    assert_eq!(reviewed_paths(&session), vec![DOC]);
    assert_eq!(snapshot.files[0].status, FileStatus::Modified);
    assert_eq!(
        (snapshot.files[0].additions, snapshot.files[0].deletions),
        (1, 1)
    );

    let view = session.file(DOC).unwrap();
    assert_eq!(view.diff_hunks.len(), 1);
    let hunk = &view.diff_hunks[0];
    assert_eq!((hunk.old_start, hunk.old_count), (1, 3));
    assert_eq!((hunk.new_start, hunk.new_count), (1, 3));
    let removed = hunk
        .lines
        .iter()
        .find(|line| line.kind == DiffLineKind::Del)
        .unwrap();
    assert_eq!((removed.content.as_str(), removed.old_num), ("two", 2));
    let added = hunk
        .lines
        .iter()
        .find(|line| line.kind == DiffLineKind::Add)
        .unwrap();
    assert_eq!((added.content.as_str(), added.new_num), ("2", 2));
}

#[test]
fn test_state_file_is_never_reviewed() {
    let dir = repo(&[(DOC, "intro\nbody\n")]);
    std::fs::write(dir.path().join(DOC), "intro\nbody\nmore\n").unwrap();
    let session = open(&dir);

    session.add_comment(DOC, comment(1, "r1")).unwrap();
    assert!(session.state_path().exists());
    session.complete_round().unwrap();
    assert_eq!(reviewed_paths(&session), vec![DOC]);

    let mut poll = PollState::default();
    assert_eq!(poll.check(&session), None);

    // Each comment rewrites the untracked state file. That must not count
    // as an edit, or the round-start snapshot is taken too early.
    session.add_comment(DOC, comment(2, "reviewer comment A")).unwrap();
    assert_eq!(poll.check(&session), None);
    session.add_comment(DOC, comment(3, "reviewer comment B")).unwrap();
    assert_eq!(poll.check(&session), None);
    assert_eq!(session.pending_edits(), 0);

    std::fs::write(dir.path().join(DOC), "title\nintro\nbody\nmore\n").unwrap();
    assert_eq!(poll.check(&session), Some(1));
    session.complete_round().unwrap();

    assert_eq!(reviewed_paths(&session), vec![DOC]);
    let carried = session.comments(DOC).unwrap();
    let bodies: Vec<&str> = carried.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["r1", "reviewer comment A", "reviewer comment B"]);
    let lines: Vec<u32> = carried.iter().map(|c| c.start_line).collect();
    assert_eq!(lines, vec![2, 3, 4]);
}

#[test]
fn test_transition_picks_up_new_and_deleted_files() {
    let dir = repo(&[(DOC, "a\nb\n"), ("old.md", "x\ny\n")]);
    std::fs::write(dir.path().join(DOC), "a\nb\nc\n").unwrap();
    let session = open(&dir);
    assert_eq!(reviewed_paths(&session), vec![DOC]);

    std::fs::write(dir.path().join("new.md"), "fresh\nfile\n").unwrap();
    std::fs::remove_file(dir.path().join("old.md")).unwrap();
    session.complete_round().unwrap();

    let snapshot = session.snapshot();
    let statuses: Vec<(&str, FileStatus)> = snapshot
        .files
        .iter()
        .map(|file| (file.path.as_str(), file.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (DOC, FileStatus::Modified),
            ("new.md", FileStatus::Untracked),
            ("old.md", FileStatus::Deleted),
        ]
    );

    let added = session.file("new.md").unwrap();
    assert_eq!(added.diff_hunks.len(), 1);
    assert_eq!(added.diff_hunks[0].new_count, 2);
    assert!(session.previous_round("new.md").unwrap().content.is_none());

    let deleted = session.file("old.md").unwrap();
    assert!(deleted.content.is_empty());
    assert_eq!(deleted.diff_hunks[0].old_count, 2);
    assert_eq!(deleted.diff_hunks[0].new_count, 0);
}

#[test]
fn test_fingerprint_notices_repeated_edits() {
    let dir = repo(&[(DOC, "v1\n")]);
    std::fs::write(dir.path().join(DOC), "v2\n").unwrap();
    let session = open(&dir);
    let mut poll = PollState::default();
    assert_eq!(poll.check(&session), None);

    // Same porcelain status both times; only the content differs.
    std::fs::write(dir.path().join(DOC), "v3 longer\n").unwrap();
    assert_eq!(poll.check(&session), Some(1));
    std::fs::write(dir.path().join(DOC), "v4 even longer\n").unwrap();
    assert_eq!(poll.check(&session), Some(2));
    assert_eq!(poll.check(&session), None);

    assert_eq!(
        session.previous_round(DOC).unwrap().content.as_deref(),
        Some("v2\n")
    );
}
