use rl_core::error::CommentError;
use rl_core::persist;
use rl_core::types::{NewComment, ShareInput, UpdateComment};
use rl_core::{ExplicitSource, RedlineError, Session, SessionConfig};
use rl_events::bus::EventBus;
use rl_events::types::ReviewEvent;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const PLAN: &str = "plan.md";

fn setup(content: &str) -> (TempDir, Arc<Session>, EventBus) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PLAN), content).unwrap();
    let (session, bus) = open(dir.path());
    (dir, session, bus)
}

fn open(root: &Path) -> (Arc<Session>, EventBus) {
    let bus = EventBus::new();
    let source = ExplicitSource::new(root, vec![PathBuf::from(PLAN)]);
    let session = Session::open(SessionConfig::new(root), Box::new(source), bus.clone()).unwrap();
    (session, bus)
}

fn comment(start_line: u32, end_line: u32, body: &str) -> NewComment {
    NewComment {
        start_line,
        end_line,
        side: None,
        body: body.to_string(),
    }
}

/// Stands in for the agent: rewrites the document on disk and lets the
/// session notice it.
fn agent_edit(dir: &TempDir, session: &Session, content: &str) {
    std::fs::write(dir.path().join(PLAN), content).unwrap();
    session.reload_files(&[PLAN.to_string()]).unwrap();
}

/// Stands in for the agent marking a comment resolved in the state file.
fn agent_resolve(session: &Session, id: u32, note: &str) {
    let mut state = persist::load(session.state_path()).unwrap().unwrap();
    let file = state.files.get_mut(PLAN).unwrap();
    let comment = file.comments.iter_mut().find(|c| c.id == id).unwrap();
    comment.resolved = true;
    comment.resolution_note = note.to_string();
    persist::store(session.state_path(), &state).unwrap();
}

#[test]
fn test_comment_follows_inserted_line() {
    let (dir, session, _bus) = setup("a\nb\nc\n");
    session.add_comment(PLAN, comment(2, 2, "reword b")).unwrap();

    agent_edit(&dir, &session, "a\nX\nb\nc\n");
    assert_eq!(session.complete_round().unwrap(), 2);

    let comments = session.comments(PLAN).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, 1);
    assert_eq!((comments[0].start_line, comments[0].end_line), (3, 3));
    assert!(comments[0].carried_forward);
    assert_eq!(comments[0].body, "reword b");

    let previous = session.previous_round(PLAN).unwrap();
    assert_eq!(previous.content.as_deref(), Some("a\nb\nc\n"));
    assert_eq!(previous.comments.len(), 1);
    assert!(!previous.comments[0].carried_forward);
    assert_eq!(previous.round_hunks.len(), 1);
}

#[test]
fn test_resolved_comment_stays_in_previous_round() {
    let (dir, session, _bus) = setup("one\ntwo\nthree\n");
    session.add_comment(PLAN, comment(1, 1, "fix one")).unwrap();
    session.add_comment(PLAN, comment(3, 3, "fix three")).unwrap();

    agent_edit(&dir, &session, "ONE\ntwo\nthree\n");
    agent_resolve(&session, 1, "capitalized");
    session.complete_round().unwrap();

    let comments = session.comments(PLAN).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].body, "fix three");
    assert_eq!(comments[0].id, 1);

    let previous = session.previous_round(PLAN).unwrap();
    let resolved = previous.comments.iter().find(|c| c.id == 1).unwrap();
    assert!(resolved.resolved);
    assert_eq!(resolved.resolution_note, "capitalized");

    let summary = session.round_summary();
    assert_eq!(summary.review_round, 2);
    assert_eq!(summary.last_round_edits, 1);
    assert_eq!(summary.resolved, 1);
    assert_eq!(summary.open, 1);
    assert_eq!(summary.carried_forward, 1);
}

#[test]
fn test_ids_restart_each_round() {
    let (dir, session, _bus) = setup("a\nb\nc\n");
    session.add_comment(PLAN, comment(1, 1, "first")).unwrap();
    session.add_comment(PLAN, comment(2, 2, "second")).unwrap();
    session.delete_comment(PLAN, 1).unwrap();

    agent_edit(&dir, &session, "a\nb\nc\nd\n");
    session.complete_round().unwrap();
    let carried = session.comments(PLAN).unwrap();
    assert_eq!(carried.len(), 1);
    assert_eq!(carried[0].id, 1);

    let added = session.add_comment(PLAN, comment(4, 4, "new")).unwrap();
    assert_eq!(added.id, 2);
}

#[test]
fn test_comments_added_mid_round_are_carried() {
    let (dir, session, _bus) = setup("a\nb\nc\n");
    session.add_comment(PLAN, comment(1, 1, "before the edit")).unwrap();

    agent_edit(&dir, &session, "a\nb\nc\nd\n");
    session.add_comment(PLAN, comment(4, 4, "after the edit")).unwrap();

    // The agent edits again but the transition runs before any poll sees it.
    std::fs::write(dir.path().join(PLAN), "top\na\nb\nc\nd\n").unwrap();
    session.complete_round().unwrap();

    let comments = session.comments(PLAN).unwrap();
    let carried: Vec<(u32, u32, &str)> = comments
        .iter()
        .map(|c| (c.id, c.start_line, c.body.as_str()))
        .collect();
    assert_eq!(
        carried,
        vec![(1, 2, "before the edit"), (2, 5, "after the edit")]
    );
    assert!(comments.iter().all(|c| c.carried_forward));
    assert_eq!(session.previous_round(PLAN).unwrap().comments.len(), 1);
}

#[test]
fn test_mid_round_changes_to_snapshot_comments() {
    let (dir, session, _bus) = setup("a\nb\nc\n");
    session.add_comment(PLAN, comment(1, 1, "drop me")).unwrap();
    session.add_comment(PLAN, comment(2, 2, "first wording")).unwrap();

    agent_edit(&dir, &session, "a\nb\nc\nd\n");
    session.delete_comment(PLAN, 1).unwrap();
    session
        .update_comment(
            PLAN,
            2,
            UpdateComment {
                body: "second wording".to_string(),
            },
        )
        .unwrap();
    session.complete_round().unwrap();

    let comments = session.comments(PLAN).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].body, "second wording");
    assert_eq!(comments[0].start_line, 2);
}

#[test]
fn test_late_comment_survives_missing_state_file() {
    let (dir, session, _bus) = setup("a\nb\n");
    session.add_comment(PLAN, comment(1, 1, "from the snapshot")).unwrap();
    agent_edit(&dir, &session, "a\nb\nc\n");
    session.add_comment(PLAN, comment(3, 3, "written after")).unwrap();
    std::fs::remove_file(session.state_path()).unwrap();

    session.complete_round().unwrap();
    let comments = session.comments(PLAN).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].body, "written after");
    assert_eq!(comments[0].id, 1);
}

#[test]
fn test_rounds_only_move_forward() {
    let (_dir, session, _bus) = setup("a\n");
    let mut last = session.review_round();
    for _ in 0..3 {
        let next = session.complete_round().unwrap();
        assert_eq!(next, last + 1);
        last = next;
    }
    assert_eq!(session.snapshot().review_round, 4);
}

#[test]
fn test_round_without_edits_carries_in_place() {
    let (_dir, session, _bus) = setup("a\nb\nc\n");
    session.add_comment(PLAN, comment(2, 3, "unclear")).unwrap();

    session.complete_round().unwrap();

    let comments = session.comments(PLAN).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!((comments[0].start_line, comments[0].end_line), (2, 3));
    assert!(comments[0].carried_forward);
    assert_eq!(session.round_summary().last_round_edits, 0);
    assert!(session
        .previous_round(PLAN)
        .unwrap()
        .line_diff
        .iter()
        .all(|entry| entry.old_line == entry.new_line));
}

#[test]
fn test_missing_state_file_drops_comments() {
    let (dir, session, _bus) = setup("a\nb\n");
    session.add_comment(PLAN, comment(1, 1, "gone")).unwrap();
    agent_edit(&dir, &session, "a\nb\nc\n");
    std::fs::remove_file(session.state_path()).unwrap();

    session.complete_round().unwrap();
    assert!(session.comments(PLAN).unwrap().is_empty());
    assert_eq!(session.previous_round(PLAN).unwrap().comments.len(), 1);
}

#[test]
fn test_malformed_state_file_drops_comments() {
    let (dir, session, _bus) = setup("a\nb\n");
    session.add_comment(PLAN, comment(1, 1, "gone")).unwrap();
    agent_edit(&dir, &session, "a\nb\nc\n");
    std::fs::write(session.state_path(), "{ truncated").unwrap();

    assert_eq!(session.complete_round().unwrap(), 2);
    assert!(session.comments(PLAN).unwrap().is_empty());
}

#[test]
fn test_carried_ranges_stay_in_bounds() {
    let (dir, session, _bus) = setup("1\n2\n3\n4\n5\n");
    session.add_comment(PLAN, comment(4, 5, "tail")).unwrap();

    agent_edit(&dir, &session, "x\ny\n");
    session.complete_round().unwrap();

    let comments = session.comments(PLAN).unwrap();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].start_line >= 1);
    assert!(comments[0].start_line <= comments[0].end_line);
    assert!(comments[0].end_line <= 2);
}

#[test]
fn test_comment_dropped_when_document_emptied() {
    let (dir, session, _bus) = setup("a\nb\n");
    session.add_comment(PLAN, comment(1, 2, "all of it")).unwrap();

    agent_edit(&dir, &session, "");
    session.complete_round().unwrap();
    assert!(session.comments(PLAN).unwrap().is_empty());
}

#[test]
fn test_edits_snapshot_once_per_round() {
    let (dir, session, bus) = setup("v1\n");
    let mut events = bus.subscribe();

    agent_edit(&dir, &session, "v2\n");
    agent_edit(&dir, &session, "v3\n");
    assert_eq!(session.pending_edits(), 2);
    assert_eq!(
        session.previous_round(PLAN).unwrap().content.as_deref(),
        Some("v1\n")
    );
    assert_eq!(
        events.try_recv().unwrap().body,
        ReviewEvent::EditDetected { pending_edits: 1 }
    );
    assert_eq!(
        events.try_recv().unwrap().body,
        ReviewEvent::EditDetected { pending_edits: 2 }
    );

    assert_eq!(session.reload_files(&[PLAN.to_string()]), None);

    session.complete_round().unwrap();
    assert_eq!(session.pending_edits(), 0);
    assert_eq!(
        events.try_recv().unwrap().body,
        ReviewEvent::StateChanged { review_round: 2 }
    );
}

#[test]
fn test_unknown_file_and_comment() {
    let (_dir, session, _bus) = setup("a\n");
    assert!(matches!(
        session.comments("nope.md"),
        Err(RedlineError::Comment(CommentError::FileNotFound { .. }))
    ));
    assert!(matches!(
        session.delete_comment(PLAN, 9),
        Err(RedlineError::Comment(CommentError::CommentNotFound { id: 9 }))
    ));
    assert!(matches!(
        session.update_comment(
            PLAN,
            9,
            UpdateComment {
                body: "x".to_string()
            }
        ),
        Err(RedlineError::Comment(CommentError::CommentNotFound { id: 9 }))
    ));
}

#[test]
fn test_finish_without_comments_removes_state_file() {
    let (_dir, session, _bus) = setup("a\n");
    session.add_comment(PLAN, comment(1, 1, "x")).unwrap();
    let summary = session.finish().unwrap();
    assert_eq!(summary.comment_count, 1);
    assert!(summary.state_path.exists());

    session.delete_comment(PLAN, 1).unwrap();
    let summary = session.finish().unwrap();
    assert_eq!(summary.comment_count, 0);
    assert!(!summary.state_path.exists());
}

#[test]
fn test_share_metadata_persists() {
    let (_dir, session, _bus) = setup("a\n");
    session.set_share(ShareInput {
        share_url: "https://share.test/r/abc".to_string(),
        delete_token: "token".to_string(),
    });
    let state = persist::load(session.state_path()).unwrap().unwrap();
    assert_eq!(state.share_url.as_deref(), Some("https://share.test/r/abc"));
    assert_eq!(
        session.snapshot().share_url.as_deref(),
        Some("https://share.test/r/abc")
    );

    session.clear_share();
    assert_eq!(persist::load(session.state_path()).unwrap(), None);
}

#[test]
fn test_reopen_restores_matching_files_only() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PLAN), "a\nb\n").unwrap();
    {
        let (session, _bus) = open(dir.path());
        session.add_comment(PLAN, comment(1, 1, "kept")).unwrap();
        session.complete_round().unwrap();
        session.finish().unwrap();
    }

    let (session, _bus) = open(dir.path());
    assert_eq!(session.review_round(), 2);
    assert_eq!(session.comments(PLAN).unwrap().len(), 1);
    assert_eq!(session.add_comment(PLAN, comment(2, 2, "next")).unwrap().id, 2);
    session.finish().unwrap();

    std::fs::write(dir.path().join(PLAN), "changed\n").unwrap();
    let (session, _bus) = open(dir.path());
    assert!(session.comments(PLAN).unwrap().is_empty());
}

#[tokio::test]
async fn test_writes_are_debounced() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PLAN), "a\nb\n").unwrap();
    let source = ExplicitSource::new(dir.path(), vec![PathBuf::from(PLAN)]);
    let config = SessionConfig::new(dir.path()).with_debounce(Duration::from_millis(50));
    let session = Session::open(config, Box::new(source), EventBus::new()).unwrap();

    session.add_comment(PLAN, comment(1, 1, "one")).unwrap();
    session.add_comment(PLAN, comment(2, 2, "two")).unwrap();
    assert!(!session.state_path().exists());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let state = persist::load(session.state_path()).unwrap().unwrap();
    assert_eq!(state.comment_count(), 2);
}

#[tokio::test]
async fn test_transition_cancels_pending_write() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PLAN), "a\nb\n").unwrap();
    let source = ExplicitSource::new(dir.path(), vec![PathBuf::from(PLAN)]);
    let config = SessionConfig::new(dir.path()).with_debounce(Duration::from_millis(50));
    let session = Session::open(config, Box::new(source), EventBus::new()).unwrap();

    session.add_comment(PLAN, comment(1, 1, "one")).unwrap();
    session.flush().unwrap();
    agent_resolve(&session, 1, "done");
    session.update_comment(PLAN, 1, UpdateComment { body: "edited".to_string() }).unwrap();

    // The update's delayed write would clobber the resolution; the
    // transition must cancel it before reading the state file.
    session.complete_round().unwrap();
    assert!(session.comments(PLAN).unwrap().is_empty());
    let previous = session.previous_round(PLAN).unwrap();
    assert!(previous.comments[0].resolved);
}
