//! The review session: every file under review, the round counter, and the
//! round-complete transition.
//!
//! All mutable state sits behind one reader/writer lock. Readers get copies.
//! Slow work (reading files, running the VCS, hashing) happens before the
//! write lock is taken, and the lock is held only to assign results.

use crate::config::SessionConfig;
use crate::diff::{build_line_map, diff_contents, remap_range};
use crate::error::{CommentError, PersistError, RedlineError, SourceError};
use crate::file::{content_hash, ReviewFile};
use crate::hunks::hunks_from_entries;
use crate::persist::{self, PersistedFile, ReviewState};
use crate::source::{ChangeSource, SourceFile};
use crate::types::{
    Comment, DiffHunk, DiffSide, FileView, FinishSummary, NewComment, PreviousRound,
    RoundSummary, SessionMode, SessionSnapshot, ShareInput, UpdateComment,
};
use chrono::Utc;
use rl_events::bus::EventBus;
use rl_events::types::ReviewEvent;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;

pub struct Session {
    config: SessionConfig,
    source: Box<dyn ChangeSource>,
    event_bus: EventBus,
    state: RwLock<SessionState>,
    /// Bumped at every round transition; a delayed write scheduled under an
    /// older generation does nothing.
    generation: AtomicU64,
    pending_write: Mutex<Option<JoinHandle<()>>>,
    /// Serializes state-file I/O with the transition's read of that file.
    persist_gate: Mutex<()>,
    /// The state file and its temporary sibling, never offered for review.
    own_files: [PathBuf; 2],
}

struct SessionState {
    files: Vec<ReviewFile>,
    review_round: u32,
    pending_edits: u32,
    last_round_edits: u32,
    share_url: Option<String>,
    delete_token: Option<String>,
}

impl SessionState {
    fn file(&self, path: &str) -> Result<&ReviewFile, CommentError> {
        self.files
            .iter()
            .find(|file| file.path == path)
            .ok_or_else(|| CommentError::FileNotFound {
                path: path.to_string(),
            })
    }

    fn file_mut(&mut self, path: &str) -> Result<&mut ReviewFile, CommentError> {
        self.files
            .iter_mut()
            .find(|file| file.path == path)
            .ok_or_else(|| CommentError::FileNotFound {
                path: path.to_string(),
            })
    }

    fn snapshot_all(&mut self) {
        for file in &mut self.files {
            file.snapshot();
        }
    }
}

struct LoadedFile {
    source: SourceFile,
    content: String,
    hash: String,
}

impl Session {
    /// Discovers files, reads them, and restores comments from the state
    /// file for every file whose content still matches the recorded hash.
    pub fn open(
        config: SessionConfig,
        source: Box<dyn ChangeSource>,
        event_bus: EventBus,
    ) -> Result<Arc<Self>, RedlineError> {
        let own_files = [
            normalized(&config.state_path),
            normalized(&persist::temp_path(&config.state_path)),
        ];
        let session = Self {
            config,
            source,
            event_bus,
            state: RwLock::new(SessionState {
                files: Vec::new(),
                review_round: 1,
                pending_edits: 0,
                last_round_edits: 0,
                share_url: None,
                delete_token: None,
            }),
            generation: AtomicU64::new(0),
            pending_write: Mutex::new(None),
            persist_gate: Mutex::new(()),
            own_files,
        };

        let sources = session.discover()?;
        let loaded = session.read_files(sources);
        let saved = match persist::load(&session.config.state_path) {
            Ok(saved) => saved,
            Err(err) => {
                tracing::warn!(path = %session.config.state_path.display(), %err, "ignoring unreadable review state");
                None
            }
        };

        let mut files = Vec::with_capacity(loaded.len());
        for item in loaded {
            let hunks = session.hunks_for(&item.source, &item.content);
            let mut file = ReviewFile::new(
                item.source.path,
                item.source.abs_path,
                item.source.status,
                item.content,
            );
            file.diff_hunks = hunks;
            if let Some(saved_file) = saved.as_ref().and_then(|s| s.files.get(&file.path)) {
                if saved_file.file_hash == file.content_hash {
                    file.replace_comments(saved_file.comments.clone());
                }
            }
            files.push(file);
        }

        {
            let mut state = session.write_state();
            state.files = files;
            if let Some(saved) = saved {
                state.review_round = saved.review_round.max(1);
                state.share_url = saved.share_url;
                state.delete_token = saved.delete_token;
            }
            tracing::info!(
                files = state.files.len(),
                review_round = state.review_round,
                mode = ?session.source.mode(),
                "review session opened"
            );
        }
        Ok(Arc::new(session))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> SessionMode {
        self.source.mode()
    }

    pub fn state_path(&self) -> &Path {
        &self.config.state_path
    }

    pub fn review_round(&self) -> u32 {
        self.read_state().review_round
    }

    pub fn pending_edits(&self) -> u32 {
        self.read_state().pending_edits
    }

    pub fn comment_count(&self) -> usize {
        self.read_state()
            .files
            .iter()
            .map(|file| file.comments.len())
            .sum()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.read_state();
        SessionSnapshot {
            mode: self.source.mode(),
            branch: self.source.branch().to_string(),
            base_ref: self.source.base_ref().to_string(),
            review_round: state.review_round,
            pending_edits: state.pending_edits,
            last_round_edits: state.last_round_edits,
            share_url: state.share_url.clone(),
            files: state.files.iter().map(ReviewFile::summary).collect(),
        }
    }

    pub fn file(&self, path: &str) -> Result<FileView, RedlineError> {
        Ok(self.read_state().file(path)?.view())
    }

    pub fn comments(&self, path: &str) -> Result<Vec<Comment>, RedlineError> {
        Ok(self.read_state().file(path)?.comments.clone())
    }

    pub fn previous_round(&self, path: &str) -> Result<PreviousRound, RedlineError> {
        let state = self.read_state();
        let file = state.file(path)?;
        Ok(PreviousRound {
            path: file.path.clone(),
            content: file.previous_content.clone(),
            comments: file.previous_comments.clone(),
            line_diff: file.round_diff.clone(),
            round_hunks: hunks_from_entries(&file.round_diff, self.config.context_lines),
        })
    }

    pub fn round_summary(&self) -> RoundSummary {
        let state = self.read_state();
        let previous = state.files.iter().flat_map(|file| &file.previous_comments);
        let resolved = previous.clone().filter(|comment| comment.resolved).count();
        let open = previous.count() - resolved;
        let carried_forward = state
            .files
            .iter()
            .flat_map(|file| &file.comments)
            .filter(|comment| comment.carried_forward)
            .count();
        RoundSummary {
            review_round: state.review_round,
            last_round_edits: state.last_round_edits,
            resolved,
            open,
            carried_forward,
        }
    }

    /// Files as the change source last reported them.
    pub fn watched_files(&self) -> Vec<SourceFile> {
        self.read_state()
            .files
            .iter()
            .map(|file| SourceFile {
                path: file.path.clone(),
                abs_path: file.abs_path.clone(),
                status: file.status,
            })
            .collect()
    }

    pub fn fingerprint(&self) -> Result<Option<String>, RedlineError> {
        Ok(self.source.fingerprint()?)
    }

    pub fn add_comment(
        self: &Arc<Self>,
        path: &str,
        input: NewComment,
    ) -> Result<Comment, RedlineError> {
        let comment = self.write_state().file_mut(path)?.add_comment(input)?;
        self.schedule_persist();
        Ok(comment)
    }

    pub fn update_comment(
        self: &Arc<Self>,
        path: &str,
        id: u32,
        input: UpdateComment,
    ) -> Result<Comment, RedlineError> {
        let comment = self
            .write_state()
            .file_mut(path)?
            .update_comment(id, input.body)?;
        self.schedule_persist();
        Ok(comment)
    }

    pub fn delete_comment(self: &Arc<Self>, path: &str, id: u32) -> Result<(), RedlineError> {
        self.write_state().file_mut(path)?.delete_comment(id)?;
        self.schedule_persist();
        Ok(())
    }

    pub fn set_share(self: &Arc<Self>, input: ShareInput) {
        {
            let mut state = self.write_state();
            state.share_url = Some(input.share_url);
            state.delete_token = Some(input.delete_token);
        }
        self.schedule_persist();
    }

    pub fn clear_share(self: &Arc<Self>) {
        {
            let mut state = self.write_state();
            state.share_url = None;
            state.delete_token = None;
        }
        self.schedule_persist();
    }

    /// Re-reads the given files and records an edit when any content changed.
    ///
    /// The first edit of a round snapshots every file before anything is
    /// overwritten, so the next transition diffs round start against round
    /// end no matter how many saves happen in between. Returns the new
    /// pending-edit count, or `None` when nothing changed.
    pub fn reload_files(&self, paths: &[String]) -> Option<u32> {
        let targets: Vec<SourceFile> = self
            .watched_files()
            .into_iter()
            .filter(|file| paths.contains(&file.path))
            .collect();
        let loaded = self.read_files(targets);

        let changed: Vec<LoadedFile> = {
            let state = self.read_state();
            loaded
                .into_iter()
                .filter(|item| {
                    state
                        .file(&item.source.path)
                        .is_ok_and(|file| file.content_hash != item.hash)
                })
                .collect()
        };
        if changed.is_empty() {
            return None;
        }
        let updates: Vec<(LoadedFile, Vec<DiffHunk>)> = changed
            .into_iter()
            .map(|item| {
                let hunks = self.hunks_for(&item.source, &item.content);
                (item, hunks)
            })
            .collect();

        let pending_edits = {
            let mut state = self.write_state();
            if state.pending_edits == 0 {
                state.snapshot_all();
            }
            for (item, hunks) in updates {
                let Ok(file) = state.file_mut(&item.source.path) else {
                    continue;
                };
                tracing::debug!(path = %file.path, "content changed on disk");
                file.set_content(item.content, item.hash);
                file.diff_hunks = hunks;
                clamp_comments(file);
            }
            state.pending_edits += 1;
            state.pending_edits
        };
        self.event_bus
            .publish(ReviewEvent::EditDetected { pending_edits });
        Some(pending_edits)
    }

    /// Closes the current round and opens the next one.
    ///
    /// Unresolved comments from the round-start snapshot are carried onto
    /// the new content through the line diff. Resolution data comes from the
    /// state file the agent edits; without that file no snapshot comment is
    /// carried. Comments added after the snapshot, including ones that land
    /// while this transition reads files, are carried as well.
    pub fn complete_round(self: &Arc<Self>) -> Result<u32, RedlineError> {
        self.cancel_pending_write();
        self.generation.fetch_add(1, Ordering::SeqCst);

        let sources = if self.source.rediscovers() {
            match self.discover() {
                Ok(sources) => sources,
                Err(err) => {
                    tracing::warn!(%err, "file discovery failed, keeping current file list");
                    self.watched_files()
                }
            }
        } else {
            self.watched_files()
        };
        let loaded: Vec<(LoadedFile, Vec<DiffHunk>)> = self
            .read_files(sources)
            .into_iter()
            .map(|item| {
                let hunks = self.hunks_for(&item.source, &item.content);
                (item, hunks)
            })
            .collect();

        let recorded = {
            let _gate = self.lock_persist_gate();
            match persist::load(&self.config.state_path) {
                Ok(recorded) => recorded,
                Err(err) => {
                    tracing::warn!(%err, "review state unreadable at round transition, no comments carried forward");
                    None
                }
            }
        };

        let review_round = {
            let mut state = self.write_state();
            if state.pending_edits == 0 {
                state.snapshot_all();
            }
            state.last_round_edits = state.pending_edits;
            state.pending_edits = 0;
            if recorded.is_none()
                && state
                    .files
                    .iter()
                    .any(|file| !file.previous_comments.is_empty())
            {
                tracing::warn!(
                    path = %self.config.state_path.display(),
                    "review state missing at round transition, unresolved comments are dropped"
                );
            }

            let mut previous: HashMap<String, ReviewFile> = state
                .files
                .drain(..)
                .map(|file| (file.path.clone(), file))
                .collect();
            let mut files = Vec::with_capacity(loaded.len());
            for (item, hunks) in loaded {
                let (mut file, live_content) = match previous.remove(&item.source.path) {
                    Some(mut existing) => {
                        existing.status = item.source.status;
                        existing.abs_path = item.source.abs_path;
                        let live_content =
                            std::mem::replace(&mut existing.content, item.content);
                        existing.content_hash = item.hash;
                        (existing, Some(live_content))
                    }
                    None => (
                        ReviewFile::new(
                            item.source.path,
                            item.source.abs_path,
                            item.source.status,
                            item.content,
                        ),
                        None,
                    ),
                };
                file.diff_hunks = hunks;
                carry_forward(&mut file, live_content.as_deref(), recorded.as_ref());
                files.push(file);
            }
            state.files = files;
            state.review_round += 1;
            tracing::info!(
                review_round = state.review_round,
                last_round_edits = state.last_round_edits,
                "round complete"
            );
            state.review_round
        };

        self.schedule_persist();
        self.event_bus
            .publish(ReviewEvent::StateChanged { review_round });
        Ok(review_round)
    }

    /// Writes the state file immediately and reports what was saved.
    pub fn finish(&self) -> Result<FinishSummary, RedlineError> {
        self.flush()?;
        Ok(FinishSummary {
            comment_count: self.comment_count(),
            state_path: self.config.state_path.clone(),
        })
    }

    /// Cancels any delayed write and persists now.
    pub fn flush(&self) -> Result<(), RedlineError> {
        self.cancel_pending_write();
        self.persist(None)?;
        Ok(())
    }

    fn schedule_persist(self: &Arc<Self>) {
        let generation = self.generation.load(Ordering::SeqCst);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.persist_logged(Some(generation));
            return;
        };
        let session = Arc::clone(self);
        let delay = self.config.debounce;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let write =
                tokio::task::spawn_blocking(move || session.persist_logged(Some(generation)));
            if let Err(err) = write.await {
                tracing::warn!(%err, "review state write task failed");
            }
        });
        if let Some(previous) = self.lock_pending_write().replace(task) {
            previous.abort();
        }
    }

    fn cancel_pending_write(&self) {
        if let Some(task) = self.lock_pending_write().take() {
            task.abort();
        }
    }

    fn persist_logged(&self, generation: Option<u64>) {
        if let Err(err) = self.persist(generation) {
            tracing::warn!(path = %self.config.state_path.display(), %err, "failed to write review state");
        }
    }

    fn persist(&self, generation: Option<u64>) -> Result<(), PersistError> {
        let _gate = self.lock_persist_gate();
        if generation.is_some_and(|expected| expected != self.generation.load(Ordering::SeqCst)) {
            return Ok(());
        }
        let state = self.review_state();
        persist::store(&self.config.state_path, &state)
    }

    fn review_state(&self) -> ReviewState {
        let state = self.read_state();
        let files: BTreeMap<String, PersistedFile> = state
            .files
            .iter()
            .filter(|file| !file.comments.is_empty())
            .map(|file| {
                (
                    file.path.clone(),
                    PersistedFile {
                        status: file.status,
                        file_hash: file.content_hash.clone(),
                        comments: file.comments.clone(),
                    },
                )
            })
            .collect();
        ReviewState {
            branch: self.source.branch().to_string(),
            base_ref: self.source.base_ref().to_string(),
            updated_at: Utc::now(),
            review_round: state.review_round,
            share_url: state.share_url.clone(),
            delete_token: state.delete_token.clone(),
            files,
        }
    }

    /// Lists files from the change source, minus the session's own state file.
    fn discover(&self) -> Result<Vec<SourceFile>, SourceError> {
        let files = self.source.list_files()?;
        Ok(files
            .into_iter()
            .filter(|file| {
                let path = normalized(&file.abs_path);
                if self.own_files.contains(&path) {
                    tracing::debug!(path = %file.path, "not reviewing the review state file");
                    false
                } else {
                    true
                }
            })
            .collect())
    }

    /// Files that vanish between listing and reading are skipped; the next
    /// discovery reports them as deleted.
    fn read_files(&self, sources: Vec<SourceFile>) -> Vec<LoadedFile> {
        sources
            .into_iter()
            .filter_map(|source| match self.source.read_content(&source) {
                Ok(content) => {
                    let hash = content_hash(&content);
                    Some(LoadedFile {
                        source,
                        content,
                        hash,
                    })
                }
                Err(err) => {
                    tracing::debug!(path = %source.path, %err, "skipping unreadable file");
                    None
                }
            })
            .collect()
    }

    fn hunks_for(&self, source: &SourceFile, content: &str) -> Vec<DiffHunk> {
        self.source.diff_hunks(source, content).unwrap_or_else(|err| {
            tracing::warn!(path = %source.path, %err, "diff unavailable");
            Vec::new()
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending_write(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_persist_gate(&self) -> MutexGuard<'_, ()> {
        self.persist_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rebuilds `file.comments` for a new round.
///
/// Unresolved comments from the round-start snapshot move through the round
/// diff, but only when the state file was found. Comments the reviewer added
/// after the snapshot was taken move from `live_content`, the text they were
/// written against, and are kept even without a state file. Snapshot
/// comments the reviewer has since deleted stay deleted.
fn carry_forward(
    file: &mut ReviewFile,
    live_content: Option<&str>,
    recorded: Option<&ReviewState>,
) {
    let saved = recorded
        .and_then(|state| state.comments_for(&file.path))
        .unwrap_or_default();
    for comment in &mut file.previous_comments {
        merge_resolution(comment, saved);
    }

    let Some(previous_content) = file.previous_content.as_deref() else {
        file.round_diff.clear();
        file.replace_comments(Vec::new());
        return;
    };
    file.round_diff = diff_contents(previous_content, &file.content);
    let line_count = file.line_count();

    let mut carried = Vec::new();
    if recorded.is_some() {
        let line_map = build_line_map(&file.round_diff);
        for snapshot in file.previous_comments.iter().filter(|c| !c.resolved) {
            let Some(live) = file.comments.iter().find(|c| c.id == snapshot.id) else {
                continue;
            };
            if let Some((start_line, end_line)) =
                remap_range(&line_map, snapshot.start_line, snapshot.end_line, line_count)
            {
                carried.push(Comment {
                    start_line,
                    end_line,
                    body: live.body.clone(),
                    updated_at: live.updated_at,
                    ..snapshot.clone()
                });
            }
        }
    }

    let late: Vec<Comment> = file
        .comments
        .iter()
        .filter(|live| !file.previous_comments.iter().any(|c| c.id == live.id))
        .cloned()
        .collect();
    if !late.is_empty() {
        let basis = live_content.unwrap_or(file.content.as_str());
        let line_map = build_line_map(&diff_contents(basis, &file.content));
        for mut comment in late {
            merge_resolution(&mut comment, saved);
            if comment.resolved {
                continue;
            }
            if let Some((start_line, end_line)) =
                remap_range(&line_map, comment.start_line, comment.end_line, line_count)
            {
                carried.push(Comment {
                    start_line,
                    end_line,
                    ..comment
                });
            }
        }
    }

    for (index, comment) in carried.iter_mut().enumerate() {
        comment.id = u32::try_from(index + 1).unwrap_or(u32::MAX);
        comment.carried_forward = true;
    }
    file.replace_comments(carried);
}

fn merge_resolution(comment: &mut Comment, saved: &[Comment]) {
    if let Some(saved) = saved.iter().find(|saved| saved.id == comment.id) {
        comment.resolved = saved.resolved;
        comment.resolution_note.clone_from(&saved.resolution_note);
        comment.resolution_lines.clone_from(&saved.resolution_lines);
    }
}

/// Resolves the parent directory so differently spelled paths to the same
/// file compare equal. The file itself may not exist yet.
fn normalized(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map_or_else(|_| path.to_path_buf(), |dir| dir.join(name)),
        _ => path.to_path_buf(),
    }
}

/// Keeps live comment ranges inside the file after its content changed.
fn clamp_comments(file: &mut ReviewFile) {
    let line_count = file.line_count().max(1);
    // Old-side ranges point into the base, which an edit does not move.
    let new_side = file
        .comments
        .iter_mut()
        .filter(|comment| comment.side != Some(DiffSide::Old));
    for comment in new_side {
        comment.start_line = comment.start_line.clamp(1, line_count);
        comment.end_line = comment.end_line.clamp(comment.start_line, line_count);
    }
}
