//! Background task that notices edits on disk and runs round transitions.
//!
//! One task owns both jobs, so a poll pass and a transition never overlap.
//! Session calls block on the filesystem and the VCS, so each one runs on
//! the blocking pool and is awaited before the loop continues.

use crate::session::Session;
use rl_events::signal::RoundSignalReceiver;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// What the previous poll pass saw.
#[derive(Debug, Default)]
pub struct PollState {
    mtimes: HashMap<String, SystemTime>,
    fingerprint: Option<String>,
}

impl PollState {
    /// One detection pass. Returns the pending-edit count when the session
    /// recorded an edit.
    pub fn check(&mut self, session: &Session) -> Option<u32> {
        let candidates = match session.fingerprint() {
            Ok(Some(fingerprint)) => self.fingerprint_changed(fingerprint, session),
            Ok(None) => self.mtimes_changed(session),
            Err(err) => {
                tracing::debug!(%err, "fingerprint unavailable");
                return None;
            }
        };
        if candidates.is_empty() {
            return None;
        }
        session.reload_files(&candidates)
    }

    fn fingerprint_changed(&mut self, fingerprint: String, session: &Session) -> Vec<String> {
        let changed = self
            .fingerprint
            .as_ref()
            .is_some_and(|previous| *previous != fingerprint);
        self.fingerprint = Some(fingerprint);
        if !changed {
            return Vec::new();
        }
        session
            .watched_files()
            .into_iter()
            .map(|file| file.path)
            .collect()
    }

    /// A file seen for the first time only records its baseline.
    fn mtimes_changed(&mut self, session: &Session) -> Vec<String> {
        let mut changed = Vec::new();
        for file in session.watched_files() {
            let Ok(modified) = std::fs::metadata(&file.abs_path).and_then(|meta| meta.modified())
            else {
                continue;
            };
            match self.mtimes.insert(file.path.clone(), modified) {
                Some(previous) if previous != modified => changed.push(file.path),
                _ => {}
            }
        }
        changed
    }
}

pub async fn run(
    session: Arc<Session>,
    mut rounds: RoundSignalReceiver,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(session.config().poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut poll = Some(PollState::default());
    let mut rounds_open = true;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            signal = rounds.recv(), if rounds_open => {
                if signal.is_none() {
                    rounds_open = false;
                    continue;
                }
                let session = Arc::clone(&session);
                match tokio::task::spawn_blocking(move || session.complete_round()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => tracing::warn!(%err, "round transition failed"),
                    Err(err) => tracing::error!(%err, "round transition task failed"),
                }
            }
            _ = interval.tick() => {
                let mut state = poll.take().unwrap_or_default();
                let session = Arc::clone(&session);
                match tokio::task::spawn_blocking(move || {
                    state.check(&session);
                    state
                })
                .await
                {
                    Ok(state) => poll = Some(state),
                    Err(err) => tracing::error!(%err, "poll task failed"),
                }
            }
        }
    }
    tracing::debug!("watcher stopped");
}
