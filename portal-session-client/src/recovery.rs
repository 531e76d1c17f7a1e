//! Single-flight recovery state.
//!
//! One [`RecoveryState`] per client. When requests fail authentication, the
//! first one to get here leads the recovery episode; every other request that
//! fails while the episode is pending parks on a one-shot waiter and is
//! released together with the rest when the leader is done.
//!
//! The mutex is only held for the bookkeeping in this module, never across an
//! `.await`, so other tasks see either the state before or after a change.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Point-in-time view of the recovery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoverySnapshot {
    /// A recovery episode is running.
    pub pending: bool,
    /// Requests parked until the episode ends.
    pub waiting: usize,
    /// Completed recovery episodes.
    pub episodes: u64,
}

#[derive(Default)]
struct Inner {
    pending: bool,
    episodes: u64,
    waiters: Vec<oneshot::Sender<()>>,
}

/// What a request that failed authentication should do next.
pub(crate) enum Role {
    /// An episode is running; wait for it, then re-dispatch once.
    Join(oneshot::Receiver<()>),
    /// An episode finished after this request was dispatched; re-dispatch once.
    Rejoin,
    /// No credential was sent and no episode applies; redirect directly.
    Unauthenticated,
    /// Run the episode.
    Lead(Episode),
}

#[derive(Default)]
pub(crate) struct RecoveryState {
    inner: Mutex<Inner>,
}

impl RecoveryState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of completed episodes; stamped on each request at dispatch.
    pub(crate) fn epoch(&self) -> u64 {
        self.inner.lock().episodes
    }

    pub(crate) fn snapshot(&self) -> RecoverySnapshot {
        let inner = self.inner.lock();
        RecoverySnapshot {
            pending: inner.pending,
            waiting: inner.waiters.len(),
            episodes: inner.episodes,
        }
    }

    /// Decide the role of a request that just failed authentication.
    ///
    /// `dispatched_epoch` is [`epoch`](Self::epoch) as observed when the
    /// request was sent.
    pub(crate) fn enter(self: &Arc<Self>, dispatched_epoch: u64, carried_credential: bool) -> Role {
        let mut inner = self.inner.lock();

        if inner.pending {
            let (tx, rx) = oneshot::channel();
            inner.waiters.push(tx);
            return Role::Join(rx);
        }

        if dispatched_epoch < inner.episodes {
            return Role::Rejoin;
        }

        if !carried_credential {
            return Role::Unauthenticated;
        }

        inner.pending = true;
        Role::Lead(Episode {
            state: Arc::clone(self),
            finished: false,
        })
    }

    fn take_waiters(&self) -> Vec<oneshot::Sender<()>> {
        std::mem::take(&mut self.inner.lock().waiters)
    }

    fn complete(&self) -> Vec<oneshot::Sender<()>> {
        let mut inner = self.inner.lock();
        inner.pending = false;
        inner.episodes += 1;
        std::mem::take(&mut inner.waiters)
    }
}

fn release(waiters: Vec<oneshot::Sender<()>>) -> usize {
    let count = waiters.len();
    for waiter in waiters {
        // A closed receiver means the caller gave up on the request.
        let _ = waiter.send(());
    }
    count
}

/// A running recovery episode, held by its leader.
///
/// Dropping an unfinished episode (the leader's future was cancelled) still
/// ends it, so waiters are never stranded and `pending` never sticks.
pub(crate) struct Episode {
    state: Arc<RecoveryState>,
    finished: bool,
}

impl Episode {
    /// Release everyone queued so far. Returns how many were released.
    pub(crate) fn release_waiters(&self) -> usize {
        release(self.state.take_waiters())
    }

    /// End the episode: clear `pending`, advance the epoch, and release any
    /// request that queued after [`release_waiters`](Self::release_waiters).
    pub(crate) fn finish(mut self) -> usize {
        self.finished = true;
        release(self.state.complete())
    }
}

impl Drop for Episode {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Recovery episode abandoned before completion");
            release(self.state.complete());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_leads() {
        let state = Arc::new(RecoveryState::new());
        let role = state.enter(0, true);
        assert!(matches!(role, Role::Lead(_)));
        assert!(state.snapshot().pending);
    }

    #[tokio::test]
    async fn test_waiters_released_together() {
        let state = Arc::new(RecoveryState::new());
        let Role::Lead(episode) = state.enter(0, true) else {
            panic!("expected to lead");
        };

        let Role::Join(first) = state.enter(0, true) else {
            panic!("expected to join");
        };
        let Role::Join(second) = state.enter(0, false) else {
            panic!("expected to join");
        };
        assert_eq!(state.snapshot().waiting, 2);

        assert_eq!(episode.release_waiters(), 2);
        first.await.unwrap();
        second.await.unwrap();

        // Queued between release and finish.
        let Role::Join(late) = state.enter(0, true) else {
            panic!("expected to join");
        };
        assert_eq!(episode.finish(), 1);
        late.await.unwrap();

        assert_eq!(
            state.snapshot(),
            RecoverySnapshot {
                pending: false,
                waiting: 0,
                episodes: 1
            }
        );
    }

    #[test]
    fn test_stale_request_rejoins_finished_episode() {
        let state = Arc::new(RecoveryState::new());
        let Role::Lead(episode) = state.enter(0, true) else {
            panic!("expected to lead");
        };
        episode.finish();

        assert!(matches!(state.enter(0, true), Role::Rejoin));
        assert!(matches!(state.enter(1, true), Role::Lead(_)));
    }

    #[test]
    fn test_no_credential_without_episode() {
        let state = Arc::new(RecoveryState::new());
        assert!(matches!(state.enter(0, false), Role::Unauthenticated));
        assert!(!state.snapshot().pending);
    }

    #[tokio::test]
    async fn test_dropped_episode_releases_waiters() {
        let state = Arc::new(RecoveryState::new());
        let Role::Lead(episode) = state.enter(0, true) else {
            panic!("expected to lead");
        };
        let Role::Join(waiter) = state.enter(0, true) else {
            panic!("expected to join");
        };

        drop(episode);

        waiter.await.unwrap();
        let snapshot = state.snapshot();
        assert!(!snapshot.pending);
        assert_eq!(snapshot.episodes, 1);
    }
}
