use std::time::Duration;

use tokio::time::{Instant, sleep_until};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { query: String, deadline: Instant },
    Committing,
}

/// Delays search input until typing pauses.
#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    delay: Duration,
    state: DebounceState,
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        SearchDebouncer::new(DEFAULT_DEBOUNCE)
    }
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        SearchDebouncer {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }

    /// Records a keystroke and restarts the timer. Ignored while committing.
    pub fn input(&mut self, query: impl Into<String>) {
        if self.state == DebounceState::Committing {
            log::debug!("search input ignored during commit");
            return;
        }
        self.state = DebounceState::Pending {
            query: query.into(),
            deadline: Instant::now() + self.delay,
        };
    }

    /// Waits for the pending deadline and hands back its query.
    pub async fn settle(&mut self) -> Option<String> {
        let DebounceState::Pending { deadline, .. } = &self.state else {
            return None;
        };
        sleep_until(*deadline).await;
        match std::mem::replace(&mut self.state, DebounceState::Idle) {
            DebounceState::Pending { query, .. } => Some(query),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Flushes any pending query and enters `Committing`.
    pub async fn commit(&mut self) -> Option<String> {
        let pending = self.settle().await;
        self.state = DebounceState::Committing;
        pending
    }

    pub fn finish_commit(&mut self) {
        if self.state == DebounceState::Committing {
            self.state = DebounceState::Idle;
        }
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{Instant, advance};

    use super::{DebounceState, SearchDebouncer};

    #[tokio::test(start_paused = true)]
    async fn typing_restarts_the_timer() {
        let start = Instant::now();
        let mut debouncer = SearchDebouncer::default();
        debouncer.input("in");
        advance(Duration::from_millis(150)).await;
        debouncer.input("inb");

        assert_eq!(debouncer.settle().await.as_deref(), Some("inb"));
        assert!(start.elapsed() >= Duration::from_millis(350));
        assert_eq!(debouncer.state(), &DebounceState::Idle);
        assert_eq!(debouncer.settle().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_waits_for_pending_query() {
        let start = Instant::now();
        let mut debouncer = SearchDebouncer::new(Duration::from_millis(200));
        debouncer.input("sent");

        assert_eq!(debouncer.commit().await.as_deref(), Some("sent"));
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(debouncer.state(), &DebounceState::Committing);

        debouncer.input("ignored");
        assert_eq!(debouncer.state(), &DebounceState::Committing);
        debouncer.finish_commit();
        assert_eq!(debouncer.state(), &DebounceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_without_input_does_not_wait() {
        let start = Instant::now();
        let mut debouncer = SearchDebouncer::default();
        assert_eq!(debouncer.commit().await, None);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_query() {
        let mut debouncer = SearchDebouncer::default();
        debouncer.input("drafts");
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert_eq!(debouncer.settle().await, None);
    }
}
