//! services/watcher/src/scheduler.rs
//!
//! The long-running loop that walks the viewing windows in order, opening the
//! stream shortly before each one and closing it some time after.
//!
//! Each pass of the loop looks at the window at the front of the cursor:
//! - closed session, window already over (plus margin): drop it without opening;
//! - closed session, open threshold reached: open (and optionally mute);
//! - open session, close threshold reached: close and drop the window;
//! - otherwise sleep towards the next threshold and look again.
//!
//! With a poll interval the sleep is chunked, and between chunks the schedule
//! can be refetched so newly published matches are picked up.

use chrono::{DateTime, Utc};
use owl_watcher_core::{
    domain::{SessionState, ViewingWindow},
    ports::{Clock, PortResult, ScheduleSource, StreamSession},
    reducer::{reduce_with, ClosePolicy, MERGE_THRESHOLD_HOURS},
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;

//=========================================================================================
// Settings and Outcome
//=========================================================================================

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// How long before a window opens to show the stream.
    pub open_margin: chrono::Duration,
    /// How long after a window closes to keep the stream up.
    pub close_margin: chrono::Duration,
    /// `None` sleeps straight to each threshold and disables refetching.
    pub poll_interval: Option<Duration>,
    pub mute: bool,
    pub close_policy: ClosePolicy,
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            open_margin: config.open_margin,
            close_margin: config.close_margin,
            poll_interval: config.poll_interval,
            mute: config.mute,
            close_policy: config.close_policy,
        }
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every window was watched or skipped.
    Completed,
    /// The cancellation token fired.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Elapsed,
    Cancelled,
}

//=========================================================================================
// ScheduleCursor
//=========================================================================================

/// The windows not yet fully processed, front first, plus the session state.
#[derive(Debug, Clone, Default)]
pub struct ScheduleCursor {
    windows: VecDeque<ViewingWindow>,
    session: SessionState,
}

impl ScheduleCursor {
    pub fn new(windows: Vec<ViewingWindow>) -> Self {
        Self {
            windows: windows.into(),
            session: SessionState::Closed,
        }
    }

    pub fn current(&self) -> Option<&ViewingWindow> {
        self.windows.front()
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn remaining(&self) -> impl Iterator<Item = &ViewingWindow> {
        self.windows.iter()
    }

    fn advance(&mut self) {
        self.windows.pop_front();
    }

    /// Swaps in a freshly reduced schedule.
    ///
    /// While the session is open the current window survives and keeps its
    /// `open`. Fresh windows that overlap it, or open less than
    /// [`MERGE_THRESHOLD_HOURS`] after it, are folded into it under `policy`, so
    /// a moved `close` is picked up even after the window's first matches have
    /// left the pending state. Fresh windows that ended before it are dropped;
    /// the rest follow it.
    pub fn replace_remaining(&mut self, fresh: Vec<ViewingWindow>, policy: ClosePolicy) {
        let mut current = match (self.session, self.windows.front()) {
            (SessionState::Open, Some(current)) => *current,
            _ => {
                self.windows = fresh.into();
                return;
            }
        };

        let mut later = VecDeque::new();
        for window in fresh {
            let hours_after = (window.open - current.open).num_seconds() / 3600;
            if window.open >= current.open && hours_after >= MERGE_THRESHOLD_HOURS {
                later.push_back(window);
            } else if window.open >= current.open || window.close > current.open {
                current.close = match policy {
                    ClosePolicy::LastWrite => window.close,
                    ClosePolicy::Max => current.close.max(window.close),
                };
            }
        }

        later.push_front(current);
        self.windows = later;
    }
}

//=========================================================================================
// WindowScheduler
//=========================================================================================

pub struct WindowScheduler {
    session: Arc<dyn StreamSession>,
    clock: Arc<dyn Clock>,
    source: Option<Arc<dyn ScheduleSource>>,
    settings: SchedulerSettings,
    cursor: ScheduleCursor,
    last_fetch: DateTime<Utc>,
}

impl WindowScheduler {
    /// Creates a scheduler over `windows`, which are assumed to have just been fetched.
    pub fn new(
        session: Arc<dyn StreamSession>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
        windows: Vec<ViewingWindow>,
    ) -> Self {
        let last_fetch = clock.now();
        Self {
            session,
            clock,
            source: None,
            settings,
            cursor: ScheduleCursor::new(windows),
            last_fetch,
        }
    }

    /// Refetches from `source` on poll ticks. Has no effect with exact-sleep.
    pub fn with_refetch(mut self, source: Arc<dyn ScheduleSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn cursor(&self) -> &ScheduleCursor {
        &self.cursor
    }

    /// Drives the session until every window is done or `cancel` fires.
    ///
    /// An open session is closed on every exit path. If the run itself failed,
    /// that error is returned even when the final close fails too.
    pub async fn run(&mut self, cancel: CancellationToken) -> PortResult<RunOutcome> {
        let result = self.drive(&cancel).await;

        if self.cursor.session != SessionState::Open {
            return result;
        }
        info!("Closing the stream before exiting.");
        match (result, self.close_session().await) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(close_err)) => {
                error!("Failed to close the stream while exiting: {}", close_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> PortResult<RunOutcome> {
        loop {
            if cancel.is_cancelled() {
                info!("Watcher cancelled.");
                return Ok(RunOutcome::Cancelled);
            }

            let Some(window) = self.cursor.current().copied() else {
                info!("No viewing windows left.");
                return Ok(RunOutcome::Completed);
            };
            let now = self.clock.now();
            let close_at = self.close_at(&window);

            let wake = match self.cursor.session {
                SessionState::Closed if now >= close_at => {
                    info!(
                        "Skipping window {} - {}, it is already over.",
                        window.open, window.close
                    );
                    self.cursor.advance();
                    continue;
                }
                SessionState::Closed => {
                    let open_at = self.open_at(&window);
                    if now >= open_at {
                        self.open_session(&window).await?;
                        continue;
                    }
                    debug!("Waiting to open at {}", open_at);
                    self.pause_until(open_at, cancel).await
                }
                SessionState::Open if now >= close_at => {
                    self.close_session().await?;
                    self.cursor.advance();
                    continue;
                }
                SessionState::Open => {
                    debug!("Waiting to close at {}", close_at);
                    self.pause_until(close_at, cancel).await
                }
            };

            if wake == Wake::Cancelled {
                info!("Watcher cancelled.");
                return Ok(RunOutcome::Cancelled);
            }
        }
    }

    fn open_at(&self, window: &ViewingWindow) -> DateTime<Utc> {
        window
            .open
            .checked_sub_signed(self.settings.open_margin)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn close_at(&self, window: &ViewingWindow) -> DateTime<Utc> {
        window
            .close
            .checked_add_signed(self.settings.close_margin)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    async fn open_session(&mut self, window: &ViewingWindow) -> PortResult<()> {
        info!("Opening the stream for {} - {}", window.open, window.close);
        self.session.open().await?;
        self.cursor.session = SessionState::Open;

        if self.settings.mute {
            if let Err(e) = self.session.mute().await {
                warn!("Could not mute the stream: {}", e);
            }
        }
        Ok(())
    }

    async fn close_session(&mut self) -> PortResult<()> {
        info!("Closing the stream.");
        self.session.close().await?;
        self.cursor.session = SessionState::Closed;
        Ok(())
    }

    /// Sleeps towards `deadline`, at most one poll interval at a time.
    async fn pause_until(&mut self, deadline: DateTime<Utc>, cancel: &CancellationToken) -> Wake {
        let remaining = (deadline - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
        let nap = match self.settings.poll_interval {
            Some(interval) => interval.min(remaining),
            None => remaining,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Wake::Cancelled,
            _ = self.clock.sleep(nap) => {}
        }

        self.refetch_if_due().await;
        Wake::Elapsed
    }

    async fn refetch_if_due(&mut self) {
        let (Some(source), Some(interval)) = (self.source.clone(), self.settings.poll_interval)
        else {
            return;
        };
        let now = self.clock.now();
        match (now - self.last_fetch).to_std() {
            Ok(elapsed) if elapsed >= interval => {}
            _ => return,
        }
        self.last_fetch = now;

        match source.fetch_matches().await {
            Ok(records) => {
                let fresh = reduce_with(&records, self.settings.close_policy);
                debug!("Refetched schedule: {} windows", fresh.len());
                self.cursor.replace_remaining(fresh, self.settings.close_policy);
            }
            Err(e) => warn!("Schedule refetch failed, keeping the current windows: {}", e),
        }
    }
}
