use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::types::{ActivityEvent, InactivityConfig, InactivityStatus, TimerPhase};

type ExpireCallback = Box<dyn Fn() + Send + Sync>;

struct TimerState {
    enabled: bool,
    phase: TimerPhase,
    last_activity: Instant,
    /// Bumped on every (re)start so a superseded tick task stops itself.
    cycle: u64,
    task: Option<JoinHandle<()>>,
}

struct TimerInner {
    config: InactivityConfig,
    on_expire: ExpireCallback,
    state: Mutex<TimerState>,
    status_tx: watch::Sender<InactivityStatus>,
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        if let Some(task) = self.state.get_mut().task.take() {
            task.abort();
        }
    }
}

/// Countdown that calls `on_expire` once the user has been idle for
/// `timeout`, after publishing a warning during the last `warning` of it.
///
/// The timer starts disabled. [`set_enabled`](Self::set_enabled) scopes it
/// to the lifetime of an authenticated session.
#[derive(Clone)]
pub struct InactivityTimer {
    inner: Arc<TimerInner>,
}

impl InactivityTimer {
    pub fn new<F>(config: InactivityConfig, on_expire: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (status_tx, _) = watch::channel(InactivityStatus::default());
        Self {
            inner: Arc::new(TimerInner {
                config,
                on_expire: Box::new(on_expire),
                state: Mutex::new(TimerState {
                    enabled: false,
                    phase: TimerPhase::Idle,
                    last_activity: Instant::now(),
                    cycle: 0,
                    task: None,
                }),
                status_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<InactivityStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn status(&self) -> InactivityStatus {
        *self.inner.status_tx.borrow()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    /// Starts a fresh countdown. Does nothing while disabled.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if !state.enabled {
            tracing::debug!("Inactivity timer is disabled, not starting");
            return;
        }
        self.restart(&mut state);
    }

    /// Back to zero elapsed time with the warning cleared.
    pub fn reset_timer(&self) {
        let mut state = self.inner.state.lock();
        if !state.enabled {
            return;
        }
        match state.phase {
            TimerPhase::Running | TimerPhase::Warning => {
                state.last_activity = Instant::now();
                let status = InactivityStatus::running(&self.inner.config);
                state.phase = status.phase;
                self.inner.status_tx.send_replace(status);
            }
            // The tick task is gone after expiry; a reset begins a new cycle
            TimerPhase::Idle | TimerPhase::Expired => self.restart(&mut state),
        }
    }

    /// Notes user activity. Only the last-activity instant moves; the
    /// published status catches up on the next tick.
    pub fn record_activity(&self, event: ActivityEvent) {
        let mut state = self.inner.state.lock();
        if state.enabled && matches!(state.phase, TimerPhase::Running | TimerPhase::Warning) {
            tracing::trace!("Activity: {:?}", event);
            state.last_activity = Instant::now();
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.lock();
        if state.enabled == enabled {
            return;
        }
        state.enabled = enabled;

        if enabled {
            tracing::debug!("Inactivity timer enabled");
            self.restart(&mut state);
        } else {
            tracing::debug!("Inactivity timer disabled");
            if let Some(task) = state.task.take() {
                task.abort();
            }
            state.cycle += 1;
            state.phase = TimerPhase::Idle;
            self.inner.status_tx.send_replace(InactivityStatus::default());
        }
    }

    fn restart(&self, state: &mut TimerState) {
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.cycle += 1;
        state.last_activity = Instant::now();
        let status = InactivityStatus::running(&self.inner.config);
        state.phase = status.phase;
        self.inner.status_tx.send_replace(status);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = spawn_ticker(
                    &handle,
                    Arc::downgrade(&self.inner),
                    state.cycle,
                    self.inner.config.tick,
                );
                state.task = Some(task);
            }
            Err(e) => {
                tracing::error!("Inactivity timer needs a Tokio runtime to tick: {}", e);
            }
        }
    }
}

fn spawn_ticker(
    handle: &tokio::runtime::Handle,
    inner: Weak<TimerInner>,
    cycle: u64,
    period: std::time::Duration,
) -> JoinHandle<()> {
    handle.spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if !inner.tick(cycle) {
                break;
            }
        }
    })
}

impl TimerInner {
    /// Returns false once this cycle's ticker should stop.
    fn tick(&self, cycle: u64) -> bool {
        let status = {
            let mut state = self.state.lock();
            if state.cycle != cycle
                || !matches!(state.phase, TimerPhase::Running | TimerPhase::Warning)
            {
                return false;
            }

            let status = InactivityStatus::evaluate(state.last_activity.elapsed(), &self.config);
            if status.phase == TimerPhase::Warning && state.phase == TimerPhase::Running {
                tracing::info!(
                    "Inactivity warning: logout in {} seconds",
                    status.seconds_remaining
                );
            }
            state.phase = status.phase;
            if status.phase == TimerPhase::Expired {
                state.task = None;
            }
            self.status_tx.send_replace(status);
            status
        };

        if status.phase == TimerPhase::Expired {
            tracing::info!("Inactivity timeout reached");
            (self.on_expire)();
            return false;
        }
        true
    }
}
