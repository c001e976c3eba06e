use std::time::Duration;

/// Thresholds of the inactivity countdown.
///
/// `warning` is measured backwards from `timeout`: with a 30 minute timeout
/// and a 5 minute warning the prompt appears after 25 idle minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactivityConfig {
    pub timeout: Duration,
    pub warning: Duration,
    pub tick: Duration,
}

impl InactivityConfig {
    pub(super) fn warning_threshold(&self) -> Duration {
        self.timeout.saturating_sub(self.warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPhase {
    /// Disabled, or enabled but never started.
    #[default]
    Idle,
    Running,
    Warning,
    /// `on_expire` has fired; no more ticks until reset or re-enable.
    Expired,
}

/// Snapshot published to the presentation layer on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InactivityStatus {
    pub phase: TimerPhase,
    pub show_warning: bool,
    /// Whole seconds left before the inactivity logout, rounded up.
    pub seconds_remaining: u64,
}

/// User interaction signals that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityEvent {
    PointerMove,
    PointerDown,
    KeyPress,
    Touch,
    Scroll,
}

impl ActivityEvent {
    pub const ALL: [ActivityEvent; 5] = [
        ActivityEvent::PointerMove,
        ActivityEvent::PointerDown,
        ActivityEvent::KeyPress,
        ActivityEvent::Touch,
        ActivityEvent::Scroll,
    ];
}

impl InactivityStatus {
    pub(super) fn running(config: &InactivityConfig) -> Self {
        Self::evaluate(Duration::ZERO, config)
    }

    /// Status after `elapsed` idle time.
    pub(super) fn evaluate(elapsed: Duration, config: &InactivityConfig) -> Self {
        if elapsed >= config.timeout {
            return Self {
                phase: TimerPhase::Expired,
                show_warning: false,
                seconds_remaining: 0,
            };
        }

        let remaining = config.timeout - elapsed;
        let seconds_remaining = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);

        if elapsed >= config.warning_threshold() {
            Self {
                phase: TimerPhase::Warning,
                show_warning: true,
                seconds_remaining,
            }
        } else {
            Self {
                phase: TimerPhase::Running,
                show_warning: false,
                seconds_remaining,
            }
        }
    }
}
