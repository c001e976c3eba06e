//! Inactivity countdown.
//!
//! One tick task per countdown cycle compares "now" with the instant of the
//! last user activity. Activity signals only move that instant, so bursts
//! of pointer or scroll events never reschedule anything; their effect is
//! observed at the next tick.

mod timer;
mod types;

pub use timer::InactivityTimer;
pub use types::{ActivityEvent, InactivityConfig, InactivityStatus, TimerPhase};
