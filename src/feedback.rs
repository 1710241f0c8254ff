//! Volume and activity feedback
//!
//! The assistant reports a level in `[0, 1]` together with what it is doing.
//! Sinks are purely observational and never influence the session.

use std::io::Write;
use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// What the assistant is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActivityState {
    #[default]
    Idle,
    /// The user is speaking
    Listening,
    /// Waiting on the model or running functions
    Processing,
    /// Assistant audio is playing
    Speaking,
}

impl ActivityState {
    /// Short label for display
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "thinking",
            Self::Speaking => "speaking",
        }
    }
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Receiver of level and activity updates
pub trait VisualFeedback: Send {
    /// Report the current level (clamped to `[0, 1]` by callers) and state
    fn update(&mut self, level: f32, state: ActivityState);
}

/// Feedback sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl VisualFeedback for NoFeedback {
    fn update(&mut self, _level: f32, _state: ActivityState) {}
}

/// Single-line level meter on stderr
#[derive(Debug)]
pub struct TerminalMeter {
    width: usize,
    last: Option<ActivityState>,
}

impl TerminalMeter {
    /// Meter with a bar of `width` cells
    #[must_use]
    pub const fn new(width: usize) -> Self {
        Self { width, last: None }
    }
}

impl Default for TerminalMeter {
    fn default() -> Self {
        Self::new(40)
    }
}

impl VisualFeedback for TerminalMeter {
    fn update(&mut self, level: f32, state: ActivityState) {
        let line = render_meter(level, state, self.width);
        let mut err = std::io::stderr().lock();
        // Terminal output is best-effort
        let _ = write!(err, "\r{line}");
        if self.last != Some(state) && state == ActivityState::Idle {
            let _ = writeln!(err);
        }
        let _ = err.flush();
        self.last = Some(state);
    }
}

impl Drop for TerminalMeter {
    fn drop(&mut self) {
        if self.last.is_some() {
            let _ = writeln!(std::io::stderr());
        }
    }
}

/// Render one meter line, e.g. `[listening] ████      `
#[must_use]
pub fn render_meter(level: f32, state: ActivityState, width: usize) -> String {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = ((level.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!(
        "[{:>9}] {}{}",
        state.label(),
        "█".repeat(filled),
        " ".repeat(width - filled)
    )
}

/// Bounds how often the wrapped sink is updated
///
/// State changes always pass through; repeated updates for the same state
/// are subject to the quota.
pub struct RateLimited<F> {
    inner: F,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    last_state: Option<ActivityState>,
}

impl<F: VisualFeedback> RateLimited<F> {
    /// Allow at most `per_second` same-state updates per second
    pub fn new(inner: F, per_second: u32) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner,
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            last_state: None,
        }
    }

    /// The wrapped sink
    pub const fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: VisualFeedback> VisualFeedback for RateLimited<F> {
    fn update(&mut self, level: f32, state: ActivityState) {
        let changed = self.last_state != Some(state);
        if changed || self.limiter.check().is_ok() {
            self.last_state = Some(state);
            self.inner.update(level, state);
        }
    }
}

impl<F> std::fmt::Debug for RateLimited<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimited")
            .field("last_state", &self.last_state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<(f32, ActivityState)>);

    impl VisualFeedback for Recorder {
        fn update(&mut self, level: f32, state: ActivityState) {
            self.0.push((level, state));
        }
    }

    #[test]
    fn meter_scales_with_level() {
        assert_eq!(
            render_meter(0.5, ActivityState::Listening, 10),
            "[listening] █████     "
        );
        assert_eq!(render_meter(3.0, ActivityState::Idle, 4), "[     idle] ████");
        assert_eq!(render_meter(-1.0, ActivityState::Idle, 4), "[     idle]     ");
    }

    #[test]
    fn rate_limit_drops_repeats_but_not_transitions() {
        let mut feedback = RateLimited::new(Recorder::default(), 1);

        feedback.update(0.1, ActivityState::Listening);
        feedback.update(0.2, ActivityState::Listening);
        feedback.update(0.3, ActivityState::Listening);
        feedback.update(0.4, ActivityState::Speaking);

        let states: Vec<_> = feedback.inner().0.iter().map(|(_, s)| *s).collect();
        assert_eq!(states.first(), Some(&ActivityState::Listening));
        assert_eq!(states.last(), Some(&ActivityState::Speaking));
        assert!(states.len() < 4);
    }
}
