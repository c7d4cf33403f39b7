//! Countdown budget for a run of operations.
//!
//! A [`CountdownTimer`] is told how many iterations the run will take,
//! then records how long each one took. Whether time remains depends on an
//! explicit [`BudgetPolicy`]:
//!
//! - [`BudgetPolicy::Iterations`]: time remains while fewer than the total
//!   number of iterations have completed.
//! - [`BudgetPolicy::Window`]: additionally, the estimate for the rest of the
//!   run (average recorded iteration × iterations left) added to the time
//!   already spent must fit inside the window.
//! - [`BudgetPolicy::Until`]: a window ending at a wall-clock deadline,
//!   measured from the moment the timer is created.

use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};

/// Source of monotonic time.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`]; unaffected by wall-clock changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// How a budget decides whether time remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BudgetPolicy {
    /// Run every iteration, no matter how long they take.
    #[default]
    Iterations,
    /// Stop once the projected finish no longer fits the window.
    Window(Duration),
    /// Like `Window`, for the time left until a local deadline.
    Until(NaiveDateTime),
}

impl BudgetPolicy {
    /// Fix a deadline into the window left at `now`; a passed deadline
    /// leaves an empty window.
    #[must_use]
    pub fn window_at(self, now: NaiveDateTime) -> Self {
        match self {
            Self::Until(end) => Self::Window((end - now).to_std().unwrap_or(Duration::ZERO)),
            policy => policy,
        }
    }
}

/// Time/iteration allowance consulted by the orchestrator.
pub trait Budget {
    /// Begin timing and forget previously recorded iterations.
    fn start(&mut self);

    /// Record the end of one iteration.
    fn next_iteration(&mut self);

    /// Whether another iteration may start.
    fn time_remaining(&self) -> bool;

    /// Estimated time left for the remaining iterations.
    fn remaining(&self) -> Option<Duration>;

    /// Time since [`Budget::start`].
    fn elapsed(&self) -> Duration;

    /// Number of iterations recorded since the last start.
    fn iterations_completed(&self) -> usize;
}

/// Budget that tracks per-iteration durations.
#[derive(Debug, Clone)]
pub struct CountdownTimer<C: Clock = MonotonicClock> {
    iterations: usize,
    policy: BudgetPolicy,
    window: Option<Duration>,
    clock: C,
    start: Option<Instant>,
    last_time: Option<Instant>,
    times: Vec<Duration>,
}

impl CountdownTimer<MonotonicClock> {
    /// Create a timer for `iterations` iterations.
    pub fn new(iterations: usize, policy: BudgetPolicy) -> Self {
        Self::with_clock(iterations, policy, MonotonicClock)
    }
}

impl<C: Clock> CountdownTimer<C> {
    /// Create a timer reading time from `clock`. A deadline policy becomes
    /// the window left right now.
    pub fn with_clock(iterations: usize, policy: BudgetPolicy, clock: C) -> Self {
        let window = match policy.window_at(Local::now().naive_local()) {
            BudgetPolicy::Window(window) => Some(window),
            BudgetPolicy::Iterations | BudgetPolicy::Until(_) => None,
        };
        Self {
            iterations,
            policy,
            window,
            clock,
            start: None,
            last_time: None,
            times: Vec::new(),
        }
    }

    /// Total number of iterations expected.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The policy the timer was created with.
    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    /// The window in force, if any; deadlines are fixed when the timer is
    /// created.
    pub fn window(&self) -> Option<Duration> {
        self.window
    }

    /// When timing began.
    pub fn start_time(&self) -> Option<Instant> {
        self.start
    }

    /// When the last iteration ended (or timing began).
    pub fn last_time(&self) -> Option<Instant> {
        self.last_time
    }

    /// Recorded iteration durations, oldest first.
    pub fn times(&self) -> &[Duration] {
        &self.times
    }

    fn iterations_left(&self) -> usize {
        self.iterations.saturating_sub(self.times.len())
    }

    fn average(&self) -> Option<Duration> {
        if self.times.is_empty() {
            return None;
        }
        let total: Duration = self.times.iter().sum();
        Some(total / self.times.len() as u32)
    }
}

impl<C: Clock> Budget for CountdownTimer<C> {
    fn start(&mut self) {
        let now = self.clock.now();
        self.start = Some(now);
        self.last_time = Some(now);
        self.times.clear();
    }

    fn next_iteration(&mut self) {
        let now = self.clock.now();
        let last = self.last_time.unwrap_or(now);
        self.times.push(now.saturating_duration_since(last));
        self.last_time = Some(now);
    }

    fn time_remaining(&self) -> bool {
        if self.iterations_left() == 0 {
            return false;
        }
        match self.window {
            None => true,
            Some(window) if window.is_zero() => false,
            Some(window) => {
                let projected = self.elapsed() + self.remaining().unwrap_or_default();
                projected <= window
            }
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.start?;
        let average = self.average()?;
        Some(average * self.iterations_left() as u32)
    }

    fn elapsed(&self) -> Duration {
        self.start.map(|start| self.clock.now().saturating_duration_since(start)).unwrap_or_default()
    }

    fn iterations_completed(&self) -> usize {
        self.times.len()
    }
}

/// Render a duration for progress reports (`1h 02m 03s`, `4m 05s`, `1.25s`).
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
