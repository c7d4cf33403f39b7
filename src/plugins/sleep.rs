//! A countdown that blocks until its time is over.

use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};

use crate::config::ConfigurationError;
use crate::plugin::{HelpSections, Plugin, ProductContext};
use crate::runner::{format_duration, Operation, OperationResult};

/// Section read by [`Sleep`] when none is given.
pub const SLEEP_SECTION: &str = "SLEEP";

const END_OPTION: &str = "end";
const TOTAL_OPTION: &str = "total";
const INTERVAL_OPTION: &str = "interval";
const VERBOSE_OPTION: &str = "verbose";

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

const CONFIGURATION: &str = "[SLEEP]
# one of end or total is required
# end = 2024-06-01 08:00:00
total = 1 hr 30 min
# time between reports of the time remaining (default 1 second)
interval = 1 min
# report the time remaining (default True)
verbose = True
";

const OPTIONS: &str = "{bold}end{reset} : an absolute timestamp (e.g. 2024-06-01 08:00:00) \
at which the sleep ends.

{bold}total{reset} : a relative time given as pairs of '<amount> <units>', e.g. '3.4 hours'. \
Most units only need their first letter, but `months` and `minutes` both start with `m` so \
they need two.

{bold}interval{reset} : time between reports of the time remaining (default 1 second), \
written like {bold}total{reset}.

{bold}verbose{reset} : report the time remaining at each interval (default True).

One of {bold}end{reset} or {bold}total{reset} is required.";

/// Plugin producing [`SleepOperation`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sleep;

impl Plugin for Sleep {
    fn name(&self) -> &'static str {
        "Sleep"
    }

    fn default_section(&self) -> &'static str {
        SLEEP_SECTION
    }

    fn product(&self, context: &mut ProductContext<'_>) -> anyhow::Result<Box<dyn Operation>> {
        let configuration = context.configuration();
        let section = context.section();

        let end = configuration.get_datetime_optional(section, END_OPTION)?;
        let total = configuration.get_relativetime_optional(section, TOTAL_OPTION)?;
        let until = match (end, total) {
            (_, Some(total)) => SleepUntil::After(total.to_std().unwrap_or(Duration::ZERO)),
            (Some(end), None) => SleepUntil::At(end),
            (None, None) => {
                return Err(ConfigurationError::MissingOption {
                    section: section.to_string(),
                    option: format!("{END_OPTION}' or '{TOTAL_OPTION}"),
                }
                .into())
            }
        };

        let interval = configuration
            .get_relativetime_optional(section, INTERVAL_OPTION)?
            .and_then(|interval| interval.to_std().ok())
            .filter(|interval| !interval.is_zero())
            .unwrap_or(DEFAULT_INTERVAL);
        let verbose = configuration.get_boolean_optional(section, VERBOSE_OPTION)?.unwrap_or(true);

        Ok(Box::new(SleepOperation { name: section.to_string(), until, interval, verbose }))
    }

    fn config(&self) -> String {
        CONFIGURATION.to_string()
    }

    fn sections(&self) -> HelpSections {
        vec![
            (
                "Name",
                "{bold}Sleep{reset} -- a countdown timer that blocks until time is over"
                    .to_string(),
            ),
            (
                "Description",
                "{bold}Sleep{reset} is a verbose no-op meant to insert a pause in a run."
                    .to_string(),
            ),
            ("Configuration", CONFIGURATION.to_string()),
            ("Options", OPTIONS.to_string()),
        ]
    }
}

/// When a sleep is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepUntil {
    /// A wall-clock timestamp.
    At(NaiveDateTime),
    /// A duration counted from the call.
    After(Duration),
}

/// Blocks until its end time, reporting the time left every interval.
#[derive(Debug, Clone)]
pub struct SleepOperation {
    name: String,
    until: SleepUntil,
    interval: Duration,
    verbose: bool,
}

impl SleepOperation {
    /// Create a sleep named `name`.
    pub fn new(
        name: impl Into<String>,
        until: SleepUntil,
        interval: Duration,
        verbose: bool,
    ) -> Self {
        Self { name: name.into(), until, interval, verbose }
    }

    /// When the sleep is over.
    pub fn until(&self) -> SleepUntil {
        self.until
    }

    /// Time between reports.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn deadline(&self, now: Instant) -> Instant {
        match self.until {
            SleepUntil::After(total) => now + total,
            SleepUntil::At(end) => {
                now + (end - Local::now().naive_local()).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

impl Operation for SleepOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&mut self) -> OperationResult {
        let deadline = self.deadline(Instant::now());
        tracing::info!(name = %self.name, "Sleeping");

        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            if self.verbose {
                tracing::info!(remaining = %format_duration(left), "Sleep time remaining");
            }
            std::thread::sleep(left.min(self.interval));
        }

        tracing::info!(name = %self.name, "Sleep is over");
        Ok(())
    }
}
