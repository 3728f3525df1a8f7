//! `ALTER TABLE ... MODIFY TTL` statement synthesis.

use std::fmt;
use std::num::NonZeroU32;

use common::identifier::escape_identifier;

use crate::classifier::{TimeColumnDecision, TimeEncoding};

/// Divisor turning a nanosecond epoch into seconds.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Number of days rows are kept for. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetentionWindow(NonZeroU32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("retention window must be at least one day, got {0}")]
pub struct InvalidRetentionWindow(pub u32);

impl RetentionWindow {
    pub fn new(days: u32) -> Result<Self, InvalidRetentionWindow> {
        NonZeroU32::new(days)
            .map(Self)
            .ok_or(InvalidRetentionWindow(days))
    }

    pub fn days(&self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for RetentionWindow {
    type Error = InvalidRetentionWindow;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        Self::new(days)
    }
}

impl fmt::Display for RetentionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days", self.days())
    }
}

/// The expression the retention interval is added to.
///
/// TTL expressions must evaluate to `Date` or `DateTime`, so `DateTime64`
/// columns are truncated with `toDateTime` and nanosecond integers are first
/// divided down to seconds.
pub fn ttl_expression(decision: &TimeColumnDecision) -> String {
    let column = escape_identifier(&decision.name);
    match decision.encoding {
        TimeEncoding::EpochInteger => format!("toDateTime({column} / {NANOS_PER_SECOND})"),
        TimeEncoding::Calendar if decision.has_sub_second_precision() => {
            format!("toDateTime({column})")
        }
        TimeEncoding::Calendar => column,
    }
}

pub fn synthesize(
    database: &str,
    table: &str,
    decision: &TimeColumnDecision,
    window: RetentionWindow,
) -> String {
    format!(
        "ALTER TABLE {}.{} MODIFY TTL {} + INTERVAL {} DAY",
        escape_identifier(database),
        escape_identifier(table),
        ttl_expression(decision),
        window.days()
    )
}
