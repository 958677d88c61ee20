//! Cron evaluation: the most recent occurrence at or before a timestamp.
//!
//! Timestamps are wall-clock `NaiveDateTime`s. They are evaluated as if
//! they were UTC so that no daylight-saving shift can move an occurrence.

use chrono::{NaiveDateTime, TimeDelta, TimeZone, Utc};
use croner::Cron;

use crate::error::{Result, TaskError};

/// Look-back windows tried in order, in seconds. The first window that
/// contains an occurrence is scanned forward to its last one.
const LOOKBACK_WINDOWS_SECS: &[i64] = &[
    2 * 60,
    2 * 3600,
    2 * 86_400,
    32 * 86_400,
    367 * 86_400,
    5 * 366 * 86_400,
    30 * 366 * 86_400,
];

/// A parsed, validated cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    cron: Cron,
}

impl CronSchedule {
    /// Parse a standard five-field cron expression.
    ///
    /// Expressions that are well formed but can never fire (`* * 30 2 *`)
    /// are rejected too.
    pub fn parse(expr: &str) -> Result<Self> {
        let cron = Cron::new(expr).parse().map_err(|e| TaskError::InvalidCron {
            expr: expr.to_owned(),
            reason: e.to_string(),
        })?;
        if !ever_fires(&cron) {
            return Err(TaskError::InvalidCron {
                expr: expr.to_owned(),
                reason: "schedule never fires".to_owned(),
            });
        }
        Ok(Self {
            expr: expr.to_owned(),
            cron,
        })
    }

    /// The source expression.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Most recent occurrence `<= at`, or `None` if the schedule has not
    /// fired within the widest look-back window.
    pub fn previous_occurrence(&self, at: NaiveDateTime) -> Option<NaiveDateTime> {
        let at = Utc.from_utc_datetime(&at);

        for &window in LOOKBACK_WINDOWS_SECS {
            let Some(start) = at.checked_sub_signed(TimeDelta::seconds(window)) else {
                continue;
            };
            let mut latest = match self.cron.find_next_occurrence(&start, true) {
                Ok(first) if first <= at => first,
                _ => continue,
            };
            while let Ok(next) = self.cron.find_next_occurrence(&latest, false) {
                if next > at {
                    break;
                }
                latest = next;
            }
            return Some(latest.naive_utc());
        }
        None
    }
}

/// Whether `cron` has any occurrence after a fixed anchor date.
fn ever_fires(cron: &Cron) -> bool {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .is_some_and(|anchor| cron.find_next_occurrence(&anchor, true).is_ok())
}
