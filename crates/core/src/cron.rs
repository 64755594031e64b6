// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! 5-field crontab schedules.
//!
//! `minute hour dom month dow` with `*`, numeric ranges (`a-b`), steps
//! (`*/n`, `a-b/n`) and comma lists. Matching is minute-resolution against
//! a caller-supplied wall-clock time, so the scheduler decides the zone.

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid cron field '{0}'")]
    Field(String),

    #[error("value {value} out of range {min}..={max}")]
    Range { value: u32, min: u32, max: u32 },
}

/// A parsed crontab schedule. Keeps its source string for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Schedule {
    source: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days: Vec<u32>,
    months: Vec<u32>,
    weekdays: Vec<u32>,
}

impl Schedule {
    /// True when the schedule covers the wall-clock minute of `t`.
    pub fn matches<Tz: TimeZone>(&self, t: &DateTime<Tz>) -> bool {
        self.minutes.contains(&t.minute())
            && self.hours.contains(&t.hour())
            && self.days.contains(&t.day())
            && self.months.contains(&t.month())
            && self.weekdays.contains(&t.weekday().num_days_from_sunday())
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Schedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }

        Ok(Self {
            source: fields.join(" "),
            minutes: parse_field(fields[0], 0, 59)?,
            hours: parse_field(fields[1], 0, 23)?,
            days: parse_field(fields[2], 1, 31)?,
            months: parse_field(fields[3], 1, 12)?,
            // Crontab allows 0-7 for day-of-week; 7 folds onto Sunday (0).
            weekdays: parse_field(fields[4], 0, 7)?
                .into_iter()
                .map(|d| d % 7)
                .collect(),
        })
    }
}

impl TryFrom<String> for Schedule {
    type Error = CronError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Schedule> for String {
    fn from(s: Schedule) -> String {
        s.source
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Expand one crontab field into its covered values.
fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, CronError> {
    let mut values = Vec::new();
    for part in field.split(',') {
        values.extend(parse_part(part, min, max)?);
    }
    if values.is_empty() {
        return Err(CronError::Field(field.to_string()));
    }
    values.sort_unstable();
    values.dedup();
    Ok(values)
}

/// One comma-separated part: `*`, `*/n`, `a`, `a-b`, or `a-b/n`.
fn parse_part(part: &str, min: u32, max: u32) -> Result<Vec<u32>, CronError> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => {
            let step: u32 = step
                .parse()
                .map_err(|_| CronError::Field(part.to_string()))?;
            if step == 0 {
                return Err(CronError::Field(part.to_string()));
            }
            (range, step)
        }
        None => (part, 1),
    };

    let (lo, hi) = if range == "*" {
        (min, max)
    } else if let Some((lo, hi)) = range.split_once('-') {
        (
            parse_value(lo, min, max)?,
            parse_value(hi, min, max)?,
        )
    } else {
        let v = parse_value(range, min, max)?;
        (v, v)
    };

    if lo > hi {
        return Err(CronError::Field(part.to_string()));
    }

    Ok((lo..=hi).step_by(step as usize).collect())
}

fn parse_value(s: &str, min: u32, max: u32) -> Result<u32, CronError> {
    let value: u32 = s.parse().map_err(|_| CronError::Field(s.to_string()))?;
    if !(min..=max).contains(&value) {
        return Err(CronError::Range { value, min, max });
    }
    Ok(value)
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
