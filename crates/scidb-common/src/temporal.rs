//! Temporal reference metadata: origin instant plus interval granularity.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar-component interval in ISO 8601 duration notation.
///
/// Months and years do not have a fixed length in seconds, so the
/// components are kept separate and applied with calendar arithmetic.
/// The bare string "P" denotes an unset interval, which is distinct
/// from one whose components happen to be zero-but-present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemporalInterval {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TemporalInterval {
    /// Whether no component at all is set.
    pub fn is_unset(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
    }

    /// Whether the interval needs calendar arithmetic rather than a
    /// fixed number of seconds.
    fn is_calendar(&self) -> bool {
        self.years > 0 || self.months > 0
    }

    fn fixed_seconds(&self) -> i64 {
        i64::from(self.days) * 86_400
            + i64::from(self.hours) * 3_600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds)
    }

    /// Add this interval `count` times onto an instant.
    pub fn add_to(&self, t: DateTime<Utc>, count: i64) -> DateTime<Utc> {
        if self.is_calendar() {
            let months = i64::from(self.years) * 12 + i64::from(self.months);
            let total = months * count;
            let shifted = if total >= 0 {
                t.checked_add_months(Months::new(total as u32)).unwrap_or(t)
            } else {
                t.checked_sub_months(Months::new((-total) as u32)).unwrap_or(t)
            };
            shifted + Duration::seconds(self.fixed_seconds() * count)
        } else {
            t + Duration::seconds(self.fixed_seconds() * count)
        }
    }

    /// Parse ISO 8601 duration notation, e.g. "P1D", "PT6H", "P1Y2M".
    pub fn parse(s: &str) -> Result<Self, TemporalParseError> {
        let s = s.trim();
        let rest = s
            .strip_prefix('P')
            .ok_or_else(|| TemporalParseError::InvalidDuration(s.to_string()))?;

        let mut out = Self::default();
        let mut in_time = false;
        let mut digits = String::new();
        for c in rest.chars() {
            match c {
                'T' => in_time = true,
                '0'..='9' => digits.push(c),
                unit => {
                    let value: u32 = digits
                        .parse()
                        .map_err(|_| TemporalParseError::InvalidDuration(s.to_string()))?;
                    digits.clear();
                    match (unit, in_time) {
                        ('Y', false) => out.years = value,
                        ('M', false) => out.months = value,
                        ('W', false) => out.days = value * 7,
                        ('D', false) => out.days = value,
                        ('H', true) => out.hours = value,
                        ('M', true) => out.minutes = value,
                        ('S', true) => out.seconds = value,
                        _ => return Err(TemporalParseError::InvalidDuration(s.to_string())),
                    }
                }
            }
        }
        if !digits.is_empty() {
            return Err(TemporalParseError::InvalidDuration(s.to_string()));
        }
        Ok(out)
    }
}

impl fmt::Display for TemporalInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for TemporalInterval {
    type Err = TemporalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse a backend datetime cell into a UTC instant.
///
/// The shim reports datetimes either as ISO 8601 or in SciDB's
/// "YYYY-MM-DD hh:mm:ss" form; date-only values are midnight UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TemporalParseError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = nd.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }
    Err(TemporalParseError::InvalidDatetime(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TemporalParseError {
    #[error("Invalid ISO 8601 duration: {0}")]
    InvalidDuration(String),
    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),
}

/// Temporal reference of an array: which dimension spans time and how
/// dimension indices map to instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalReference {
    /// Name of the temporal dimension.
    pub tdim: String,
    /// Instant at dimension index 0.
    pub t0: DateTime<Utc>,
    /// Step between consecutive indices.
    pub dt: TemporalInterval,
}

impl TemporalReference {
    /// Instant at a given dimension index.
    pub fn datetime_at_index(&self, index: i64) -> DateTime<Utc> {
        self.dt.add_to(self.t0, index)
    }

    /// Largest index whose instant is not after `t`.
    ///
    /// Month/year granularity steps through the calendar so that e.g.
    /// P1M lands on month boundaries regardless of month length.
    pub fn index_at_datetime(&self, t: DateTime<Utc>) -> i64 {
        if self.dt.is_unset() {
            return 0;
        }
        if !self.dt.is_calendar() {
            let step = self.dt.fixed_seconds();
            let delta = (t - self.t0).num_seconds();
            return delta.div_euclid(step);
        }
        // Calendar stepping: start from a month-based guess, then correct.
        let months_per_step = i64::from(self.dt.years) * 12 + i64::from(self.dt.months);
        let approx_months = i64::from(t.year() - self.t0.year()) * 12
            + i64::from(t.month() as i32 - self.t0.month() as i32);
        let mut index = approx_months.div_euclid(months_per_step.max(1));
        while self.datetime_at_index(index + 1) <= t {
            index += 1;
        }
        while self.datetime_at_index(index) > t {
            index -= 1;
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_interval_parse_roundtrip() {
        for s in ["P1D", "PT6H", "P1Y2M", "P10DT30M", "PT15S"] {
            let i = TemporalInterval::parse(s).unwrap();
            assert_eq!(i.to_string(), s);
        }
    }

    #[test]
    fn test_interval_unset() {
        let i = TemporalInterval::parse("P").unwrap();
        assert!(i.is_unset());
        assert_eq!(i.to_string(), "P");
    }

    #[test]
    fn test_interval_parse_errors() {
        assert!(TemporalInterval::parse("1D").is_err());
        assert!(TemporalInterval::parse("P1").is_err());
        assert!(TemporalInterval::parse("PT1D").is_err());
    }

    #[test]
    fn test_index_fixed_interval() {
        let trs = TemporalReference {
            tdim: "t".to_string(),
            t0: utc(2020, 1, 1, 0),
            dt: TemporalInterval::parse("PT6H").unwrap(),
        };
        assert_eq!(trs.index_at_datetime(utc(2020, 1, 1, 0)), 0);
        assert_eq!(trs.index_at_datetime(utc(2020, 1, 1, 18)), 3);
        assert_eq!(trs.index_at_datetime(utc(2020, 1, 2, 1)), 4);
        assert_eq!(trs.datetime_at_index(4), utc(2020, 1, 2, 0));
    }

    #[test]
    fn test_index_month_interval() {
        let trs = TemporalReference {
            tdim: "t".to_string(),
            t0: utc(2020, 1, 31, 0),
            dt: TemporalInterval::parse("P1M").unwrap(),
        };
        // Feb has no 31st; chrono clamps to the 29th in 2020.
        assert_eq!(trs.datetime_at_index(1), utc(2020, 2, 29, 0));
        assert_eq!(trs.index_at_datetime(utc(2020, 3, 30, 0)), 1);
        assert_eq!(trs.index_at_datetime(utc(2020, 3, 31, 0)), 2);
    }

    #[test]
    fn test_parse_datetime_forms() {
        assert_eq!(
            parse_datetime("2024-01-15T12:00:00Z").unwrap(),
            utc(2024, 1, 15, 12)
        );
        assert_eq!(
            parse_datetime("2024-01-15 12:00:00").unwrap(),
            utc(2024, 1, 15, 12)
        );
        assert_eq!(parse_datetime("2024-01-15").unwrap(), utc(2024, 1, 15, 0));
        assert!(parse_datetime("not a date").is_err());
    }
}
