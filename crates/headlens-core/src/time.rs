//! Time and duration utilities.
//!
//! All duration math in one aggregation pass is done against a single
//! [`PassClock`], captured once when the pass starts and copied into
//! every task, so expiry and usability decisions agree with each other.

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::DataError;

/// Text shown for machines and keys that never expire.
pub const NO_EXPIRATION: &str = "No expiration date";

/// Wire value headscale uses for "no expiry" (Go's zero `time.Time`).
pub const ZERO_TIMESTAMP: &str = "0001-01-01T00:00:00Z";

/// Years that only ever appear as placeholder dates.
const SENTINEL_YEARS: [i32; 3] = [0, 1, 9999];

/// An expiry closer than this many whole days is flagged.
const EXPIRING_SOON_DAYS: i64 = 14;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// The "now" of one aggregation pass, together with the display timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassClock {
    now: DateTime<Utc>,
    timezone: Tz,
}

impl PassClock {
    /// Capture the current time.
    #[must_use]
    pub fn capture(timezone: Tz) -> Self {
        Self::at(Utc::now(), timezone)
    }

    /// A clock pinned to a given instant.
    #[must_use]
    pub const fn at(now: DateTime<Utc>, timezone: Tz) -> Self {
        Self { now, timezone }
    }

    /// The captured instant.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The display timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Time elapsed since `ts` (negative if `ts` is in the future).
    #[must_use]
    pub fn since(&self, ts: DateTime<Utc>) -> TimeDelta {
        self.now - ts
    }

    /// Time remaining until `ts` (negative if `ts` has passed).
    #[must_use]
    pub fn until(&self, ts: DateTime<Utc>) -> TimeDelta {
        ts - self.now
    }

    /// Render `ts` in the display timezone, e.g.
    /// `Monday 03/06/2023, 14:00:00 Europe/Berlin`.
    #[must_use]
    pub fn format_timestamp(&self, ts: DateTime<Utc>) -> String {
        let local = ts.with_timezone(&self.timezone);
        format!(
            "{} {}",
            local.format("%A %m/%d/%Y, %H:%M:%S"),
            self.timezone.name()
        )
    }
}

/// Status class derived from how long ago a machine was last seen.
///
/// Variants are ordered from most to least recently seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorClass {
    /// Seen within the last 30 seconds.
    Fresh,
    /// Seen within the last 5 minutes.
    Online,
    /// Seen within the last 15 minutes.
    Active,
    /// Seen within the last hour.
    Quiet,
    /// Seen one hour ago.
    Recent,
    /// Seen within the last 12 hours.
    Away,
    /// Seen within the last 2 days.
    Idle,
    /// Seen within the last 2 weeks.
    Stale,
    /// Seen within the last 30 days.
    Lost,
    /// Not seen for over 30 days.
    Offline,
}

impl ColorClass {
    /// CSS classes for the status badge.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Fresh => "green-text",
            Self::Online => "green-text text-lighten-2",
            Self::Active => "green-text text-lighten-3",
            Self::Quiet => "yellow-text text-lighten-2",
            Self::Recent => "yellow-text",
            Self::Away => "orange-text text-lighten-2",
            Self::Idle => "orange-text",
            Self::Stale => "deep-orange-text text-lighten-1",
            Self::Lost => "red-text text-darken-2",
            Self::Offline => "grey-text",
        }
    }
}

/// Map time since last contact to a status class.
///
/// Negative deltas (clock skew) count as "just seen".
#[must_use]
pub fn classify_color(delta: TimeDelta) -> ColorClass {
    let total = delta.num_seconds().max(0).unsigned_abs();
    let days = total / SECS_PER_DAY;
    let hours = total / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;

    if days > 30 {
        ColorClass::Offline
    } else if days > 14 {
        ColorClass::Lost
    } else if days > 1 {
        ColorClass::Stale
    } else if hours > 12 {
        ColorClass::Idle
    } else if hours > 1 {
        ColorClass::Away
    } else if hours == 1 {
        ColorClass::Recent
    } else if minutes > 15 {
        ColorClass::Quiet
    } else if minutes > 5 {
        ColorClass::Active
    } else if total > 30 {
        ColorClass::Online
    } else {
        ColorClass::Fresh
    }
}

/// Phrasing used by [`format_duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationMode {
    /// Time since an event: "3 days ago".
    Elapsed,
    /// Time until an expiry: "in 5 hours".
    UntilExpiry,
}

/// Human-relative rendering of a delta.
///
/// For [`DurationMode::Elapsed`] the delta is `now - event`; for
/// [`DurationMode::UntilExpiry`] it is `expiry - now`. Either sign is
/// accepted.
#[must_use]
pub fn format_duration(delta: TimeDelta, mode: DurationMode) -> String {
    let negative = delta < TimeDelta::zero();
    let total = delta.num_seconds().unsigned_abs();

    match mode {
        DurationMode::Elapsed if total == 0 => "just now".to_string(),
        DurationMode::Elapsed if negative => format!("in {}", describe_span(total)),
        DurationMode::Elapsed => format!("{} ago", describe_span(total)),
        DurationMode::UntilExpiry if negative => format!("expired {} ago", describe_span(total)),
        DurationMode::UntilExpiry => {
            let days = total / SECS_PER_DAY;
            if days > 730 {
                "in greater than two years".to_string()
            } else if days > 365 {
                "in greater than a year".to_string()
            } else {
                format!("in {}", describe_span(total))
            }
        }
    }
}

/// Largest whole unit of a span: "2 days", "1 hour", "45 seconds".
fn describe_span(total_secs: u64) -> String {
    let days = total_secs / SECS_PER_DAY;
    let hours = total_secs / SECS_PER_HOUR;
    let minutes = (total_secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total_secs % SECS_PER_MINUTE;

    if days > 0 {
        plural(days, "day")
    } else if hours > 0 {
        plural(hours, "hour")
    } else if minutes > 0 {
        plural(minutes, "minute")
    } else {
        plural(seconds, "second")
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// How an expiry should be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryDisplay {
    /// Display text, or [`NO_EXPIRATION`].
    pub text: String,
    /// Whether the expiry is less than two weeks (but at least a day) away.
    pub expiring_soon: bool,
}

/// Resolve the display of an optional expiry.
///
/// `None` is the explicit form of headscale's "never expires" sentinel,
/// see [`parse_expiry`].
#[must_use]
pub fn resolve_expiry_display(expiry: Option<DateTime<Utc>>, clock: &PassClock) -> ExpiryDisplay {
    let Some(ts) = expiry else {
        return ExpiryDisplay {
            text: NO_EXPIRATION.to_string(),
            expiring_soon: false,
        };
    };

    let delta = clock.until(ts);
    let days = delta.num_days();
    ExpiryDisplay {
        text: format!(
            "{} ({})",
            clock.format_timestamp(ts),
            format_duration(delta, DurationMode::UntilExpiry)
        ),
        expiring_soon: days > 0 && days < EXPIRING_SOON_DAYS,
    }
}

/// Parse a required RFC 3339 timestamp.
pub fn parse_timestamp(field: &'static str, raw: Option<&str>) -> Result<DateTime<Utc>, DataError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(DataError::missing(field))?;

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DataError::InvalidTimestamp {
            field,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Parse an expiry, folding every "never expires" form into `None`.
///
/// Absent values, [`ZERO_TIMESTAMP`] and placeholder years (0000, 0001,
/// 9999) all mean no expiry.
pub fn parse_expiry(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, DataError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if raw == ZERO_TIMESTAMP {
        return Ok(None);
    }

    let ts = parse_timestamp(field, Some(raw))?;
    if SENTINEL_YEARS.contains(&ts.year()) {
        return Ok(None);
    }
    Ok(Some(ts))
}
