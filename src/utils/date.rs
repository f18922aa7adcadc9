//! Date helpers: "today" in the scheduling zone and serde for `YYYY-MM-DD` request fields.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date of `now` as observed in `tz`.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Calendar year of `now` as observed in `tz`.
pub fn current_year_in(tz: Tz, now: DateTime<Utc>) -> i32 {
    today_in(tz, now).year()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
}

/// Deserialize NaiveDate from "YYYY-MM-DD" string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_date(&s).map_err(serde::de::Error::custom)
}
