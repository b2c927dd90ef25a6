use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::ValidationError;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Calendar date of a daily bar, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradingDate(Date);

impl TradingDate {
    pub const fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_datetime(input).map(Self::from)
    }

    /// Midnight UTC on this date.
    pub const fn midnight(self) -> PrimitiveDateTime {
        PrimitiveDateTime::new(self.0, Time::MIDNIGHT)
    }
}

impl From<PrimitiveDateTime> for TradingDate {
    fn from(value: PrimitiveDateTime) -> Self {
        Self(value.date())
    }
}

impl Display for TradingDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for TradingDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TradingDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Parses a provider date string into a naive timestamp.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (space or `T` separator), and
/// RFC3339 with any offset. The offset is dropped and the wall-clock time in
/// that offset is kept, so an exchange-local midnight stays on its own date.
pub fn parse_datetime(input: &str) -> Result<PrimitiveDateTime, ValidationError> {
    let trimmed = input.trim();
    let invalid = || ValidationError::InvalidDate {
        value: input.to_owned(),
    };

    if let Ok(date) = Date::parse(trimmed, DATE_FORMAT) {
        return Ok(PrimitiveDateTime::new(date, Time::MIDNIGHT));
    }

    let t_separated = trimmed.replacen(' ', "T", 1);
    if let Ok(value) = PrimitiveDateTime::parse(&t_separated, DATETIME_FORMAT) {
        return Ok(value);
    }

    let parsed = OffsetDateTime::parse(&t_separated, &Rfc3339).map_err(|_| invalid())?;
    Ok(PrimitiveDateTime::new(parsed.date(), parsed.time()))
}

/// Converts UNIX seconds to a UTC timestamp.
pub fn from_unix_seconds(seconds: i64) -> Result<PrimitiveDateTime, ValidationError> {
    let value = OffsetDateTime::from_unix_timestamp(seconds).map_err(|_| {
        ValidationError::InvalidDate {
            value: seconds.to_string(),
        }
    })?;
    Ok(PrimitiveDateTime::new(value.date(), value.time()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_plain_dates_and_datetimes() {
        assert_eq!(
            parse_datetime("2024-01-02").expect("date"),
            datetime!(2024-01-02 00:00:00)
        );
        assert_eq!(
            parse_datetime("2024-01-02 15:30:00").expect("datetime"),
            datetime!(2024-01-02 15:30:00)
        );
    }

    #[test]
    fn keeps_local_wall_clock_of_offset_timestamps() {
        let parsed = parse_datetime("2024-01-02T23:30:00-05:00").expect("rfc3339");
        assert_eq!(parsed, datetime!(2024-01-02 23:30:00));
        let tokyo = parse_datetime("2024-01-04 00:00:00+09:00").expect("space separated");
        assert_eq!(TradingDate::from(tokyo).to_string(), "2024-01-04");
    }

    #[test]
    fn converts_unix_seconds() {
        assert_eq!(
            from_unix_seconds(1_704_153_600).expect("unix"),
            datetime!(2024-01-02 00:00:00)
        );
    }

    #[test]
    fn trading_date_round_trips_through_serde() {
        let date = TradingDate::parse("2024-03-05").expect("date");
        let json = serde_json::to_string(&date).expect("serialize");
        assert_eq!(json, "\"2024-03-05\"");
        let back: TradingDate = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, date);
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_datetime("yesterday").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }
}
