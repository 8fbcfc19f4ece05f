use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Zone in which calendar days are counted
#[derive(Debug, Clone, Copy, PartialEq)]
enum Zone {
    Local,
    Named(Tz),
}

/// Timezone-aware calendar calculations for history keys and report headers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimezoneCalculator {
    zone: Zone,
}

impl TimezoneCalculator {
    /// `"local"` selects the process time zone, anything else must be an IANA name
    pub fn new(timezone_str: &str) -> Result<Self> {
        if timezone_str.is_empty() || timezone_str.eq_ignore_ascii_case("local") {
            return Ok(Self::local());
        }

        let tz = Tz::from_str(timezone_str)
            .map_err(|e| anyhow!("Invalid timezone '{}': {}", timezone_str, e))?;
        Ok(Self {
            zone: Zone::Named(tz),
        })
    }

    pub fn local() -> Self {
        Self { zone: Zone::Local }
    }

    pub fn utc() -> Self {
        Self {
            zone: Zone::Named(Tz::UTC),
        }
    }

    /// Wall-clock time of `instant` in the configured zone
    pub fn local_datetime(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self.zone {
            Zone::Local => instant.with_timezone(&Local).naive_local(),
            Zone::Named(tz) => instant.with_timezone(&tz).naive_local(),
        }
    }

    /// Calendar date of `instant`, the key history entries are stored under
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local_datetime(instant).date()
    }

    /// The calendar day before `today`
    pub fn previous_day(today: NaiveDate) -> Result<NaiveDate> {
        today
            .checked_sub_signed(Duration::days(1))
            .with_context(|| format!("No calendar day before {today}"))
    }

    /// Report header timestamp, `YYYY-MM-DD HH:MM:SS`
    pub fn format_timestamp(&self, instant: DateTime<Utc>) -> String {
        self.local_datetime(instant)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

impl Default for TimezoneCalculator {
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timezone_parsing() {
        assert!(TimezoneCalculator::new("local").is_ok());
        assert!(TimezoneCalculator::new("").is_ok());
        assert!(TimezoneCalculator::new("Asia/Shanghai").is_ok());
        assert!(TimezoneCalculator::new("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn test_date_follows_configured_zone() {
        // 20:00 UTC on the 15th is already the 16th in Shanghai
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 20, 0, 0).unwrap();

        let utc = TimezoneCalculator::utc();
        let shanghai = TimezoneCalculator::new("Asia/Shanghai").unwrap();

        assert_eq!(utc.date_of(instant), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(shanghai.date_of(instant), NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
    }

    #[test]
    fn test_previous_day_crosses_month() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            TimezoneCalculator::previous_day(today).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(TimezoneCalculator::previous_day(NaiveDate::MIN).is_err());
    }

    #[test]
    fn test_format_timestamp() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 5).unwrap();
        assert_eq!(
            TimezoneCalculator::utc().format_timestamp(instant),
            "2024-03-15 14:30:05"
        );
    }
}
