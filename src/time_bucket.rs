use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;

/// Calendar year-month scope under which sequence numbers are partitioned.
///
/// Buckets are always observed in Indian Standard Time, independent of the
/// host timezone. A bucket is derived per request and never cached, so a
/// request arriving at a month boundary lands in the bucket of its own
/// instant of evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthBucket {
    /// 4-digit calendar year, e.g. `"2024"`.
    pub year: String,
    /// 2-digit zero-padded month 01-12, e.g. `"06"`.
    pub month: String,
}

impl MonthBucket {
    /// Bucket for the current instant in IST.
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now().with_timezone(&Kolkata))
    }

    /// Bucket for an arbitrary zoned instant. Minting always goes through
    /// [`MonthBucket::now`]; this exists so boundary behavior is testable.
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            year: format!("{:04}", dt.year()),
            month: format!("{:02}", dt.month()),
        }
    }

    /// The `"YYYY-MM"` form used in counter keys.
    pub fn key(&self) -> String {
        format!("{}-{}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_utc_instant_in_ist() {
        // 20:00 UTC is 01:30 IST the next day.
        let dt = Utc
            .with_ymd_and_hms(2024, 6, 14, 20, 0, 0)
            .unwrap()
            .with_timezone(&Kolkata);
        let bucket = MonthBucket::from_datetime(&dt);
        assert_eq!(bucket.year, "2024");
        assert_eq!(bucket.month, "06");
        assert_eq!(bucket.key(), "2024-06");
    }

    #[test]
    fn month_boundary_follows_ist_not_utc() {
        // 2024-06-30T18:29:59Z is 23:59:59 IST, still June.
        let before = Utc
            .with_ymd_and_hms(2024, 6, 30, 18, 29, 59)
            .unwrap()
            .with_timezone(&Kolkata);
        assert_eq!(MonthBucket::from_datetime(&before).key(), "2024-06");

        // One second later it is midnight July 1st in IST.
        let after = Utc
            .with_ymd_and_hms(2024, 6, 30, 18, 30, 0)
            .unwrap()
            .with_timezone(&Kolkata);
        assert_eq!(MonthBucket::from_datetime(&after).key(), "2024-07");
    }

    #[test]
    fn year_rolls_over_in_ist() {
        let dt = Utc
            .with_ymd_and_hms(2023, 12, 31, 18, 30, 0)
            .unwrap()
            .with_timezone(&Kolkata);
        let bucket = MonthBucket::from_datetime(&dt);
        assert_eq!(bucket.year, "2024");
        assert_eq!(bucket.month, "01");
    }

    #[test]
    fn single_digit_month_is_zero_padded() {
        let dt = Kolkata.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap();
        assert_eq!(MonthBucket::from_datetime(&dt).key(), "2025-03");
    }
}
