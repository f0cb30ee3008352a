//! Fixed UTC offset with an optional yearly daylight-saving rule.

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, UtcOffset, Weekday};

/// "Week `week` of `month`, on `weekday`, at `hour`:00 local time", with
/// week 5 meaning the last such weekday in the month.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DstTransition {
    pub month: Month,
    pub week: u8,
    pub weekday: Weekday,
    pub hour: u8,
}

impl DstTransition {
    pub const fn last(weekday: Weekday, month: Month, hour: u8) -> Self {
        Self {
            month,
            week: 5,
            weekday,
            hour,
        }
    }

    fn date_in(&self, year: i32) -> Option<Date> {
        let first = Date::from_calendar_date(year, self.month, 1).ok()?;
        let lead = (7 + self.weekday.number_days_from_monday() as i64
            - first.weekday().number_days_from_monday() as i64)
            % 7;
        let week = self.week.clamp(1, 5) as i64;
        let mut date = first + Duration::days(lead + 7 * (week - 1));
        while date.month() != self.month {
            date -= Duration::days(7);
        }
        Some(date)
    }

    /// Unix time of this transition in `year`, read against the offset that
    /// is in force just before it.
    fn unix_in(&self, year: i32, offset_before: i32) -> Option<i64> {
        let local = self.date_in(year)?.with_hms(self.hour, 0, 0).ok()?;
        let offset = UtcOffset::from_whole_seconds(offset_before).ok()?;
        Some(local.assume_offset(offset).unix_timestamp())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DstRule {
    pub offset_seconds: i32,
    pub start: DstTransition,
    pub end: DstTransition,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeZoneRule {
    pub std_offset_seconds: i32,
    pub dst: Option<DstRule>,
}

impl Default for TimeZoneRule {
    fn default() -> Self {
        Self::uk()
    }
}

impl TimeZoneRule {
    pub const fn utc() -> Self {
        Self {
            std_offset_seconds: 0,
            dst: None,
        }
    }

    /// GMT, with BST from 01:00 on the last Sunday of March until 02:00 BST
    /// on the last Sunday of October.
    pub const fn uk() -> Self {
        Self {
            std_offset_seconds: 0,
            dst: Some(DstRule {
                offset_seconds: 3_600,
                start: DstTransition::last(Weekday::Sunday, Month::March, 1),
                end: DstTransition::last(Weekday::Sunday, Month::October, 2),
            }),
        }
    }

    pub fn offset_at(&self, unix: i64) -> i32 {
        let Some(dst) = self.dst else {
            return self.std_offset_seconds;
        };

        let year = OffsetDateTime::from_unix_timestamp(unix + self.std_offset_seconds as i64)
            .map(|t| t.year())
            .unwrap_or(1970);
        let (Some(start), Some(end)) = (
            dst.start.unix_in(year, self.std_offset_seconds),
            dst.end.unix_in(year, dst.offset_seconds),
        ) else {
            return self.std_offset_seconds;
        };

        let in_dst = if start < end {
            unix >= start && unix < end
        } else {
            unix >= start || unix < end
        };
        if in_dst {
            dst.offset_seconds
        } else {
            self.std_offset_seconds
        }
    }

    /// Local wall-clock time for a unix timestamp.
    pub fn to_local(&self, unix: i64) -> PrimitiveDateTime {
        let utc = OffsetDateTime::from_unix_timestamp(unix).unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let local = UtcOffset::from_whole_seconds(self.offset_at(unix))
            .map(|offset| utc.to_offset(offset))
            .unwrap_or(utc);
        PrimitiveDateTime::new(local.date(), local.time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn unix(t: PrimitiveDateTime) -> i64 {
        t.assume_utc().unix_timestamp()
    }

    #[test]
    fn utc_is_identity() {
        let t = datetime!(2024-07-01 12:34:56);
        assert_eq!(TimeZoneRule::utc().to_local(unix(t)), t);
    }

    #[test]
    fn uk_switches_on_last_sundays() {
        let uk = TimeZoneRule::uk();

        // 2024: BST from 31 March 01:00 UTC to 27 October 01:00 UTC.
        assert_eq!(uk.to_local(unix(datetime!(2024-03-31 00:59:59))), datetime!(2024-03-31 00:59:59));
        assert_eq!(uk.to_local(unix(datetime!(2024-03-31 01:00:00))), datetime!(2024-03-31 02:00:00));
        assert_eq!(uk.to_local(unix(datetime!(2024-10-27 00:59:59))), datetime!(2024-10-27 01:59:59));
        assert_eq!(uk.to_local(unix(datetime!(2024-10-27 01:00:00))), datetime!(2024-10-27 01:00:00));
    }

    #[test]
    fn uk_winter_and_summer() {
        let uk = TimeZoneRule::uk();

        assert_eq!(uk.to_local(unix(datetime!(2025-01-10 22:00:00))), datetime!(2025-01-10 22:00:00));
        assert_eq!(uk.to_local(unix(datetime!(2025-06-10 22:30:00))), datetime!(2025-06-10 23:30:00));
    }

    #[test]
    fn epoch_start_is_representable() {
        assert_eq!(TimeZoneRule::uk().to_local(0), datetime!(1970-01-01 00:00:00));
    }
}
