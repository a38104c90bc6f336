use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Used when a professional has no configured default booking time.
pub const FALLBACK_DEFAULT_TIME: &str = "10:00";

/// Days scanned after the requested one when looking for a working day.
const LOOKAHEAD_DAYS: i64 = 6;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A professional's recurring week: the days they work plus the time
/// offered when suggesting an alternative day.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklySchedule {
    days: Vec<Weekday>,
    default_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvailabilityDecision {
    Available,
    Suggest {
        requested_weekday: Weekday,
        date: NaiveDate,
        time: NaiveTime,
    },
    NoSlotThisWeek {
        requested_weekday: Weekday,
    },
}

impl WeeklySchedule {
    /// Unrecognised day names are skipped; an unparseable default time
    /// falls back to 10:00.
    pub fn new<S: AsRef<str>>(working_days: &[S], default_time: Option<&str>) -> Self {
        let mut days: Vec<Weekday> = working_days
            .iter()
            .filter_map(|d| parse_weekday(d.as_ref()).ok())
            .collect();
        days.sort_by_key(|d| d.num_days_from_monday());
        days.dedup();

        let default_time = default_time
            .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M").ok())
            .unwrap_or_else(fallback_time);

        Self { days, default_time }
    }

    pub fn works_on(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }

    /// Same-day availability is decided by weekday alone. Otherwise the
    /// next six days are scanned for the first working day, which is
    /// offered at the default time.
    pub fn resolve(&self, requested: NaiveDateTime) -> AvailabilityDecision {
        let date = requested.date();
        let requested_weekday = date.weekday();

        if self.works_on(requested_weekday) {
            return AvailabilityDecision::Available;
        }

        for offset in 1..=LOOKAHEAD_DAYS {
            let candidate = date + Duration::days(offset);
            if self.works_on(candidate.weekday()) {
                return AvailabilityDecision::Suggest {
                    requested_weekday,
                    date: candidate,
                    time: self.default_time,
                };
            }
        }

        AvailabilityDecision::NoSlotThisWeek { requested_weekday }
    }

    pub fn to_human_readable(&self) -> String {
        if self.days.is_empty() {
            return "no working days".to_string();
        }
        self.days
            .iter()
            .map(|d| weekday_name(*d))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    let lower = s.trim().to_lowercase();
    WEEK.iter()
        .copied()
        .find(|d| {
            let full = weekday_name(*d).to_lowercase();
            lower == full || (lower.len() == 3 && full.starts_with(&lower))
        })
        .ok_or_else(|| anyhow::anyhow!("invalid weekday: {s}"))
}

fn fallback_time() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_parse_weekday_accepts_full_and_short_names() {
        assert_eq!(parse_weekday("Monday").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("wed").unwrap(), Weekday::Wed);
        assert_eq!(parse_weekday(" SUNDAY ").unwrap(), Weekday::Sun);
        assert!(parse_weekday("Funday").is_err());
        assert!(parse_weekday("mo").is_err());
    }

    #[test]
    fn test_working_day_is_available() {
        let schedule = WeeklySchedule::new(&["Monday", "Wednesday", "Friday"], None);
        // 2025-10-22 is a Wednesday
        assert_eq!(
            schedule.resolve(dt("2025-10-22 15:30")),
            AvailabilityDecision::Available
        );
    }

    #[test]
    fn test_tuesday_suggests_wednesday_same_week() {
        let schedule = WeeklySchedule::new(&["Monday", "Wednesday"], None);
        // 2025-10-21 is a Tuesday
        assert_eq!(
            schedule.resolve(dt("2025-10-21 10:00")),
            AvailabilityDecision::Suggest {
                requested_weekday: Weekday::Tue,
                date: date("2025-10-22"),
                time: time("10:00"),
            }
        );
    }

    #[test]
    fn test_suggestion_uses_configured_default_time() {
        let schedule = WeeklySchedule::new(&["Friday"], Some("14:30"));
        // 2025-10-20 is a Monday; Friday is four days later
        assert_eq!(
            schedule.resolve(dt("2025-10-20 09:00")),
            AvailabilityDecision::Suggest {
                requested_weekday: Weekday::Mon,
                date: date("2025-10-24"),
                time: time("14:30"),
            }
        );
    }

    #[test]
    fn test_suggestion_wraps_into_next_week() {
        let schedule = WeeklySchedule::new(&["Monday"], None);
        // 2025-10-25 is a Saturday; the next Monday is 2025-10-27
        match schedule.resolve(dt("2025-10-25 11:00")) {
            AvailabilityDecision::Suggest { date: d, .. } => assert_eq!(d, date("2025-10-27")),
            other => panic!("expected suggestion, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_default_time_falls_back() {
        let schedule = WeeklySchedule::new(&["Thursday"], Some("noon"));
        match schedule.resolve(dt("2025-10-21 10:00")) {
            AvailabilityDecision::Suggest { time: t, .. } => assert_eq!(t, time(FALLBACK_DEFAULT_TIME)),
            other => panic!("expected suggestion, got {other:?}"),
        }
    }

    #[test]
    fn test_no_working_days_reports_no_slot() {
        let schedule = WeeklySchedule::new(&["Someday"], None);
        assert_eq!(
            schedule.resolve(dt("2025-10-21 10:00")),
            AvailabilityDecision::NoSlotThisWeek {
                requested_weekday: Weekday::Tue
            }
        );
    }

    #[test]
    fn test_to_human_readable_orders_days() {
        let schedule = WeeklySchedule::new(&["Friday", "mon", "Wednesday", "Monday"], None);
        assert_eq!(schedule.to_human_readable(), "Monday, Wednesday, Friday");
    }
}
