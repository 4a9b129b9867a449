//! Exam-period calendar.
//!
//! Turns a date range and a daily slot pattern into the candidate slot list
//! the solver enumerates.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::data::TimeSlot;

/// A start/end pair repeated on every exam day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DailySlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailySlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }
}

/// Four two-hour sittings with half-hour breaks, 09:00 to 18:30.
pub fn default_daily_slots() -> Vec<DailySlot> {
    [(9, 0, 11, 0), (11, 30, 13, 30), (14, 0, 16, 0), (16, 30, 18, 30)]
        .into_iter()
        .filter_map(|(start_h, start_m, end_h, end_m)| {
            Some(DailySlot::new(
                NaiveTime::from_hms_opt(start_h, start_m, 0)?,
                NaiveTime::from_hms_opt(end_h, end_m, 0)?,
            ))
        })
        .collect()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Inclusive date range exams may be held in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_daily_slots")]
    pub daily_slots: Vec<DailySlot>,
    #[serde(default)]
    pub include_weekends: bool,
}

impl ExamPeriod {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            daily_slots: default_daily_slots(),
            include_weekends: false,
        }
    }

    pub fn with_daily_slots(mut self, daily_slots: Vec<DailySlot>) -> Self {
        self.daily_slots = daily_slots;
        self
    }

    pub fn including_weekends(mut self) -> Self {
        self.include_weekends = true;
        self
    }

    /// Dates exams may fall on, in order. Empty when the range is inverted.
    pub fn exam_days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut day = self.start_date;
        while day <= self.end_date {
            if self.include_weekends || !is_weekend(day) {
                days.push(day);
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        days
    }

    /// Every daily slot on every exam day, chronologically.
    pub fn slots(&self) -> Vec<TimeSlot> {
        let mut daily = self.daily_slots.clone();
        daily.sort_by_key(|s| (s.start, s.end));
        self.exam_days()
            .into_iter()
            .flat_map(|day| {
                daily
                    .iter()
                    .map(move |s| TimeSlot::new(day, s.start, s.end))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_exam_days_skip_weekends() {
        // Thursday 2 Jan to Tuesday 7 Jan
        let period = ExamPeriod::new(date(2), date(7));
        assert_eq!(period.exam_days(), vec![date(2), date(3), date(6), date(7)]);

        let all = period.clone().including_weekends();
        assert_eq!(all.exam_days().len(), 6);
    }

    #[test]
    fn test_slots_are_chronological() {
        let period = ExamPeriod::new(date(6), date(7)).with_daily_slots(vec![
            DailySlot::new(hm(14, 0), hm(16, 0)),
            DailySlot::new(hm(9, 0), hm(11, 0)),
        ]);
        let slots = period.slots();
        assert_eq!(slots.len(), 4);
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(slots[0].start, hm(9, 0));
        assert_eq!(slots[3].date, date(7));
    }

    #[test]
    fn test_default_pattern() {
        let slots = default_daily_slots();
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|s| (s.end - s.start).num_minutes() == 120));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        assert!(ExamPeriod::new(date(7), date(6)).slots().is_empty());
    }

    #[test]
    fn test_period_from_json_uses_default_slots() {
        let period: ExamPeriod =
            serde_json::from_str(r#"{"startDate": "2025-01-06", "endDate": "2025-01-06"}"#).unwrap();
        assert_eq!(period.slots().len(), 4);
    }
}
