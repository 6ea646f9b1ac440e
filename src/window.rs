use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::models::ReportingWindow;

const FRIDAY_INDEX: u32 = 4;

impl ReportingWindow {
    /// First of `today`'s month through the latest Friday on or before `today`.
    pub fn for_date(today: NaiveDate) -> Self {
        Self {
            begin: first_of_month(today),
            end: most_recent_friday(today),
        }
    }

    pub fn current() -> Self {
        Self::for_date(Local::now().date_naive())
    }

    /// True when the latest Friday falls before the first of the month.
    pub fn is_empty(&self) -> bool {
        self.end < self.begin
    }

    pub fn begin_mdy(&self) -> String {
        format_mdy(self.begin)
    }

    pub fn end_mdy(&self) -> String {
        format_mdy(self.end)
    }
}

pub fn first_of_month(today: NaiveDate) -> NaiveDate {
    today - Duration::days(i64::from(today.day0()))
}

pub fn most_recent_friday(today: NaiveDate) -> NaiveDate {
    let weekday = today.weekday().num_days_from_monday();
    let back = (weekday + 7 - FRIDAY_INDEX) % 7;
    today - Duration::days(i64::from(back))
}

pub fn format_mdy(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn friday_is_its_own_end() {
        let window = ReportingWindow::for_date(date(2026, 10, 16));
        assert_eq!(window.begin, date(2026, 10, 1));
        assert_eq!(window.end, date(2026, 10, 16));
    }

    #[test]
    fn monday_steps_back_to_friday() {
        let window = ReportingWindow::for_date(date(2026, 10, 19));
        assert_eq!(window.end, date(2026, 10, 16));
        assert_eq!(window.begin_mdy(), "10/01/2026");
        assert_eq!(window.end_mdy(), "10/16/2026");
    }

    #[test]
    fn thursday_steps_back_six_days() {
        assert_eq!(most_recent_friday(date(2026, 10, 22)), date(2026, 10, 16));
    }

    #[test]
    fn end_is_latest_friday_for_every_day_of_a_year() {
        let mut day = date(2026, 1, 1);
        while day.year() == 2026 {
            let window = ReportingWindow::for_date(day);
            assert_eq!(window.begin.day(), 1);
            assert_eq!(window.begin.month(), day.month());
            assert_eq!(window.end.weekday(), Weekday::Fri);
            assert!(window.end <= day);
            assert!((day - window.end).num_days() < 7);
            day += Duration::days(1);
        }
    }

    #[test]
    fn saturday_first_of_month_gives_empty_window() {
        // 2026-08-01 is a Saturday.
        let window = ReportingWindow::for_date(date(2026, 8, 1));
        assert_eq!(window.begin, date(2026, 8, 1));
        assert_eq!(window.end, date(2026, 7, 31));
        assert!(window.is_empty());
        assert!(!ReportingWindow::for_date(date(2026, 8, 7)).is_empty());
    }

    #[test]
    fn every_day_before_first_friday_is_empty() {
        for day in 1..=6 {
            assert!(ReportingWindow::for_date(date(2026, 8, day)).is_empty());
        }
        // October 2026 starts on a Thursday.
        assert!(ReportingWindow::for_date(date(2026, 10, 1)).is_empty());
        assert!(!ReportingWindow::for_date(date(2026, 10, 2)).is_empty());
    }

    #[test]
    fn dates_format_with_leading_zeros() {
        assert_eq!(format_mdy(date(2026, 3, 6)), "03/06/2026");
    }
}
