//! Service activation by date, from `calendar.txt` weekday patterns plus
//! `calendar_dates.txt` exceptions.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{HashMap, HashSet};

use super::service_date::ServiceDate;

/// One `calendar.txt` row: a weekday pattern bounded by a date range.
#[derive(Debug, Clone)]
pub struct WeeklyService {
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl WeeklyService {
    fn runs_on(&self, date: NaiveDate) -> bool {
        if date < self.start_date || date > self.end_date {
            return false;
        }
        match date.weekday() {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

/// One `calendar_dates.txt` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Added,
    Removed,
}

#[derive(Debug, Default)]
pub struct ServiceCalendar {
    weekly: HashMap<String, WeeklyService>,
    exceptions: HashMap<String, HashMap<NaiveDate, Exception>>,
}

impl ServiceCalendar {
    pub fn new() -> ServiceCalendar {
        ServiceCalendar::default()
    }

    pub fn add_weekly(&mut self, service_id: String, service: WeeklyService) {
        self.weekly.insert(service_id, service);
    }

    pub fn add_exception(&mut self, service_id: String, date: NaiveDate, exception: Exception) {
        self.exceptions
            .entry(service_id)
            .or_default()
            .insert(date, exception);
    }

    /// Whether `service_id` is active on `date`. An exception overrides the
    /// weekday pattern in either direction.
    pub fn runs_on(&self, service_id: &str, date: NaiveDate) -> bool {
        if let Some(exceptions) = self.exceptions.get(service_id) {
            match exceptions.get(&date) {
                Some(Exception::Added) => return true,
                Some(Exception::Removed) => return false,
                None => {}
            }
        }
        self.weekly
            .get(service_id)
            .map(|w| w.runs_on(date))
            .unwrap_or(false)
    }

    /// The set of service ids active on a service date.
    pub fn service_ids_for_date(&self, service_date: ServiceDate) -> HashSet<String> {
        let date = service_date.date();
        let mut ids: HashSet<String> = self
            .weekly
            .keys()
            .chain(self.exceptions.keys())
            .filter(|id| self.runs_on(id, date))
            .cloned()
            .collect();
        ids.shrink_to_fit();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekdays_only() -> WeeklyService {
        WeeklyService {
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: false,
            sunday: false,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
        }
    }

    #[test]
    fn test_weekday_pattern() {
        let mut cal = ServiceCalendar::new();
        cal.add_weekly("WKD".to_string(), weekdays_only());

        // 2026-03-05 is a Thursday, 2026-03-07 a Saturday
        assert!(cal.runs_on("WKD", NaiveDate::from_ymd_opt(2026, 3, 5).unwrap()));
        assert!(!cal.runs_on("WKD", NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()));
    }

    #[test]
    fn test_date_range_bounds() {
        let mut cal = ServiceCalendar::new();
        cal.add_weekly("WKD".to_string(), weekdays_only());

        // a Friday before the range opens
        assert!(!cal.runs_on("WKD", NaiveDate::from_ymd_opt(2025, 12, 26).unwrap()));
    }

    #[test]
    fn test_exception_overrides_pattern() {
        let mut cal = ServiceCalendar::new();
        cal.add_weekly("WKD".to_string(), weekdays_only());
        let thursday = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        cal.add_exception("WKD".to_string(), thursday, Exception::Removed);
        cal.add_exception("WKD".to_string(), saturday, Exception::Added);

        assert!(!cal.runs_on("WKD", thursday));
        assert!(cal.runs_on("WKD", saturday));
    }

    #[test]
    fn test_exception_only_service() {
        let mut cal = ServiceCalendar::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 4).unwrap();
        cal.add_exception("HOLIDAY".to_string(), date, Exception::Added);

        assert!(cal.runs_on("HOLIDAY", date));
        let ids = cal.service_ids_for_date(ServiceDate::new(date));
        assert!(ids.contains("HOLIDAY"));
    }

    #[test]
    fn test_service_ids_for_date() {
        let mut cal = ServiceCalendar::new();
        cal.add_weekly("WKD".to_string(), weekdays_only());
        let thursday = ServiceDate::new(NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
        let saturday = ServiceDate::new(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap());

        assert!(cal.service_ids_for_date(thursday).contains("WKD"));
        assert!(cal.service_ids_for_date(saturday).is_empty());
    }
}
