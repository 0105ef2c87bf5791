//! Service dates in the agency's timezone.
//!
//! A service date is a calendar day; its service period runs from local
//! midnight and may extend past 26:00 to cover overnight trips, so
//! seconds-since-service-midnight values above 86400 are normal.

use chrono::{NaiveDate, TimeZone};
use chrono_tz::Tz;

/// A calendar date identifying one service day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceDate(NaiveDate);

impl ServiceDate {
    pub fn new(date: NaiveDate) -> ServiceDate {
        ServiceDate(date)
    }

    /// The service date whose nominal day contains the given wall-clock
    /// instant, in the agency's timezone.
    pub fn from_timestamp(epoch_sec: i64, tz: Tz) -> ServiceDate {
        let dt = tz
            .timestamp_opt(epoch_sec, 0)
            .single()
            .expect("epoch seconds map to exactly one instant");
        ServiceDate(dt.date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn previous(&self) -> ServiceDate {
        ServiceDate(self.0.pred_opt().expect("service date underflow"))
    }

    /// Epoch seconds of this service day's local midnight.
    pub fn start_epoch(&self, tz: Tz) -> i64 {
        tz.from_local_datetime(&self.0.and_hms_opt(0, 0, 0).expect("midnight exists"))
            .earliest()
            .expect("service day has a local midnight")
            .timestamp()
    }

    /// The `YYYYMMDD` form used in GTFS-realtime `start_date` fields.
    pub fn to_start_date(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }
}
