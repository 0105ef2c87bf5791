//! Static schedule: GTFS bundle loading, the service calendar, and
//! service-date arithmetic in the agency timezone.

pub mod calendar;
pub mod gtfs;
pub mod service_date;

pub use calendar::{Exception, ServiceCalendar, WeeklyService};
pub use gtfs::{load_schedule, ScheduleError, ScheduledTrip, StaticSchedule, StopTime};
pub use service_date::ServiceDate;
