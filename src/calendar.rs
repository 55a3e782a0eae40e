//! Month calendar view.
//!
//! Weeks start on Sunday. The grid opens with one blank cell per weekday
//! before the first of the month, then one cell per day. Day boundaries are
//! taken in the clinic's fixed UTC offset.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{AppointmentDetail, AppointmentStatus};

/// Appointments shown per day cell before collapsing into "+N more".
pub const MAX_DAY_PREVIEWS: usize = 3;

/// Years the clinic stores and displays. Timestamps are kept as fixed-width
/// text, which only sorts correctly for four-digit years.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

pub fn is_supported_year(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

/// A calendar month, identified by its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "MonthRef")]
pub struct MonthCursor {
    first: NaiveDate,
}

#[derive(Debug, Serialize)]
struct MonthRef {
    year: i32,
    month: u32,
}

impl From<MonthCursor> for MonthRef {
    fn from(cursor: MonthCursor) -> Self {
        Self {
            year: cursor.year(),
            month: cursor.month(),
        }
    }
}

impl MonthCursor {
    /// `None` when `month` is outside 1..=12 or `year` outside
    /// [`MIN_YEAR`]..=[`MAX_YEAR`].
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !is_supported_year(year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn prev(&self) -> Self {
        self.first
            .checked_sub_months(Months::new(1))
            .map_or(*self, |first| Self { first })
    }

    pub fn next(&self) -> Self {
        self.first
            .checked_add_months(Months::new(1))
            .map_or(*self, |first| Self { first })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first
            .iter_days()
            .take_while(move |d| d.month() == self.first.month())
    }

    /// Sunday-first grid: leading `None` cells, then every day of the month.
    pub fn grid(&self) -> Vec<Option<NaiveDate>> {
        let leading = self.first.weekday().num_days_from_sunday() as usize;
        std::iter::repeat(None)
            .take(leading)
            .chain(self.days().map(Some))
            .collect()
    }

    /// Half-open UTC range `[first 00:00, next first 00:00)` in clinic time.
    pub fn bounds(&self, offset: &FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            local_midnight(self.first, offset),
            local_midnight(self.next().first, offset),
        )
    }

    pub fn label(&self) -> String {
        self.first.format("%B %Y").to_string()
    }
}

/// Convenience wrapper over [`MonthCursor::grid`].
pub fn month_grid(year: i32, month: u32) -> Option<Vec<Option<NaiveDate>>> {
    MonthCursor::new(year, month).map(|cursor| cursor.grid())
}

/// UTC instant of local midnight for `date` in `offset`.
pub fn local_midnight(date: NaiveDate, offset: &FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    let utc = local.checked_sub_signed(shift).unwrap_or(if shift > Duration::zero() {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    });
    utc.and_utc()
}

/// Clinic calendar day of an instant.
pub fn local_date(instant: DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    instant.with_timezone(offset).date_naive()
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentPreview {
    pub id: Uuid,
    pub time: String,
    pub status: AppointmentStatus,
    pub patient_name: String,
    pub doctor_name: String,
    pub doctor_color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub day: u32,
    pub is_today: bool,
    pub appointments: Vec<AppointmentPreview>,
    /// Appointments beyond the previews.
    pub more: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub prev: MonthCursor,
    pub next: MonthCursor,
    pub cells: Vec<Option<DayCell>>,
}

/// Lay out `appointments` (earliest first) over the month grid.
pub fn build_month(
    cursor: MonthCursor,
    appointments: &[AppointmentDetail],
    offset: &FixedOffset,
    today: NaiveDate,
) -> MonthView {
    let mut by_day: BTreeMap<NaiveDate, Vec<&AppointmentDetail>> = BTreeMap::new();
    for detail in appointments {
        let day = local_date(detail.appointment.appointment_date, offset);
        by_day.entry(day).or_default().push(detail);
    }

    let cells = cursor
        .grid()
        .into_iter()
        .map(|slot| {
            slot.map(|date| {
                let day_appointments = by_day.remove(&date).unwrap_or_default();
                let more = day_appointments.len().saturating_sub(MAX_DAY_PREVIEWS);
                DayCell {
                    date,
                    day: date.day(),
                    is_today: date == today,
                    appointments: day_appointments
                        .into_iter()
                        .take(MAX_DAY_PREVIEWS)
                        .map(|d| preview(d, offset))
                        .collect(),
                    more,
                }
            })
        })
        .collect();

    MonthView {
        year: cursor.year(),
        month: cursor.month(),
        label: cursor.label(),
        prev: cursor.prev(),
        next: cursor.next(),
        cells,
    }
}

fn preview(detail: &AppointmentDetail, offset: &FixedOffset) -> AppointmentPreview {
    AppointmentPreview {
        id: detail.appointment.id,
        time: detail
            .appointment
            .appointment_date
            .with_timezone(offset)
            .format("%H:%M")
            .to_string(),
        status: detail.appointment.status,
        patient_name: detail.patient.full_name(),
        doctor_name: detail.doctor.full_name(),
        doctor_color: detail.doctor.color.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::list_appointment_details_between;
    use crate::test_support::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn grid_has_leading_blanks_for_weekday() {
        // 1 March 2025 is a Saturday.
        let grid = month_grid(2025, 3).unwrap();
        assert_eq!(grid.len(), 6 + 31);
        assert!(grid[..6].iter().all(Option::is_none));
        assert_eq!(grid[6], Some(date(2025, 3, 1)));
        assert_eq!(grid.last().copied().flatten(), Some(date(2025, 3, 31)));
    }

    #[test]
    fn grid_without_blanks_when_month_starts_on_sunday() {
        // 1 June 2025 is a Sunday.
        let grid = month_grid(2025, 6).unwrap();
        assert_eq!(grid[0], Some(date(2025, 6, 1)));
        assert_eq!(grid.len(), 30);
    }

    #[test]
    fn leap_february() {
        assert_eq!(MonthCursor::new(2024, 2).unwrap().days().count(), 29);
        assert_eq!(MonthCursor::new(2025, 2).unwrap().days().count(), 28);
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(month_grid(2025, 0).is_none());
        assert!(month_grid(2025, 13).is_none());
    }

    #[test]
    fn years_outside_four_digits_are_rejected() {
        assert!(MonthCursor::new(0, 12).is_none());
        assert!(MonthCursor::new(10_000, 1).is_none());
        assert!(MonthCursor::new(NaiveDate::MIN.year(), 1).is_none());
        assert!(MonthCursor::new(NaiveDate::MAX.year(), 12).is_none());
    }

    #[test]
    fn edge_year_bounds_are_non_empty() {
        let east = FixedOffset::east_opt(3600).unwrap();
        let west = FixedOffset::west_opt(3600).unwrap();

        let first = MonthCursor::new(MIN_YEAR, 1).unwrap();
        let (start, end) = first.bounds(&east);
        assert!(start < end);
        assert_eq!(end - start, Duration::days(31));

        let last = MonthCursor::new(MAX_YEAR, 12).unwrap();
        assert_ne!(last.next(), last);
        let (start, end) = last.bounds(&west);
        assert!(start < end);
        assert_eq!(end - start, Duration::days(31));
    }

    #[test]
    fn navigation_wraps_years() {
        let jan = MonthCursor::new(2025, 1).unwrap();
        assert_eq!(jan.prev(), MonthCursor::new(2024, 12).unwrap());
        let dec = MonthCursor::new(2024, 12).unwrap();
        assert_eq!(dec.next(), jan);
        assert_eq!(MonthCursor::containing(date(2025, 1, 17)), jan);
    }

    #[test]
    fn bounds_follow_clinic_offset() {
        let cursor = MonthCursor::new(2025, 3).unwrap();
        let (start, end) = cursor.bounds(&FixedOffset::east_opt(0).unwrap());
        assert_eq!(start, utc(2025, 3, 1, 0, 0));
        assert_eq!(end, utc(2025, 4, 1, 0, 0));

        let (start, end) = cursor.bounds(&FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(start, utc(2025, 3, 1, 5, 0));
        assert_eq!(end, utc(2025, 4, 1, 5, 0));
    }

    #[test]
    fn late_appointment_on_last_day_is_in_range() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn, "Ana", "Ruiz");
        let doctor = seed_doctor(&conn, "Laura", "Gómez");
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 3, 31, 18, 0), 30, AppointmentStatus::Scheduled);
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 4, 1, 0, 0), 30, AppointmentStatus::Scheduled);

        let offset = FixedOffset::east_opt(0).unwrap();
        let (start, end) = MonthCursor::new(2025, 3).unwrap().bounds(&offset);
        let found = list_appointment_details_between(&conn, &start, &end).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].appointment.appointment_date, utc(2025, 3, 31, 18, 0));
    }

    #[test]
    fn build_month_caps_previews_and_marks_today() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn, "Ana", "Ruiz");
        let doctor = seed_doctor(&conn, "Laura", "Gómez");
        for hour in 8..13 {
            seed_appointment(&conn, &patient, &doctor, None, utc(2025, 3, 10, hour, 0), 30, AppointmentStatus::Scheduled);
        }
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 3, 11, 9, 0), 30, AppointmentStatus::Confirmed);

        let offset = FixedOffset::east_opt(0).unwrap();
        let cursor = MonthCursor::new(2025, 3).unwrap();
        let (start, end) = cursor.bounds(&offset);
        let details = list_appointment_details_between(&conn, &start, &end).unwrap();
        let view = build_month(cursor, &details, &offset, date(2025, 3, 11));

        assert_eq!(view.label, "March 2025");
        let cell = |d: u32| view.cells.iter().flatten().find(|c| c.day == d).unwrap();
        let tenth = cell(10);
        assert_eq!(tenth.appointments.len(), 3);
        assert_eq!(tenth.more, 2);
        assert_eq!(tenth.appointments[0].time, "08:00");
        assert_eq!(tenth.appointments[0].patient_name, "Ana Ruiz");
        assert_eq!(tenth.appointments[0].doctor_color, "#3B82F6");
        assert!(!tenth.is_today);

        let eleventh = cell(11);
        assert!(eleventh.is_today);
        assert_eq!(eleventh.appointments.len(), 1);
        assert_eq!(eleventh.more, 0);
    }

    #[test]
    fn appointment_lands_on_local_day() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn, "Ana", "Ruiz");
        let doctor = seed_doctor(&conn, "Laura", "Gómez");
        // 02:00 UTC on the 11th is 21:00 on the 10th at UTC-5.
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 3, 11, 2, 0), 30, AppointmentStatus::Scheduled);

        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let cursor = MonthCursor::new(2025, 3).unwrap();
        let (start, end) = cursor.bounds(&offset);
        let details = list_appointment_details_between(&conn, &start, &end).unwrap();
        let view = build_month(cursor, &details, &offset, date(2025, 1, 1));

        let tenth = view.cells.iter().flatten().find(|c| c.day == 10).unwrap();
        assert_eq!(tenth.appointments.len(), 1);
        assert_eq!(tenth.appointments[0].time, "21:00");
    }

    #[test]
    fn month_cursor_serializes_as_year_and_month() {
        let json = serde_json::to_value(MonthCursor::new(2025, 3).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"year": 2025, "month": 3}));
    }
}
