//! List filtering for the search boxes and selectors.
//!
//! Text matching is a case-insensitive substring test. An empty or
//! whitespace-only term matches everything.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, Utc};
use uuid::Uuid;

use crate::calendar::{local_date, local_midnight};
use crate::models::{
    AppointmentDetail, AppointmentStatus, DateRange, Doctor, MedicalRecordDetail, Patient, Service,
};

/// Lower-cased search term; `None` when blank.
fn normalize(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn contains_opt(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| contains(h, needle))
}

pub fn patient_matches(patient: &Patient, needle: &str) -> bool {
    contains(&patient.first_name, needle)
        || contains(&patient.last_name, needle)
        || contains_opt(patient.email.as_deref(), needle)
        // phone numbers are matched verbatim
        || patient.phone.as_deref().is_some_and(|p| p.contains(needle))
}

pub fn filter_patients(patients: Vec<Patient>, term: Option<&str>) -> Vec<Patient> {
    match normalize(term) {
        Some(needle) => patients
            .into_iter()
            .filter(|p| patient_matches(p, &needle))
            .collect(),
        None => patients,
    }
}

pub fn filter_doctors(doctors: Vec<Doctor>, term: Option<&str>) -> Vec<Doctor> {
    let Some(needle) = normalize(term) else {
        return doctors;
    };
    doctors
        .into_iter()
        .filter(|d| contains(&d.full_name(), &needle) || contains(&d.specialty, &needle))
        .collect()
}

pub fn filter_services(services: Vec<Service>, term: Option<&str>) -> Vec<Service> {
    let Some(needle) = normalize(term) else {
        return services;
    };
    services
        .into_iter()
        .filter(|s| contains(&s.name, &needle) || contains_opt(s.description.as_deref(), &needle))
        .collect()
}

/// Whether `at` falls in the relative window `range` as seen from `now`.
///
/// `Today` is the clinic calendar day of `now`; `Week` is `now..=now + 7 days`;
/// `Month` runs from `now` to local midnight of the same day next month.
pub fn in_date_range(at: DateTime<Utc>, range: DateRange, now: DateTime<Utc>, offset: &FixedOffset) -> bool {
    match range {
        DateRange::Today => local_date(at, offset) == local_date(now, offset),
        DateRange::Week => at >= now && at <= now + Duration::days(7),
        DateRange::Month => {
            let today = local_date(now, offset);
            let limit = today
                .checked_add_months(Months::new(1))
                .map(|d| local_midnight(d, offset))
                .unwrap_or(now);
            at >= now && at <= limit
        }
    }
}

pub fn filter_appointments(
    appointments: Vec<AppointmentDetail>,
    term: Option<&str>,
    status: Option<AppointmentStatus>,
    range: Option<DateRange>,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> Vec<AppointmentDetail> {
    let needle = normalize(term);
    appointments
        .into_iter()
        .filter(|a| {
            needle.as_deref().map_or(true, |n| {
                contains(&a.patient.first_name, n)
                    || contains(&a.patient.last_name, n)
                    || contains(&a.doctor.first_name, n)
                    || contains(&a.doctor.last_name, n)
                    || a.service.as_ref().is_some_and(|s| contains(&s.name, n))
            })
        })
        .filter(|a| status.map_or(true, |s| a.appointment.status == s))
        .filter(|a| range.map_or(true, |r| in_date_range(a.appointment.appointment_date, r, now, offset)))
        .collect()
}

pub fn filter_medical_records(
    records: Vec<MedicalRecordDetail>,
    term: Option<&str>,
    doctor_id: Option<Uuid>,
) -> Vec<MedicalRecordDetail> {
    let needle = normalize(term);
    records
        .into_iter()
        .filter(|r| {
            needle.as_deref().map_or(true, |n| {
                contains(&r.patient.first_name, n)
                    || contains(&r.patient.last_name, n)
                    || contains(&r.doctor.first_name, n)
                    || contains(&r.doctor.last_name, n)
                    || contains_opt(r.record.diagnosis.as_deref(), n)
                    || contains_opt(r.record.treatment.as_deref(), n)
            })
        })
        .filter(|r| doctor_id.map_or(true, |id| r.record.doctor_id == id))
        .collect()
}

/// Whole years between `date_of_birth` and `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::*;
    use crate::test_support::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn patients_match_names_email_and_phone() {
        let conn = open_memory_database().unwrap();
        let mut ana = seed_patient(&conn, "Ana", "Ruiz");
        ana.email = Some("ana.ruiz@mail.test".into());
        ana.phone = Some("+34 600 111 222".into());
        let pedro = seed_patient(&conn, "Pedro", "Sanz");
        let all = vec![ana, pedro];

        assert_eq!(filter_patients(all.clone(), Some("RUIZ")).len(), 1);
        assert_eq!(filter_patients(all.clone(), Some("mail.test")).len(), 1);
        assert_eq!(filter_patients(all.clone(), Some("600 111")).len(), 1);
        assert_eq!(filter_patients(all.clone(), Some("  ")).len(), 2);
        assert_eq!(filter_patients(all.clone(), None).len(), 2);
        assert!(filter_patients(all, Some("zzz")).is_empty());
    }

    #[test]
    fn doctors_match_full_name_or_specialty() {
        let conn = open_memory_database().unwrap();
        let doctors = vec![seed_doctor(&conn, "Laura", "Gómez"), seed_doctor(&conn, "Pedro", "Sanz")];
        assert_eq!(filter_doctors(doctors.clone(), Some("laura góm")).len(), 1);
        assert_eq!(filter_doctors(doctors.clone(), Some("general")).len(), 2);
        assert!(filter_doctors(doctors, Some("cardio")).is_empty());
    }

    #[test]
    fn services_match_name_or_description() {
        let conn = open_memory_database().unwrap();
        let mut cleaning = seed_service(&conn, "Cleaning", 30);
        cleaning.description = Some("Dental hygiene".into());
        let services = vec![cleaning, seed_service(&conn, "Consult", 15)];
        assert_eq!(filter_services(services.clone(), Some("hygiene")).len(), 1);
        assert_eq!(filter_services(services, Some("c")).len(), 2);
    }

    #[test]
    fn date_ranges() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let now = utc(2025, 3, 10, 12, 0);

        assert!(in_date_range(utc(2025, 3, 10, 8, 0), DateRange::Today, now, &offset));
        assert!(!in_date_range(utc(2025, 3, 11, 0, 0), DateRange::Today, now, &offset));

        assert!(in_date_range(utc(2025, 3, 17, 12, 0), DateRange::Week, now, &offset));
        assert!(!in_date_range(utc(2025, 3, 17, 12, 1), DateRange::Week, now, &offset));
        assert!(!in_date_range(utc(2025, 3, 10, 11, 0), DateRange::Week, now, &offset));

        assert!(in_date_range(utc(2025, 4, 10, 0, 0), DateRange::Month, now, &offset));
        assert!(!in_date_range(utc(2025, 4, 10, 0, 1), DateRange::Month, now, &offset));
    }

    #[test]
    fn today_uses_clinic_day() {
        // 03:00 UTC on the 11th is still the 10th at UTC-5.
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = utc(2025, 3, 10, 20, 0);
        assert!(in_date_range(utc(2025, 3, 11, 3, 0), DateRange::Today, now, &offset));
    }

    #[test]
    fn appointments_filter_by_term_status_and_range() {
        let conn = open_memory_database().unwrap();
        let ana = seed_patient(&conn, "Ana", "Ruiz");
        let pedro = seed_patient(&conn, "Pedro", "Sanz");
        let doctor = seed_doctor(&conn, "Laura", "Gómez");
        let cleaning = seed_service(&conn, "Cleaning", 30);
        seed_appointment(&conn, &ana, &doctor, Some(&cleaning), utc(2025, 3, 10, 9, 0), 30, AppointmentStatus::Confirmed);
        seed_appointment(&conn, &pedro, &doctor, None, utc(2025, 3, 12, 9, 0), 30, AppointmentStatus::Scheduled);
        seed_appointment(&conn, &pedro, &doctor, None, utc(2025, 5, 1, 9, 0), 30, AppointmentStatus::Cancelled);

        let all = list_appointment_details(&conn).unwrap();
        let offset = FixedOffset::east_opt(0).unwrap();
        let now = utc(2025, 3, 10, 8, 0);

        let by_term = filter_appointments(all.clone(), Some("clean"), None, None, now, &offset);
        assert_eq!(by_term.len(), 1);
        assert_eq!(by_term[0].patient.first_name, "Ana");

        let by_doctor = filter_appointments(all.clone(), Some("gómez"), None, None, now, &offset);
        assert_eq!(by_doctor.len(), 3);

        let cancelled = filter_appointments(all.clone(), None, Some(AppointmentStatus::Cancelled), None, now, &offset);
        assert_eq!(cancelled.len(), 1);

        let week = filter_appointments(all.clone(), None, None, Some(DateRange::Week), now, &offset);
        assert_eq!(week.len(), 2);

        let today = filter_appointments(all, Some("pedro"), None, Some(DateRange::Today), now, &offset);
        assert!(today.is_empty());
    }

    #[test]
    fn medical_records_filter_by_term_and_doctor() {
        let conn = open_memory_database().unwrap();
        let ana = seed_patient(&conn, "Ana", "Ruiz");
        let laura = seed_doctor(&conn, "Laura", "Gómez");
        let pedro = seed_doctor(&conn, "Pedro", "Sanz");
        seed_medical_record(&conn, &ana, &laura, utc(2025, 3, 1, 9, 0), "Migraine");
        seed_medical_record(&conn, &ana, &pedro, utc(2025, 3, 2, 9, 0), "Sprained ankle");

        let all = list_medical_record_details(&conn).unwrap();
        assert_eq!(filter_medical_records(all.clone(), Some("migr"), None).len(), 1);
        assert_eq!(filter_medical_records(all.clone(), Some("ruiz"), None).len(), 2);
        assert_eq!(filter_medical_records(all.clone(), None, Some(pedro.id)).len(), 1);
        assert!(filter_medical_records(all, Some("migr"), Some(pedro.id)).is_empty());
    }

    #[test]
    fn age_counts_completed_years() {
        let dob = date(1990, 6, 15);
        assert_eq!(age_on(dob, date(2025, 6, 14)), 34);
        assert_eq!(age_on(dob, date(2025, 6, 15)), 35);
        assert_eq!(age_on(dob, date(2025, 12, 31)), 35);
    }
}
