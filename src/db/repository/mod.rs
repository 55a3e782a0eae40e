//! Repository layer — entity-scoped database operations.
//!
//! One sub-module per table family, each a set of free functions over a
//! borrowed `rusqlite::Connection`. All public functions are re-exported here.

mod appointment;
mod audit;
mod doctor;
mod medical_record;
mod patient;
mod profile;
mod service;
mod session;
mod stats;

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use super::DatabaseError;

pub use appointment::*;
pub use audit::*;
pub use doctor::*;
pub use medical_record::*;
pub use patient::*;
pub use profile::*;
pub use service::*;
pub use session::*;
pub use stats::*;

/// Storage format for instants. Fixed width, so text order equals time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    match NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        Ok(naive) => Ok(naive.and_utc()),
        Err(_) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e)),
    }
}

pub(crate) fn col_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn col_opt_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn col_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn col_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_ts(idx, &raw))
        .transpose()
}

pub(crate) fn col_opt_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn col_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rusqlite::Connection;

    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::*;
    use crate::test_support::*;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    #[test]
    fn timestamps_round_trip_at_second_precision() {
        let ts = utc(2025, 3, 9, 14, 30);
        assert_eq!(ts_to_sql(&ts), "2025-03-09T14:30:00Z");
        let conn = test_db();
        let patient = seed_patient(&conn, "Ana", "García");
        let appt = seed_appointment(&conn, &patient, &seed_doctor(&conn, "Luis", "Pérez"), None, ts, 30, AppointmentStatus::Scheduled);
        let loaded = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(loaded.appointment_date, ts);
    }

    #[test]
    fn patient_insert_update_and_list_newest_first() {
        let conn = test_db();
        let first = seed_patient(&conn, "Ana", "García");
        let second = seed_patient(&conn, "Bruno", "Díaz");

        let listed = list_patients(&conn).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);

        let input = PatientInput {
            first_name: "Ana María".into(),
            last_name: "García".into(),
            phone: Some("555-0101".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17),
            ..Default::default()
        };
        update_patient(&conn, &first.id, &input, Utc::now()).unwrap();
        let loaded = get_patient(&conn, &first.id).unwrap().unwrap();
        assert_eq!(loaded.first_name, "Ana María");
        assert_eq!(loaded.phone.as_deref(), Some("555-0101"));
        assert_eq!(loaded.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert!(loaded.updated_at.is_some());
    }

    #[test]
    fn update_missing_patient_is_not_found() {
        let conn = test_db();
        let err = update_patient(&conn, &Uuid::new_v4(), &PatientInput::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn doctors_sorted_by_first_name_and_deletable() {
        let conn = test_db();
        let zoe = seed_doctor(&conn, "Zoe", "Ruiz");
        seed_doctor(&conn, "Andrés", "Mora");

        let names: Vec<String> = list_doctors(&conn).unwrap().into_iter().map(|d| d.first_name).collect();
        assert_eq!(names, vec!["Andrés", "Zoe"]);

        delete_doctor(&conn, &zoe.id).unwrap();
        assert!(get_doctor(&conn, &zoe.id).unwrap().is_none());
        assert!(matches!(
            delete_doctor(&conn, &zoe.id),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn services_sorted_by_name_and_updatable() {
        let conn = test_db();
        let xray = seed_service(&conn, "Radiografía", 15);
        seed_service(&conn, "Consulta general", 30);

        let names: Vec<String> = list_services(&conn).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Consulta general", "Radiografía"]);

        update_service(
            &conn,
            &xray.id,
            &ServiceInput {
                name: "Radiografía".into(),
                description: Some("Tórax".into()),
                duration_minutes: 45,
                price: 80.0,
            },
        )
        .unwrap();
        let loaded = get_service(&conn, &xray.id).unwrap().unwrap();
        assert_eq!(loaded.duration_minutes, 45);
        assert_eq!(loaded.description.as_deref(), Some("Tórax"));
    }

    #[test]
    fn appointment_details_join_names() {
        let conn = test_db();
        let patient = seed_patient(&conn, "Ana", "García");
        let doctor = seed_doctor(&conn, "Luis", "Pérez");
        let service = seed_service(&conn, "Consulta", 30);
        let appt = seed_appointment(&conn, &patient, &doctor, Some(&service), utc(2025, 3, 10, 9, 0), 30, AppointmentStatus::Confirmed);
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 3, 12, 9, 0), 30, AppointmentStatus::Scheduled);

        let details = list_appointment_details(&conn).unwrap();
        assert_eq!(details.len(), 2);
        // Latest first
        assert_eq!(details[0].appointment.appointment_date, utc(2025, 3, 12, 9, 0));
        assert!(details[0].service.is_none());

        let detail = get_appointment_detail(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(detail.patient.full_name(), "Ana García");
        assert_eq!(detail.doctor.full_name(), "Luis Pérez");
        assert_eq!(detail.service.as_ref().unwrap().name, "Consulta");
        assert_eq!(detail.appointment.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn appointments_between_is_half_open() {
        let conn = test_db();
        let patient = seed_patient(&conn, "Ana", "García");
        let doctor = seed_doctor(&conn, "Luis", "Pérez");
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 3, 1, 0, 0), 30, AppointmentStatus::Scheduled);
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 3, 31, 23, 0), 30, AppointmentStatus::Scheduled);
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 4, 1, 0, 0), 30, AppointmentStatus::Scheduled);

        let march = list_appointment_details_between(&conn, &utc(2025, 3, 1, 0, 0), &utc(2025, 4, 1, 0, 0)).unwrap();
        assert_eq!(march.len(), 2);
        assert!(march[0].appointment.appointment_date < march[1].appointment.appointment_date);
        assert_eq!(
            count_appointments_between(&conn, &utc(2025, 3, 1, 0, 0), &utc(2025, 4, 1, 0, 0)).unwrap(),
            2
        );
    }

    #[test]
    fn booked_slots_skip_inactive_other_services_and_excluded() {
        let conn = test_db();
        let patient = seed_patient(&conn, "Ana", "García");
        let doctor = seed_doctor(&conn, "Luis", "Pérez");
        let other_doctor = seed_doctor(&conn, "Marta", "Sol");
        let consult = seed_service(&conn, "Consulta", 30);
        let xray = seed_service(&conn, "Radiografía", 15);
        let at = utc(2025, 3, 10, 9, 0);

        let kept = seed_appointment(&conn, &patient, &doctor, Some(&consult), at, 30, AppointmentStatus::Scheduled);
        let edited = seed_appointment(&conn, &patient, &doctor, Some(&consult), at, 30, AppointmentStatus::Confirmed);
        seed_appointment(&conn, &patient, &doctor, Some(&consult), at, 30, AppointmentStatus::Cancelled);
        seed_appointment(&conn, &patient, &doctor, Some(&consult), at, 30, AppointmentStatus::NoShow);
        seed_appointment(&conn, &patient, &doctor, Some(&xray), at, 15, AppointmentStatus::Scheduled);
        seed_appointment(&conn, &patient, &other_doctor, Some(&consult), at, 30, AppointmentStatus::Scheduled);

        let all_services = list_booked_slots(&conn, &doctor.id, None, None).unwrap();
        assert_eq!(all_services.len(), 3);

        let same_service = list_booked_slots(&conn, &doctor.id, Some(&consult.id), Some(&edited.id)).unwrap();
        assert_eq!(same_service.len(), 1);
        assert_eq!(same_service[0].id, kept.id);
    }

    #[test]
    fn medical_records_listed_by_record_date_desc() {
        let conn = test_db();
        let patient = seed_patient(&conn, "Ana", "García");
        let other = seed_patient(&conn, "Bruno", "Díaz");
        let doctor = seed_doctor(&conn, "Luis", "Pérez");
        let older = seed_medical_record(&conn, &patient, &doctor, utc(2025, 1, 5, 10, 0), "Gripe");
        let newer = seed_medical_record(&conn, &patient, &doctor, utc(2025, 2, 5, 10, 0), "Migraña");
        seed_medical_record(&conn, &other, &doctor, utc(2025, 3, 5, 10, 0), "Alergia");

        let all = list_medical_record_details(&conn).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].patient.first_name, "Bruno");

        let for_patient = list_patient_medical_records(&conn, &patient.id).unwrap();
        let ids: Vec<Uuid> = for_patient.iter().map(|r| r.record.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert_eq!(for_patient[0].doctor.full_name(), "Luis Pérez");
    }

    #[test]
    fn medical_record_update_clears_appointment_link() {
        let conn = test_db();
        let patient = seed_patient(&conn, "Ana", "García");
        let doctor = seed_doctor(&conn, "Luis", "Pérez");
        let record = seed_medical_record(&conn, &patient, &doctor, utc(2025, 1, 5, 10, 0), "Gripe");

        update_medical_record(
            &conn,
            &record.id,
            &MedicalRecordInput {
                patient_id: patient.id,
                doctor_id: doctor.id,
                appointment_id: None,
                diagnosis: Some("Gripe estacional".into()),
                treatment: Some("Reposo".into()),
                medications: None,
                notes: None,
                record_date: utc(2025, 1, 6, 10, 0),
            },
        )
        .unwrap();
        let loaded = get_medical_record(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded.diagnosis.as_deref(), Some("Gripe estacional"));
        assert_eq!(loaded.record_date, utc(2025, 1, 6, 10, 0));
    }

    #[test]
    fn profile_email_lookup_ignores_case() {
        let conn = test_db();
        let profile = seed_profile(&conn, "recepcion@clinica.test", Role::Staff);
        let found = find_profile_by_email(&conn, "RECEPCION@clinica.test").unwrap().unwrap();
        assert_eq!(found.id, profile.id);
        assert_eq!(found.role, Role::Staff);

        update_profile_role(&conn, &profile.id, Role::Admin).unwrap();
        assert!(get_profile(&conn, &profile.id).unwrap().unwrap().is_admin());
        assert_eq!(count_profiles(&conn).unwrap(), 1);
    }

    #[test]
    fn sessions_expire_and_delete() {
        let conn = test_db();
        let profile = seed_profile(&conn, "a@clinica.test", Role::Staff);
        let now = utc(2025, 3, 10, 9, 0);
        let live = [1u8; 32];
        let stale = [2u8; 32];
        insert_session(&conn, &live, &profile.id, &now, &(now + Duration::hours(1))).unwrap();
        insert_session(&conn, &stale, &profile.id, &now, &(now - Duration::minutes(1))).unwrap();

        assert_eq!(find_session_user(&conn, &live, &now).unwrap(), Some(profile.id));
        assert_eq!(find_session_user(&conn, &stale, &now).unwrap(), None);

        assert_eq!(purge_expired_sessions(&conn, &now).unwrap(), 1);
        assert!(delete_session(&conn, &live).unwrap());
        assert!(!delete_session(&conn, &live).unwrap());
    }

    #[test]
    fn password_reset_is_single_use() {
        let conn = test_db();
        let profile = seed_profile(&conn, "a@clinica.test", Role::Staff);
        let now = utc(2025, 3, 10, 9, 0);
        let token = [7u8; 32];
        insert_password_reset(&conn, &token, &profile.id, &(now + Duration::hours(1))).unwrap();

        assert_eq!(consume_password_reset(&conn, &token, &now).unwrap(), Some(profile.id));
        assert_eq!(consume_password_reset(&conn, &token, &now).unwrap(), None);
    }

    #[test]
    fn expired_password_reset_is_rejected() {
        let conn = test_db();
        let profile = seed_profile(&conn, "a@clinica.test", Role::Staff);
        let now = utc(2025, 3, 10, 9, 0);
        let token = [8u8; 32];
        insert_password_reset(&conn, &token, &profile.id, &(now - Duration::seconds(1))).unwrap();
        assert_eq!(consume_password_reset(&conn, &token, &now).unwrap(), None);
    }

    #[test]
    fn stats_count_each_table() {
        let conn = test_db();
        let patient = seed_patient(&conn, "Ana", "García");
        seed_patient(&conn, "Bruno", "Díaz");
        let doctor = seed_doctor(&conn, "Luis", "Pérez");
        seed_service(&conn, "Consulta", 30);
        seed_appointment(&conn, &patient, &doctor, None, utc(2025, 3, 10, 9, 0), 30, AppointmentStatus::Scheduled);

        assert_eq!(count_patients(&conn).unwrap(), 2);
        assert_eq!(count_appointments(&conn).unwrap(), 1);
        assert_eq!(count_services(&conn).unwrap(), 1);
    }

    #[test]
    fn audit_entries_insert_and_prune() {
        let conn = test_db();
        insert_audit_entries(
            &conn,
            &[
                ("2024-01-01T00:00:00Z".into(), None, "GET /api/patients".into(), "status:200".into()),
                ("2025-03-10T09:00:00Z".into(), Some("u1".into()), "POST /api/appointments".into(), "status:201".into()),
            ],
        )
        .unwrap();

        let pruned = prune_audit_log(&conn, &utc(2025, 1, 1, 0, 0)).unwrap();
        assert_eq!(pruned, 1);
        let remaining = recent_audit_entries(&conn, 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].2, "POST /api/appointments");
    }
}
