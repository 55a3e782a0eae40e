//! Shared fixtures for unit tests.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::*;
use crate::models::*;

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

pub fn seed_profile(conn: &Connection, email: &str, role: Role) -> Profile {
    let profile = Profile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: "Test".into(),
        last_name: "User".into(),
        role,
        created_at: Utc::now(),
    };
    insert_profile(conn, &profile).unwrap();
    profile
}

pub fn seed_patient(conn: &Connection, first: &str, last: &str) -> Patient {
    let patient = Patient {
        id: Uuid::new_v4(),
        first_name: first.into(),
        last_name: last.into(),
        email: None,
        phone: None,
        date_of_birth: None,
        address: None,
        emergency_contact_name: None,
        emergency_contact_phone: None,
        medical_notes: None,
        created_by: None,
        created_at: Utc::now(),
        updated_at: None,
    };
    insert_patient(conn, &patient).unwrap();
    patient
}

pub fn seed_doctor(conn: &Connection, first: &str, last: &str) -> Doctor {
    let doctor = Doctor {
        id: Uuid::new_v4(),
        user_id: None,
        first_name: first.into(),
        last_name: last.into(),
        phone: None,
        specialty: "Medicina general".into(),
        color: DEFAULT_DOCTOR_COLOR.into(),
        created_at: Utc::now(),
    };
    insert_doctor(conn, &doctor).unwrap();
    doctor
}

pub fn seed_service(conn: &Connection, name: &str, minutes: u32) -> Service {
    let service = Service {
        id: Uuid::new_v4(),
        name: name.into(),
        description: None,
        duration_minutes: minutes,
        price: 50.0,
        created_at: Utc::now(),
    };
    insert_service(conn, &service).unwrap();
    service
}

pub fn seed_appointment(
    conn: &Connection,
    patient: &Patient,
    doctor: &Doctor,
    service: Option<&Service>,
    at: DateTime<Utc>,
    minutes: u32,
    status: AppointmentStatus,
) -> Appointment {
    let appt = Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        doctor_id: doctor.id,
        service_id: service.map(|s| s.id),
        appointment_date: at,
        duration_minutes: minutes,
        status,
        notes: None,
        created_by: None,
        created_at: Utc::now(),
        updated_at: None,
    };
    insert_appointment(conn, &appt).unwrap();
    appt
}

pub fn seed_medical_record(
    conn: &Connection,
    patient: &Patient,
    doctor: &Doctor,
    record_date: DateTime<Utc>,
    diagnosis: &str,
) -> MedicalRecord {
    let record = MedicalRecord {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        doctor_id: doctor.id,
        appointment_id: None,
        diagnosis: Some(diagnosis.into()),
        treatment: None,
        medications: None,
        notes: None,
        record_date,
        created_by: None,
        created_at: Utc::now(),
    };
    insert_medical_record(conn, &record).unwrap();
    record
}

/// `CoreState` whose database lives in a fresh temp directory.
/// Keep the returned guard alive for the duration of the test.
pub fn temp_core_state() -> (tempfile::TempDir, crate::core_state::CoreState) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_string_lossy().into_owned();
    let config = crate::config::ClinicConfig::from_lookup(|key| match key {
        "CLINICA_DATA_DIR" => Some(path.clone()),
        _ => None,
    })
    .unwrap();
    (dir, crate::core_state::CoreState::new(config))
}
