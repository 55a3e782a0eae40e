use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::doctor::DoctorSummary;
use super::enums::AppointmentStatus;
use super::patient::PersonName;
use super::service::ServiceSummary;

/// Duration used when neither the request nor the service provides one.
pub const DEFAULT_APPOINTMENT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub service_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.appointment_date + Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Booking request. `duration_minutes` falls back to the service duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentInput {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Appointment joined with patient, doctor and service columns.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: PersonName,
    pub doctor: DoctorSummary,
    pub service: Option<ServiceSummary>,
}

/// Existing booking considered by the conflict check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedSlot {
    pub id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: u32,
}
