use serde::Deserialize;
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// Relative window used by the appointment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Today,
    Week,
    Month,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientFilter {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorFilter {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceFilter {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentFilter {
    pub q: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub range: Option<DateRange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MedicalRecordFilter {
    pub q: Option<String>,
    pub doctor_id: Option<Uuid>,
}
