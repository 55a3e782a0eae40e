//! Form-level checks for create and update requests.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::{DoctorInput, PatientInput, ServiceInput, DEFAULT_DOCTOR_COLOR};
use crate::scheduling::validate_duration;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn required(value: &str, message: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError(message.into()));
    }
    Ok(())
}

pub fn validate_patient(input: &PatientInput) -> Result<(), ValidationError> {
    required(&input.first_name, "First name is required")?;
    required(&input.last_name, "Last name is required")?;
    if let Some(email) = input.email.as_deref().filter(|e| !e.trim().is_empty()) {
        if !EMAIL.is_match(email.trim()) {
            return Err(ValidationError("Email address is not valid".into()));
        }
    }
    Ok(())
}

/// Validates the doctor form and returns the colour to store.
pub fn validate_doctor(input: &DoctorInput) -> Result<String, ValidationError> {
    required(&input.first_name, "First name is required")?;
    required(&input.last_name, "Last name is required")?;
    required(&input.specialty, "Specialty is required")?;
    match input.color.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(DEFAULT_DOCTOR_COLOR.to_string()),
        Some(color) if HEX_COLOR.is_match(color) => Ok(color.to_uppercase()),
        Some(_) => Err(ValidationError("Color must be a hex value like #3B82F6".into())),
    }
}

pub fn validate_service(input: &ServiceInput) -> Result<(), ValidationError> {
    required(&input.name, "Service name is required")?;
    // Same grid the booking form offers, so a service default always books.
    validate_duration(input.duration_minutes).map_err(|e| ValidationError(e.to_string()))?;
    if !input.price.is_finite() || input.price < 0.0 {
        return Err(ValidationError("Price must be zero or more".into()));
    }
    Ok(())
}
