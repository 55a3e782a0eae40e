//! Role-based access rules.
//!
//! Two tiers: administrators manage the doctor roster, the service catalog
//! and staff roles; every signed-in role may read everything and manage
//! patients, appointments and medical records.

use serde::Serialize;
use thiserror::Error;

use crate::models::{Profile, Role};

#[derive(Debug, Error)]
#[error("Administrator access required")]
pub struct AdminRequired;

/// One sidebar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub key: &'static str,
    pub title: &'static str,
    pub href: &'static str,
}

const BASE_NAVIGATION: [NavItem; 4] = [
    NavItem { key: "dashboard", title: "Dashboard", href: "/dashboard" },
    NavItem { key: "patients", title: "Patients", href: "/dashboard/patients" },
    NavItem { key: "appointments", title: "Appointments", href: "/dashboard/appointments" },
    NavItem { key: "medical_records", title: "Medical Records", href: "/dashboard/medical-records" },
];

const ADMIN_NAVIGATION: [NavItem; 2] = [
    NavItem { key: "doctors", title: "Doctors", href: "/dashboard/doctors" },
    NavItem { key: "services", title: "Services", href: "/dashboard/services" },
];

/// Display label for a role. Accounts without a role read as "User".
pub fn role_label(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Admin) => "Administrator",
        Some(Role::Doctor) => "Doctor",
        Some(Role::Nurse) => "Nurse",
        Some(Role::Staff) => "Staff",
        None => "User",
    }
}

pub fn navigation_for(role: Role) -> Vec<NavItem> {
    let mut items = BASE_NAVIGATION.to_vec();
    if role.is_admin() {
        items.extend(ADMIN_NAVIGATION);
    }
    items
}

pub fn require_admin(profile: &Profile) -> Result<(), AdminRequired> {
    if profile.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = %profile.id, role = %profile.role, "Admin-only action denied");
        Err(AdminRequired)
    }
}
