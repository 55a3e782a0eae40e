use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::authorization::{navigation_for, role_label, NavItem};
use crate::calendar::{local_date, local_midnight};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::Profile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_patients: i64,
    pub total_appointments: i64,
    pub today_appointments: i64,
    pub total_services: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Greeting {
    pub first_name: String,
    pub last_name: String,
    pub role_label: &'static str,
}

/// Everything the landing page shows for a signed-in user.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub greeting: Greeting,
    pub stats: DashboardStats,
    pub navigation: Vec<NavItem>,
}

/// Entity counts; "today" is the clinic calendar day containing `now`.
pub fn dashboard_stats(
    conn: &Connection,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> Result<DashboardStats, DatabaseError> {
    let today = local_date(now, offset);
    let start = local_midnight(today, offset);
    let end = today
        .succ_opt()
        .map(|d| local_midnight(d, offset))
        .unwrap_or(start);

    Ok(DashboardStats {
        total_patients: repository::count_patients(conn)?,
        total_appointments: repository::count_appointments(conn)?,
        today_appointments: repository::count_appointments_between(conn, &start, &end)?,
        total_services: repository::count_services(conn)?,
    })
}

pub fn dashboard_data(
    conn: &Connection,
    profile: &Profile,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> Result<DashboardData, DatabaseError> {
    Ok(DashboardData {
        greeting: Greeting {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            role_label: role_label(Some(profile.role)),
        },
        stats: dashboard_stats(conn, now, offset)?,
        navigation: navigation_for(profile.role),
    })
}
