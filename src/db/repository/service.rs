use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_ts, col_uuid, ts_to_sql};
use crate::db::DatabaseError;
use crate::models::*;

const SERVICE_COLUMNS: &str = "id, name, description, duration_minutes, price, created_at";

pub fn insert_service(conn: &Connection, service: &Service) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO services (id, name, description, duration_minutes, price, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            service.id.to_string(),
            service.name,
            service.description,
            service.duration_minutes,
            service.price,
            ts_to_sql(&service.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &Uuid) -> Result<Option<Service>, DatabaseError> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1");
    let service = conn
        .query_row(&sql, params![id.to_string()], service_from_row)
        .optional()?;
    Ok(service)
}

pub fn update_service(
    conn: &Connection,
    id: &Uuid,
    input: &ServiceInput,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE services SET name = ?2, description = ?3, duration_minutes = ?4, price = ?5
         WHERE id = ?1",
        params![
            id.to_string(),
            input.name,
            input.description,
            input.duration_minutes,
            input.price,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("service", id));
    }
    Ok(())
}

pub fn delete_service(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM services WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(DatabaseError::not_found("service", id));
    }
    Ok(())
}

/// Catalog ordered by name.
pub fn list_services(conn: &Connection) -> Result<Vec<Service>, DatabaseError> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services ORDER BY name ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], service_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: col_uuid(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        duration_minutes: row.get(3)?,
        price: row.get(4)?,
        created_at: col_ts(row, 5)?,
    })
}
