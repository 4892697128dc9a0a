use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    decode_list, encode_list, parse_opt_uuid, parse_timestamp, parse_uuid, timestamp_to_sql,
    SqlFilter,
};
use crate::db::DatabaseError;
use crate::models::{Doctor, DoctorFilter};

const DOCTOR_COLUMNS: &str = "id, user_id, name, email, specialization, license_number, phone,
     patient_ids, is_active, created_at, updated_at";

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, user_id, name, email, specialization, license_number, phone,
         patient_ids, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            doctor.id.to_string(),
            doctor.user_id.map(|id| id.to_string()),
            doctor.name,
            doctor.email,
            doctor.specialization,
            doctor.license_number,
            doctor.phone,
            encode_list(&doctor.patient_ids)?,
            doctor.is_active,
            timestamp_to_sql(doctor.created_at),
            timestamp_to_sql(doctor.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1"),
            params![id.to_string()],
            doctor_row_from_rusqlite,
        )
        .optional()?;
    row.map(doctor_from_row).transpose()
}

/// The doctor profile linked to a sign-in account, active or not.
pub fn get_doctor_by_user(conn: &Connection, user_id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE user_id = ?1
                 ORDER BY is_active DESC, created_at DESC LIMIT 1"
            ),
            params![user_id.to_string()],
            doctor_row_from_rusqlite,
        )
        .optional()?;
    row.map(doctor_from_row).transpose()
}

/// Active doctors newest first, unless the filter includes inactive ones.
pub fn list_doctors(conn: &Connection, filter: &DoctorFilter) -> Result<Vec<Doctor>, DatabaseError> {
    let mut f = SqlFilter::new();
    if !filter.include_inactive {
        f.raw("is_active = 1");
    }
    if let Some(user_id) = filter.user_id {
        f.eq("user_id = {p}", user_id.to_string());
    }
    let sql = format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors{} ORDER BY created_at DESC",
        f.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(f.params().as_slice(), doctor_row_from_rusqlite)?;

    let mut doctors = Vec::new();
    for row in rows {
        doctors.push(doctor_from_row(row?)?);
    }
    Ok(doctors)
}

pub fn update_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET user_id = ?2, name = ?3, email = ?4, specialization = ?5,
         license_number = ?6, phone = ?7, patient_ids = ?8, is_active = ?9, updated_at = ?10
         WHERE id = ?1",
        params![
            doctor.id.to_string(),
            doctor.user_id.map(|id| id.to_string()),
            doctor.name,
            doctor.email,
            doctor.specialization,
            doctor.license_number,
            doctor.phone,
            encode_list(&doctor.patient_ids)?,
            doctor.is_active,
            timestamp_to_sql(Utc::now()),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("doctor", doctor.id));
    }
    Ok(())
}

/// Soft delete: the row stays, default lists stop returning it.
pub fn deactivate_doctor(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), timestamp_to_sql(Utc::now())],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("doctor", id));
    }
    Ok(())
}

pub fn count_active_doctors(conn: &Connection) -> Result<u32, DatabaseError> {
    let n: u32 = conn.query_row("SELECT COUNT(*) FROM doctors WHERE is_active = 1", [], |row| {
        row.get(0)
    })?;
    Ok(n)
}

struct DoctorRow {
    id: String,
    user_id: Option<String>,
    name: String,
    email: String,
    specialization: String,
    license_number: String,
    phone: String,
    patient_ids: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

fn doctor_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<DoctorRow, rusqlite::Error> {
    Ok(DoctorRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        specialization: row.get(4)?,
        license_number: row.get(5)?,
        phone: row.get(6)?,
        patient_ids: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn doctor_from_row(row: DoctorRow) -> Result<Doctor, DatabaseError> {
    Ok(Doctor {
        id: parse_uuid("doctors.id", &row.id)?,
        user_id: parse_opt_uuid("doctors.user_id", row.user_id)?,
        name: row.name,
        email: row.email,
        specialization: row.specialization,
        license_number: row.license_number,
        phone: row.phone,
        patient_ids: decode_list("doctors.patient_ids", &row.patient_ids)?,
        is_active: row.is_active,
        created_at: parse_timestamp("doctors.created_at", &row.created_at)?,
        updated_at: parse_timestamp("doctors.updated_at", &row.updated_at)?,
    })
}
