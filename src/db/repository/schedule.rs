use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    date_to_sql, decode_list, encode_list, parse_date, parse_opt_uuid, parse_timestamp,
    parse_uuid, timestamp_to_sql, SqlFilter,
};
use crate::db::DatabaseError;
use crate::models::{MedicationSchedule, ScheduleFilter};

const SCHEDULE_COLUMNS: &str = "id, patient_id, medication_id, medication_name, dosage, times,
     start_date, end_date, instructions, prescribed_by, prescribed_by_name, is_active,
     created_at, updated_at";

pub fn insert_schedule(conn: &Connection, s: &MedicationSchedule) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO schedules (id, patient_id, medication_id, medication_name, dosage, times,
         start_date, end_date, instructions, prescribed_by, prescribed_by_name, is_active,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            s.id.to_string(),
            s.patient_id.to_string(),
            s.medication_id.to_string(),
            s.medication_name,
            s.dosage,
            encode_list(&s.times)?,
            date_to_sql(s.start_date),
            date_to_sql(s.end_date),
            s.instructions,
            s.prescribed_by.map(|id| id.to_string()),
            s.prescribed_by_name,
            s.is_active,
            timestamp_to_sql(s.created_at),
            timestamp_to_sql(s.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_schedule(conn: &Connection, id: &Uuid) -> Result<Option<MedicationSchedule>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"),
            params![id.to_string()],
            schedule_row_from_rusqlite,
        )
        .optional()?;
    row.map(schedule_from_row).transpose()
}

/// Active schedules. A single-patient query orders by start date (newest
/// course first); everything else orders by creation, newest first.
pub fn list_schedules(
    conn: &Connection,
    filter: &ScheduleFilter,
) -> Result<Vec<MedicationSchedule>, DatabaseError> {
    let mut f = SqlFilter::new();
    if !filter.include_inactive {
        f.raw("is_active = 1");
    }
    if let Some(patient_id) = filter.patient_id {
        f.eq("patient_id = {p}", patient_id.to_string());
    }
    if let Some(ids) = &filter.patient_ids {
        f.any_of("patient_id", ids);
    }
    let order = if filter.patient_id.is_some() {
        "start_date DESC, created_at DESC"
    } else {
        "created_at DESC"
    };
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules{} ORDER BY {order}",
        f.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(f.params().as_slice(), schedule_row_from_rusqlite)?;

    let mut schedules = Vec::new();
    for row in rows {
        schedules.push(schedule_from_row(row?)?);
    }
    Ok(schedules)
}

pub fn update_schedule(conn: &Connection, s: &MedicationSchedule) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE schedules SET patient_id = ?2, medication_id = ?3, medication_name = ?4,
         dosage = ?5, times = ?6, start_date = ?7, end_date = ?8, instructions = ?9,
         prescribed_by = ?10, prescribed_by_name = ?11, is_active = ?12, updated_at = ?13
         WHERE id = ?1",
        params![
            s.id.to_string(),
            s.patient_id.to_string(),
            s.medication_id.to_string(),
            s.medication_name,
            s.dosage,
            encode_list(&s.times)?,
            date_to_sql(s.start_date),
            date_to_sql(s.end_date),
            s.instructions,
            s.prescribed_by.map(|id| id.to_string()),
            s.prescribed_by_name,
            s.is_active,
            timestamp_to_sql(Utc::now()),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("schedule", s.id));
    }
    Ok(())
}

/// Soft delete: the row stays, default lists stop returning it.
pub fn deactivate_schedule(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE schedules SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), timestamp_to_sql(Utc::now())],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("schedule", id));
    }
    Ok(())
}

struct ScheduleRow {
    id: String,
    patient_id: String,
    medication_id: String,
    medication_name: String,
    dosage: String,
    times: String,
    start_date: String,
    end_date: String,
    instructions: Option<String>,
    prescribed_by: Option<String>,
    prescribed_by_name: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

fn schedule_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ScheduleRow, rusqlite::Error> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        medication_id: row.get(2)?,
        medication_name: row.get(3)?,
        dosage: row.get(4)?,
        times: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        instructions: row.get(8)?,
        prescribed_by: row.get(9)?,
        prescribed_by_name: row.get(10)?,
        is_active: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn schedule_from_row(row: ScheduleRow) -> Result<MedicationSchedule, DatabaseError> {
    Ok(MedicationSchedule {
        id: parse_uuid("schedules.id", &row.id)?,
        patient_id: parse_uuid("schedules.patient_id", &row.patient_id)?,
        medication_id: parse_uuid("schedules.medication_id", &row.medication_id)?,
        medication_name: row.medication_name,
        dosage: row.dosage,
        times: decode_list("schedules.times", &row.times)?,
        start_date: parse_date("schedules.start_date", &row.start_date)?,
        end_date: parse_date("schedules.end_date", &row.end_date)?,
        instructions: row.instructions,
        prescribed_by: parse_opt_uuid("schedules.prescribed_by", row.prescribed_by)?,
        prescribed_by_name: row.prescribed_by_name,
        is_active: row.is_active,
        created_at: parse_timestamp("schedules.created_at", &row.created_at)?,
        updated_at: parse_timestamp("schedules.updated_at", &row.updated_at)?,
    })
}
