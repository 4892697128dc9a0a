use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{date_to_sql, parse_date, parse_timestamp, parse_uuid, timestamp_to_sql, SqlFilter};
use crate::db::DatabaseError;
use crate::models::enums::ConsumptionStatus;
use crate::models::{ConsumptionFilter, ConsumptionRecord};

const RECORD_COLUMNS: &str = "id, patient_id, schedule_id, medication_name, scheduled_time,
     actual_time, status, date, notes, reminder_sent, created_at, updated_at";

pub fn insert_consumption_record(
    conn: &Connection,
    record: &ConsumptionRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO consumption_records (id, patient_id, schedule_id, medication_name,
         scheduled_time, actual_time, status, date, notes, reminder_sent, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.schedule_id.to_string(),
            record.medication_name,
            record.scheduled_time,
            record.actual_time,
            record.status.as_str(),
            date_to_sql(record.date),
            record.notes,
            record.reminder_sent,
            timestamp_to_sql(record.created_at),
            timestamp_to_sql(record.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_consumption_record(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ConsumptionRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM consumption_records WHERE id = ?1"),
            params![id.to_string()],
            record_row_from_rusqlite,
        )
        .optional()?;
    row.map(record_from_row).transpose()
}

/// Dose history, newest day first and latest dose first within a day.
pub fn list_consumption_records(
    conn: &Connection,
    filter: &ConsumptionFilter,
) -> Result<Vec<ConsumptionRecord>, DatabaseError> {
    let mut f = SqlFilter::new();
    if let Some(patient_id) = filter.patient_id {
        f.eq("patient_id = {p}", patient_id.to_string());
    }
    if let Some(ids) = &filter.patient_ids {
        f.any_of("patient_id", ids);
    }
    if let Some(schedule_id) = filter.schedule_id {
        f.eq("schedule_id = {p}", schedule_id.to_string());
    }
    if let Some(status) = filter.status {
        f.eq("status = {p}", status.as_str());
    }
    if let Some(date) = filter.date {
        f.eq("date = {p}", date_to_sql(date));
    }
    if let Some(from) = filter.date_from {
        f.eq("date >= {p}", date_to_sql(from));
    }
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM consumption_records{}
         ORDER BY date DESC, scheduled_time DESC",
        f.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(f.params().as_slice(), record_row_from_rusqlite)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

pub fn update_consumption_record(
    conn: &Connection,
    record: &ConsumptionRecord,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE consumption_records SET actual_time = ?2, status = ?3, notes = ?4,
         reminder_sent = ?5, updated_at = ?6 WHERE id = ?1",
        params![
            record.id.to_string(),
            record.actual_time,
            record.status.as_str(),
            record.notes,
            record.reminder_sent,
            timestamp_to_sql(Utc::now()),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("consumption_record", record.id));
    }
    Ok(())
}

struct RecordRow {
    id: String,
    patient_id: String,
    schedule_id: String,
    medication_name: String,
    scheduled_time: String,
    actual_time: Option<String>,
    status: String,
    date: String,
    notes: Option<String>,
    reminder_sent: bool,
    created_at: String,
    updated_at: String,
}

fn record_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<RecordRow, rusqlite::Error> {
    Ok(RecordRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        schedule_id: row.get(2)?,
        medication_name: row.get(3)?,
        scheduled_time: row.get(4)?,
        actual_time: row.get(5)?,
        status: row.get(6)?,
        date: row.get(7)?,
        notes: row.get(8)?,
        reminder_sent: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<ConsumptionRecord, DatabaseError> {
    Ok(ConsumptionRecord {
        id: parse_uuid("consumption_records.id", &row.id)?,
        patient_id: parse_uuid("consumption_records.patient_id", &row.patient_id)?,
        schedule_id: parse_uuid("consumption_records.schedule_id", &row.schedule_id)?,
        medication_name: row.medication_name,
        scheduled_time: row.scheduled_time,
        actual_time: row.actual_time,
        status: ConsumptionStatus::from_str(&row.status)?,
        date: parse_date("consumption_records.date", &row.date)?,
        notes: row.notes,
        reminder_sent: row.reminder_sent,
        created_at: parse_timestamp("consumption_records.created_at", &row.created_at)?,
        updated_at: parse_timestamp("consumption_records.updated_at", &row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::test_fixtures;

    #[test]
    fn history_is_newest_first() {
        let conn = open_memory_database().unwrap();
        let s = test_fixtures::schedule(Uuid::new_v4(), Uuid::new_v4(), &["08:00", "20:00"]);
        let r1 = test_fixtures::record(&s, "2024-01-20", "08:00", ConsumptionStatus::Taken);
        let r2 = test_fixtures::record(&s, "2024-01-20", "20:00", ConsumptionStatus::Late);
        let r3 = test_fixtures::record(&s, "2024-01-21", "08:00", ConsumptionStatus::Missed);
        for r in [&r1, &r2, &r3] {
            insert_consumption_record(&conn, r).unwrap();
        }

        let ids: Vec<Uuid> = list_consumption_records(&conn, &ConsumptionFilter::default())
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![r3.id, r2.id, r1.id]);
    }

    #[test]
    fn filters_by_status_and_date_window() {
        let conn = open_memory_database().unwrap();
        let s = test_fixtures::schedule(Uuid::new_v4(), Uuid::new_v4(), &["08:00"]);
        insert_consumption_record(
            &conn,
            &test_fixtures::record(&s, "2024-01-10", "08:00", ConsumptionStatus::Missed),
        )
        .unwrap();
        insert_consumption_record(
            &conn,
            &test_fixtures::record(&s, "2024-01-20", "08:00", ConsumptionStatus::Missed),
        )
        .unwrap();
        insert_consumption_record(
            &conn,
            &test_fixtures::record(&s, "2024-01-20", "20:00", ConsumptionStatus::Taken),
        )
        .unwrap();

        let recent_missed = list_consumption_records(
            &conn,
            &ConsumptionFilter {
                status: Some(ConsumptionStatus::Missed),
                date_from: Some(test_fixtures::date("2024-01-15")),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(recent_missed.len(), 1);

        let on_day = list_consumption_records(
            &conn,
            &ConsumptionFilter {
                date: Some(test_fixtures::date("2024-01-20")),
                patient_id: Some(s.patient_id),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(on_day.len(), 2);
    }

    #[test]
    fn update_changes_status() {
        let conn = open_memory_database().unwrap();
        let s = test_fixtures::schedule(Uuid::new_v4(), Uuid::new_v4(), &["08:00"]);
        let mut r = test_fixtures::record(&s, "2024-01-20", "08:00", ConsumptionStatus::Missed);
        insert_consumption_record(&conn, &r).unwrap();
        r.status = ConsumptionStatus::Late;
        r.actual_time = Some("09:10".into());
        update_consumption_record(&conn, &r).unwrap();

        let loaded = get_consumption_record(&conn, &r.id).unwrap().unwrap();
        assert_eq!(loaded.status, ConsumptionStatus::Late);
        assert_eq!(loaded.actual_time.as_deref(), Some("09:10"));
    }
}
