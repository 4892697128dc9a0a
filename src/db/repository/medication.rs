use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    date_to_sql, decode_list, encode_list, parse_opt_date, parse_timestamp, parse_uuid,
    timestamp_to_sql, SqlFilter,
};
use crate::db::DatabaseError;
use crate::models::enums::MedicationCategory;
use crate::models::{Medication, MedicationFilter};

const MEDICATION_COLUMNS: &str = "id, name, dosage, frequency, instructions, side_effects,
     category, manufacturer, expiry_date, stock_quantity, is_active, created_at, updated_at";

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, name, dosage, frequency, instructions, side_effects,
         category, manufacturer, expiry_date, stock_quantity, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            med.id.to_string(),
            med.name,
            med.dosage,
            med.frequency,
            med.instructions,
            encode_list(&med.side_effects)?,
            med.category.as_str(),
            med.manufacturer,
            med.expiry_date.map(date_to_sql),
            med.stock_quantity,
            med.is_active,
            timestamp_to_sql(med.created_at),
            timestamp_to_sql(med.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1"),
            params![id.to_string()],
            medication_row_from_rusqlite,
        )
        .optional()?;
    row.map(medication_from_row).transpose()
}

/// Active catalogue entries ordered by name.
pub fn list_medications(
    conn: &Connection,
    filter: &MedicationFilter,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut f = SqlFilter::new();
    if !filter.include_inactive {
        f.raw("is_active = 1");
    }
    if let Some(category) = filter.category {
        f.eq("category = {p}", category.as_str());
    }
    let sql = format!(
        "SELECT {MEDICATION_COLUMNS} FROM medications{} ORDER BY name COLLATE NOCASE ASC",
        f.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(f.params().as_slice(), medication_row_from_rusqlite)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

pub fn update_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medications SET name = ?2, dosage = ?3, frequency = ?4, instructions = ?5,
         side_effects = ?6, category = ?7, manufacturer = ?8, expiry_date = ?9,
         stock_quantity = ?10, is_active = ?11, updated_at = ?12
         WHERE id = ?1",
        params![
            med.id.to_string(),
            med.name,
            med.dosage,
            med.frequency,
            med.instructions,
            encode_list(&med.side_effects)?,
            med.category.as_str(),
            med.manufacturer,
            med.expiry_date.map(date_to_sql),
            med.stock_quantity,
            med.is_active,
            timestamp_to_sql(Utc::now()),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("medication", med.id));
    }
    Ok(())
}

/// Soft delete: the row stays, default lists stop returning it.
pub fn deactivate_medication(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medications SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), timestamp_to_sql(Utc::now())],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("medication", id));
    }
    Ok(())
}

pub fn count_active_medications(conn: &Connection) -> Result<u32, DatabaseError> {
    let n: u32 = conn.query_row(
        "SELECT COUNT(*) FROM medications WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(n)
}

struct MedicationRow {
    id: String,
    name: String,
    dosage: String,
    frequency: String,
    instructions: String,
    side_effects: String,
    category: String,
    manufacturer: Option<String>,
    expiry_date: Option<String>,
    stock_quantity: u32,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        dosage: row.get(2)?,
        frequency: row.get(3)?,
        instructions: row.get(4)?,
        side_effects: row.get(5)?,
        category: row.get(6)?,
        manufacturer: row.get(7)?,
        expiry_date: row.get(8)?,
        stock_quantity: row.get(9)?,
        is_active: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    Ok(Medication {
        id: parse_uuid("medications.id", &row.id)?,
        name: row.name,
        dosage: row.dosage,
        frequency: row.frequency,
        instructions: row.instructions,
        side_effects: decode_list("medications.side_effects", &row.side_effects)?,
        category: MedicationCategory::from_str(&row.category)?,
        manufacturer: row.manufacturer,
        expiry_date: parse_opt_date("medications.expiry_date", row.expiry_date)?,
        stock_quantity: row.stock_quantity,
        is_active: row.is_active,
        created_at: parse_timestamp("medications.created_at", &row.created_at)?,
        updated_at: parse_timestamp("medications.updated_at", &row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::test_fixtures;

    #[test]
    fn list_is_sorted_by_name() {
        let conn = open_memory_database().unwrap();
        for name in ["Paracetamol", "amoxicillin", "Metformin"] {
            insert_medication(
                &conn,
                &test_fixtures::medication(name, MedicationCategory::Other),
            )
            .unwrap();
        }
        let names: Vec<String> = list_medications(&conn, &MedicationFilter::default())
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["amoxicillin", "Metformin", "Paracetamol"]);
    }

    #[test]
    fn category_filter() {
        let conn = open_memory_database().unwrap();
        insert_medication(
            &conn,
            &test_fixtures::medication("Vitamin D3", MedicationCategory::Vitamin),
        )
        .unwrap();
        insert_medication(
            &conn,
            &test_fixtures::medication("Amoxicillin", MedicationCategory::Antibiotic),
        )
        .unwrap();

        let vitamins = list_medications(
            &conn,
            &MedicationFilter {
                category: Some(MedicationCategory::Vitamin),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(vitamins.len(), 1);
        assert_eq!(vitamins[0].name, "Vitamin D3");
    }

    #[test]
    fn optional_fields_survive_round_trip() {
        let conn = open_memory_database().unwrap();
        let mut med = test_fixtures::medication("Lisinopril", MedicationCategory::Antihypertensive);
        med.manufacturer = None;
        med.expiry_date = None;
        insert_medication(&conn, &med).unwrap();

        let loaded = get_medication(&conn, &med.id).unwrap().unwrap();
        assert!(loaded.manufacturer.is_none());
        assert!(loaded.expiry_date.is_none());
        assert_eq!(loaded.side_effects, vec!["Nausea"]);
    }

    #[test]
    fn soft_delete_hides_from_catalogue() {
        let conn = open_memory_database().unwrap();
        let med = test_fixtures::medication("Metformin", MedicationCategory::Antidiabetic);
        insert_medication(&conn, &med).unwrap();
        deactivate_medication(&conn, &med.id).unwrap();

        assert_eq!(count_active_medications(&conn).unwrap(), 0);
        let all = list_medications(
            &conn,
            &MedicationFilter {
                include_inactive: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(all.len(), 1);
    }
}
