use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    date_to_sql, decode_list, encode_list, parse_date, parse_opt_uuid, parse_timestamp,
    parse_uuid, timestamp_to_sql, SqlFilter,
};
use crate::db::DatabaseError;
use crate::models::enums::Gender;
use crate::models::{EmergencyContact, Patient, PatientFilter};

const PATIENT_COLUMNS: &str = "id, name, age, gender, email, phone, address, medical_conditions,
     allergies, doctor_id, doctor_name, registration_date, emergency_contact_name,
     emergency_contact_phone, emergency_contact_relationship, blood_type, weight, height,
     is_active, created_at, updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, age, gender, email, phone, address, medical_conditions,
         allergies, doctor_id, doctor_name, registration_date, emergency_contact_name,
         emergency_contact_phone, emergency_contact_relationship, blood_type, weight, height,
         is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.age,
            patient.gender.as_str(),
            patient.email,
            patient.phone,
            patient.address,
            encode_list(&patient.medical_conditions)?,
            encode_list(&patient.allergies)?,
            patient.doctor_id.map(|id| id.to_string()),
            patient.doctor_name,
            date_to_sql(patient.registration_date),
            patient.emergency_contact.name,
            patient.emergency_contact.phone,
            patient.emergency_contact.relationship,
            patient.blood_type,
            patient.weight,
            patient.height,
            patient.is_active,
            timestamp_to_sql(patient.created_at),
            timestamp_to_sql(patient.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            patient_row_from_rusqlite,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

/// Patient records are linked to patient accounts by email.
pub fn get_active_patient_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let patients = list_patients(
        conn,
        &PatientFilter {
            email: Some(email.to_string()),
            ..Default::default()
        },
    )?;
    Ok(patients.into_iter().next())
}

/// Active patients newest first, unless the filter includes inactive ones.
pub fn list_patients(conn: &Connection, filter: &PatientFilter) -> Result<Vec<Patient>, DatabaseError> {
    let mut f = SqlFilter::new();
    if !filter.include_inactive {
        f.raw("is_active = 1");
    }
    if let Some(doctor_id) = filter.doctor_id {
        f.eq("doctor_id = {p}", doctor_id.to_string());
    }
    if let Some(email) = &filter.email {
        f.eq("LOWER(email) = LOWER({p})", email.trim().to_string());
    }
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients{} ORDER BY created_at DESC",
        f.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(f.params().as_slice(), patient_row_from_rusqlite)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET name = ?2, age = ?3, gender = ?4, email = ?5, phone = ?6,
         address = ?7, medical_conditions = ?8, allergies = ?9, doctor_id = ?10,
         doctor_name = ?11, emergency_contact_name = ?12, emergency_contact_phone = ?13,
         emergency_contact_relationship = ?14, blood_type = ?15, weight = ?16, height = ?17,
         is_active = ?18, updated_at = ?19
         WHERE id = ?1",
        params![
            patient.id.to_string(),
            patient.name,
            patient.age,
            patient.gender.as_str(),
            patient.email,
            patient.phone,
            patient.address,
            encode_list(&patient.medical_conditions)?,
            encode_list(&patient.allergies)?,
            patient.doctor_id.map(|id| id.to_string()),
            patient.doctor_name,
            patient.emergency_contact.name,
            patient.emergency_contact.phone,
            patient.emergency_contact.relationship,
            patient.blood_type,
            patient.weight,
            patient.height,
            patient.is_active,
            timestamp_to_sql(Utc::now()),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("patient", patient.id));
    }
    Ok(())
}

/// Soft delete: the row stays, default lists stop returning it.
pub fn deactivate_patient(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), timestamp_to_sql(Utc::now())],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("patient", id));
    }
    Ok(())
}

pub fn count_active_patients(conn: &Connection) -> Result<u32, DatabaseError> {
    let n: u32 = conn.query_row("SELECT COUNT(*) FROM patients WHERE is_active = 1", [], |row| {
        row.get(0)
    })?;
    Ok(n)
}

struct PatientRow {
    id: String,
    name: String,
    age: u32,
    gender: String,
    email: String,
    phone: String,
    address: String,
    medical_conditions: String,
    allergies: String,
    doctor_id: Option<String>,
    doctor_name: String,
    registration_date: String,
    emergency_contact_name: String,
    emergency_contact_phone: String,
    emergency_contact_relationship: String,
    blood_type: String,
    weight: f64,
    height: f64,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

fn patient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        address: row.get(6)?,
        medical_conditions: row.get(7)?,
        allergies: row.get(8)?,
        doctor_id: row.get(9)?,
        doctor_name: row.get(10)?,
        registration_date: row.get(11)?,
        emergency_contact_name: row.get(12)?,
        emergency_contact_phone: row.get(13)?,
        emergency_contact_relationship: row.get(14)?,
        blood_type: row.get(15)?,
        weight: row.get(16)?,
        height: row.get(17)?,
        is_active: row.get(18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid("patients.id", &row.id)?,
        name: row.name,
        age: row.age,
        gender: Gender::from_str(&row.gender)?,
        email: row.email,
        phone: row.phone,
        address: row.address,
        medical_conditions: decode_list("patients.medical_conditions", &row.medical_conditions)?,
        allergies: decode_list("patients.allergies", &row.allergies)?,
        doctor_id: parse_opt_uuid("patients.doctor_id", row.doctor_id)?,
        doctor_name: row.doctor_name,
        registration_date: parse_date("patients.registration_date", &row.registration_date)?,
        emergency_contact: EmergencyContact {
            name: row.emergency_contact_name,
            phone: row.emergency_contact_phone,
            relationship: row.emergency_contact_relationship,
        },
        blood_type: row.blood_type,
        weight: row.weight,
        height: row.height,
        is_active: row.is_active,
        created_at: parse_timestamp("patients.created_at", &row.created_at)?,
        updated_at: parse_timestamp("patients.updated_at", &row.updated_at)?,
    })
}
