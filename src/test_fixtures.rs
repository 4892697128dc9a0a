//! Builders for model values used across unit tests.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::models::enums::{ConsumptionStatus, Gender, MedicationCategory, UserRole};
use crate::models::{
    ConsumptionRecord, Doctor, EmergencyContact, Medication, MedicationSchedule, Patient,
    UserProfile,
};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn user(email: &str, role: UserRole) -> UserProfile {
    let now = Utc::now();
    UserProfile {
        id: Uuid::new_v4(),
        email: email.into(),
        name: "Test User".into(),
        role,
        specialization: None,
        license_number: None,
        phone: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn doctor(name: &str) -> Doctor {
    let now = Utc::now();
    Doctor {
        id: Uuid::new_v4(),
        user_id: None,
        name: name.into(),
        email: format!("{}@beom-med.com", name.to_lowercase().replace(' ', ".")),
        specialization: "Cardiology".into(),
        license_number: "MD-12345".into(),
        phone: "+62-812-0000".into(),
        patient_ids: Vec::new(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn patient(name: &str, email: &str) -> Patient {
    let now = Utc::now();
    Patient {
        id: Uuid::new_v4(),
        name: name.into(),
        age: 45,
        gender: Gender::Male,
        email: email.into(),
        phone: "+62-813-1111".into(),
        address: "Jl. Sudirman 1".into(),
        medical_conditions: vec!["Diabetes Type 2".into()],
        allergies: vec!["Penicillin".into()],
        doctor_id: None,
        doctor_name: String::new(),
        registration_date: date("2024-01-10"),
        emergency_contact: EmergencyContact {
            name: "Jane Smith".into(),
            phone: "+62-813-2222".into(),
            relationship: "Spouse".into(),
        },
        blood_type: "O+".into(),
        weight: 78.5,
        height: 175.0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn medication(name: &str, category: MedicationCategory) -> Medication {
    let now = Utc::now();
    Medication {
        id: Uuid::new_v4(),
        name: name.into(),
        dosage: "500mg".into(),
        frequency: "2x daily".into(),
        instructions: "After meals".into(),
        side_effects: vec!["Nausea".into()],
        category,
        manufacturer: Some("Kimia Farma".into()),
        expiry_date: Some(date("2026-12-31")),
        stock_quantity: 100,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn schedule(patient_id: Uuid, medication_id: Uuid, times: &[&str]) -> MedicationSchedule {
    let now = Utc::now();
    MedicationSchedule {
        id: Uuid::new_v4(),
        patient_id,
        medication_id,
        medication_name: "Metformin 500mg".into(),
        dosage: "500mg".into(),
        times: times.iter().map(|t| t.to_string()).collect(),
        start_date: date("2024-01-01"),
        end_date: date("2024-12-31"),
        instructions: None,
        prescribed_by: None,
        prescribed_by_name: "Dr. Michael Chen".into(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn record(
    schedule: &MedicationSchedule,
    on: &str,
    at: &str,
    status: ConsumptionStatus,
) -> ConsumptionRecord {
    let now = Utc::now();
    ConsumptionRecord {
        id: Uuid::new_v4(),
        patient_id: schedule.patient_id,
        schedule_id: schedule.id,
        medication_name: schedule.medication_name.clone(),
        scheduled_time: at.into(),
        actual_time: (status != ConsumptionStatus::Missed).then(|| at.to_string()),
        status,
        date: date(on),
        notes: None,
        reminder_sent: false,
        created_at: now,
        updated_at: now,
    }
}
