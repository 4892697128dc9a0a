//! Demo data for a fresh database: four sign-in accounts, a small
//! catalogue, doctors, patients, schedules and a few days of history.
//!
//! Seeding only runs against a database without any accounts.

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::db::{repository, DatabaseError, StoredCredential};
use crate::models::enums::{ConsumptionStatus, Gender, MedicationCategory, UserRole};
use crate::models::{
    ConsumptionRecord, Doctor, EmergencyContact, Medication, MedicationSchedule, Patient,
    UserFilter, UserProfile,
};

/// Demo sign-ins: (name, email, password, role).
pub const DEMO_ACCOUNTS: &[(&str, &str, &str, UserRole)] = &[
    ("Administrator", "admin@beom-med.com", "admin123", UserRole::Admin),
    ("Michael Chen", "michael.chen@beom-med.com", "doctor123", UserRole::Doctor),
    ("Sarah Wilson", "sarah.wilson@beom-med.com", "doctor123", UserRole::Doctor),
    ("John Smith", "john.smith@email.com", "patient123", UserRole::Patient),
];

/// (name, email, specialization, license number, phone)
const DEMO_DOCTORS: [(&str, &str, &str, &str, &str); 3] = [
    (
        "Michael Chen",
        "michael.chen@beom-med.com",
        "Internal Medicine",
        "STR-12345678",
        "+62 21 9876 5432",
    ),
    (
        "Sarah Wilson",
        "sarah.wilson@beom-med.com",
        "Cardiology",
        "STR-87654321",
        "+62 21 5432 9876",
    ),
    (
        "Ahmad Rahman",
        "ahmad.rahman@beom-med.com",
        "Endocrinology",
        "STR-11223344",
        "+62 21 1122 3344",
    ),
];

struct DemoMedication {
    name: &'static str,
    dosage: &'static str,
    frequency: &'static str,
    instructions: &'static str,
    side_effects: &'static [&'static str],
    category: MedicationCategory,
}

const DEMO_MEDICATIONS: [DemoMedication; 5] = [
    DemoMedication {
        name: "Metformin",
        dosage: "500mg",
        frequency: "2x daily",
        instructions: "Take after meals",
        side_effects: &["Nausea", "Diarrhea", "Bloating"],
        category: MedicationCategory::Antidiabetic,
    },
    DemoMedication {
        name: "Lisinopril",
        dosage: "10mg",
        frequency: "1x daily",
        instructions: "Take before meals",
        side_effects: &["Dry cough", "Dizziness"],
        category: MedicationCategory::Antihypertensive,
    },
    DemoMedication {
        name: "Vitamin D3",
        dosage: "1000 IU",
        frequency: "1x daily",
        instructions: "Take after meals",
        side_effects: &["Minimal"],
        category: MedicationCategory::Vitamin,
    },
    DemoMedication {
        name: "Amoxicillin",
        dosage: "500mg",
        frequency: "3x daily",
        instructions: "Take every 8 hours",
        side_effects: &["Nausea", "Skin rash", "Diarrhea"],
        category: MedicationCategory::Antibiotic,
    },
    DemoMedication {
        name: "Paracetamol",
        dosage: "500mg",
        frequency: "As needed",
        instructions: "For fever and pain",
        side_effects: &["Rare"],
        category: MedicationCategory::Analgesic,
    },
];

struct DemoPatient {
    name: &'static str,
    age: u32,
    gender: Gender,
    email: &'static str,
    conditions: &'static [&'static str],
    allergies: &'static [&'static str],
    blood_type: &'static str,
    weight: f64,
    height: f64,
    contact: &'static str,
}

const DEMO_PATIENTS: [DemoPatient; 3] = [
    DemoPatient {
        name: "John Smith",
        age: 45,
        gender: Gender::Male,
        email: "john.smith@email.com",
        conditions: &["Hypertension", "Diabetes Type 2"],
        allergies: &["Penicillin"],
        blood_type: "O+",
        weight: 75.0,
        height: 170.0,
        contact: "Jane Smith",
    },
    DemoPatient {
        name: "Maria Garcia",
        age: 38,
        gender: Gender::Female,
        email: "maria.garcia@email.com",
        conditions: &["Diabetes Type 1"],
        allergies: &["Sulfa"],
        blood_type: "A+",
        weight: 65.0,
        height: 165.0,
        contact: "Carlos Garcia",
    },
    DemoPatient {
        name: "Robert Johnson",
        age: 62,
        gender: Gender::Male,
        email: "robert.johnson@email.com",
        conditions: &["Coronary Heart Disease", "Hypertension"],
        allergies: &[],
        blood_type: "B+",
        weight: 80.0,
        height: 175.0,
        contact: "Mary Johnson",
    },
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub accounts: usize,
    pub doctors: usize,
    pub patients: usize,
    pub medications: usize,
    pub schedules: usize,
    pub records: usize,
}

/// Populate an empty database. Returns `None` when accounts already exist.
pub fn seed_demo_data(
    conn: &mut Connection,
    today: NaiveDate,
) -> Result<Option<SeedSummary>, DatabaseError> {
    let existing = repository::list_users(
        conn,
        &UserFilter {
            include_inactive: true,
            ..Default::default()
        },
    )?;
    if !existing.is_empty() {
        tracing::debug!(accounts = existing.len(), "Database already has accounts, skipping seed");
        return Ok(None);
    }

    let tx = conn.transaction()?;
    let mut summary = SeedSummary::default();

    let mut account_ids = Vec::new();
    for (name, email, password, role) in DEMO_ACCOUNTS {
        let profile = account(name, email, *role);
        let (password_hash, salt) = hash_password(password);
        repository::insert_user(&tx, &profile)?;
        repository::upsert_credential(
            &tx,
            &StoredCredential {
                user_id: profile.id,
                password_hash,
                salt,
            },
        )?;
        account_ids.push(profile.id);
        summary.accounts += 1;
    }

    let mut chen = doctor(Some(account_ids[1]), DEMO_DOCTORS[0]);
    let mut wilson = doctor(Some(account_ids[2]), DEMO_DOCTORS[1]);
    let rahman = doctor(None, DEMO_DOCTORS[2]);

    let medications: Vec<Medication> = DEMO_MEDICATIONS.iter().map(medication).collect();
    for m in &medications {
        repository::insert_medication(&tx, m)?;
        summary.medications += 1;
    }

    let john = patient(&DEMO_PATIENTS[0], &chen, today - Duration::days(45));
    let maria = patient(&DEMO_PATIENTS[1], &wilson, today - Duration::days(46));
    let robert = patient(&DEMO_PATIENTS[2], &chen, today - Duration::days(47));
    let patients = [&john, &maria, &robert];
    for p in patients {
        repository::insert_patient(&tx, p)?;
        summary.patients += 1;
    }

    chen.patient_ids = vec![john.id, robert.id];
    wilson.patient_ids = vec![maria.id];
    for d in [&chen, &wilson, &rahman] {
        repository::insert_doctor(&tx, d)?;
        summary.doctors += 1;
    }

    let start = today - Duration::days(30);
    let end = today + Duration::days(60);
    let schedules = [
        schedule(&john, &medications[0], &chen, &["08:00", "20:00"], start, end),
        schedule(&john, &medications[1], &chen, &["07:00"], start, end),
        schedule(&maria, &medications[2], &wilson, &["09:00"], start, end),
        schedule(&robert, &medications[1], &chen, &["08:00"], start, end),
    ];
    for s in &schedules {
        repository::insert_schedule(&tx, s)?;
        summary.schedules += 1;
    }

    // Three past days of history, with one late and one missed dose.
    for days_back in 1..=3 {
        let day = today - Duration::days(days_back);
        for s in &schedules {
            for time in &s.times {
                let status = match (days_back, time.as_str()) {
                    (1, "20:00") => ConsumptionStatus::Missed,
                    (2, "07:00") => ConsumptionStatus::Late,
                    _ => ConsumptionStatus::Taken,
                };
                repository::insert_consumption_record(&tx, &record(s, day, time, status))?;
                summary.records += 1;
            }
        }
    }

    tx.commit()?;
    tracing::info!(?summary, "Demo data seeded");
    Ok(Some(summary))
}

// ═══════════════════════════════════════════
// Builders
// ═══════════════════════════════════════════

fn account(name: &str, email: &str, role: UserRole) -> UserProfile {
    let now = Utc::now();
    let doctor = DEMO_DOCTORS.iter().find(|d| d.1 == email);
    UserProfile {
        id: Uuid::new_v4(),
        email: email.into(),
        name: name.into(),
        role,
        specialization: doctor.map(|d| d.2.to_string()),
        license_number: doctor.map(|d| d.3.to_string()),
        phone: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn doctor(
    user_id: Option<Uuid>,
    (name, email, specialization, license_number, phone): (&str, &str, &str, &str, &str),
) -> Doctor {
    let now = Utc::now();
    Doctor {
        id: Uuid::new_v4(),
        user_id,
        name: name.into(),
        email: email.into(),
        specialization: specialization.into(),
        license_number: license_number.into(),
        phone: phone.into(),
        patient_ids: Vec::new(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn medication(m: &DemoMedication) -> Medication {
    let now = Utc::now();
    Medication {
        id: Uuid::new_v4(),
        name: m.name.into(),
        dosage: m.dosage.into(),
        frequency: m.frequency.into(),
        instructions: m.instructions.into(),
        side_effects: m.side_effects.iter().map(|s| s.to_string()).collect(),
        category: m.category,
        manufacturer: None,
        expiry_date: None,
        stock_quantity: 100,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn patient(p: &DemoPatient, doctor: &Doctor, registered: NaiveDate) -> Patient {
    let now = Utc::now();
    Patient {
        id: Uuid::new_v4(),
        name: p.name.into(),
        age: p.age,
        gender: p.gender,
        email: p.email.into(),
        phone: "+62 812 3456 7890".into(),
        address: "Jakarta".into(),
        medical_conditions: p.conditions.iter().map(|s| s.to_string()).collect(),
        allergies: p.allergies.iter().map(|s| s.to_string()).collect(),
        doctor_id: Some(doctor.id),
        doctor_name: doctor.name.clone(),
        registration_date: registered,
        emergency_contact: EmergencyContact {
            name: p.contact.into(),
            phone: "+62 812 9876 5432".into(),
            relationship: "Spouse".into(),
        },
        blood_type: p.blood_type.into(),
        weight: p.weight,
        height: p.height,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn schedule(
    patient: &Patient,
    med: &Medication,
    doctor: &Doctor,
    times: &[&str],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> MedicationSchedule {
    let now = Utc::now();
    MedicationSchedule {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        medication_id: med.id,
        medication_name: med.label_with_dosage(&med.dosage),
        dosage: med.dosage.clone(),
        times: times.iter().map(|t| t.to_string()).collect(),
        start_date,
        end_date,
        instructions: Some(med.instructions.clone()),
        prescribed_by: Some(doctor.id),
        prescribed_by_name: format!("Dr. {}", doctor.name),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn record(
    s: &MedicationSchedule,
    date: NaiveDate,
    time: &str,
    status: ConsumptionStatus,
) -> ConsumptionRecord {
    let now = Utc::now();
    ConsumptionRecord {
        id: Uuid::new_v4(),
        patient_id: s.patient_id,
        schedule_id: s.id,
        medication_name: s.medication_name.clone(),
        scheduled_time: time.into(),
        actual_time: match status {
            ConsumptionStatus::Missed => None,
            _ => Some(time.into()),
        },
        status,
        date,
        notes: None,
        reminder_sent: true,
        created_at: now,
        updated_at: now,
    }
}
