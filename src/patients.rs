//! Patient management: the admin patient page and the doctor's
//! "my patients" page.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{self, Actor};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{Gender, UserRole};
use crate::models::{Doctor, EmergencyContact, Patient, PatientFilter, ScheduleFilter};
use crate::validation::{self, ListInput, ValidationError};

// ═══════════════════════════════════════════
// Input types
// ═══════════════════════════════════════════

/// New patient as entered on the patient form.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatientForm {
    pub name: String,
    pub age: i64,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub medical_conditions: ListInput,
    pub allergies: ListInput,
    pub doctor_id: Option<Uuid>,
    pub registration_date: Option<NaiveDate>,
    pub emergency_contact: EmergencyContact,
    pub blood_type: String,
    pub weight: Option<f64>,
    pub height: Option<f64>,
}

impl Default for PatientForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            age: 0,
            gender: Gender::Male,
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            medical_conditions: ListInput::default(),
            allergies: ListInput::default(),
            doctor_id: None,
            registration_date: None,
            emergency_contact: EmergencyContact::default(),
            blood_type: String::new(),
            weight: None,
            height: None,
        }
    }
}

impl PatientForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::required("name", &self.name)?;
        validation::email("email", &self.email)?;
        age(self.age)?;
        if let Some(w) = self.weight {
            validation::non_negative("weight", w)?;
        }
        if let Some(h) = self.height {
            validation::non_negative("height", h)?;
        }
        Ok(())
    }
}

/// Edit of an existing patient. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_conditions: Option<ListInput>,
    pub allergies: Option<ListInput>,
    /// `Some(None)` unassigns the doctor.
    #[serde(deserialize_with = "double_option")]
    pub doctor_id: Option<Option<Uuid>>,
    pub emergency_contact: Option<EmergencyContact>,
    pub blood_type: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Uuid>::deserialize(de).map(Some)
}

impl PatientPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validation::required("name", name)?;
        }
        if let Some(email) = &self.email {
            validation::email("email", email)?;
        }
        if let Some(a) = self.age {
            age(a)?;
        }
        if let Some(w) = self.weight {
            validation::non_negative("weight", w)?;
        }
        if let Some(h) = self.height {
            validation::non_negative("height", h)?;
        }
        Ok(())
    }
}

fn age(value: i64) -> Result<u32, ValidationError> {
    u32::try_from(value).map_err(|_| ValidationError::new("age", "Age must be a non-negative whole number"))
}

/// Query string of the patient list pages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatientQuery {
    pub search: String,
    pub include_inactive: bool,
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

pub fn fetch_patients(
    conn: &Connection,
    actor: &Actor,
    query: &PatientQuery,
) -> Result<Vec<Patient>, ServiceError> {
    let filter = match actor.role {
        UserRole::Admin => PatientFilter {
            include_inactive: query.include_inactive,
            ..Default::default()
        },
        UserRole::Doctor => match actor.doctor_id {
            Some(doctor_id) => PatientFilter {
                doctor_id: Some(doctor_id),
                ..Default::default()
            },
            None => return Ok(Vec::new()),
        },
        UserRole::Patient => return Err(ServiceError::Forbidden),
    };
    let patients = repository::list_patients(conn, &filter)?;
    Ok(patients
        .into_iter()
        .filter(|p| matches_patient(&query.search, p))
        .collect())
}

fn matches_patient(term: &str, p: &Patient) -> bool {
    let id = p.id.to_string();
    let mut fields = vec![p.name.as_str(), p.email.as_str(), id.as_str()];
    fields.extend(p.medical_conditions.iter().map(String::as_str));
    validation::matches_search(term, &fields)
}

pub fn fetch_patient(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<Patient, ServiceError> {
    authorization::authorize_patient(conn, actor, id)?;
    repository::get_patient(conn, id)?.ok_or_else(|| ServiceError::not_found("patient"))
}

pub fn create_patient(
    conn: &Connection,
    actor: &Actor,
    form: &PatientForm,
    today: NaiveDate,
) -> Result<Patient, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    form.validate()?;
    let doctor = form
        .doctor_id
        .map(|id| active_doctor(conn, &id))
        .transpose()?;

    let now = Utc::now();
    let patient = Patient {
        id: Uuid::new_v4(),
        name: form.name.trim().to_string(),
        age: age(form.age)?,
        gender: form.gender,
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        address: form.address.trim().to_string(),
        medical_conditions: form.medical_conditions.cleaned(),
        allergies: form.allergies.cleaned(),
        doctor_id: doctor.as_ref().map(|d| d.id),
        doctor_name: doctor.as_ref().map(|d| d.name.clone()).unwrap_or_default(),
        registration_date: form.registration_date.unwrap_or(today),
        emergency_contact: form.emergency_contact.clone(),
        blood_type: form.blood_type.trim().to_string(),
        weight: form.weight.unwrap_or(0.0),
        height: form.height.unwrap_or(0.0),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    repository::insert_patient(conn, &patient)?;
    if let Some(doctor) = doctor {
        add_to_roster(conn, doctor, patient.id)?;
    }
    tracing::info!(patient_id = %patient.id, "Patient registered");
    Ok(patient)
}

pub fn update_patient(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: &PatientPatch,
) -> Result<Patient, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    patch.validate()?;
    let mut patient =
        repository::get_patient(conn, id)?.ok_or_else(|| ServiceError::not_found("patient"))?;
    let previous_doctor = patient.doctor_id;

    if let Some(name) = &patch.name {
        patient.name = name.trim().to_string();
    }
    if let Some(a) = patch.age {
        patient.age = age(a)?;
    }
    if let Some(g) = patch.gender {
        patient.gender = g;
    }
    if let Some(email) = &patch.email {
        patient.email = email.trim().to_string();
    }
    if let Some(phone) = &patch.phone {
        patient.phone = phone.trim().to_string();
    }
    if let Some(address) = &patch.address {
        patient.address = address.trim().to_string();
    }
    if let Some(list) = &patch.medical_conditions {
        patient.medical_conditions = list.cleaned();
    }
    if let Some(list) = &patch.allergies {
        patient.allergies = list.cleaned();
    }
    if let Some(contact) = &patch.emergency_contact {
        patient.emergency_contact = contact.clone();
    }
    if let Some(blood) = &patch.blood_type {
        patient.blood_type = blood.trim().to_string();
    }
    if let Some(w) = patch.weight {
        patient.weight = w;
    }
    if let Some(h) = patch.height {
        patient.height = h;
    }

    let mut new_doctor = None;
    if let Some(assignment) = patch.doctor_id {
        match assignment {
            Some(doctor_id) => {
                let doctor = active_doctor(conn, &doctor_id)?;
                patient.doctor_id = Some(doctor.id);
                patient.doctor_name = doctor.name.clone();
                new_doctor = Some(doctor);
            }
            None => {
                patient.doctor_id = None;
                patient.doctor_name.clear();
            }
        }
    }

    repository::update_patient(conn, &patient)?;

    if patient.doctor_id != previous_doctor {
        if let Some(old) = previous_doctor {
            remove_from_roster(conn, &old, &patient.id)?;
        }
        if let Some(doctor) = new_doctor {
            add_to_roster(conn, doctor, patient.id)?;
        }
    }
    repository::get_patient(conn, id)?.ok_or_else(|| ServiceError::not_found("patient"))
}

/// Soft delete. The patient's schedules are deactivated one by one; a
/// schedule that fails is logged and skipped.
pub fn deactivate_patient(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    repository::deactivate_patient(conn, id)?;

    let schedules = repository::list_schedules(
        conn,
        &ScheduleFilter {
            patient_id: Some(*id),
            ..Default::default()
        },
    )?;
    let mut failed = 0usize;
    for schedule in &schedules {
        if let Err(e) = repository::deactivate_schedule(conn, &schedule.id) {
            failed += 1;
            tracing::warn!(schedule_id = %schedule.id, error = %e, "Could not deactivate schedule");
        }
    }
    tracing::info!(
        patient_id = %id,
        schedules = schedules.len() - failed,
        failed,
        "Patient deactivated"
    );
    Ok(())
}

// ═══════════════════════════════════════════
// Doctor assignment
// ═══════════════════════════════════════════

fn active_doctor(conn: &Connection, id: &Uuid) -> Result<Doctor, ServiceError> {
    match repository::get_doctor(conn, id)? {
        Some(d) if d.is_active => Ok(d),
        _ => Err(ValidationError::new("doctor_id", "Selected doctor does not exist").into()),
    }
}

fn add_to_roster(conn: &Connection, mut doctor: Doctor, patient_id: Uuid) -> Result<(), ServiceError> {
    if !doctor.patient_ids.contains(&patient_id) {
        doctor.patient_ids.push(patient_id);
        repository::update_doctor(conn, &doctor)?;
    }
    Ok(())
}

fn remove_from_roster(conn: &Connection, doctor_id: &Uuid, patient_id: &Uuid) -> Result<(), ServiceError> {
    if let Some(mut doctor) = repository::get_doctor(conn, doctor_id)? {
        let before = doctor.patient_ids.len();
        doctor.patient_ids.retain(|p| p != patient_id);
        if doctor.patient_ids.len() != before {
            repository::update_doctor(conn, &doctor)?;
        }
    }
    Ok(())
}
