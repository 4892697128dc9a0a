//! Drug catalogue: readable by every signed-in role, edited by admins.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{self, Actor};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{MedicationCategory, UserRole};
use crate::models::{Medication, MedicationFilter};
use crate::validation::{self, ListInput, ValidationError};

// ═══════════════════════════════════════════
// Input types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MedicationForm {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub instructions: String,
    pub side_effects: ListInput,
    pub category: String,
    pub manufacturer: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub stock_quantity: i64,
}

impl MedicationForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::required("name", &self.name)?;
        validation::required("dosage", &self.dosage)?;
        category(&self.category)?;
        stock(self.stock_quantity)?;
        Ok(())
    }
}

/// Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MedicationPatch {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub instructions: Option<String>,
    pub side_effects: Option<ListInput>,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub stock_quantity: Option<i64>,
}

impl MedicationPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(v) = &self.name {
            validation::required("name", v)?;
        }
        if let Some(v) = &self.dosage {
            validation::required("dosage", v)?;
        }
        if let Some(v) = &self.category {
            category(v)?;
        }
        if let Some(v) = self.stock_quantity {
            stock(v)?;
        }
        Ok(())
    }
}

fn category(value: &str) -> Result<MedicationCategory, ValidationError> {
    MedicationCategory::from_str(value.trim())
        .map_err(|_| ValidationError::new("category", "Please choose a valid category"))
}

fn stock(value: i64) -> Result<u32, ValidationError> {
    u32::try_from(value)
        .map_err(|_| ValidationError::new("stock_quantity", "Stock must be a non-negative whole number"))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MedicationQuery {
    pub search: String,
    pub category: Option<MedicationCategory>,
    pub include_inactive: bool,
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

/// Catalogue ordered by name. Inactive entries are only listed for admins.
pub fn fetch_medications(
    conn: &Connection,
    actor: &Actor,
    query: &MedicationQuery,
) -> Result<Vec<Medication>, ServiceError> {
    let medications = repository::list_medications(
        conn,
        &MedicationFilter {
            category: query.category,
            include_inactive: query.include_inactive && actor.is_admin(),
        },
    )?;
    Ok(medications
        .into_iter()
        .filter(|m| {
            validation::matches_search(
                &query.search,
                &[
                    m.name.as_str(),
                    m.category.as_str(),
                    m.manufacturer.as_deref().unwrap_or_default(),
                ],
            )
        })
        .collect())
}

pub fn fetch_medication(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<Medication, ServiceError> {
    match repository::get_medication(conn, id)? {
        Some(m) if m.is_active || actor.is_admin() => Ok(m),
        _ => Err(ServiceError::not_found("medication")),
    }
}

pub fn create_medication(
    conn: &Connection,
    actor: &Actor,
    form: &MedicationForm,
) -> Result<Medication, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    form.validate()?;
    let now = Utc::now();
    let medication = Medication {
        id: Uuid::new_v4(),
        name: form.name.trim().to_string(),
        dosage: form.dosage.trim().to_string(),
        frequency: form.frequency.trim().to_string(),
        instructions: form.instructions.trim().to_string(),
        side_effects: form.side_effects.cleaned(),
        category: category(&form.category)?,
        manufacturer: validation::optional_text(form.manufacturer.clone()),
        expiry_date: form.expiry_date,
        stock_quantity: stock(form.stock_quantity)?,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    repository::insert_medication(conn, &medication)?;
    tracing::info!(medication_id = %medication.id, "Medication added to catalogue");
    Ok(medication)
}

pub fn update_medication(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: &MedicationPatch,
) -> Result<Medication, ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    patch.validate()?;
    let mut med =
        repository::get_medication(conn, id)?.ok_or_else(|| ServiceError::not_found("medication"))?;

    if let Some(v) = &patch.name {
        med.name = v.trim().to_string();
    }
    if let Some(v) = &patch.dosage {
        med.dosage = v.trim().to_string();
    }
    if let Some(v) = &patch.frequency {
        med.frequency = v.trim().to_string();
    }
    if let Some(v) = &patch.instructions {
        med.instructions = v.trim().to_string();
    }
    if let Some(v) = &patch.side_effects {
        med.side_effects = v.cleaned();
    }
    if let Some(v) = &patch.category {
        med.category = category(v)?;
    }
    if patch.manufacturer.is_some() {
        med.manufacturer = validation::optional_text(patch.manufacturer.clone());
    }
    if patch.expiry_date.is_some() {
        med.expiry_date = patch.expiry_date;
    }
    if let Some(v) = patch.stock_quantity {
        med.stock_quantity = stock(v)?;
    }
    repository::update_medication(conn, &med)?;
    repository::get_medication(conn, id)?.ok_or_else(|| ServiceError::not_found("medication"))
}

/// Existing schedules keep their denormalised medication name.
pub fn deactivate_medication(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(), ServiceError> {
    authorization::require_role(actor, &[UserRole::Admin])?;
    repository::deactivate_medication(conn, id)?;
    tracing::info!(medication_id = %id, "Medication deactivated");
    Ok(())
}
