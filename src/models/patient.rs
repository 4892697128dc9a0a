use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub medical_conditions: Vec<String>,
    pub allergies: Vec<String>,
    pub doctor_id: Option<Uuid>,
    pub doctor_name: String,
    pub registration_date: NaiveDate,
    pub emergency_contact: EmergencyContact,
    pub blood_type: String,
    /// Kilograms.
    pub weight: f64,
    /// Centimetres.
    pub height: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
