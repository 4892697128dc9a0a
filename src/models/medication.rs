use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MedicationCategory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub instructions: String,
    pub side_effects: Vec<String>,
    pub category: MedicationCategory,
    pub manufacturer: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub stock_quantity: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medication {
    /// Display label used on schedules and records, e.g. "Metformin 500mg".
    pub fn label_with_dosage(&self, dosage: &str) -> String {
        format!("{} {}", self.name, dosage.trim())
    }
}
