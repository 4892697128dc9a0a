use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationSchedule {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medication_id: Uuid,
    pub medication_name: String,
    pub dosage: String,
    /// Times of day, "HH:MM".
    pub times: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub instructions: Option<String>,
    pub prescribed_by: Option<Uuid>,
    pub prescribed_by_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicationSchedule {
    /// Active and `date` falls inside the inclusive date range.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.is_active && self.start_date <= date && date <= self.end_date
    }
}
