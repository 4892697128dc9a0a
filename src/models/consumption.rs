use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ConsumptionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub schedule_id: Uuid,
    pub medication_name: String,
    pub scheduled_time: String,
    pub actual_time: Option<String>,
    pub status: ConsumptionStatus,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
