use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Stay;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bed {
    pub id: i64,
    pub hotel_id: i64,
    pub bed_number: String,
    pub position: String,
    pub status: BedStatus,
    pub created_at: NaiveDateTime,
}

/// Occupancy flag kept in lockstep with the bed's active stay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BedStatus {
    Available,
    Occupied,
}

impl BedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BedStatus::Available => "available",
            BedStatus::Occupied => "occupied",
        }
    }

    /// Unknown values read as occupied so a corrupt row is never handed out.
    pub fn parse(s: &str) -> Self {
        match s {
            "available" => BedStatus::Available,
            _ => BedStatus::Occupied,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BedWithStay {
    #[serde(flatten)]
    pub bed: Bed,
    #[serde(rename = "customer", skip_serializing_if = "Option::is_none")]
    pub active_stay: Option<Stay>,
}
