use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One guest's occupancy of one bed. Active while `check_out` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stay {
    pub id: i64,
    pub bed_id: i64,
    pub full_name: String,
    pub mobile_number: String,
    pub check_in: NaiveDateTime,
    pub planned_check_out: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub amount_paid: f64,
    pub payment_mode: String,
    pub created_at: NaiveDateTime,
}

impl Stay {
    pub fn is_active(&self) -> bool {
        self.check_out.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestDetails {
    pub full_name: String,
    pub mobile_number: String,
    pub check_in: NaiveDateTime,
    pub planned_check_out: Option<NaiveDateTime>,
    pub amount_paid: f64,
    pub payment_mode: String,
}

impl GuestDetails {
    pub fn validate(&self) -> Result<(), String> {
        if self.full_name.trim().is_empty() {
            return Err("full_name is required".to_string());
        }
        if self.mobile_number.trim().is_empty() {
            return Err("mobile_number is required".to_string());
        }
        if self.payment_mode.trim().is_empty() {
            return Err("payment_mode is required".to_string());
        }
        if !self.amount_paid.is_finite() || self.amount_paid < 0.0 {
            return Err("amount_paid must be a non-negative number".to_string());
        }
        if let Some(planned) = self.planned_check_out {
            if planned < self.check_in {
                return Err("check_out must not be before check_in".to_string());
            }
        }
        Ok(())
    }
}
