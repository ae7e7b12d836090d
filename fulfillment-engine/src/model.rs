use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::{PaymentStatus, PrescriptionStatus};

/// The medication line on a prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationOrder {
    pub name: String,
    pub strength: String,
    pub quantity: i32,
    pub refills: i32,
    pub instructions: Option<String>,
}

impl MedicationOrder {
    /// Short human-readable summary, used on payment links and receipts.
    pub fn summary(&self) -> String {
        format!("{} {} x {}", self.name, self.strength, self.quantity)
    }
}

/// A prescription as the fulfillment pipeline sees it.
///
/// Monetary fields are decimal dollars in the domain and integer cents in
/// storage. `queue_id` is the pharmacy's correlation id, assigned once at
/// submission and immutable afterwards. `patient_name`/`provider_name` are
/// display copies read via join for sanitized patient-facing output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub patient_id: Uuid,
    pub pharmacy_id: Uuid,
    pub patient_name: String,
    pub provider_name: String,
    pub medication: MedicationOrder,
    pub acquisition_cost: Decimal,
    pub consultation_fee: Decimal,
    pub queue_id: Option<String>,
    pub status: PrescriptionStatus,
    pub payment_status: PaymentStatus,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medication_summary_reads_naturally() {
        let medication = MedicationOrder {
            name: "Amoxicillin".to_string(),
            strength: "500mg".to_string(),
            quantity: 30,
            refills: 0,
            instructions: Some("Take with food".to_string()),
        };
        assert_eq!(medication.summary(), "Amoxicillin 500mg x 30");
    }
}
