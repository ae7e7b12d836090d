//! Prescription status vocabulary and the fulfillment transition graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fulfillment status of a prescription.
///
/// The forward chain is `pending_payment → submitted → billing → approved →
/// packed → shipped → delivered`, with `cancelled` reachable from any
/// non-terminal state. `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    PendingPayment,
    Submitted,
    Billing,
    Approved,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
}

/// The six states the pharmacy may report through its status webhook.
pub const WEBHOOK_STATES: [PrescriptionStatus; 6] = [
    PrescriptionStatus::Submitted,
    PrescriptionStatus::Billing,
    PrescriptionStatus::Approved,
    PrescriptionStatus::Packed,
    PrescriptionStatus::Shipped,
    PrescriptionStatus::Delivered,
];

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Submitted => "submitted",
            Self::Billing => "billing",
            Self::Approved => "approved",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Case-insensitive parse over all states.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pending_payment" => Some(Self::PendingPayment),
            "submitted" => Some(Self::Submitted),
            "billing" => Some(Self::Billing),
            "approved" => Some(Self::Approved),
            "packed" => Some(Self::Packed),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Case-insensitive parse restricted to the webhook states. Everything
    /// else, `cancelled` and `pending_payment` included, is invalid input on
    /// the status webhook.
    pub fn parse_webhook(value: &str) -> Option<Self> {
        Self::parse(value).filter(|s| WEBHOOK_STATES.contains(s))
    }

    /// Terminal states have no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Outgoing edges of the transition graph.
    ///
    /// Forward moves may skip chain states: pharmacy systems batch their
    /// callbacks and a missed delivery must not wedge the order. Backward
    /// moves are never edges.
    pub fn successors(&self) -> &'static [PrescriptionStatus] {
        match self {
            Self::PendingPayment => &[
                Self::Submitted,
                Self::Billing,
                Self::Approved,
                Self::Packed,
                Self::Shipped,
                Self::Delivered,
                Self::Cancelled,
            ],
            Self::Submitted => &[
                Self::Billing,
                Self::Approved,
                Self::Packed,
                Self::Shipped,
                Self::Delivered,
                Self::Cancelled,
            ],
            Self::Billing => &[
                Self::Approved,
                Self::Packed,
                Self::Shipped,
                Self::Delivered,
                Self::Cancelled,
            ],
            Self::Approved => &[Self::Packed, Self::Shipped, Self::Delivered, Self::Cancelled],
            Self::Packed => &[Self::Shipped, Self::Delivered, Self::Cancelled],
            Self::Shipped => &[Self::Delivered, Self::Cancelled],
            Self::Delivered | Self::Cancelled => &[],
        }
    }

    /// Edge membership check.
    pub fn can_transition_to(&self, to: PrescriptionStatus) -> bool {
        self.successors().contains(&to)
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of consulting the transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// The edge exists; apply it.
    Allowed,
    /// Same state re-delivered; re-persist and acknowledge.
    Replay,
    /// Not an edge; reject but record the attempt.
    Rejected,
}

/// Consult the graph for a requested move.
pub fn check_transition(from: PrescriptionStatus, to: PrescriptionStatus) -> TransitionCheck {
    if from == to {
        TransitionCheck::Replay
    } else if from.can_transition_to(to) {
        TransitionCheck::Allowed
    } else {
        TransitionCheck::Rejected
    }
}

/// Payment state of a prescription, flipped by the payment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "unpaid" => Some(Self::Unpaid),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
