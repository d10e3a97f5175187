use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSessionStatus {
    #[default]
    Pending,
    SlipUploaded,
    PendingApproval,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl PaymentSessionStatus {
    pub const ALL: [PaymentSessionStatus; 7] = [
        PaymentSessionStatus::Pending,
        PaymentSessionStatus::SlipUploaded,
        PaymentSessionStatus::PendingApproval,
        PaymentSessionStatus::Approved,
        PaymentSessionStatus::Rejected,
        PaymentSessionStatus::Expired,
        PaymentSessionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSessionStatus::Pending => "pending",
            PaymentSessionStatus::SlipUploaded => "slip_uploaded",
            PaymentSessionStatus::PendingApproval => "pending_approval",
            PaymentSessionStatus::Approved => "approved",
            PaymentSessionStatus::Rejected => "rejected",
            PaymentSessionStatus::Expired => "expired",
            PaymentSessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentSessionStatus::Pending),
            "slip_uploaded" => Some(PaymentSessionStatus::SlipUploaded),
            "pending_approval" => Some(PaymentSessionStatus::PendingApproval),
            "approved" => Some(PaymentSessionStatus::Approved),
            "rejected" => Some(PaymentSessionStatus::Rejected),
            "expired" => Some(PaymentSessionStatus::Expired),
            "cancelled" => Some(PaymentSessionStatus::Cancelled),
            _ => None,
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentSessionStatus::Approved
                | PaymentSessionStatus::Rejected
                | PaymentSessionStatus::Expired
                | PaymentSessionStatus::Cancelled
        )
    }
}

impl Display for PaymentSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
