use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Membership,
    Class,
    DailyPass,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Membership => "membership",
            BookingType::Class => "class",
            BookingType::DailyPass => "daily_pass",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "membership" => Some(BookingType::Membership),
            "class" => Some(BookingType::Class),
            "daily_pass" => Some(BookingType::DailyPass),
            _ => None,
        }
    }
}

impl Display for BookingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
