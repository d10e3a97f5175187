use std::collections::HashMap;
use std::fmt::Display;

use serde::Serialize;

use super::crc16::checksum;
use super::payload::{
    COUNTRY_TH, CURRENCY_THB, DYNAMIC_INITIATION, PAYLOAD_FORMAT_VALUE, STATIC_INITIATION,
    TAG_CHECKSUM, TAG_COUNTRY, TAG_CURRENCY, TAG_PAYLOAD_FORMAT, TAG_POINT_OF_INITIATION,
};
use crate::domain::errors::PaymentError;

const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadField {
    Structure,
    Format,
    Initiation,
    Currency,
    Country,
    Checksum,
}

impl PayloadField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadField::Structure => "structure",
            PayloadField::Format => "format",
            PayloadField::Initiation => "initiation",
            PayloadField::Currency => "currency",
            PayloadField::Country => "country",
            PayloadField::Checksum => "checksum",
        }
    }
}

impl Display for PayloadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub failures: Vec<PayloadField>,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, field: PayloadField) -> bool {
        self.failures.contains(&field)
    }
}

/// A payload that passed [`validate`]. The only input the QR renderer accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayload(String);

impl ValidatedPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ValidatedPayload {
    type Error = PaymentError;

    fn try_from(payload: String) -> Result<Self, Self::Error> {
        let report = validate(&payload);
        if report.ok() {
            Ok(ValidatedPayload(payload))
        } else {
            Err(PaymentError::ValidationFailure(report.failures))
        }
    }
}

fn parse_top_level(payload: &str) -> Option<Vec<(&str, &str)>> {
    if !payload.is_ascii() {
        return None;
    }

    let mut fields = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return None;
        }
        let tag = &rest[..2];
        let len: usize = rest[2..4].parse().ok()?;
        let end = 4 + len;
        if rest.len() < end {
            return None;
        }
        fields.push((tag, &rest[4..end]));
        rest = &rest[end..];
    }
    Some(fields)
}

/// Re-parses a payload and reports every field that is wrong.
pub fn validate(payload: &str) -> ValidationReport {
    let Some(fields) = parse_top_level(payload) else {
        return ValidationReport {
            failures: vec![PayloadField::Structure],
        };
    };

    let mut failures = Vec::new();
    let values: HashMap<&str, &str> = fields.iter().copied().collect();

    if values.get(TAG_PAYLOAD_FORMAT) != Some(&PAYLOAD_FORMAT_VALUE) {
        failures.push(PayloadField::Format);
    }
    match values.get(TAG_POINT_OF_INITIATION) {
        Some(&value) if value == STATIC_INITIATION || value == DYNAMIC_INITIATION => {}
        _ => failures.push(PayloadField::Initiation),
    }
    if values.get(TAG_CURRENCY) != Some(&CURRENCY_THB) {
        failures.push(PayloadField::Currency);
    }
    if values.get(TAG_COUNTRY) != Some(&COUNTRY_TH) {
        failures.push(PayloadField::Country);
    }

    let checksum_ok = match fields.last() {
        Some((tag, value)) if *tag == TAG_CHECKSUM && value.len() == CHECKSUM_LEN => {
            let body = &payload[..payload.len() - CHECKSUM_LEN];
            checksum(body) == value.to_ascii_uppercase()
        }
        _ => false,
    };
    if !checksum_ok {
        failures.push(PayloadField::Checksum);
    }

    ValidationReport { failures }
}
