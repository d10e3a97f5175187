use std::str::FromStr;

use rust_decimal::Decimal;

use super::crc16::checksum;
use crate::domain::errors::PaymentError;

pub const TAG_PAYLOAD_FORMAT: &str = "00";
pub const TAG_POINT_OF_INITIATION: &str = "01";
pub const TAG_MERCHANT_ACCOUNT: &str = "29";
pub const TAG_CURRENCY: &str = "53";
pub const TAG_AMOUNT: &str = "54";
pub const TAG_COUNTRY: &str = "58";
pub const TAG_CHECKSUM: &str = "63";

pub const PAYLOAD_FORMAT_VALUE: &str = "01";
pub const STATIC_INITIATION: &str = "11";
pub const DYNAMIC_INITIATION: &str = "12";
pub const PROMPTPAY_AID: &str = "A000000677010111";
pub const CURRENCY_THB: &str = "764";
pub const COUNTRY_TH: &str = "TH";

const SUB_TAG_AID: &str = "00";
const SUB_TAG_MOBILE: &str = "01";
const SUB_TAG_NATIONAL_ID: &str = "02";

const LOCAL_PHONE_PREFIX: char = '0';
const COUNTRY_CALLING_CODE: &str = "66";
const PROXY_WIDTH: usize = 13;

/// 999,999.99 THB.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayeeIdentifier {
    /// Mobile number with the country calling code, e.g. `66812345678`.
    Mobile(String),
    NationalId(String),
}

impl PayeeIdentifier {
    pub fn parse(raw: &str) -> Result<Self, PaymentError> {
        let digits: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .collect();

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::InvalidIdentifier(format!(
                "`{}` must contain only digits",
                raw
            )));
        }

        match digits.len() {
            10 if digits.starts_with(LOCAL_PHONE_PREFIX) => Ok(PayeeIdentifier::Mobile(format!(
                "{}{}",
                COUNTRY_CALLING_CODE,
                &digits[1..]
            ))),
            11 if digits.starts_with(COUNTRY_CALLING_CODE) => Ok(PayeeIdentifier::Mobile(digits)),
            13 => Ok(PayeeIdentifier::NationalId(digits)),
            _ => Err(PaymentError::InvalidIdentifier(format!(
                "`{}` is neither a mobile number nor a 13 digit national id",
                raw
            ))),
        }
    }

    pub fn normalized(&self) -> &str {
        match self {
            PayeeIdentifier::Mobile(value) | PayeeIdentifier::NationalId(value) => value,
        }
    }

    fn sub_tag(&self) -> &'static str {
        match self {
            PayeeIdentifier::Mobile(_) => SUB_TAG_MOBILE,
            PayeeIdentifier::NationalId(_) => SUB_TAG_NATIONAL_ID,
        }
    }

    /// Mobile proxies are left padded with zeros to 13 digits on the wire.
    fn proxy_value(&self) -> String {
        format!("{:0>width$}", self.normalized(), width = PROXY_WIDTH)
    }
}

pub fn normalize_identifier(raw: &str) -> Result<String, PaymentError> {
    Ok(PayeeIdentifier::parse(raw)?.normalized().to_string())
}

pub fn validate_amount(amount: Decimal) -> Result<Decimal, PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!(
            "{} must be greater than zero",
            amount
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(PaymentError::InvalidAmount(format!(
            "{} exceeds the maximum of {}",
            amount, MAX_AMOUNT
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(PaymentError::InvalidAmount(format!(
            "{} has more than two fraction digits",
            amount
        )));
    }
    Ok(amount)
}

pub fn parse_amount(raw: &str) -> Result<Decimal, PaymentError> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| PaymentError::InvalidAmount(format!("`{}` is not a number", raw)))?;
    validate_amount(amount)
}

pub fn format_amount(amount: Decimal) -> Result<String, PaymentError> {
    let mut amount = validate_amount(amount)?;
    amount.rescale(2);
    Ok(amount.to_string())
}

pub(crate) fn tlv(tag: &str, value: &str) -> String {
    format!("{}{:02}{}", tag, value.len(), value)
}

/// Builds a dynamic (amount bearing) PromptPay payload.
pub fn build_payload(identifier: &str, amount: Decimal) -> Result<String, PaymentError> {
    let payee = PayeeIdentifier::parse(identifier)?;
    let amount = format_amount(amount)?;

    let merchant_account = format!(
        "{}{}",
        tlv(SUB_TAG_AID, PROMPTPAY_AID),
        tlv(payee.sub_tag(), &payee.proxy_value())
    );

    let mut payload = String::with_capacity(96);
    payload.push_str(&tlv(TAG_PAYLOAD_FORMAT, PAYLOAD_FORMAT_VALUE));
    payload.push_str(&tlv(TAG_POINT_OF_INITIATION, DYNAMIC_INITIATION));
    payload.push_str(&tlv(TAG_MERCHANT_ACCOUNT, &merchant_account));
    payload.push_str(&tlv(TAG_CURRENCY, CURRENCY_THB));
    payload.push_str(&tlv(TAG_AMOUNT, &amount));
    payload.push_str(&tlv(TAG_COUNTRY, COUNTRY_TH));
    payload.push_str(TAG_CHECKSUM);
    payload.push_str("04");

    let crc = checksum(&payload);
    payload.push_str(&crc);

    Ok(payload)
}
