//! CRC-16/CCITT-FALSE as used by EMVCo merchant-presented QR codes.

const INITIAL: u16 = 0xFFFF;
const POLYNOMIAL: u16 = 0x1021;

pub fn crc16_ccitt(data: &[u8]) -> u16 {
    data.iter().fold(INITIAL, |crc, byte| {
        let mut crc = crc ^ ((*byte as u16) << 8);
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
        crc
    })
}

/// Four uppercase hex digits, zero padded.
pub fn checksum(payload_without_checksum: &str) -> String {
    format!("{:04X}", crc16_ccitt(payload_without_checksum.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_ccitt_false_check_value() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
        assert_eq!(checksum("123456789"), "29B1");
    }

    #[test]
    fn empty_input_returns_initial_register() {
        assert_eq!(checksum(""), "FFFF");
    }

    #[test]
    fn pads_small_values_to_four_digits() {
        let value = checksum("A");
        assert_eq!(value.len(), 4);
        assert_eq!(value, value.to_uppercase());
    }
}
