//! Barcode Scanner Protocol
//!
//! The scanners expose a single notify characteristic. Every notification
//! carries the text of one scanned label, possibly padded with CR/LF.

use crate::domain::errors::{PayloadDecodeError, RadioError};

/// Data characteristic the scanners notify on
pub const DATA_CHAR_UUID: &str = "00002aa1-0000-1000-8000-00805f9b34fb";

/// Decodes one notification into the label text it carries.
pub fn decode_payload(bytes: &[u8]) -> Result<String, PayloadDecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| PayloadDecodeError::InvalidUtf8)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(PayloadDecodeError::Empty);
    }
    Ok(text.to_string())
}

/// Parses `AA:FC:4A:1C:10:35` into its 48-bit integer form.
pub fn parse_address(address: &str) -> Result<u64, RadioError> {
    let invalid = || RadioError::Backend(format!("Invalid Bluetooth address: {}", address));

    let octets: Vec<&str> = address.trim().split(':').collect();
    if octets.len() != 6 {
        return Err(invalid());
    }

    octets.iter().try_fold(0u64, |acc, octet| {
        if octet.len() != 2 {
            return Err(invalid());
        }
        let value = u8::from_str_radix(octet, 16).map_err(|_| invalid())?;
        Ok((acc << 8) | value as u64)
    })
}

/// Formats a 48-bit address as upper-case colon-separated octets.
pub fn format_address(address: u64) -> String {
    (0..6)
        .rev()
        .map(|i| format!("{:02X}", (address >> (i * 8)) & 0xFF))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parses `00002aa1-0000-1000-8000-00805f9b34fb` into a 128-bit value.
pub fn parse_uuid(uuid_str: &str) -> Result<u128, RadioError> {
    let hex = uuid_str.replace('-', "");
    if hex.len() != 32 {
        return Err(RadioError::Backend(format!("Invalid UUID format: {}", uuid_str)));
    }
    u128::from_str_radix(&hex, 16)
        .map_err(|_| RadioError::Backend(format!("Invalid UUID format: {}", uuid_str)))
}
