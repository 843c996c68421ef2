// Cycling Power Measurement payload codec.
//
// Layout (little-endian): bytes 0-1 flags, bytes 2-3 signed instantaneous
// power in watts. Only flag bit 0 is interpreted; when it is set the power
// field is treated as absent and reported as zero.

use crate::error::CoreError;

/// Flag bit 0: instantaneous power field absent.
pub const POWER_ABSENT: u16 = 0x0001;

/// Decode instantaneous power from a measurement notification.
///
/// Returns 0 when flag bit 0 is set. Payloads shorter than four bytes are
/// rejected with `CoreError::MalformedMeasurement`.
pub fn decode_instantaneous_power(payload: &[u8]) -> Result<i16, CoreError> {
    let &[f0, f1, p0, p1, ..] = payload else {
        return Err(CoreError::MalformedMeasurement { len: payload.len() });
    };

    let flags = u16::from_le_bytes([f0, f1]);
    if flags & POWER_ABSENT != 0 {
        return Ok(0);
    }
    Ok(i16::from_le_bytes([p0, p1]))
}

/// Build the minimal four-byte payload a sensor would send for `watts`.
pub fn encode_measurement(watts: i16) -> Vec<u8> {
    let [p0, p1] = watts.to_le_bytes();
    vec![0x00, 0x00, p0, p1]
}
