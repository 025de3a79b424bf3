//! Checksum engine
//!
//! The two checksum families used on the RF side. Both are pure functions
//! over byte slices.

/// Generator polynomial of the LaCrosse IT+ CRC-8 (x^8 + x^5 + x^4 + 1)
pub const CRC8_POLY: u8 = 0x31;

/// XOR of every nibble of every byte, folded to 4 bits
///
/// Runs over the ASCII text of a Somfy body, so each hex digit contributes
/// both its own low nibble and the ASCII high nibble (`0x3` or `0x4`).
pub fn nibble_xor(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b ^ (b >> 4)) & 0x0F
}

/// CRC-8, polynomial 0x31, initial value 0, no final XOR, MSB first
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}
