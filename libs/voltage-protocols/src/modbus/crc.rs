//! Modbus CRC-16
//!
//! Polynomial 0xA001 (reflected 0x8005), initial value 0xFFFF, no final XOR.
//! The result is transmitted low byte first.

/// Reflected CRC-16 lookup table, built at compile time
const CRC_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-16 (Modbus) over a whole slice
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        let table_index = ((crc ^ byte as u16) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC_TABLE[table_index];
    }
    crc
}

/// CRC-16 (Modbus) over `length` bytes beginning at `start`.
///
/// A range reaching past the end of `data` is clamped to the available bytes.
pub fn compute(data: &[u8], start: usize, length: usize) -> u16 {
    let end = start.saturating_add(length).min(data.len());
    let start = start.min(end);
    crc16(&data[start..end])
}
