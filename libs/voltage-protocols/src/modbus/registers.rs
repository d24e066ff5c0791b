//! Holding-register decoding
//!
//! The meter answers a 60-register read of its holding-register map. Values
//! spanning two registers are sent high word first. The index/scale pairs
//! below are a fixed contract with that device's register map.

use std::ops::Index;

/// Registers needed for the recorded measurement columns (indices 0..=49)
pub const REQUIRED_REGISTERS: usize = 50;

/// Registers needed for the extended per-phase details (indices 0..=58)
pub const DETAIL_REGISTERS: usize = 59;

// Register map indices (high word of 32-bit values)
const REG_VOLTAGE_L1: usize = 0;
const REG_CURRENT_L1: usize = 6;
const REG_VOLTAGE_L12: usize = 14;
const REG_ACTIVE_POWER: usize = 20;
const REG_REACTIVE_POWER: usize = 22;
const REG_APPARENT_POWER: usize = 24;
const REG_ENERGY_IN: usize = 28;
const REG_REACTIVE_ENERGY_IN: usize = 30;
const REG_ENERGY_OUT: usize = 32;
const REG_REACTIVE_ENERGY_OUT: usize = 34;
const REG_POWER_FACTOR: usize = 36;
const REG_LOAD_CHARACTER: usize = 37;
const REG_FREQUENCY: usize = 38;
const REG_PHASE_POWER_L1: usize = 44;
const REG_PHASE_REACTIVE_L1: usize = 50;
const REG_PHASE_POWER_FACTOR_L1: usize = 56;

/// Two registers as unsigned 32-bit, high word first
pub fn unsigned32(hi: u16, lo: u16) -> u32 {
    (u32::from(hi) << 16) | u32::from(lo)
}

/// Two registers as two's-complement 32-bit, high word first
pub fn signed32(hi: u16, lo: u16) -> i32 {
    unsigned32(hi, lo) as i32
}

/// One register as two's-complement 16-bit
pub fn signed16(reg: u16) -> i16 {
    reg as i16
}

/// Ordered register words of one response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterBank(Vec<u16>);

impl RegisterBank {
    pub fn new(words: Vec<u16>) -> Self {
        Self(words)
    }

    /// Big-endian word pairs; an odd trailing byte is ignored
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Self(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn words(&self) -> &[u16] {
        &self.0
    }

    fn u32_at(&self, index: usize) -> u32 {
        unsigned32(self[index], self[index + 1])
    }

    fn i32_at(&self, index: usize) -> i32 {
        signed32(self[index], self[index + 1])
    }
}

impl Index<usize> for RegisterBank {
    type Output = u16;

    /// Panics on an index outside the bank; callers check the length first.
    fn index(&self, index: usize) -> &u16 {
        &self.0[index]
    }
}

/// Values written to the daily record file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterValues {
    /// Imported active energy, kWh
    pub energy_in_kwh: f64,
    /// Exported active energy, kWh
    pub energy_out_kwh: f64,
    /// Grid frequency, Hz
    pub frequency_hz: f64,
    /// Total active power, W
    pub active_power_w: f64,
    /// Total reactive power, var
    pub reactive_power_var: f64,
    /// Total apparent power, VA
    pub apparent_power_va: f64,
    /// Imported reactive energy, kvarh
    pub reactive_energy_in_kvarh: f64,
    /// Exported reactive energy, kvarh
    pub reactive_energy_out_kvarh: f64,
    /// Active power per phase L1..L3, W
    pub phase_power_w: [f64; 3],
}

/// Decode the recorded columns; `None` if the bank is shorter than
/// [`REQUIRED_REGISTERS`].
pub fn decode_measurements(regs: &RegisterBank) -> Option<MeterValues> {
    if regs.len() < REQUIRED_REGISTERS {
        return None;
    }

    let kilo = |index: usize| f64::from(regs.u32_at(index)) / 1000.0;
    let centi = |index: usize| f64::from(regs.i32_at(index)) / 100.0;

    Some(MeterValues {
        energy_in_kwh: kilo(REG_ENERGY_IN),
        energy_out_kwh: kilo(REG_ENERGY_OUT),
        frequency_hz: f64::from(regs[REG_FREQUENCY]) / 10.0,
        active_power_w: centi(REG_ACTIVE_POWER),
        reactive_power_var: centi(REG_REACTIVE_POWER),
        apparent_power_va: centi(REG_APPARENT_POWER),
        reactive_energy_in_kvarh: kilo(REG_REACTIVE_ENERGY_IN),
        reactive_energy_out_kvarh: kilo(REG_REACTIVE_ENERGY_OUT),
        phase_power_w: [0, 1, 2].map(|phase| centi(REG_PHASE_POWER_L1 + phase * 2)),
    })
}

/// Load character reported in register 37
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadCharacter {
    NoLoad,
    Inductive,
    Capacitive,
    Unknown(u16),
}

impl From<u16> for LoadCharacter {
    fn from(raw: u16) -> Self {
        match raw {
            0 => Self::NoLoad,
            1 => Self::Inductive,
            2 => Self::Capacitive,
            other => Self::Unknown(other),
        }
    }
}

/// Per-phase values not written to the record file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterDetails {
    /// Phase-to-neutral voltage L1..L3, V
    pub voltage_v: [f64; 3],
    /// Phase current L1..L3, A
    pub current_a: [f64; 3],
    /// Line voltage L1-L2, L2-L3, L3-L1, V
    pub line_voltage_v: [f64; 3],
    pub power_factor: f64,
    pub load: LoadCharacter,
    /// Reactive power per phase L1..L3, var
    pub phase_reactive_var: [f64; 3],
    pub phase_power_factor: [f64; 3],
}

/// Decode the extended map; `None` if the bank is shorter than
/// [`DETAIL_REGISTERS`].
pub fn decode_details(regs: &RegisterBank) -> Option<MeterDetails> {
    if regs.len() < DETAIL_REGISTERS {
        return None;
    }

    let milli = |base: usize, phase: usize| f64::from(regs.u32_at(base + phase * 2)) / 1000.0;
    let centi = |base: usize, phase: usize| f64::from(regs.i32_at(base + phase * 2)) / 100.0;
    let factor = |index: usize| f64::from(signed16(regs[index])) / 100.0;

    Some(MeterDetails {
        voltage_v: [0, 1, 2].map(|p| milli(REG_VOLTAGE_L1, p)),
        current_a: [0, 1, 2].map(|p| milli(REG_CURRENT_L1, p)),
        line_voltage_v: [0, 1, 2].map(|p| milli(REG_VOLTAGE_L12, p)),
        power_factor: factor(REG_POWER_FACTOR),
        load: LoadCharacter::from(regs[REG_LOAD_CHARACTER]),
        phase_reactive_var: [0, 1, 2].map(|p| centi(REG_PHASE_REACTIVE_L1, p)),
        phase_power_factor: [0, 1, 2].map(|p| factor(REG_PHASE_POWER_FACTOR_L1 + p)),
    })
}
