//! Register codec - conversions between operator units and register values.
//!
//! - [`registers`] - timer period (`PR2`) and duty-cycle (`CCPRxL`/`CCPxCON`) arithmetic
//! - [`modulation`] - 16-level modulation-index code
//! - [`payload`] - typed SYNC payloads and operator setpoints
//!
//! All conversions are pure functions. Out-of-range inputs are rejected
//! with `LinkError::InvalidInput` before anything is sent to the device.
//!
//! # Example
//!
//! ```
//! use pwm_link::codec::{pr2_from_frequency, registers_from_duty_cycle, ModulationIndexCode};
//!
//! let pr2 = pr2_from_frequency(25_000.0, 48e6, 16).unwrap();
//! let regs = registers_from_duty_cycle(pr2, 0.5).unwrap();
//! assert_eq!(regs.to_bytes(), [29, 15, 0]);
//!
//! let code = ModulationIndexCode::from_index(0.95).unwrap();
//! assert_eq!(code.value(), 15);
//! ```

pub mod modulation;
pub mod payload;
pub mod registers;

pub use modulation::{
    index_from_code, modulation_code_from_index, ModulationIndexCode, MAX_MODULATION_INDEX,
    MIN_MODULATION_INDEX, MODULATION_CODE_MAX,
};
pub use payload::{Setpoint, SyncMode, SyncPayload};
pub use registers::{
    duty_cycle_from_registers, duty_cycle_step, frequency_from_pr2, min_switching_frequency,
    possible_pr2_values, pr2_from_frequency, pr2_from_frequency_clamped,
    registers_from_duty_cycle, ConverterRegisters, PR2_MAX,
};
