//! Discretized modulation-index codec.
//!
//! The inverter firmware stores one sine table per modulation index from
//! 0.80 to 0.95 in steps of 0.01, and the link selects a table with a 4-bit
//! code:
//!
//! ```text
//! code  = round((index − 0.80) × 100)      0..=15
//! index = 0.80 + code / 100                0.80..=0.95
//! ```

use std::fmt;

use crate::error::{LinkError, Result};

/// Modulation index selected by code 0.
pub const MIN_MODULATION_INDEX: f64 = 0.80;

/// Modulation index selected by code 15.
pub const MAX_MODULATION_INDEX: f64 = 0.95;

/// Largest modulation code.
pub const MODULATION_CODE_MAX: u8 = 15;

/// Index increment per code.
pub const MODULATION_STEP: f64 = 0.01;

/// Tolerance on the bounds so `0.8 + 15 × 0.01` style float noise is accepted.
const BOUND_TOLERANCE: f64 = 1e-9;

/// A modulation-index code in `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulationIndexCode(u8);

impl ModulationIndexCode {
    /// Code 0 (index 0.80).
    pub const MIN: ModulationIndexCode = ModulationIndexCode(0);
    /// Code 15 (index 0.95).
    pub const MAX: ModulationIndexCode = ModulationIndexCode(MODULATION_CODE_MAX);

    /// Wrap a raw code.
    pub fn new(code: u8) -> Result<Self> {
        if code > MODULATION_CODE_MAX {
            return Err(LinkError::InvalidInput(format!(
                "Modulation code {} exceeds maximum {}",
                code, MODULATION_CODE_MAX
            )));
        }
        Ok(Self(code))
    }

    /// Nearest code for a modulation index.
    ///
    /// # Example
    ///
    /// ```
    /// use pwm_link::codec::ModulationIndexCode;
    ///
    /// assert_eq!(ModulationIndexCode::from_index(0.95).unwrap().value(), 15);
    /// assert_eq!(ModulationIndexCode::from_index(0.874).unwrap().value(), 7);
    /// assert!(ModulationIndexCode::from_index(0.70).is_err());
    /// ```
    pub fn from_index(index: f64) -> Result<Self> {
        if !index.is_finite()
            || index < MIN_MODULATION_INDEX - BOUND_TOLERANCE
            || index > MAX_MODULATION_INDEX + BOUND_TOLERANCE
        {
            return Err(LinkError::InvalidInput(format!(
                "Modulation index must be within [{}, {}], got {}",
                MIN_MODULATION_INDEX, MAX_MODULATION_INDEX, index
            )));
        }
        let code = ((index - MIN_MODULATION_INDEX) / MODULATION_STEP).round();
        Ok(Self(code.clamp(0.0, MODULATION_CODE_MAX as f64) as u8))
    }

    /// The raw code.
    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// The modulation index this code selects.
    pub fn index(self) -> f64 {
        MIN_MODULATION_INDEX + self.0 as f64 * MODULATION_STEP
    }

    /// All 16 codes in ascending order.
    pub fn all() -> impl Iterator<Item = ModulationIndexCode> {
        (0..=MODULATION_CODE_MAX).map(ModulationIndexCode)
    }
}

impl TryFrom<u8> for ModulationIndexCode {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ModulationIndexCode> for u8 {
    fn from(code: ModulationIndexCode) -> Self {
        code.0
    }
}

impl fmt::Display for ModulationIndexCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.index())
    }
}

/// Code for a modulation index. See [`ModulationIndexCode::from_index`].
pub fn modulation_code_from_index(index: f64) -> Result<ModulationIndexCode> {
    ModulationIndexCode::from_index(index)
}

/// Modulation index for a code.
pub fn index_from_code(code: ModulationIndexCode) -> f64 {
    code.index()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in ModulationIndexCode::all() {
            assert_eq!(modulation_code_from_index(index_from_code(code)).unwrap(), code);
        }
        assert_eq!(ModulationIndexCode::all().count(), 16);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(ModulationIndexCode::from_index(0.80).unwrap(), ModulationIndexCode::MIN);
        assert_eq!(ModulationIndexCode::from_index(0.95).unwrap(), ModulationIndexCode::MAX);
        assert!((ModulationIndexCode::MAX.index() - 0.95).abs() < 1e-12);
        assert!((ModulationIndexCode::MIN.index() - 0.80).abs() < 1e-12);
    }

    #[test]
    fn test_rounds_to_nearest_code() {
        assert_eq!(ModulationIndexCode::from_index(0.8449).unwrap().value(), 4);
        assert_eq!(ModulationIndexCode::from_index(0.8451).unwrap().value(), 5);
    }

    #[test]
    fn test_out_of_range_index() {
        for bad in [0.79, 0.96, -1.0, f64::NAN] {
            assert!(matches!(
                ModulationIndexCode::from_index(bad),
                Err(LinkError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_raw_code_validation() {
        assert!(ModulationIndexCode::new(15).is_ok());
        assert!(ModulationIndexCode::try_from(16u8).is_err());
        assert_eq!(u8::from(ModulationIndexCode::new(9).unwrap()), 9);
    }

    #[test]
    fn test_display() {
        assert_eq!(ModulationIndexCode::MAX.to_string(), "0.95");
        assert_eq!(ModulationIndexCode::new(3).unwrap().to_string(), "0.83");
    }
}
