//! Timer-period and duty-cycle register arithmetic.
//!
//! The PWM peripheral is driven by three registers:
//! - `PR2`: timer period, selects the switching frequency
//! - `CCPRxL`: high 8 bits of the 10-bit duty value
//! - `CCPxCON<5:4>`: low 2 bits of the duty value
//!
//! ```text
//! PR2      = floor(F_osc / (F_pwm · 4 · prescaler) − 1)
//! F_pwm    = F_osc / ((PR2 + 1) · 4 · prescaler)
//! duty10   = round((PR2 + 1) · 4 · D)          CCPRxL = duty10 >> 2
//! D        = duty10 / (4 · (PR2 + 1))          CCPxCON = duty10 & 0b11
//! ```

use crate::error::{LinkError, Result};

/// Largest value of the 8-bit PR2 register.
pub const PR2_MAX: u8 = u8::MAX;

/// Largest 2-bit CCPxCON value.
pub const CCPXCON_MAX: u8 = 0b11;

/// Largest 10-bit duty value.
pub const DUTY_VALUE_MAX: u16 = 0x3FF;

/// Slack absorbing float error when the period lands exactly on a register
/// boundary.
const PR2_EPSILON: f64 = 1e-9;

/// Duty-cycle and period register values for converter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConverterRegisters {
    /// Timer period register.
    pub pr2: u8,
    /// Duty value, high 8 bits.
    pub ccprxl: u8,
    /// Duty value, low 2 bits (0..=3).
    pub ccpxcon: u8,
}

impl ConverterRegisters {
    /// Create a register triple, validating the 2-bit CCPxCON field.
    pub fn new(pr2: u8, ccprxl: u8, ccpxcon: u8) -> Result<Self> {
        if ccpxcon > CCPXCON_MAX {
            return Err(LinkError::InvalidInput(format!(
                "CCPxCON {} exceeds 2-bit maximum {}",
                ccpxcon, CCPXCON_MAX
            )));
        }
        Ok(Self {
            pr2,
            ccprxl,
            ccpxcon,
        })
    }

    /// The combined 10-bit duty value.
    #[inline]
    pub fn duty_value(&self) -> u16 {
        ((self.ccprxl as u16) << 2) | (self.ccpxcon & CCPXCON_MAX) as u16
    }

    /// Duty cycle these registers produce.
    pub fn duty_cycle(&self) -> f64 {
        duty_cycle_from_registers(self.ccprxl, self.ccpxcon, self.pr2)
    }

    /// Wire order: `PR2, CCPRxL, CCPxCON`.
    pub fn to_bytes(&self) -> [u8; 3] {
        [self.pr2, self.ccprxl, self.ccpxcon]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [pr2, ccprxl, ccpxcon] => Self::new(*pr2, *ccprxl, *ccpxcon),
            other => Err(LinkError::Protocol(format!(
                "Register payload must be 3 bytes, got {}",
                other.len()
            ))),
        }
    }
}

fn check_timer_inputs(oscillator_hz: f64, prescaler: u32) -> Result<()> {
    if !oscillator_hz.is_finite() || oscillator_hz <= 0.0 {
        return Err(LinkError::InvalidInput(format!(
            "Oscillator frequency must be positive, got {}",
            oscillator_hz
        )));
    }
    if prescaler == 0 {
        return Err(LinkError::InvalidInput(
            "Timer prescaler must be non-zero".to_string(),
        ));
    }
    Ok(())
}

/// PR2 value for the requested switching frequency.
///
/// # Errors
///
/// `RegisterOverflow` when the period does not fit the 8-bit register,
/// `InvalidInput` for non-positive frequencies or prescaler.
///
/// # Example
///
/// ```
/// use pwm_link::codec::pr2_from_frequency;
///
/// assert_eq!(pr2_from_frequency(15_000.0, 48e6, 16).unwrap(), 49);
/// assert!(pr2_from_frequency(1_000.0, 48e6, 16).is_err());
/// ```
pub fn pr2_from_frequency(switching_hz: f64, oscillator_hz: f64, prescaler: u32) -> Result<u8> {
    let raw = raw_pr2(switching_hz, oscillator_hz, prescaler)?;
    if !(0.0..=PR2_MAX as f64).contains(&raw) {
        return Err(LinkError::RegisterOverflow(raw as i64));
    }
    Ok(raw as u8)
}

/// Like [`pr2_from_frequency`], but clamps out-of-range periods to 0..=255.
pub fn pr2_from_frequency_clamped(
    switching_hz: f64,
    oscillator_hz: f64,
    prescaler: u32,
) -> Result<u8> {
    let raw = raw_pr2(switching_hz, oscillator_hz, prescaler)?;
    Ok(raw.clamp(0.0, PR2_MAX as f64) as u8)
}

fn raw_pr2(switching_hz: f64, oscillator_hz: f64, prescaler: u32) -> Result<f64> {
    check_timer_inputs(oscillator_hz, prescaler)?;
    if !switching_hz.is_finite() || switching_hz <= 0.0 {
        return Err(LinkError::InvalidInput(format!(
            "Switching frequency must be positive, got {}",
            switching_hz
        )));
    }
    let period = oscillator_hz / (switching_hz * 4.0 * prescaler as f64);
    Ok((period - 1.0 + PR2_EPSILON).floor())
}

/// Switching frequency produced by a PR2 value.
pub fn frequency_from_pr2(pr2: u8, oscillator_hz: f64, prescaler: u32) -> f64 {
    oscillator_hz / ((pr2 as f64 + 1.0) * 4.0 * prescaler as f64)
}

/// Every `(PR2, frequency)` pair for PR2 in `0..=254`.
pub fn possible_pr2_values(oscillator_hz: f64, prescaler: u32) -> Vec<(u8, f64)> {
    (0..PR2_MAX)
        .map(|pr2| (pr2, frequency_from_pr2(pr2, oscillator_hz, prescaler)))
        .collect()
}

/// Lowest switching frequency the timer can produce (PR2 = 255).
pub fn min_switching_frequency(oscillator_hz: f64, prescaler: u32) -> f64 {
    frequency_from_pr2(PR2_MAX, oscillator_hz, prescaler)
}

/// Registers producing `duty_cycle` at the given period.
///
/// # Errors
///
/// `InvalidInput` when `duty_cycle` is outside `[0, 1]`.
///
/// # Example
///
/// ```
/// use pwm_link::codec::registers_from_duty_cycle;
///
/// let regs = registers_from_duty_cycle(49, 0.0).unwrap();
/// assert_eq!((regs.ccprxl, regs.ccpxcon), (0, 0));
///
/// let regs = registers_from_duty_cycle(49, 0.5).unwrap();
/// assert_eq!(regs.duty_value(), 100);
/// ```
pub fn registers_from_duty_cycle(pr2: u8, duty_cycle: f64) -> Result<ConverterRegisters> {
    if !duty_cycle.is_finite() || !(0.0..=1.0).contains(&duty_cycle) {
        return Err(LinkError::InvalidInput(format!(
            "Duty cycle must be within [0, 1], got {}",
            duty_cycle
        )));
    }

    // 100 % at PR2 = 255 would need 11 bits.
    let value = ((pr2 as f64 + 1.0) * 4.0 * duty_cycle).round() as u16;
    let value = value.min(DUTY_VALUE_MAX);

    Ok(ConverterRegisters {
        pr2,
        ccprxl: (value >> 2) as u8,
        ccpxcon: (value & CCPXCON_MAX as u16) as u8,
    })
}

/// Duty cycle encoded by a CCPRxL/CCPxCON pair at the given period.
pub fn duty_cycle_from_registers(ccprxl: u8, ccpxcon: u8, pr2: u8) -> f64 {
    let value = ((ccprxl as u16) << 2) | (ccpxcon & CCPXCON_MAX) as u16;
    value as f64 / (4.0 * (pr2 as f64 + 1.0))
}

/// Quantization step of the duty cycle at the given period.
#[inline]
pub fn duty_cycle_step(pr2: u8) -> f64 {
    1.0 / (4.0 * (pr2 as f64 + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const F_OSC: f64 = 48e6;
    const PRESCALER: u32 = 16;

    #[test]
    fn test_pr2_for_20khz() {
        // 48 MHz / (20 kHz · 64) = 37.5 → PR2 = 36
        assert_eq!(pr2_from_frequency(20_000.0, F_OSC, PRESCALER).unwrap(), 36);
    }

    #[test]
    fn test_pr2_49_is_15khz() {
        assert_eq!(pr2_from_frequency(15_000.0, F_OSC, PRESCALER).unwrap(), 49);
        assert_eq!(frequency_from_pr2(49, F_OSC, PRESCALER), 15_000.0);
    }

    #[test]
    fn test_pr2_overflow_reported() {
        let result = pr2_from_frequency(1_000.0, F_OSC, PRESCALER);
        assert!(matches!(result, Err(LinkError::RegisterOverflow(v)) if v > 255));

        // Too fast: period below one tick.
        let result = pr2_from_frequency(2_000_000.0, F_OSC, PRESCALER);
        assert!(matches!(result, Err(LinkError::RegisterOverflow(v)) if v < 0));
    }

    #[test]
    fn test_pr2_clamped() {
        assert_eq!(
            pr2_from_frequency_clamped(1_000.0, F_OSC, PRESCALER).unwrap(),
            255
        );
        assert_eq!(
            pr2_from_frequency_clamped(2_000_000.0, F_OSC, PRESCALER).unwrap(),
            0
        );
    }

    #[test]
    fn test_pr2_rejects_bad_inputs() {
        assert!(matches!(
            pr2_from_frequency(0.0, F_OSC, PRESCALER),
            Err(LinkError::InvalidInput(_))
        ));
        assert!(matches!(
            pr2_from_frequency(20_000.0, F_OSC, 0),
            Err(LinkError::InvalidInput(_))
        ));
        assert!(matches!(
            pr2_from_frequency(f64::NAN, F_OSC, PRESCALER),
            Err(LinkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_frequency_inversion_for_every_pr2() {
        for prescaler in [1, 4, 16] {
            for pr2 in 0..=PR2_MAX {
                let freq = frequency_from_pr2(pr2, F_OSC, prescaler);
                assert_eq!(
                    pr2_from_frequency(freq, F_OSC, prescaler).unwrap(),
                    pr2,
                    "prescaler {prescaler}, pr2 {pr2}"
                );
            }
        }
    }

    #[test]
    fn test_zero_duty_cycle() {
        let regs = registers_from_duty_cycle(49, 0.0).unwrap();
        assert_eq!(regs.ccprxl, 0);
        assert_eq!(regs.ccpxcon, 0);
        assert_eq!(regs.pr2, 49);
    }

    #[test]
    fn test_duty_cycle_split() {
        // (49 + 1) · 4 · 0.09 = 18 → CCPRxL 4, CCPxCON 2
        let regs = registers_from_duty_cycle(49, 0.09).unwrap();
        assert_eq!((regs.ccprxl, regs.ccpxcon), (4, 2));
        assert_eq!(regs.duty_value(), 18);
    }

    #[test]
    fn test_full_duty_at_max_period_saturates() {
        let regs = registers_from_duty_cycle(255, 1.0).unwrap();
        assert_eq!(regs.duty_value(), DUTY_VALUE_MAX);
        assert!((regs.duty_cycle() - 1.0).abs() <= duty_cycle_step(255));
    }

    #[test]
    fn test_duty_cycle_out_of_range() {
        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                registers_from_duty_cycle(49, bad),
                Err(LinkError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_duty_cycle_round_trip_within_one_step() {
        for pr2 in 0..=PR2_MAX {
            for i in 0..=100 {
                let duty = i as f64 / 100.0;
                let regs = registers_from_duty_cycle(pr2, duty).unwrap();
                let recovered = duty_cycle_from_registers(regs.ccprxl, regs.ccpxcon, pr2);
                assert!(
                    (recovered - duty).abs() <= duty_cycle_step(pr2),
                    "pr2 {pr2}, duty {duty}, recovered {recovered}"
                );
            }
        }
    }

    #[test]
    fn test_register_bytes() {
        let regs = ConverterRegisters::new(49, 4, 2).unwrap();
        assert_eq!(regs.to_bytes(), [49, 4, 2]);
        assert_eq!(ConverterRegisters::from_bytes(&[49, 4, 2]).unwrap(), regs);
        assert!(ConverterRegisters::from_bytes(&[49, 4]).is_err());
        assert!(ConverterRegisters::from_bytes(&[49, 4, 4]).is_err());
    }

    #[test]
    fn test_ccpxcon_validated() {
        assert!(ConverterRegisters::new(49, 4, 3).is_ok());
        assert!(matches!(
            ConverterRegisters::new(49, 4, 4),
            Err(LinkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_possible_pr2_values() {
        let values = possible_pr2_values(F_OSC, PRESCALER);
        assert_eq!(values.len(), 255);
        assert_eq!(values[0], (0, 750_000.0));
        assert_eq!(values[49], (49, 15_000.0));
        assert!(values.windows(2).all(|w| w[0].1 > w[1].1));
    }

    #[test]
    fn test_min_switching_frequency() {
        assert_eq!(min_switching_frequency(F_OSC, PRESCALER), 48e6 / 16_384.0);
    }
}
