//! SYNC payloads and the setpoints they carry.
//!
//! A [`Setpoint`] is what the operator adjusts (modulation index, or
//! switching frequency and duty cycle). A [`SyncPayload`] is its register
//! encoding as carried by a SYNC frame. Which of the two shapes a device
//! speaks is fixed per deployment by [`SyncMode`].

use serde::{Deserialize, Serialize};

use super::modulation::ModulationIndexCode;
use super::registers::{
    duty_cycle_from_registers, frequency_from_pr2, pr2_from_frequency, registers_from_duty_cycle,
    ConverterRegisters,
};
use crate::config::DeviceProfile;
use crate::error::{LinkError, Result};

/// SYNC payload shape used by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// PWM inverter: 1-byte modulation-index code.
    #[default]
    Inverter,
    /// DC-DC converter: 3-byte `PR2, CCPRxL, CCPxCON` triple.
    Converter,
}

impl SyncMode {
    /// SYNC payload length in this mode.
    pub fn payload_len(self) -> usize {
        match self {
            SyncMode::Inverter => 1,
            SyncMode::Converter => 3,
        }
    }
}

/// Protocol-domain SYNC payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPayload {
    Modulation(ModulationIndexCode),
    Registers(ConverterRegisters),
}

impl SyncPayload {
    pub fn mode(&self) -> SyncMode {
        match self {
            SyncPayload::Modulation(_) => SyncMode::Inverter,
            SyncPayload::Registers(_) => SyncMode::Converter,
        }
    }

    /// Payload bytes as they follow the SYNC type byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SyncPayload::Modulation(code) => vec![code.value()],
            SyncPayload::Registers(regs) => regs.to_bytes().to_vec(),
        }
    }

    /// Decode SYNC payload bytes in the given mode.
    pub fn decode(mode: SyncMode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != mode.payload_len() {
            return Err(LinkError::Protocol(format!(
                "SYNC payload in {:?} mode must be {} bytes, got {}",
                mode,
                mode.payload_len(),
                bytes.len()
            )));
        }
        match mode {
            SyncMode::Inverter => ModulationIndexCode::new(bytes[0])
                .map(SyncPayload::Modulation)
                .map_err(|_| {
                    LinkError::Protocol(format!("Modulation code {} out of range", bytes[0]))
                }),
            SyncMode::Converter => ConverterRegisters::from_bytes(bytes)
                .map(SyncPayload::Registers)
                .map_err(|e| LinkError::Protocol(e.to_string())),
        }
    }
}

/// Operator-domain setpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    Inverter { modulation_index: f64 },
    Converter { frequency_hz: f64, duty_cycle: f64 },
}

impl Setpoint {
    pub fn mode(&self) -> SyncMode {
        match self {
            Setpoint::Inverter { .. } => SyncMode::Inverter,
            Setpoint::Converter { .. } => SyncMode::Converter,
        }
    }

    /// Encode for a device in `mode`, enforcing the profile's operating limits.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a mode mismatch or a value outside the limits,
    /// `RegisterOverflow` if the frequency cannot be represented.
    pub fn to_payload(&self, mode: SyncMode, profile: &DeviceProfile) -> Result<SyncPayload> {
        if self.mode() != mode {
            return Err(LinkError::InvalidInput(format!(
                "{:?} setpoint sent to a device in {:?} mode",
                self.mode(),
                mode
            )));
        }

        match *self {
            Setpoint::Inverter { modulation_index } => {
                profile.check_modulation_index(modulation_index)?;
                ModulationIndexCode::from_index(modulation_index).map(SyncPayload::Modulation)
            }
            Setpoint::Converter {
                frequency_hz,
                duty_cycle,
            } => {
                profile.check_frequency(frequency_hz)?;
                profile.check_duty_cycle(duty_cycle)?;
                let pr2 =
                    pr2_from_frequency(frequency_hz, profile.oscillator_hz, profile.timer_prescaler)?;
                registers_from_duty_cycle(pr2, duty_cycle).map(SyncPayload::Registers)
            }
        }
    }

    /// Setpoint a device reported. No limits are applied: the device state is
    /// shown as-is.
    pub fn from_payload(payload: &SyncPayload, profile: &DeviceProfile) -> Self {
        match payload {
            SyncPayload::Modulation(code) => Setpoint::Inverter {
                modulation_index: code.index(),
            },
            SyncPayload::Registers(regs) => Setpoint::Converter {
                frequency_hz: frequency_from_pr2(
                    regs.pr2,
                    profile.oscillator_hz,
                    profile.timer_prescaler,
                ),
                duty_cycle: duty_cycle_from_registers(regs.ccprxl, regs.ccpxcon, regs.pr2),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(value: u8) -> ModulationIndexCode {
        ModulationIndexCode::new(value).unwrap()
    }

    #[test]
    fn test_payload_bytes() {
        assert_eq!(SyncPayload::Modulation(code(15)).to_bytes(), vec![15]);
        let regs = ConverterRegisters::new(49, 4, 2).unwrap();
        assert_eq!(SyncPayload::Registers(regs).to_bytes(), vec![49, 4, 2]);
    }

    #[test]
    fn test_decode_by_mode() {
        assert_eq!(
            SyncPayload::decode(SyncMode::Inverter, &[15]).unwrap(),
            SyncPayload::Modulation(code(15))
        );
        assert_eq!(
            SyncPayload::decode(SyncMode::Converter, &[49, 4, 2]).unwrap(),
            SyncPayload::Registers(ConverterRegisters::new(49, 4, 2).unwrap())
        );
    }

    #[test]
    fn test_decode_wrong_length_for_mode() {
        assert!(matches!(
            SyncPayload::decode(SyncMode::Inverter, &[49, 4, 2]),
            Err(LinkError::Protocol(_))
        ));
        assert!(matches!(
            SyncPayload::decode(SyncMode::Converter, &[15]),
            Err(LinkError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_out_of_range_code_is_protocol_error() {
        assert!(matches!(
            SyncPayload::decode(SyncMode::Inverter, &[16]),
            Err(LinkError::Protocol(_))
        ));
    }

    #[test]
    fn test_inverter_setpoint_encoding() {
        let profile = DeviceProfile::default();
        let payload = Setpoint::Inverter {
            modulation_index: 0.87,
        }
        .to_payload(SyncMode::Inverter, &profile)
        .unwrap();
        assert_eq!(payload, SyncPayload::Modulation(code(7)));
    }

    #[test]
    fn test_converter_setpoint_encoding() {
        let profile = DeviceProfile::default();
        let payload = Setpoint::Converter {
            frequency_hz: 25_000.0,
            duty_cycle: 0.5,
        }
        .to_payload(SyncMode::Converter, &profile)
        .unwrap();

        // 48 MHz / (25 kHz · 64) − 1 = 29; 30 · 4 · 0.5 = 60
        assert_eq!(
            payload,
            SyncPayload::Registers(ConverterRegisters::new(29, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_mode_mismatch_rejected() {
        let profile = DeviceProfile::default();
        let result = Setpoint::Inverter {
            modulation_index: 0.9,
        }
        .to_payload(SyncMode::Converter, &profile);
        assert!(matches!(result, Err(LinkError::InvalidInput(_))));
    }

    #[test]
    fn test_limits_enforced() {
        let profile = DeviceProfile::default();
        let too_slow = Setpoint::Converter {
            frequency_hz: 15_000.0,
            duty_cycle: 0.3,
        };
        assert!(matches!(
            too_slow.to_payload(SyncMode::Converter, &profile),
            Err(LinkError::InvalidInput(_))
        ));

        let too_wide = Setpoint::Converter {
            frequency_hz: 25_000.0,
            duty_cycle: 0.9,
        };
        assert!(matches!(
            too_wide.to_payload(SyncMode::Converter, &profile),
            Err(LinkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_payload() {
        let profile = DeviceProfile::default();

        let inverter = Setpoint::from_payload(&SyncPayload::Modulation(code(15)), &profile);
        match inverter {
            Setpoint::Inverter { modulation_index } => {
                assert!((modulation_index - 0.95).abs() < 1e-12)
            }
            other => panic!("unexpected setpoint {other:?}"),
        }

        let regs = ConverterRegisters::new(49, 4, 2).unwrap();
        let converter = Setpoint::from_payload(&SyncPayload::Registers(regs), &profile);
        match converter {
            Setpoint::Converter {
                frequency_hz,
                duty_cycle,
            } => {
                assert_eq!(frequency_hz, 15_000.0);
                assert!((duty_cycle - 0.09).abs() < 1e-12);
            }
            other => panic!("unexpected setpoint {other:?}"),
        }
    }

    #[test]
    fn test_sync_mode_serde() {
        assert_eq!(
            serde_json::to_string(&SyncMode::Converter).unwrap(),
            "\"converter\""
        );
        let mode: SyncMode = serde_json::from_str("\"inverter\"").unwrap();
        assert_eq!(mode, SyncMode::Inverter);
    }
}
