//! Device and link configuration.
//!
//! [`DeviceProfile`] holds the microcontroller tuning (oscillator,
//! prescaler) and the operating limits of the power stage. [`LinkConfig`]
//! holds the serial link parameters and the SYNC payload mode. Both are
//! plain values passed to the link at construction; nothing here is global.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use pwm_link::{LinkConfig, SyncMode};
//!
//! let config = LinkConfig::new()
//!     .baud_rate(19_200)
//!     .timeout(Duration::from_millis(250))
//!     .mode(SyncMode::Converter);
//! assert!(config.validate().is_ok());
//!
//! let config = LinkConfig::from_json_str(r#"{"baud_rate": 9600, "timeout_ms": 500}"#).unwrap();
//! assert_eq!(config.timeout, Duration::from_millis(500));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::SyncMode;
use crate::error::{LinkError, Result};

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default link timeout for every blocking read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default number of attempts per sync request.
pub const DEFAULT_SYNC_ATTEMPTS: u32 = 5;

/// Tolerance applied to the operating limits.
const LIMIT_TOLERANCE: f64 = 1e-9;

/// Microcontroller tuning and power-stage operating limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Oscillator frequency in Hz.
    pub oscillator_hz: f64,
    /// Timer 2 prescaler.
    pub timer_prescaler: u32,
    pub min_frequency_hz: f64,
    pub max_frequency_hz: f64,
    pub min_duty_cycle: f64,
    pub max_duty_cycle: f64,
    pub min_modulation_index: f64,
    pub max_modulation_index: f64,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            oscillator_hz: 48e6,
            timer_prescaler: 16,
            min_frequency_hz: 20e3,
            max_frequency_hz: 30e3,
            min_duty_cycle: 0.10,
            max_duty_cycle: 0.57,
            min_modulation_index: 0.80,
            max_modulation_index: 0.95,
        }
    }
}

impl DeviceProfile {
    /// Validate the profile.
    ///
    /// Checks:
    /// - Oscillator frequency and prescaler are positive
    /// - Every min/max pair is ordered
    /// - Duty-cycle limits lie within [0, 1]
    pub fn validate(&self) -> Result<()> {
        if !self.oscillator_hz.is_finite() || self.oscillator_hz <= 0.0 {
            return Err(LinkError::Config(
                "Oscillator frequency must be positive".to_string(),
            ));
        }
        if self.timer_prescaler == 0 {
            return Err(LinkError::Config(
                "Timer prescaler must be non-zero".to_string(),
            ));
        }
        if !(self.min_frequency_hz > 0.0 && self.min_frequency_hz <= self.max_frequency_hz) {
            return Err(LinkError::Config(format!(
                "Invalid frequency limits [{}, {}]",
                self.min_frequency_hz, self.max_frequency_hz
            )));
        }
        if !(0.0 <= self.min_duty_cycle
            && self.min_duty_cycle <= self.max_duty_cycle
            && self.max_duty_cycle <= 1.0)
        {
            return Err(LinkError::Config(format!(
                "Invalid duty-cycle limits [{}, {}]",
                self.min_duty_cycle, self.max_duty_cycle
            )));
        }
        if !(self.min_modulation_index <= self.max_modulation_index) {
            return Err(LinkError::Config(format!(
                "Invalid modulation-index limits [{}, {}]",
                self.min_modulation_index, self.max_modulation_index
            )));
        }
        Ok(())
    }

    pub fn check_frequency(&self, frequency_hz: f64) -> Result<()> {
        check_range(
            "Switching frequency",
            frequency_hz,
            self.min_frequency_hz,
            self.max_frequency_hz,
        )
    }

    pub fn check_duty_cycle(&self, duty_cycle: f64) -> Result<()> {
        check_range(
            "Duty cycle",
            duty_cycle,
            self.min_duty_cycle,
            self.max_duty_cycle,
        )
    }

    pub fn check_modulation_index(&self, index: f64) -> Result<()> {
        check_range(
            "Modulation index",
            index,
            self.min_modulation_index,
            self.max_modulation_index,
        )
    }
}

fn check_range(what: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min - LIMIT_TOLERANCE || value > max + LIMIT_TOLERANCE {
        return Err(LinkError::InvalidInput(format!(
            "{} {} outside [{}, {}]",
            what, value, min, max
        )));
    }
    Ok(())
}

/// Serial link configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Timeout applied to every blocking read.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Attempts per sync request before the link is declared lost.
    pub sync_attempts: u32,
    /// SYNC payload shape of the device.
    pub mode: SyncMode,
    /// Device tuning and limits.
    pub profile: DeviceProfile,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            sync_attempts: DEFAULT_SYNC_ATTEMPTS,
            mode: SyncMode::default(),
            profile: DeviceProfile::default(),
        }
    }
}

impl LinkConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baud rate.
    ///
    /// Default: 9600
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the link timeout.
    ///
    /// Default: 500 ms
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of attempts per sync request.
    ///
    /// Default: 5
    pub fn sync_attempts(mut self, attempts: u32) -> Self {
        self.sync_attempts = attempts;
        self
    }

    /// Set the SYNC payload mode.
    ///
    /// Default: `SyncMode::Inverter`
    pub fn mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the device profile.
    pub fn profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(LinkError::Config(
                "Baud rate must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(LinkError::Config(
                "Timeout must be greater than zero".to_string(),
            ));
        }
        if self.sync_attempts == 0 {
            return Err(LinkError::Config(
                "At least one sync attempt is required".to_string(),
            ));
        }
        self.profile.validate()
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LinkConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_matches_hardware() {
        let profile = DeviceProfile::default();
        assert_eq!(profile.oscillator_hz, 48e6);
        assert_eq!(profile.timer_prescaler, 16);
        assert_eq!(profile.min_frequency_hz, 20e3);
        assert_eq!(profile.max_frequency_hz, 30e3);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_profile_limits() {
        let profile = DeviceProfile::default();
        assert!(profile.check_frequency(25e3).is_ok());
        assert!(profile.check_frequency(19_999.0).is_err());
        assert!(profile.check_duty_cycle(0.57).is_ok());
        assert!(profile.check_duty_cycle(0.58).is_err());
        assert!(profile.check_modulation_index(0.80).is_ok());
        assert!(profile.check_modulation_index(0.8 + 15.0 * 0.01).is_ok());
        assert!(profile.check_modulation_index(0.96).is_err());
        assert!(profile.check_modulation_index(f64::NAN).is_err());
    }

    #[test]
    fn test_profile_validation() {
        let inverted = DeviceProfile {
            min_frequency_hz: 30e3,
            max_frequency_hz: 20e3,
            ..DeviceProfile::default()
        };
        assert!(matches!(inverted.validate(), Err(LinkError::Config(_))));

        let no_prescaler = DeviceProfile {
            timer_prescaler: 0,
            ..DeviceProfile::default()
        };
        assert!(no_prescaler.validate().is_err());

        let duty_over_one = DeviceProfile {
            max_duty_cycle: 1.5,
            ..DeviceProfile::default()
        };
        assert!(duty_over_one.validate().is_err());
    }

    #[test]
    fn test_link_config_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.sync_attempts, DEFAULT_SYNC_ATTEMPTS);
        assert_eq!(config.mode, SyncMode::Inverter);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_link_config_builder() {
        let config = LinkConfig::new()
            .baud_rate(115_200)
            .timeout(Duration::from_millis(50))
            .sync_attempts(3)
            .mode(SyncMode::Converter);

        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout, Duration::from_millis(50));
        assert_eq!(config.sync_attempts, 3);
        assert_eq!(config.mode, SyncMode::Converter);
    }

    #[test]
    fn test_link_config_validation() {
        assert!(LinkConfig::new().baud_rate(0).validate().is_err());
        assert!(LinkConfig::new().timeout(Duration::ZERO).validate().is_err());
        assert!(LinkConfig::new().sync_attempts(0).validate().is_err());
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config = LinkConfig::from_json_str(
            r#"{"timeout_ms": 250, "mode": "converter", "profile": {"timer_prescaler": 4}}"#,
        )
        .unwrap();

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.mode, SyncMode::Converter);
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.profile.timer_prescaler, 4);
        assert_eq!(config.profile.oscillator_hz, 48e6);
    }

    #[test]
    fn test_json_round_trip_preserves_config() {
        let config = LinkConfig::new()
            .timeout(Duration::from_millis(1200))
            .mode(SyncMode::Converter);
        let json = config.to_json_string().unwrap();
        assert!(json.contains("\"timeout_ms\": 1200"));
        assert_eq!(LinkConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_json_invalid_values_rejected() {
        assert!(matches!(
            LinkConfig::from_json_str(r#"{"baud_rate": 0}"#),
            Err(LinkError::Config(_))
        ));
        assert!(matches!(
            LinkConfig::from_json_str("not json"),
            Err(LinkError::Json(_))
        ));
    }
}
