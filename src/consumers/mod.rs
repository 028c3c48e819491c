use crate::metering_62056::utils::{extract_numeric_value, extract_unit};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod file_logger;
#[cfg(feature = "mqtt")]
pub mod mqtt;
#[cfg(feature = "eibd")]
pub mod eibd;

pub use file_logger::FileLogger;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttPublisher;
#[cfg(feature = "eibd")]
pub use eibd::EibdPublisher;

/// Energy registers: total, tariff 1, tariff 2.
pub const ENERGY_REGISTERS: [&str; 3] = ["1.8.0", "1.8.1", "1.8.2"];
pub const POWER_DOWN_COUNTER: &str = "C.7.0";

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Field {0} missing in data block")]
    MissingField(String),
    #[error("Field {code} has no numeric value: {value:?}")]
    InvalidValue { code: String, value: String },
    #[error("Field {code} is in {unit}, expected {expected}")]
    UnexpectedUnit { code: String, unit: String, expected: String },
    #[error("Value of {code} out of range: {value}")]
    OutOfRange { code: String, value: i64 },
    #[error("Publishing failed: {0}")]
    Publish(String),
    #[error("Command failed: {0}")]
    Command(String),
}

/// Receives every successful reading, in the order consumers were registered.
#[async_trait]
pub trait Consumer: Send {
    /// Used in log lines only.
    fn name(&self) -> &str;

    async fn process(&mut self, timestamp: DateTime<Utc>, data: &str) -> Result<(), ConsumerError>;
}

pub(crate) fn numeric_field(fields: &Map<String, Value>, code: &str) -> Result<f64, ConsumerError> {
    let value = fields
        .get(code)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConsumerError::MissingField(code.to_string()))?;

    extract_numeric_value(value).ok_or_else(|| ConsumerError::InvalidValue {
        code: code.to_string(),
        value: value.to_string(),
    })
}

/// Like [`numeric_field`] but refuses a register that carries a unit other
/// than kWh. A missing unit is accepted.
pub(crate) fn energy_field(fields: &Map<String, Value>, code: &str) -> Result<f64, ConsumerError> {
    let value = numeric_field(fields, code)?;
    let raw = fields.get(code).and_then(|v| v.as_str()).unwrap_or_default();
    match extract_unit(raw) {
        Some(unit) if unit != "kWh" => Err(ConsumerError::UnexpectedUnit {
            code: code.to_string(),
            unit,
            expected: "kWh".to_string(),
        }),
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_62056::obis_parser;

    #[test]
    fn test_energy_field_checks_unit() {
        let fields = obis_parser::extract("1-0:1.8.0(0000012.500*kWh)\r\n1-0:1.8.1(12.5)\r\n1-0:1.8.2(0000012.500*Wh)\r\n");
        assert_eq!(energy_field(&fields, "1.8.0").unwrap(), 12.5);
        assert_eq!(energy_field(&fields, "1.8.1").unwrap(), 12.5);
        assert!(matches!(
            energy_field(&fields, "1.8.2"),
            Err(ConsumerError::UnexpectedUnit { unit, .. }) if unit == "Wh"
        ));
    }

    #[test]
    fn test_numeric_field_errors() {
        let fields = obis_parser::extract("0-0:C.1.6*255(FDF5)\r\n");
        assert!(matches!(numeric_field(&fields, "C.1.6"), Err(ConsumerError::InvalidValue { .. })));
        assert!(matches!(numeric_field(&fields, "C.7.0"), Err(ConsumerError::MissingField(code)) if code == "C.7.0"));
    }
}
