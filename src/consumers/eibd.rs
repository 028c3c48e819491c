use super::{energy_field, numeric_field, Consumer, ConsumerError, ENERGY_REGISTERS, POWER_DOWN_COUNTER};
use crate::config::EibdConsumerConfig;
use crate::metering_62056::obis_parser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::process::Stdio;
use std::time::Duration;

/// KNX group addresses of the energy registers, same order as
/// [`ENERGY_REGISTERS`].
const ENERGY_GROUP_ADDRESSES: [&str; 3] = ["14/1/0", "14/1/1", "14/1/2"];
const POWER_DOWN_GROUP_ADDRESS: &str = "14/1/3";

/// A KNX 4 byte counter is signed.
const MAX_COUNTER: i64 = 2147483647;

/// Splits a counter into the four big endian bytes `groupwrite` expects,
/// e.g. 692930505 becomes `0x29 0x4d 0x47 0xc9`.
pub fn to_four_bytes(code: &str, value: i64) -> Result<Vec<String>, ConsumerError> {
    if !(0..=MAX_COUNTER).contains(&value) {
        return Err(ConsumerError::OutOfRange { code: code.to_string(), value });
    }
    Ok((value as u32).to_be_bytes().iter().map(|b| format!("0x{:02x}", b)).collect())
}

/// Writes the meter index (in Wh) and the power down counter to the KNX bus
/// through eibd's `groupwrite` tool.
pub struct EibdPublisher {
    name: String,
    groupwrite: String,
    host: String,
    timeout: Duration,
}

impl EibdPublisher {
    pub fn new(config: &EibdConsumerConfig) -> Self {
        info!("Created EIBD, host = {}", config.host);
        Self {
            name: "eibd".to_string(),
            groupwrite: config.groupwrite.clone(),
            host: config.host.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Argument lists for `groupwrite`, one per group address.
    pub fn commands(&self, data: &str) -> Result<Vec<Vec<String>>, ConsumerError> {
        let fields = obis_parser::extract(data);
        let mut commands = Vec::new();

        for (code, group_address) in ENERGY_REGISTERS.iter().zip(ENERGY_GROUP_ADDRESSES.iter()) {
            let wh = (energy_field(&fields, code)? * 1000.0).round() as i64;
            let mut args = vec![self.host.clone(), group_address.to_string()];
            args.extend(to_four_bytes(code, wh)?);
            info!("{} = {} Wh", group_address, wh);
            commands.push(args);
        }

        let power_downs = numeric_field(&fields, POWER_DOWN_COUNTER)? as i64;
        info!("{} = {} times", POWER_DOWN_GROUP_ADDRESS, power_downs);
        commands.push(vec![self.host.clone(), POWER_DOWN_GROUP_ADDRESS.to_string(), format!("{:#x}", power_downs)]);

        Ok(commands)
    }

    async fn execute(&self, args: &[String]) -> Result<(), ConsumerError> {
        debug!("Executing: {} {}", self.groupwrite, args.join(" "));
        let mut command = tokio::process::Command::new(&self.groupwrite);
        command
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = tokio::time::timeout(self.timeout, command.status())
            .await
            .map_err(|_| ConsumerError::Command(format!("{} timed out", self.groupwrite)))??;
        if !status.success() {
            return Err(ConsumerError::Command(format!("Unable to execute {}: {}", self.groupwrite, status)));
        }
        Ok(())
    }
}

#[async_trait]
impl Consumer for EibdPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&mut self, _timestamp: DateTime<Utc>, data: &str) -> Result<(), ConsumerError> {
        for args in self.commands(data)? {
            self.execute(&args).await?;
        }
        Ok(())
    }
}
