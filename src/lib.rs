//! Periodic readout of IEC 62056-21 electricity meters (ISKRA MT174 and
//! friends) over an optical serial head.
//!
//! Every interval the scheduler drives one request/acknowledge/data block
//! exchange and hands the checked data block to the configured consumers.

pub mod config;
pub mod transport;
pub mod metering_62056;
pub mod consumers;
pub mod scheduler;

// Re-export common types for easier access
pub use config::Config;
pub use consumers::{Consumer, ConsumerError, FileLogger};
#[cfg(feature = "mqtt")]
pub use consumers::MqttPublisher;
#[cfg(feature = "eibd")]
pub use consumers::EibdPublisher;
pub use metering_62056::{MeterReader, Mt174Client, ReadError};
pub use scheduler::Scheduler;
pub use transport::{SerialSettings, SerialTransport, Transport};
