use super::{Transport, TransportError};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Line settings for the optical head. IEC 62056-21 fixes 7E1, only the
/// speed and the read timeout vary between meters.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub timeout: Duration,
}

impl SerialSettings {
    pub fn new(port_name: String, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port_name,
            baud_rate,
            data_bits: tokio_serial::DataBits::Seven,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::Even,
            timeout,
        }
    }
}

pub struct SerialTransport {
    settings: SerialSettings,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings, stream: None }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        debug!("Opening serial port {} at {} baud", self.settings.port_name, self.settings.baud_rate);
        let stream = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .timeout(self.settings.timeout)
            .open_native_async()
            .map_err(|e| TransportError::Open {
                port: self.settings.port_name.clone(),
                reason: e.to_string(),
            })?;

        self.stream = Some(stream);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let timeout = self.settings.timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        let mut buf = [0u8; 1];
        match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => Ok(None),
            Ok(Ok(_)) => Ok(Some(buf[0])),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(_) => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        /* SerialStream has no close, dropping it releases the port */
        if self.stream.take().is_some() {
            debug!("Closed serial port {}", self.settings.port_name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_settings_are_7e1() {
        let settings = SerialSettings::new("/dev/ttyUSB0".to_string(), 300, Duration::from_millis(1500));
        assert_eq!(settings.port_name, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 300);
        assert_eq!(settings.data_bits, tokio_serial::DataBits::Seven);
        assert_eq!(settings.parity, tokio_serial::Parity::Even);
        assert_eq!(settings.stop_bits, tokio_serial::StopBits::One);
    }

    #[tokio::test]
    async fn test_not_open_transport_refuses_io() {
        let mut transport = SerialTransport::new(SerialSettings::new("/dev/null".to_string(), 9600, Duration::from_millis(10)));
        assert!(!transport.is_open());
        assert!(matches!(transport.write(b"/?!\r\n").await, Err(TransportError::NotOpen)));
        assert!(matches!(transport.read_byte().await, Err(TransportError::NotOpen)));
        assert!(transport.close().await.is_ok());
    }
}
