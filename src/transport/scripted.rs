use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What a [`ScriptedTransport`] saw, shared with the test after the transport
/// has been moved into a client.
#[derive(Default, Debug)]
pub struct Recording {
    pub written: Vec<u8>,
    pub opened: u32,
    pub closed: u32,
}

/// In-memory transport that answers reads from a prepared byte script.
/// An exhausted script behaves like a read timeout.
pub struct ScriptedTransport {
    incoming: VecDeque<u8>,
    open: bool,
    fail_open: bool,
    recording: Arc<Mutex<Recording>>,
}

impl ScriptedTransport {
    pub fn new(incoming: &[u8]) -> (Self, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        let transport = Self {
            incoming: incoming.iter().copied().collect(),
            open: false,
            fail_open: false,
            recording: recording.clone(),
        };
        (transport, recording)
    }

    pub fn failing_open() -> (Self, Arc<Mutex<Recording>>) {
        let (mut transport, recording) = Self::new(&[]);
        transport.fail_open = true;
        (transport, recording)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.fail_open {
            return Err(TransportError::Open { port: "scripted".to_string(), reason: "no such device".to_string() });
        }
        self.open = true;
        self.recording.lock().unwrap().opened += 1;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.recording.lock().unwrap().written.extend_from_slice(data);
        Ok(())
    }

    async fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        Ok(self.incoming.pop_front())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.open = false;
        self.recording.lock().unwrap().closed += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MAX_LINE_LEN;

    #[tokio::test]
    async fn test_read_line_stops_at_newline() {
        let (mut t, _) = ScriptedTransport::new(b"/ISK5MT174-0001\r\nrest");
        t.open().await.unwrap();
        assert_eq!(t.read_line().await.unwrap(), b"/ISK5MT174-0001\r\n".to_vec());
        assert_eq!(t.read_line().await.unwrap(), b"rest".to_vec());
        assert!(t.read_line().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_line_is_bounded() {
        let noise = vec![b'x'; MAX_LINE_LEN * 2];
        let (mut t, _) = ScriptedTransport::new(&noise);
        t.open().await.unwrap();
        assert_eq!(t.read_line().await.unwrap().len(), MAX_LINE_LEN);
    }
}
