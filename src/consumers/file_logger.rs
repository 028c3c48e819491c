use super::{Consumer, ConsumerError};
use crate::metering_62056::obis_parser;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use log::{debug, info};
use tokio::io::AsyncWriteExt;

/// Appends one line per reading to `<base>-<YYYY-MM>.log`, a new file every
/// month.
pub struct FileLogger {
    name: String,
    base: String,
}

impl FileLogger {
    pub fn new(base: String) -> Self {
        info!("Created FileLogger, filename = {}", base);
        Self { name: "file-logger".to_string(), base }
    }

    pub fn filename_for(&self, date: DateTime<Local>) -> String {
        format!("{}-{}.log", self.base, date.format("%Y-%m"))
    }

    pub fn format_line(timestamp: DateTime<Utc>, data: &str) -> String {
        let fields = serde_json::Value::Object(obis_parser::extract(data));
        format!("{}: {}\n", timestamp.timestamp(), fields)
    }
}

#[async_trait]
impl Consumer for FileLogger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&mut self, timestamp: DateTime<Utc>, data: &str) -> Result<(), ConsumerError> {
        let filename = self.filename_for(Local::now());
        let line = Self::format_line(timestamp, data);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Written data to {}", filename);
        Ok(())
    }
}
