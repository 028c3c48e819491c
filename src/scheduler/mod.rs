use crate::consumers::{Consumer, ConsumerError};
use crate::metering_62056::{MeterReader, ReadError};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

pub const SLEEP_TIME: Duration = Duration::from_millis(100);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Interrupted")]
    Interrupted,
}

/// Outcome of one read cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub read_duration: Duration,
    /// Set when the meter could not be read; no consumer ran in that case.
    pub read_error: Option<ReadError>,
    /// In registration order.
    pub consumers: Vec<(String, Result<Duration, ConsumerError>)>,
}

pub struct Scheduler {
    reader: Box<dyn MeterReader>,
    consumers: Vec<Box<dyn Consumer>>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(reader: Box<dyn MeterReader>, consumers: Vec<Box<dyn Consumer>>, interval: Duration) -> Self {
        info!("Created scheduler, interval = {}s, {} consumers", interval.as_secs(), consumers.len());
        Self { reader, consumers, interval }
    }

    /// Reads the meter once and hands the data block to every consumer.
    ///
    /// Never fails: a failed read ends the cycle early, a failing consumer is
    /// logged and the next one still runs.
    pub async fn execute(&mut self, timestamp: DateTime<Utc>) -> CycleReport {
        let begin = Instant::now();
        let result = self.reader.read().await;
        let read_duration = begin.elapsed();

        let mut report = CycleReport {
            timestamp,
            read_duration,
            read_error: None,
            consumers: Vec::with_capacity(self.consumers.len()),
        };

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                error!("Error in meter reader ({:?}): {}", e.kind(), e);
                report.read_error = Some(e);
                return report;
            }
        };
        info!("Read data in {:.3}s", read_duration.as_secs_f64());
        debug!("Data: {:?}", data);

        for consumer in self.consumers.iter_mut() {
            let begin = Instant::now();
            let outcome = match consumer.process(timestamp, &data).await {
                Ok(()) => {
                    let took = begin.elapsed();
                    info!("Consumer ({}) in {:.3}s", consumer.name(), took.as_secs_f64());
                    Ok(took)
                }
                Err(e) => {
                    error!("Error in consumer ({}): {}", consumer.name(), e);
                    Err(e)
                }
            };
            report.consumers.push((consumer.name().to_string(), outcome));
        }
        report
    }

    /// Runs a cycle every interval until `shutdown` turns true.
    ///
    /// The flag is only looked at between cycles, a running handshake is
    /// allowed to finish first.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<(), SchedulerError> {
        let mut baseline: Option<Instant> = None;
        loop {
            if *shutdown.borrow() {
                info!("Interrupt received, stopping scheduler");
                return Err(SchedulerError::Interrupted);
            }

            if let Some(start) = baseline {
                if start.elapsed() < self.interval {
                    tokio::time::sleep(SLEEP_TIME).await;
                    continue;
                }
            }

            baseline = Some(Instant::now());
            self.execute(Utc::now()).await;
        }
    }
}
