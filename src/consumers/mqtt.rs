use super::{energy_field, numeric_field, Consumer, ConsumerError, ENERGY_REGISTERS, POWER_DOWN_COUNTER};
use crate::config::MqttConsumerConfig;
use crate::metering_62056::obis_parser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;

/// Topic names of the energy registers, same order as [`ENERGY_REGISTERS`].
const TOPIC_NAMES: [&str; 3] = ["total", "tariff1", "tariff2"];

/// Requests the client buffers while the broker is unreachable.
const REQUEST_CAPACITY: usize = 10;

/// Readings further apart than interval * (1 + margin) give no power value.
const MARGIN: f64 = 0.5;

/// Turns readings into topic/payload pairs. Kept apart from the client so the
/// arithmetic does not need a broker.
pub struct EnergyTopics {
    root_topic: String,
    max_gap_secs: f64,
    last: Option<(DateTime<Utc>, [f64; 3])>,
}

impl EnergyTopics {
    pub fn new(root_topic: String, interval_secs: u64) -> Self {
        let interval = interval_secs as f64;
        Self {
            root_topic,
            max_gap_secs: interval + interval * MARGIN,
            last: None,
        }
    }

    pub fn messages(&mut self, timestamp: DateTime<Utc>, data: &str) -> Result<Vec<(String, String)>, ConsumerError> {
        let fields = obis_parser::extract(data);
        let ts = timestamp.timestamp();

        let mut index = [0.0; 3];
        for (i, code) in ENERGY_REGISTERS.iter().enumerate() {
            index[i] = energy_field(&fields, code)?;
        }
        let power_downs = numeric_field(&fields, POWER_DOWN_COUNTER)? as i64;

        let mut messages = Vec::new();

        if let Some((last_ts, last_index)) = self.last {
            let gap = (timestamp - last_ts).num_milliseconds() as f64 / 1000.0;
            if gap > 0.0 && gap < self.max_gap_secs {
                for (i, name) in TOPIC_NAMES.iter().enumerate() {
                    // kWh over the gap to average kW
                    let power = (index[i] - last_index[i]) * 3600.0 / gap;
                    messages.push((format!("{}/current/{}", self.root_topic, name), format!("{} {:.3}", ts, power)));
                }
            } else {
                error!("Interval too long: {:.2}", gap);
            }
        }

        for (i, name) in TOPIC_NAMES.iter().enumerate() {
            let topic = format!("{}/index/{}", self.root_topic, name);
            info!("{} = {:.3} kWh", topic, index[i]);
            messages.push((topic, format!("{} {:.3}", ts, index[i])));
        }

        messages.push((format!("{}/powerdown/counter", self.root_topic), format!("{} {}", ts, power_downs)));

        self.last = Some((timestamp, index));
        Ok(messages)
    }
}

/// Publishes meter index, average power and the power down counter.
pub struct MqttPublisher {
    name: String,
    client: AsyncClient,
    topics: EnergyTopics,
}

impl MqttPublisher {
    /// Needs a running tokio runtime, the MQTT event loop is spawned onto it.
    pub fn new(config: &MqttConsumerConfig, interval_secs: u64) -> Self {
        let mut options = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(5));
        if let Some(user) = &config.user {
            options.set_credentials(user.clone(), config.pass.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                    },
                    Ok(_) => {},
                    Err(e) => {
                        error!("Error in MQTT {:?}, reconnecting", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        info!("Created MQTT ({}), host = {}, port = {}", config.client_name, config.host, config.port);
        Self {
            name: "mqtt".to_string(),
            client,
            topics: EnergyTopics::new(config.root_topic.clone(), interval_secs),
        }
    }
}

#[async_trait]
impl Consumer for MqttPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&mut self, timestamp: DateTime<Utc>, data: &str) -> Result<(), ConsumerError> {
        for (topic, payload) in self.topics.messages(timestamp, data)? {
            debug!("Publishing {} to {}", payload, topic);
            // Never wait for room in the request queue, a broker that is down
            // would otherwise hold up every consumer after this one
            self.client
                .try_publish(topic, QoS::AtLeastOnce, false, payload)
                .map_err(|e| ConsumerError::Publish(e.to_string()))?;
        }
        Ok(())
    }
}
