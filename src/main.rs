use mt174reader::{config::ConsumerConfig, Config, Consumer, FileLogger, MeterReader, Mt174Client, Scheduler, SerialSettings, SerialTransport};
use log::{error, info, warn};
use std::time::Duration;


#[cfg(feature = "simulator")]
fn simulated_reader() -> Option<Box<dyn MeterReader>> {
    Some(Box::new(mt174reader::metering_62056::simulator::FakeMeter::new()))
}

#[cfg(not(feature = "simulator"))]
fn simulated_reader() -> Option<Box<dyn MeterReader>> {
    error!("meter.simulate is set but the simulator feature is not compiled in");
    None
}

fn build_reader(config: &Config) -> Option<Box<dyn MeterReader>> {
    if config.meter.simulate {
        return simulated_reader();
    }

    /* validated on load, simulate or a port is always present */
    let port = config.meter.port.clone()?;
    let settings = SerialSettings::new(port, config.meter.baud_rate, config.meter.timeout());
    info!("Created MT174, port = {}", settings.port_name);
    Some(Box::new(Mt174Client::new(SerialTransport::new(settings))))
}

fn build_consumers(config: &Config) -> Vec<Box<dyn Consumer>> {
    let mut consumers: Vec<Box<dyn Consumer>> = Vec::new();
    for consumer in config.consumers.iter() {
        match consumer {
            ConsumerConfig::FileLogger(c) => {
                consumers.push(Box::new(FileLogger::new(c.path.clone())));
            }
            #[cfg(feature = "mqtt")]
            ConsumerConfig::Mqtt(c) => {
                consumers.push(Box::new(mt174reader::MqttPublisher::new(c, config.interval)));
            }
            #[cfg(not(feature = "mqtt"))]
            ConsumerConfig::Mqtt(_) => {
                warn!("MQTT consumer configured but the mqtt feature is not compiled in, skipping it");
            }
            #[cfg(feature = "eibd")]
            ConsumerConfig::Eibd(c) => {
                consumers.push(Box::new(mt174reader::EibdPublisher::new(c)));
            }
            #[cfg(not(feature = "eibd"))]
            ConsumerConfig::Eibd(_) => {
                warn!("EIBD consumer configured but the eibd feature is not compiled in, skipping it");
            }
        }
    }
    if consumers.is_empty() {
        warn!("No consumers configured, readings will only be logged");
    }
    consumers
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    // Initialize logging
    let default_filter = std::env::var("MT174_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    let reader = match build_reader(&config) {
        Some(r) => r,
        None => return std::process::ExitCode::FAILURE,
    };
    let consumers = build_consumers(&config);
    let mut scheduler = Scheduler::new(reader, consumers, Duration::from_secs(config.interval));

    let (tx, rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => { let _ = tx.send(true); }
            Err(e) => { error!("Unable to listen for Ctrl-C: {}", e); }
        }
    });

    info!("Scheduler started, now waiting for a signal to exit");
    match scheduler.run(rx).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            info!("{}, exiting", e);
            std::process::ExitCode::SUCCESS
        }
    }
}
