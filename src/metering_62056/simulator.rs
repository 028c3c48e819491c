use super::{MeterReader, ReadError};
use async_trait::async_trait;
use log::info;
use rand::Rng;

/// Stand-in for a real MT174, used when no optical head is attached.
///
/// Both tariff registers advance by up to 1 kWh per read, the total register
/// is their sum.
pub struct FakeMeter {
    index: [f64; 2],
}

impl FakeMeter {
    pub fn new() -> Self {
        info!("Created FakeMeter");
        Self { index: [0.0, 0.0] }
    }

    pub fn next_datablock(&mut self) -> String {
        let mut rng = rand::thread_rng();
        for register in self.index.iter_mut() {
            *register += rng.gen::<f64>();
        }
        let total = self.index[0] + self.index[1];

        format!("0-0:F.F.0*255(0000000)\r
1-0:0.0.0*255(352143)\r
0-0:C.1.0*255(62791737)\r
C.1.1(ISK0MT174-0001)\r
1-0:1.8.1*255({:011.3}*kWh)\r
1-0:1.8.2*255({:011.3}*kWh)\r
1-0:1.8.0*255({:011.3}*kWh)\r
1-0:2.8.1*255(0000001.012*kWh)\r
1-0:2.8.2*255(0000001.612*kWh)\r
1-0:2.8.0*255(0000002.624*kWh)\r
1-0:32.7.0*255(233.1*V)\r
1-0:52.7.0*255(232.7*V)\r
1-0:72.7.0*255(233.8*V)\r
1-0:31.7.0*255(5.36*A)\r
1-0:51.7.0*255(8.06*A)\r
1-0:71.7.0*255(5.71*A)\r
1-0:36.7.0*255(1.086*kW)\r
1-0:56.7.0*255(1.714*kW)\r
1-0:76.7.0*255(1.220*kW)\r
1-0:33.7.0*255(0.866)\r
1-0:53.7.0*255(0.915)\r
1-0:73.7.0*255(0.911)\r
0-0:C.7.0*255(5)\r
0-0:C.7.1*255(5)\r
0-0:C.7.2*255(5)\r
0-0:C.7.3*255(5)\r
1-0:0.2.0*255(1.03)\r
0-0:C.1.6*255(FDF5)\r
", self.index[0], self.index[1], total)
    }
}

impl Default for FakeMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeterReader for FakeMeter {
    async fn read(&mut self) -> Result<String, ReadError> {
        Ok(self.next_datablock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_62056::{obis_parser, utils::extract_numeric_value};

    fn register(fields: &serde_json::Map<String, serde_json::Value>, code: &str) -> f64 {
        extract_numeric_value(fields[code].as_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_registers_grow_and_add_up() {
        let mut meter = FakeMeter::new();
        let first = obis_parser::extract(&meter.read().await.unwrap());
        let second = obis_parser::extract(&meter.read().await.unwrap());

        assert!(register(&second, "1.8.1") >= register(&first, "1.8.1"));
        assert!(register(&second, "1.8.2") >= register(&first, "1.8.2"));
        let sum = register(&second, "1.8.1") + register(&second, "1.8.2");
        assert!((register(&second, "1.8.0") - sum).abs() < 0.002);
        assert_eq!(second["C.7.0"], "5");
        assert_eq!(second["1.8.0"].as_str().unwrap().len(), "0000002.624*kWh".len());
    }
}
