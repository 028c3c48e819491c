/// Decoded identification message, e.g. `/ISK5MT174-0001`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentification {
    pub manufacturer: String,
    pub baud_id: Option<char>,
    pub model: String,
    pub full_id: String,
}

impl DeviceIdentification {
    /// Highest speed the meter announces for mode C. Informational only, the
    /// reader never switches speed.
    pub fn max_baud_rate(&self) -> Option<u32> {
        match self.baud_id? {
            '0' => Some(300),
            '1' => Some(600),
            '2' => Some(1200),
            '3' => Some(2400),
            '4' => Some(4800),
            '5' => Some(9600),
            '6' => Some(19200),
            _ => None,
        }
    }
}
