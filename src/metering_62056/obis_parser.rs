use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    // 1-0:1.8.1*255(0001798.478*kWh)
    // C.1.1(ISK0MT174-0001)
    // 0-0:C.51.4*01()
    static ref DATA_LINE: Regex = Regex::new(r"^(?:\d+-\d+:)?([^\s()*:]+\.[^\s()*]+\.\d+)(?:\*\d+)?\((.*)\)").unwrap();
}

/// Turns a data block into an ordered map of OBIS code (without medium,
/// channel and storage groups) to the raw value inside the parentheses.
///
/// Lines that do not look like a data line are skipped. A code seen twice keeps
/// its first position but takes the last value.
pub fn extract(data: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    for line in data.lines() {
        if let Some((code, value)) = parse_data_line(line) {
            fields.insert(code, Value::String(value));
        }
    }
    fields
}

pub fn parse_data_line(line: &str) -> Option<(String, String)> {
    let captures = DATA_LINE.captures(line.trim())?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MT174_BLOCK: &str = "0-0:F.F.0*255(0000000)\r
1-0:0.0.0*255(352143)\r
0-0:C.1.0*255(62791737)\r
C.1.1(ISK0MT174-0001)\r
1-0:1.8.1*255(0000012.001*kWh)\r
1-0:1.8.2(0000013.002*kWh)\r
1-0:1.8.0*255(0000025.003*kWh)\r
1-0:32.7.0*255(233.1*V)\r
0-0:C.7.0*255(5)\r
0-0:C.1.6*255(FDF5)\r
";

    #[test]
    fn test_energy_register_line() {
        let fields = extract("1-0:1.8.0*255(0692930.505*kWh)");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["1.8.0"], "0692930.505*kWh");
    }

    #[test]
    fn test_empty_values_and_channel_suffix() {
        assert_eq!(parse_data_line("0-0:C.51.4*255()"), Some(("C.51.4".to_string(), "".to_string())));
        assert_eq!(parse_data_line("0-0:C.51.4*01()"), Some(("C.51.4".to_string(), "".to_string())));

        let fields = extract("0-0:C.51.4*255()\n0-0:C.51.4*01()\n");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["C.51.4"], "");
    }

    #[test]
    fn test_full_block_keeps_order() {
        let fields = extract(MT174_BLOCK);
        let codes: Vec<&str> = fields.keys().map(|k| k.as_str()).collect();
        assert_eq!(codes, vec!["F.F.0", "0.0.0", "C.1.0", "C.1.1", "1.8.1", "1.8.2", "1.8.0", "32.7.0", "C.7.0", "C.1.6"]);
        assert_eq!(fields["C.1.1"], "ISK0MT174-0001");
        assert_eq!(fields["1.8.2"], "0000013.002*kWh");
    }

    #[test]
    fn test_last_occurrence_wins() {
        let fields = extract("1-0:1.8.0(1*kWh)\n1-0:2.8.0(2*kWh)\n1-0:1.8.0(3*kWh)\n");
        let codes: Vec<&str> = fields.keys().map(|k| k.as_str()).collect();
        assert_eq!(codes, vec!["1.8.0", "2.8.0"]);
        assert_eq!(fields["1.8.0"], "3*kWh");
    }

    #[test]
    fn test_unmatched_lines_are_dropped() {
        let fields = extract("/ISK5MT174-0001\r\n\r\ngarbage\r\n1-0:1.8.0\r\n!\r\n1-0:2.8.0(1*kWh)");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["2.8.0"], "1*kWh");
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_parsing_is_idempotent() {
        assert_eq!(extract(MT174_BLOCK), extract(MT174_BLOCK));
    }
}
