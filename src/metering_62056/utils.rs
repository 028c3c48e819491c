use super::{structs::DeviceIdentification, ReadError};
use log::debug;

/// An identification message is `/` + 3 char manufacturer + baud id + model,
/// anything shorter is not a meter talking to us.
pub const MIN_IDENTIFICATION_LEN: usize = 7;

pub fn parse_identification_line(line: &[u8]) -> Result<DeviceIdentification, ReadError> {
    // Example replies:
    // /ISK5MT174-0001\r\n
    // \x00\x7f/ISK5MT174-0001\r\n (optical head noise in front)

    if line.is_empty() {
        return Err(ReadError::NoResponse);
    }

    // The scan is bounded by the transport's line limit
    let start = line.iter().position(|b| *b == b'/').ok_or_else(|| {
        ReadError::UnexpectedReply(format!("No identification message in {:?}", String::from_utf8_lossy(line)))
    })?;
    if start > 0 {
        debug!("Discarding {} noise bytes in front of the identification", start);
    }

    let message = &line[start..];
    if message.len() < MIN_IDENTIFICATION_LEN {
        return Err(ReadError::UnexpectedReply(format!(
            "Identification message too short: {:?}",
            String::from_utf8_lossy(message)
        )));
    }

    let text = String::from_utf8_lossy(message);
    let full_id = text.trim_end_matches(['\r', '\n']).trim_start_matches('/').to_string();

    let mut chars = full_id.chars();
    let manufacturer: String = chars.by_ref().take(3).collect();
    let baud_id = chars.next();
    let model: String = chars.collect();

    debug!("Parsed identification - Manufacturer: {}, Baud id: {:?}, Model: {}",
           manufacturer, baud_id, model);

    Ok(DeviceIdentification {
        manufacturer,
        baud_id,
        model,
        full_id,
    })
}

pub fn extract_numeric_value(value_str: &str) -> Option<f64> {
    // Extract numeric value from strings like "0692930.505" or "233.1*V"
    let cleaned = value_str
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect::<String>();

    cleaned.parse::<f64>().ok()
}

pub fn extract_unit(value_str: &str) -> Option<String> {
    let (_, unit) = value_str.split_once('*')?;
    if unit.is_empty() {
        None
    } else {
        Some(unit.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identification_line() {
        let id = parse_identification_line(b"/ISK5MT174-0001\r\n").unwrap();
        assert_eq!(id.manufacturer, "ISK");
        assert_eq!(id.baud_id, Some('5'));
        assert_eq!(id.model, "MT174-0001");
        assert_eq!(id.full_id, "ISK5MT174-0001");
        assert_eq!(id.max_baud_rate(), Some(9600));
    }

    #[test]
    fn test_noise_in_front_is_stripped() {
        for noise in [&b""[..], b"\x00", b"\x7f\x7f\xff", b"garbage bytes "] {
            let mut line = noise.to_vec();
            line.extend_from_slice(b"/ISK5MT174-0001\r\n");
            let id = parse_identification_line(&line).unwrap();
            assert_eq!(id.full_id, "ISK5MT174-0001");
        }
    }

    #[test]
    fn test_length_is_checked_after_noise() {
        // 7 bytes after the noise is just enough
        assert!(parse_identification_line(b"xx/ISK5\r\n").is_ok());
        assert!(matches!(parse_identification_line(b"xxxxxxxx/ISK\r\n"), Err(ReadError::UnexpectedReply(_))));
        assert!(matches!(parse_identification_line(b"/IS"), Err(ReadError::UnexpectedReply(_))));
    }

    #[test]
    fn test_missing_slash_is_unexpected_reply() {
        assert!(matches!(parse_identification_line(b"ISK5MT174-0001\r\n"), Err(ReadError::UnexpectedReply(_))));
    }

    #[test]
    fn test_empty_line_is_no_response() {
        assert!(matches!(parse_identification_line(b""), Err(ReadError::NoResponse)));
    }

    #[test]
    fn test_extract_numeric_value() {
        assert_eq!(extract_numeric_value("0692930.505*kWh"), Some(692930.505));
        assert_eq!(extract_numeric_value("233.1*V"), Some(233.1));
        assert_eq!(extract_numeric_value("5"), Some(5.0));
        assert_eq!(extract_numeric_value("FDF5"), None);
        assert_eq!(extract_numeric_value(""), None);
    }

    #[test]
    fn test_extract_unit() {
        assert_eq!(extract_unit("0692930.505*kWh"), Some("kWh".to_string()));
        assert_eq!(extract_unit("0.866"), None);
        assert_eq!(extract_unit("1*"), None);
    }
}
