//! Display formatting for console values
//!
//! Converts raw protocol values into what users see (fader levels in dB),
//! and hex dumps for logs.

use crate::protocol::Parameter;
use crate::state::ParamValue;

/// Raw fader value the console uses for "fully down"
pub const FADER_OFF: u16 = 0;

/// Render a raw 7-bit fader value in dB
///
/// `dB = raw * 64 / 127 - 54`, one decimal place, explicit `+` for positive
/// levels, `-inf` for the off position.
pub fn fader_to_db(raw: u16) -> String {
    if raw == FADER_OFF {
        return "-inf".to_string();
    }

    let db = f64::from(raw) * 64.0 / 127.0 - 54.0;
    let rounded = (db * 10.0).round() / 10.0;

    if rounded > 0.0 {
        format!("+{:.1}", rounded)
    } else if rounded == 0.0 {
        "0.0".to_string()
    } else {
        format!("{:.1}", rounded)
    }
}

/// Display value for a parameter; only faders are converted
pub fn format_value(parameter: Parameter, value: &ParamValue) -> String {
    match (parameter, value) {
        (Parameter::Fader, ParamValue::Number(raw)) => fader_to_db(*raw),
        (_, other) => other.to_string(),
    }
}

/// Format bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
