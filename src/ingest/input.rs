/// Validation of raw measurement input.
///
/// Turns the text tokens a caller collected (from a prompt, a command line,
/// a form) into a `Measurement`, or reports which field was rejected and why.
/// There is no retry loop here: a caller that wants to re-prompt matches on
/// the `ValidationError` and asks again.

use thiserror::Error;

use crate::model::Measurement;

/// Tokens accepted as "alert raised": `y`, and `s` (sim) as typed by
/// operators used to the Portuguese prompt.
pub const ALERT_INPUT_YES: [&str; 2] = ["y", "s"];
/// Token accepted as "no alert", the same in both languages.
pub const ALERT_INPUT_NO: &str = "n";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("city name must not be empty")]
    EmptyCity,
    #[error("water level '{0}' is not a number")]
    WaterLevelNotNumeric(String),
    #[error("water level {0} must be a finite, non-negative number of metres")]
    WaterLevelOutOfRange(f64),
    #[error("rain intensity '{0}' is not a whole number")]
    RainNotInteger(String),
    #[error("rain intensity {0} must be between 0 and 100")]
    RainOutOfRange(i64),
    #[error("civil defense alert must be 'y' (or 's') or 'n', got '{0}'")]
    InvalidAlertToken(String),
}

/// Trims the city name and capitalises each word ("  porto alegre " →
/// "Porto Alegre").
pub fn parse_city(raw: &str) -> Result<String, ValidationError> {
    let words: Vec<String> = raw
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        return Err(ValidationError::EmptyCity);
    }
    Ok(words.join(" "))
}

pub fn parse_water_level(raw: &str) -> Result<f64, ValidationError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::WaterLevelNotNumeric(raw.trim().to_string()))?;

    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::WaterLevelOutOfRange(value));
    }
    Ok(value)
}

pub fn parse_rain_intensity(raw: &str) -> Result<u8, ValidationError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::RainNotInteger(raw.trim().to_string()))?;

    if !(0..=100).contains(&value) {
        return Err(ValidationError::RainOutOfRange(value));
    }
    Ok(value as u8)
}

/// Accepts exactly `y`, `s` or `n` (case-insensitive, surrounding whitespace
/// ignored).
pub fn parse_alert(raw: &str) -> Result<bool, ValidationError> {
    let token = raw.trim().to_lowercase();
    if ALERT_INPUT_YES.contains(&token.as_str()) {
        Ok(true)
    } else if token == ALERT_INPUT_NO {
        Ok(false)
    } else {
        Err(ValidationError::InvalidAlertToken(raw.trim().to_string()))
    }
}

/// Validates all four fields, reporting the first one that fails.
pub fn validate_measurement(
    city: &str,
    water_level: &str,
    rain_intensity: &str,
    alert: &str,
) -> Result<Measurement, ValidationError> {
    Ok(Measurement {
        city: parse_city(city)?,
        water_level: parse_water_level(water_level)?,
        rain_intensity: parse_rain_intensity(rain_intensity)?,
        civil_defense_alert: parse_alert(alert)?,
    })
}
