//! APRS weather (WX) report encoding.
//!
//! Builds the textual body of an APRS weather report from a structured
//! observation. Observation inputs are SI/metric (°C, m/s, mm, hPa, W/m²)
//! with ISO-8601 timestamps; every conversion to the imperial and mixed
//! units the WX format expects happens inside the encoders below, so
//! callers never pre-convert.
//!
//! Each encoder produces a fixed-width token. An absent measurement encodes
//! as the field's designated filler (dots), never as an error; a measurement
//! whose converted value falls outside the field's range is a validation
//! error raised before any network I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::packet::{Callsign, Via};
use crate::position::format_position;

/// Meters per second to miles per hour.
const MPS_TO_MPH: f64 = 2.236_936_29;
/// Millimeters to inches.
const MM_TO_INCH: f64 = 0.039_370_078_740_2;

/// A weather-station observation to be encoded into a WX report body.
///
/// Longitude and latitude are required to compose a report; everything else
/// is optional. The timestamp defaults to the current UTC instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    pub timestamp: Option<DateTime<Utc>>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub extension: Option<Extension>,
    pub weather: Option<Weather>,
    pub comment: Option<String>,
}

/// The instantaneous course/speed vector of the station.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Extension {
    /// Degrees clockwise from true north the wind is blowing from.
    pub course_deg: Option<f64>,
    /// Sustained wind speed in m/s.
    pub speed_m_per_s: Option<f64>,
}

/// Weather measurements, each independently optional.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Weather {
    /// Gust speed in m/s.
    pub wind_gust: Option<f64>,
    /// Temperature in °C.
    pub temperature: Option<f64>,
    /// Rainfall over the last hour, in mm.
    pub rain_1h: Option<f64>,
    /// Rainfall over the last 24 hours, in mm.
    pub rain_24h: Option<f64>,
    /// Rainfall since local midnight, in mm.
    pub rain_since_midnight: Option<f64>,
    /// Barometric pressure in hPa.
    pub pressure: Option<f64>,
    /// Relative humidity in percent.
    pub humidity: Option<f64>,
    /// Irradiance in W/m².
    pub luminosity: Option<f64>,
}

/// The payload shape accepted from callers: optional per-call addressing
/// overrides plus an observation, either nested under `data` or spread at
/// the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendRequest {
    pub from: Option<Callsign>,
    pub to: Option<Callsign>,
    pub via: Option<Via>,
    pub data: Option<Observation>,
    #[serde(flatten)]
    pub observation: Observation,
}

impl SendRequest {
    /// The observation to encode; a nested `data` block wins over fields
    /// spread at the top level.
    pub fn observation(&self) -> &Observation {
        self.data.as_ref().unwrap_or(&self.observation)
    }
}

/// Validation failure raised while encoding an observation or framing a
/// packet, always before any network activity.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// A converted measurement fell outside the representable range of its
    /// WX report field.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// A mandatory observation field was absent.
    Missing(&'static str),
    /// The From callsign formatted to an empty string.
    EmptyCallsign,
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(f, "{field} value {value} is out of range <{min}, {max}>")
            }
            EncodeError::Missing(field) => write!(f, "missing {field} value"),
            EncodeError::EmptyCallsign => write!(f, "missing From callsign"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// `@DDHHMMz`: UTC day of month, hour, and minute, each two digits.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("@%d%H%Mz").to_string()
}

/// Temperature in °C encoded as whole °F, right-justified to three
/// characters (`t077`). A negative sign consumes a digit slot (`t-05`).
pub fn format_temperature(celsius: Option<f64>) -> Result<String, EncodeError> {
    let Some(celsius) = celsius else {
        return Ok("t...".to_string());
    };
    let fahrenheit = (celsius * 9.0 / 5.0).round() as i64 + 32;
    if !(-99..=999).contains(&fahrenheit) {
        return Err(EncodeError::OutOfRange {
            field: "temperature",
            value: fahrenheit as f64,
            min: -99.0,
            max: 999.0,
        });
    }
    if fahrenheit < 0 {
        Ok(format!("t-{:02}", -fahrenheit))
    } else {
        Ok(format!("t{fahrenheit:03}"))
    }
}

/// Wind direction in degrees clockwise from true north (`_200`). The token
/// `000` is reserved for "unavailable", so due north encodes as 360.
pub fn format_wind_direction(degrees: Option<f64>) -> Result<String, EncodeError> {
    let Some(degrees) = degrees else {
        return Ok("_...".to_string());
    };
    let mut value = degrees.round_ties_even() as i64;
    if !(0..=360).contains(&value) {
        return Err(EncodeError::OutOfRange {
            field: "wind direction",
            value: value as f64,
            min: 0.0,
            max: 360.0,
        });
    }
    if value == 0 {
        value = 360;
    }
    Ok(format!("_{value:03}"))
}

/// Speed in m/s encoded as three digits of whole mph, with no prefix
/// letter; the composer supplies `/` for sustained speed and `g` for gusts.
pub fn format_mph_speed(m_per_s: Option<f64>) -> Result<String, EncodeError> {
    let Some(m_per_s) = m_per_s else {
        return Ok("...".to_string());
    };
    let mph = (m_per_s * MPS_TO_MPH).round_ties_even() as i64;
    if !(0..=999).contains(&mph) {
        return Err(EncodeError::OutOfRange {
            field: "wind speed",
            value: mph as f64,
            min: 0.0,
            max: 999.0,
        });
    }
    Ok(format!("{mph:03}"))
}

/// Rainfall in mm encoded as three digits of hundredths of an inch. The
/// composer prefixes `r`, `p`, or `P` and omits the sub-field entirely when
/// the measurement is absent, so there is no filler form.
pub fn format_rain(millimeters: f64) -> Result<String, EncodeError> {
    let hundredths = (millimeters * MM_TO_INCH * 100.0).round_ties_even() as i64;
    if !(0..=999).contains(&hundredths) {
        return Err(EncodeError::OutOfRange {
            field: "rain",
            value: hundredths as f64,
            min: 0.0,
            max: 999.0,
        });
    }
    Ok(format!("{hundredths:03}"))
}

/// Barometric pressure in hPa encoded as five digits of tenths of a
/// millibar (`b10132`).
pub fn format_pressure(hpa: Option<f64>) -> Result<String, EncodeError> {
    let Some(hpa) = hpa else {
        return Ok("b.....".to_string());
    };
    let tenths = (hpa * 10.0).round_ties_even() as i64;
    if !(0..=99999).contains(&tenths) {
        return Err(EncodeError::OutOfRange {
            field: "pressure",
            value: tenths as f64,
            min: 0.0,
            max: 99999.0,
        });
    }
    Ok(format!("b{tenths:05}"))
}

/// Relative humidity in percent (`h65`). APRS represents 100% as `h00`,
/// which leaves it indistinguishable from 0%; the ambiguity is the
/// format's and is carried here unchanged.
pub fn format_humidity(percent: Option<f64>) -> Result<String, EncodeError> {
    let Some(percent) = percent else {
        return Ok("h..".to_string());
    };
    let mut value = percent.round_ties_even() as i64;
    if !(0..=100).contains(&value) {
        return Err(EncodeError::OutOfRange {
            field: "relative humidity",
            value: value as f64,
            min: 0.0,
            max: 100.0,
        });
    }
    if value == 100 {
        value = 0;
    }
    Ok(format!("h{value:02}"))
}

/// Irradiance in W/m². Values below 1000 encode as `LNNN`; 1000 and above
/// switch the prefix to lowercase `l` and drop the thousands digit, so
/// `l999` means 1999 W/m².
pub fn format_luminosity(w_per_m2: Option<f64>) -> Result<String, EncodeError> {
    let Some(w_per_m2) = w_per_m2 else {
        return Ok("L...".to_string());
    };
    let mut value = w_per_m2.round_ties_even() as i64;
    if !(0..=1999).contains(&value) {
        return Err(EncodeError::OutOfRange {
            field: "irradiance",
            value: value as f64,
            min: 0.0,
            max: 1999.0,
        });
    }
    let prefix = if value >= 1000 {
        value -= 1000;
        'l'
    } else {
        'L'
    };
    Ok(format!("{prefix}{value:03}"))
}

/// Assemble the complete WX report body for an observation.
///
/// The field order is fixed by the WX report format: timestamp, position,
/// wind direction and speed, gust, temperature, then the rain, pressure,
/// humidity, and luminosity fields (each appended only when its measurement
/// is present), followed by the verbatim comment. Position is mandatory;
/// the timestamp defaults to now.
pub fn format_wx_report(observation: &Observation) -> Result<String, EncodeError> {
    let longitude = observation
        .longitude
        .ok_or(EncodeError::Missing("longitude"))?;
    let latitude = observation
        .latitude
        .ok_or(EncodeError::Missing("latitude"))?;
    let timestamp = observation.timestamp.unwrap_or_else(Utc::now);
    let extension = observation.extension.unwrap_or_default();
    let weather = observation.weather.unwrap_or_default();

    let mut body = format_timestamp(&timestamp);
    body.push_str(&format_position(longitude, latitude)?);
    body.push_str(&format_wind_direction(extension.course_deg)?);
    body.push('/');
    body.push_str(&format_mph_speed(extension.speed_m_per_s)?);
    body.push('g');
    body.push_str(&format_mph_speed(weather.wind_gust)?);
    body.push_str(&format_temperature(weather.temperature)?);
    if let Some(rain) = weather.rain_1h {
        body.push('r');
        body.push_str(&format_rain(rain)?);
    }
    if let Some(rain) = weather.rain_24h {
        body.push('p');
        body.push_str(&format_rain(rain)?);
    }
    if let Some(rain) = weather.rain_since_midnight {
        body.push('P');
        body.push_str(&format_rain(rain)?);
    }
    if weather.pressure.is_some() {
        body.push_str(&format_pressure(weather.pressure)?);
    }
    if weather.humidity.is_some() {
        body.push_str(&format_humidity(weather.humidity)?);
    }
    if weather.luminosity.is_some() {
        body.push_str(&format_luminosity(weather.luminosity)?);
    }
    if let Some(comment) = &observation.comment {
        body.push_str(comment);
    }
    Ok(body)
}
