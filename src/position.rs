//! APRS position encoding: degrees and decimal minutes with hemisphere letters.

use crate::wx::EncodeError;

/// Encode a (longitude, latitude) pair of decimal degrees as the APRS
/// position token `DDMM.mmN/DDDMM.mmW`.
///
/// Longitude must be within [-180, 180] and latitude within [-90, 90]; the
/// hemisphere letter carries the sign.
pub fn format_position(longitude: f64, latitude: f64) -> Result<String, EncodeError> {
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(EncodeError::OutOfRange {
            field: "longitude",
            value: longitude,
            min: -180.0,
            max: 180.0,
        });
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(EncodeError::OutOfRange {
            field: "latitude",
            value: latitude,
            min: -90.0,
            max: 90.0,
        });
    }

    let (lat_hemisphere, lat) = if latitude < 0.0 {
        ('S', -latitude)
    } else {
        ('N', latitude)
    };
    let (lon_hemisphere, lon) = if longitude < 0.0 {
        ('W', -longitude)
    } else {
        ('E', longitude)
    };

    Ok(format!(
        "{:02}{}{}/{:03}{}{}",
        lat.floor() as u32,
        format_minutes(lat),
        lat_hemisphere,
        lon.floor() as u32,
        format_minutes(lon),
        lon_hemisphere,
    ))
}

/// The fractional-degree part as zero-padded decimal minutes (`MM.mm`).
/// Minutes that would round up to 60.00 are clamped to 59.99 so the token
/// stays a valid minutes value.
fn format_minutes(degrees: f64) -> String {
    let mut minutes = (degrees - degrees.floor()) * 60.0;
    if (minutes * 100.0).round() >= 6000.0 {
        minutes = 59.99;
    }
    format!("{minutes:05.2}")
}
