//! Turns one gateway upload into one batch of Signal K values.

use crate::config::{ChannelPaths, PathMapping};
use crate::convert::{
    degrees_to_radians, fahrenheit_to_kelvin, inches_to_mm, inhg_to_pascal, mph_to_mps,
    percent_to_ratio,
};
use crate::types::{RawReading, UpdateBatch};

pub const OUTSIDE_PRESSURE_PATH: &str = "environment.ecowitt.outside.pressure";
pub const SOLAR_RADIATION_PATH: &str = "environment.ecowitt.outside.solarradiation";
pub const UV_PATH: &str = "environment.ecowitt.outside.uv";
pub const RRAIN_PIEZO_PATH: &str = "environment.ecowitt.outside.rrain_piezo";
pub const DRAIN_PIEZO_PATH: &str = "environment.ecowitt.outside.drain_piezo";
pub const WIND_SPEED_APPARENT_PATH: &str = "environment.wind.speedApparent";
pub const WIND_ANGLE_APPARENT_PATH: &str = "environment.wind.angleApparent";

/// Upload keys of one auxiliary sensor channel and its slot in `PathMapping::channels`.
struct Channel {
    number: u8,
    temperature_key: &'static str,
    humidity_key: &'static str,
    slot: usize,
}

const CHANNELS: [Channel; 3] = [
    Channel {
        number: 1,
        temperature_key: "temp1f",
        humidity_key: "humidity1",
        slot: 0,
    },
    Channel {
        number: 2,
        temperature_key: "temp2f",
        humidity_key: "humidity2",
        slot: 1,
    },
    Channel {
        number: 3,
        temperature_key: "temp3f",
        humidity_key: "humidity3",
        slot: 2,
    },
];

fn configured(path: &Option<String>) -> Option<&str> {
    path.as_deref().filter(|p| !p.is_empty())
}

/// Convert every recognised field of `reading`.
///
/// The eleven built-in gateway readings are always emitted, NaN when the
/// field is missing. Channel and wind readings are only emitted when their
/// key is present, and channels additionally need a configured path.
/// Path overrides only rename the six configurable gateway readings; the
/// pressure mirror, solar, UV, rain and wind paths never change.
pub fn transform(reading: &RawReading, paths: &PathMapping) -> UpdateBatch {
    let mut batch = UpdateBatch::default();

    let baromrelin = inhg_to_pascal(reading.number("baromrelin"));
    batch.push(&paths.tempinf, fahrenheit_to_kelvin(reading.number("tempinf")));
    batch.push(&paths.humidityin, percent_to_ratio(reading.number("humidityin")));
    batch.push(OUTSIDE_PRESSURE_PATH, baromrelin);
    batch.push(&paths.baromrelin, baromrelin);
    batch.push(&paths.baromabsin, inhg_to_pascal(reading.number("baromabsin")));
    batch.push(&paths.tempf, fahrenheit_to_kelvin(reading.number("tempf")));
    batch.push(&paths.humidity, percent_to_ratio(reading.number("humidity")));
    batch.push(SOLAR_RADIATION_PATH, reading.number("solarradiation"));
    batch.push(UV_PATH, reading.number("uv"));
    batch.push(RRAIN_PIEZO_PATH, inches_to_mm(reading.number("rrain_piezo")));
    batch.push(DRAIN_PIEZO_PATH, inches_to_mm(reading.number("drain_piezo")));

    for channel in &CHANNELS {
        let slot: &ChannelPaths = &paths.channels[channel.slot];
        if reading.contains(channel.temperature_key) {
            let kelvin = fahrenheit_to_kelvin(reading.number(channel.temperature_key));
            tracing::debug!(channel = channel.number, kelvin, "channel temperature");
            if let Some(path) = configured(&slot.temperature) {
                batch.push(path, kelvin);
            }
        }
        if reading.contains(channel.humidity_key) {
            let ratio = percent_to_ratio(reading.number(channel.humidity_key));
            tracing::debug!(channel = channel.number, ratio, "channel humidity");
            if let Some(path) = configured(&slot.humidity) {
                batch.push(path, ratio);
            }
        }
    }

    if reading.contains("windspeedmph") {
        batch.push(
            WIND_SPEED_APPARENT_PATH,
            mph_to_mps(reading.number("windspeedmph")),
        );
    }
    if reading.contains("winddir") {
        batch.push(
            WIND_ANGLE_APPARENT_PATH,
            degrees_to_radians(reading.number("winddir")),
        );
    }

    batch
}
