//! Imperial to SI conversions for gateway readings.
//!
//! Every function is total: a NaN input (missing or unparsable field) comes
//! back out as NaN. Rounding follows JavaScript `Math.round`, i.e. halves go
//! toward positive infinity, so downstream consumers see the same numbers the
//! gateway plugin has always produced.

fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn round_hundredths(value: f64) -> f64 {
    round_half_up(value * 100.0) / 100.0
}

/// Inches of mercury to pascal, whole pascal.
pub fn inhg_to_pascal(inhg: f64) -> f64 {
    round_half_up(inhg * 3386.0)
}

/// Fahrenheit to kelvin, whole kelvin.
pub fn fahrenheit_to_kelvin(f: f64) -> f64 {
    round_half_up((f - 32.0) * 5.0 / 9.0 + 273.15)
}

/// Degrees to radians, two decimals.
pub fn degrees_to_radians(deg: f64) -> f64 {
    round_hundredths(deg * 0.01745)
}

/// Miles per hour to metres per second, two decimals.
pub fn mph_to_mps(mph: f64) -> f64 {
    round_hundredths(mph * 0.44704)
}

/// Inches to millimetres, whole millimetre.
pub fn inches_to_mm(inches: f64) -> f64 {
    round_half_up(inches * 2.54)
}

/// Relative humidity percentage (0-100) to a 0.0-1.0 ratio. Not rounded.
pub fn percent_to_ratio(percent: f64) -> f64 {
    percent / 100.0
}
