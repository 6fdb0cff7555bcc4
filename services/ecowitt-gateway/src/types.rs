use std::collections::HashMap;

use serde::Serialize;
use url::form_urlencoded;

/// Fields of one gateway upload, as received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReading {
    fields: HashMap<String, String>,
}

impl RawReading {
    /// Parse an `application/x-www-form-urlencoded` body. A repeated key keeps
    /// its first value.
    pub fn from_form(body: &[u8]) -> Self {
        let mut fields = HashMap::new();
        for (key, value) in form_urlencoded::parse(body) {
            fields
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self { fields }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Numeric value of `key`, NaN when absent or not a number.
    pub fn number(&self, key: &str) -> f64 {
        self.get(key).map_or(f64::NAN, parse_float)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RawReading
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = HashMap::new();
        for (key, value) in iter {
            fields.entry(key.into()).or_insert_with(|| value.into());
        }
        Self { fields }
    }
}

/// Lenient float parsing: skips leading whitespace and reads the longest
/// numeric prefix, so `"12.5mph"` is 12.5 and `"--"` is NaN. Gateways in the
/// field occasionally send trailing junk.
pub fn parse_float(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if bytes.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }

    // exponent only counts when at least one digit follows it
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// One converted value bound for a Signal K path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub path: String,
    pub value: f64,
}

/// All records derived from one upload, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateBatch {
    pub values: Vec<MeasurementRecord>,
}

impl UpdateBatch {
    pub fn push(&mut self, path: impl Into<String>, value: f64) {
        self.values.push(MeasurementRecord {
            path: path.into(),
            value,
        });
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Outbound event handed to the bus: `{"updates":[{"values":[...]}]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delta {
    pub updates: Vec<UpdateBatch>,
}

impl From<UpdateBatch> for Delta {
    fn from(batch: UpdateBatch) -> Self {
        Delta {
            updates: vec![batch],
        }
    }
}
