use std::net::SocketAddr;

use url::Url;

pub const DEFAULT_PORT: u16 = 1923;

fn read_env(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

fn read_env_optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Unset keeps the default, set-but-empty disables the slot.
fn read_env_slot(key: &str, default: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) => Some(v.trim().to_string()).filter(|v| !v.is_empty()),
        Err(_) => Some(default.to_string()),
    }
}

fn ensure_trailing_slash(mut value: String) -> String {
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

/// Output paths for one auxiliary temperature/humidity channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelPaths {
    pub temperature: Option<String>,
    pub humidity: Option<String>,
}

/// Where each configurable reading lands in the Signal K tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PathMapping {
    pub tempinf: String,
    pub humidityin: String,
    pub baromrelin: String,
    pub baromabsin: String,
    pub tempf: String,
    pub humidity: String,
    pub channels: [ChannelPaths; 3],
}

impl Default for PathMapping {
    fn default() -> Self {
        Self {
            tempinf: "environment.ecowitt.inside.temperature".into(),
            humidityin: "environment.ecowitt.inside.humidity".into(),
            baromrelin: "environment.ecowitt.inside.relpressure".into(),
            baromabsin: "environment.ecowitt.inside.abspressure".into(),
            tempf: "environment.ecowitt.outside.temperature".into(),
            humidity: "environment.ecowitt.outside.humidity".into(),
            channels: [1, 2, 3].map(|n| ChannelPaths {
                temperature: Some(format!("environment.ecowitt.{n}.temperature")),
                humidity: Some(format!("environment.ecowitt.{n}.humidity")),
            }),
        }
    }
}

impl PathMapping {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut channels = defaults.channels.clone();
        for (n, (slot, default)) in channels.iter_mut().zip(&defaults.channels).enumerate() {
            let n = n + 1;
            slot.temperature = read_env_slot(
                &format!("ECOWITT_PATH_TEMP{n}"),
                default.temperature.as_deref().unwrap_or_default(),
            );
            slot.humidity = read_env_slot(
                &format!("ECOWITT_PATH_HUMIDITY{n}"),
                default.humidity.as_deref().unwrap_or_default(),
            );
        }
        Self {
            tempinf: read_env("ECOWITT_PATH_TEMPINF", &defaults.tempinf),
            humidityin: read_env("ECOWITT_PATH_HUMIDITYIN", &defaults.humidityin),
            baromrelin: read_env("ECOWITT_PATH_BAROMRELIN", &defaults.baromrelin),
            baromabsin: read_env("ECOWITT_PATH_BAROMABSIN", &defaults.baromabsin),
            tempf: read_env("ECOWITT_PATH_TEMPF", &defaults.tempf),
            humidity: read_env("ECOWITT_PATH_HUMIDITY", &defaults.humidity),
            channels,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub credentials: Option<(String, String)>,
    pub topic_prefix: String,
    pub ca_path: Option<String>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl MqttSettings {
    pub fn from_env() -> Self {
        let default_host = read_env("MQTT_HOST", "mqtt");
        let default_port: u16 = read_env("MQTT_PORT", "1883").parse().unwrap_or(1883);
        let (host, port) = match read_env_optional("MQTT_URL") {
            Some(url) => match Url::parse(&url) {
                Ok(u) => {
                    let host = u.host_str().unwrap_or(&default_host).to_string();
                    let port = u.port().unwrap_or(default_port);
                    (host, port)
                }
                Err(e) => {
                    tracing::warn!(
                        "MQTT_URL parse error: {e}; falling back to {}:{}",
                        default_host,
                        default_port
                    );
                    (default_host, default_port)
                }
            },
            None => (default_host, default_port),
        };

        Self {
            host,
            port,
            client_id: read_env("MQTT_CLIENT_ID", "ecowitt-gateway"),
            credentials: read_env_optional("MQTT_USERNAME")
                .map(|user| (user, read_env("MQTT_PASSWORD", ""))),
            topic_prefix: ensure_trailing_slash(read_env("MQTT_TOPIC_PREFIX", "signalk/delta/")),
            ca_path: read_env_optional("MQTT_CA_PATH"),
            cert_path: read_env_optional("MQTT_CERT_PATH"),
            key_path: read_env_optional("MQTT_KEY_PATH"),
        }
    }
}

/// Everything the service reads at startup. Immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub paths: PathMapping,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            paths: PathMapping::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            host: read_env("ECOWITT_HOST", "0.0.0.0"),
            port: read_env("ECOWITT_PORT", "1923")
                .parse()
                .unwrap_or(DEFAULT_PORT),
            paths: PathMapping::from_env(),
        }
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
