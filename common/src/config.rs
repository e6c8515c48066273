use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_RELAY_ENDPOINT: &str = "https://api.callmebot.com/whatsapp.php";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    pub temp_threshold_c: f32,
    pub alarm_timeout_ms: u64,
    pub temp_read_interval_ms: u64,
    pub wifi_retry_interval_ms: u64,
    pub debounce_ms: u64,
    pub wifi_connect_timeout_ms: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            temp_threshold_c: 60.0,
            alarm_timeout_ms: 60_000,
            temp_read_interval_ms: 500,
            wifi_retry_interval_ms: 5_000,
            debounce_ms: 50,
            wifi_connect_timeout_ms: 20_000,
        }
    }
}

/// Transfer function of the analog temperature front end (LM35 style, 10 mV/°C).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalogFrontEnd {
    pub reference_mv: f32,
    pub raw_max: u16,
    pub mv_per_degree_c: f32,
}

impl Default for AnalogFrontEnd {
    fn default() -> Self {
        Self {
            reference_mv: 3_300.0,
            raw_max: 4_095,
            mv_per_degree_c: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub endpoint: String,
    pub phone: String,
    pub api_key: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RELAY_ENDPOINT.to_string(),
            phone: String::new(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinConfig {
    pub flame_pin: i32,
    pub button_pin: i32,
    pub led_pin: i32,
    pub buzzer_pin: i32,
    pub lcd_sda_pin: i32,
    pub lcd_scl_pin: i32,
    pub lcd_address: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            flame_pin: 27,
            button_pin: 26,
            led_pin: 25,
            buzzer_pin: 33,
            lcd_sda_pin: 21,
            lcd_scl_pin: 22,
            lcd_address: 0x27,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub analog: AnalogFrontEnd,
    pub network: NetworkConfig,
    pub relay: RelayConfig,
    #[serde(default)]
    pub pins: PinConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("wifi ssid is not configured")]
    MissingWifiCredentials,
    #[error("alert relay phone or api key is not configured")]
    MissingRelayCredentials,
}

impl AlarmConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.temp_threshold_c.is_finite() {
            self.temp_threshold_c = defaults.temp_threshold_c;
        }
        if self.alarm_timeout_ms == 0 {
            self.alarm_timeout_ms = defaults.alarm_timeout_ms;
        }
        if self.temp_read_interval_ms == 0 {
            self.temp_read_interval_ms = defaults.temp_read_interval_ms;
        }
        if self.wifi_retry_interval_ms == 0 {
            self.wifi_retry_interval_ms = defaults.wifi_retry_interval_ms;
        }
        if self.wifi_connect_timeout_ms == 0 {
            self.wifi_connect_timeout_ms = defaults.wifi_connect_timeout_ms;
        }
    }
}

impl AnalogFrontEnd {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.raw_max == 0 {
            self.raw_max = defaults.raw_max;
        }
        if !(self.reference_mv.is_finite() && self.reference_mv > 0.0) {
            self.reference_mv = defaults.reference_mv;
        }
        if !(self.mv_per_degree_c.is_finite() && self.mv_per_degree_c > 0.0) {
            self.mv_per_degree_c = defaults.mv_per_degree_c;
        }
    }
}

impl RuntimeConfig {
    /// Defaults with credentials baked in at build time.
    pub fn from_build_env() -> Self {
        let mut runtime = Self::default();
        runtime.network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or_default().to_string();
        runtime.network.wifi_pass = option_env!("WIFI_PASS").unwrap_or_default().to_string();
        runtime.relay.phone = option_env!("ALERT_PHONE").unwrap_or_default().to_string();
        runtime.relay.api_key = option_env!("ALERT_API_KEY").unwrap_or_default().to_string();
        if let Some(endpoint) = option_env!("ALERT_RELAY_URL") {
            runtime.relay.endpoint = endpoint.to_string();
        }
        runtime
    }

    pub fn sanitize(&mut self) {
        self.alarm.sanitize();
        self.analog.sanitize();
        if self.relay.endpoint.trim().is_empty() {
            self.relay.endpoint = DEFAULT_RELAY_ENDPOINT.to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.wifi_ssid.trim().is_empty() {
            return Err(ConfigError::MissingWifiCredentials);
        }
        if self.relay.phone.trim().is_empty() || self.relay.api_key.trim().is_empty() {
            return Err(ConfigError::MissingRelayCredentials);
        }
        Ok(())
    }

    /// Copy safe to print: passwords and keys are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.network.wifi_pass = mask(&copy.network.wifi_pass);
        copy.relay.api_key = mask(&copy.relay.api_key);
        copy
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = AlarmConfig::default();
        assert_eq!(config.temp_threshold_c, 60.0);
        assert_eq!(config.alarm_timeout_ms, 60_000);
        assert_eq!(config.temp_read_interval_ms, 500);
        assert_eq!(config.wifi_retry_interval_ms, 5_000);
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.wifi_connect_timeout_ms, 20_000);
    }

    #[test]
    fn sanitize_restores_zero_intervals() {
        let mut config = AlarmConfig {
            temp_threshold_c: f32::NAN,
            alarm_timeout_ms: 0,
            temp_read_interval_ms: 0,
            wifi_retry_interval_ms: 0,
            debounce_ms: 0,
            wifi_connect_timeout_ms: 0,
        };
        config.sanitize();

        assert_eq!(config.temp_threshold_c, 60.0);
        assert_eq!(config.alarm_timeout_ms, 60_000);
        assert_eq!(config.temp_read_interval_ms, 500);
        assert_eq!(config.wifi_retry_interval_ms, 5_000);
        // A zero debounce window is legal: any press counts.
        assert_eq!(config.debounce_ms, 0);
        assert_eq!(config.wifi_connect_timeout_ms, 20_000);
    }

    #[test]
    fn validate_requires_relay_credentials() {
        let mut runtime = RuntimeConfig::default();
        runtime.network.wifi_ssid = "home".to_string();
        assert_eq!(
            runtime.validate(),
            Err(ConfigError::MissingRelayCredentials)
        );

        runtime.relay.phone = "+15550100".to_string();
        runtime.relay.api_key = "123456".to_string();
        assert_eq!(runtime.validate(), Ok(()));
    }

    #[test]
    fn redacted_masks_secrets_only() {
        let mut runtime = RuntimeConfig::default();
        runtime.network.wifi_ssid = "home".to_string();
        runtime.network.wifi_pass = "hunter2".to_string();
        runtime.relay.phone = "+15550100".to_string();
        runtime.relay.api_key = "123456".to_string();

        let redacted = runtime.redacted();
        assert_eq!(redacted.network.wifi_ssid, "home");
        assert_eq!(redacted.network.wifi_pass, "***");
        assert_eq!(redacted.relay.phone, "+15550100");
        assert_eq!(redacted.relay.api_key, "***");
    }

    #[test]
    fn runtime_config_round_trips_through_json_without_optional_sections() {
        let raw = r#"{
            "alarm": {
                "temp_threshold_c": 55.0,
                "alarm_timeout_ms": 30000,
                "temp_read_interval_ms": 250,
                "wifi_retry_interval_ms": 5000,
                "debounce_ms": 50,
                "wifi_connect_timeout_ms": 20000
            },
            "network": { "wifi_ssid": "home", "wifi_pass": "" },
            "relay": { "endpoint": "", "phone": "1", "api_key": "2" }
        }"#;
        let mut runtime: RuntimeConfig = serde_json::from_str(raw).unwrap();
        runtime.sanitize();

        assert_eq!(runtime.alarm.temp_threshold_c, 55.0);
        assert_eq!(runtime.analog, AnalogFrontEnd::default());
        assert_eq!(runtime.pins, PinConfig::default());
        assert_eq!(runtime.relay.endpoint, DEFAULT_RELAY_ENDPOINT);
    }
}
