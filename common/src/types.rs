use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmState {
    Idle,
    Active,
}

impl AlarmState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
        }
    }
}

/// Result of a single notification attempt, kept for the status surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub message: String,
    pub delivered: bool,
    pub error: Option<String>,
    #[serde(rename = "atMs")]
    pub at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmStatus {
    #[serde(rename = "temperatureC")]
    pub temperature_c: f32,
    #[serde(rename = "flameDetected")]
    pub flame_detected: bool,
    #[serde(rename = "fireDetected")]
    pub fire_detected: bool,
    pub state: &'static str,
    #[serde(rename = "alarmActive")]
    pub alarm_active: bool,
    #[serde(rename = "fireAlertSent")]
    pub fire_alert_sent: bool,
    #[serde(rename = "alarmElapsedMs")]
    pub alarm_elapsed_ms: u64,
    #[serde(rename = "alarmRemainingMs")]
    pub alarm_remaining_ms: u64,
    #[serde(rename = "linkUp")]
    pub link_up: bool,
    #[serde(rename = "lastNotification")]
    pub last_notification: Option<NotificationRecord>,
}

impl Default for AlarmStatus {
    fn default() -> Self {
        Self {
            temperature_c: 0.0,
            flame_detected: false,
            fire_detected: false,
            state: AlarmState::Idle.as_str(),
            alarm_active: false,
            fire_alert_sent: false,
            alarm_elapsed_ms: 0,
            alarm_remaining_ms: 0,
            link_up: false,
            last_notification: None,
        }
    }
}
