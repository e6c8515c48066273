pub const LCD_COLUMNS: usize = 16;

pub const ALERT_LINES: (&str, &str) = ("!! FIRE ALARM !!", "Press btn to ack");
pub const SPLASH_LINES: (&str, &str) = ("Fire Alarm", "Starting...");
pub const CONNECTING_LINES: (&str, &str) = ("WiFi connecting", "");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub line1: String,
    pub line2: String,
}

impl Screen {
    pub fn new(line1: &str, line2: &str) -> Self {
        Self {
            line1: fit_line(line1),
            line2: fit_line(line2),
        }
    }

    pub fn telemetry(temperature_c: f32, flame_detected: bool) -> Self {
        let flame = if flame_detected { "YES" } else { "NO" };
        Self::new(
            &format!("Temp: {temperature_c:.1} C"),
            &format!("Flame: {flame}"),
        )
    }

    pub fn alert() -> Self {
        Self::new(ALERT_LINES.0, ALERT_LINES.1)
    }
}

/// Truncates to the display width on a character boundary.
pub fn fit_line(text: &str) -> String {
    text.chars().take(LCD_COLUMNS).collect()
}
