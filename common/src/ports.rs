//! Capability traits the control loop is written against.
//!
//! Runtimes implement these over real pins, WiFi and HTTP on the device, or
//! over simulated state on the host. Tests use recording fakes.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("analog read failed: {0}")]
    Adc(String),
    #[error("gpio access failed: {0}")]
    Gpio(String),
    #[error("display write failed: {0}")]
    Display(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("network is not connected")]
    Offline,
    #[error("relay answered with HTTP {0}")]
    Rejected(u16),
    #[error("relay request failed: {0}")]
    Transport(String),
}

/// Input side of the board.
pub trait Sensors {
    /// Raw analog reading of the temperature channel.
    fn read_temperature_raw(&mut self) -> Result<u16, HardwareError>;

    /// Logic level of the flame sensor output (`true` = high).
    fn flame_line_high(&mut self) -> Result<bool, HardwareError>;

    /// Logic level of the pulled-up acknowledgment button (`true` = high).
    fn button_line_high(&mut self) -> Result<bool, HardwareError>;
}

/// Output side of the board: LED and buzzer are always switched together.
pub trait Actuators {
    fn set_alarm_outputs(&mut self, on: bool) -> Result<(), HardwareError>;
}

pub trait Connectivity {
    fn is_up(&mut self) -> bool;

    /// Blocks for at most `timeout_ms`; returns whether the link came up.
    fn reconnect(&mut self, timeout_ms: u64) -> bool;
}

pub trait Notifier {
    fn send(&mut self, message: &str) -> Result<(), NotifyError>;
}

/// Two-line character display.
pub trait TextDisplay {
    fn render(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError>;
}
