pub mod alarm;
pub mod button;
pub mod config;
pub mod connectivity;
pub mod display;
pub mod engine;
pub mod evaluator;
pub mod notify;
pub mod ports;
pub mod sampler;
pub mod types;

pub use alarm::{Activation, AlarmMachine};
pub use button::AckButton;
pub use config::{AlarmConfig, AnalogFrontEnd, ConfigError, PinConfig, RelayConfig, RuntimeConfig};
pub use connectivity::{ConnectivityCheck, ConnectivitySupervisor};
pub use display::Screen;
pub use engine::{AlarmEvent, FireAlarmEngine};
pub use evaluator::{evaluate, FireAssessment};
pub use notify::RelayRequest;
pub use ports::{Actuators, Connectivity, HardwareError, Notifier, NotifyError, Sensors, TextDisplay};
pub use types::{AlarmState, AlarmStatus, NotificationRecord};
