//! The per-tick control loop.
//!
//! Stages run in a fixed order on every tick: connectivity supervision,
//! sensor sampling, fire evaluation, the alarm state machine (activation,
//! acknowledgment, timeout), then the display. All loop state lives in
//! [`FireAlarmEngine`]; time is injected as monotonic milliseconds.

use log::{debug, info, warn};

use crate::{
    alarm::{Activation, AlarmMachine},
    button::AckButton,
    config::{AlarmConfig, AnalogFrontEnd},
    connectivity::{ConnectivityCheck, ConnectivitySupervisor},
    display::Screen,
    evaluator::{evaluate, FireAssessment},
    ports::{Actuators, Connectivity, Notifier, Sensors, TextDisplay},
    sampler::{flame_from_line, raw_to_celsius, TemperatureSampler},
    types::{AlarmState, AlarmStatus, NotificationRecord},
};

#[derive(Debug, Clone, PartialEq)]
pub enum AlarmEvent {
    TemperatureSampled(f32),
    FlameChanged(bool),
    Connectivity(ConnectivityCheck),
    Activated(Activation),
    Acknowledged,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct FireAlarmEngine {
    config: AlarmConfig,
    analog: AnalogFrontEnd,

    sampler: TemperatureSampler,
    supervisor: ConnectivitySupervisor,
    button: AckButton,
    alarm: AlarmMachine,

    temperature_c: f32,
    flame_detected: bool,
    fire: FireAssessment,
    link_up: bool,
    last_notification: Option<NotificationRecord>,
}

impl FireAlarmEngine {
    pub fn new(mut config: AlarmConfig, mut analog: AnalogFrontEnd) -> Self {
        config.sanitize();
        analog.sanitize();
        Self {
            sampler: TemperatureSampler::new(config.temp_read_interval_ms),
            supervisor: ConnectivitySupervisor::new(
                config.wifi_retry_interval_ms,
                config.wifi_connect_timeout_ms,
            ),
            button: AckButton::new(config.debounce_ms),
            alarm: AlarmMachine::new(config.alarm_timeout_ms),
            config,
            analog,
            temperature_c: 0.0,
            flame_detected: false,
            fire: FireAssessment::default(),
            link_up: false,
            last_notification: None,
        }
    }

    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }

    pub fn temperature_c(&self) -> f32 {
        self.temperature_c
    }

    pub fn flame_detected(&self) -> bool {
        self.flame_detected
    }

    pub fn fire(&self) -> &FireAssessment {
        &self.fire
    }

    pub fn state(&self) -> AlarmState {
        self.alarm.state()
    }

    pub fn is_alarm_active(&self) -> bool {
        self.alarm.is_active()
    }

    pub fn fire_alert_sent(&self) -> bool {
        self.alarm.fire_alert_sent()
    }

    pub fn alarm_started_at_ms(&self) -> Option<u64> {
        self.alarm.started_at_ms()
    }

    pub fn last_temp_read_ms(&self) -> Option<u64> {
        self.sampler.last_read_ms()
    }

    pub fn last_conn_check_ms(&self) -> u64 {
        self.supervisor.last_check_ms()
    }

    pub fn is_link_up(&self) -> bool {
        self.link_up
    }

    /// Records the outcome of the boot-time association.
    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }

    pub fn last_notification(&self) -> Option<&NotificationRecord> {
        self.last_notification.as_ref()
    }

    pub fn tick<H, C, N, D>(
        &mut self,
        now_ms: u64,
        hw: &mut H,
        link: &mut C,
        notifier: &mut N,
        display: &mut D,
    ) -> Vec<AlarmEvent>
    where
        H: Sensors + Actuators,
        C: Connectivity,
        N: Notifier,
        D: TextDisplay,
    {
        let mut events = Vec::new();

        if let Some(check) = self.supervisor.poll(now_ms, link) {
            self.link_up = check.link_up();
            events.push(AlarmEvent::Connectivity(check));
        }

        self.sample(now_ms, hw, &mut events);

        self.fire = evaluate(
            self.temperature_c,
            self.flame_detected,
            self.config.temp_threshold_c,
        );

        if self.fire.detected && !self.alarm.is_active() {
            let activation = self.alarm.activate(now_ms, &self.fire.message, hw, notifier);
            self.record_notification(now_ms, &activation);
            events.push(AlarmEvent::Activated(activation));
        } else if !self.fire.detected {
            self.alarm.clear_episode();
        }

        self.service_button(now_ms, hw, &mut events);

        if self.alarm.expire_if_due(now_ms, hw) {
            events.push(AlarmEvent::TimedOut);
        }

        let screen = self.screen();
        if let Err(err) = display.render(&screen.line1, &screen.line2) {
            warn!("display update failed: {err}");
        }

        events
    }

    /// What the display should show right now.
    pub fn screen(&self) -> Screen {
        if self.alarm.is_active() {
            Screen::alert()
        } else {
            Screen::telemetry(self.temperature_c, self.flame_detected)
        }
    }

    pub fn status(&self, now_ms: u64) -> AlarmStatus {
        AlarmStatus {
            temperature_c: self.temperature_c,
            flame_detected: self.flame_detected,
            fire_detected: self.fire.detected,
            state: self.alarm.state().as_str(),
            alarm_active: self.alarm.is_active(),
            fire_alert_sent: self.alarm.fire_alert_sent(),
            alarm_elapsed_ms: self.alarm.elapsed_ms(now_ms),
            alarm_remaining_ms: self.alarm.remaining_ms(now_ms),
            link_up: self.link_up,
            last_notification: self.last_notification.clone(),
        }
    }

    fn sample(&mut self, now_ms: u64, hw: &mut impl Sensors, events: &mut Vec<AlarmEvent>) {
        if self.sampler.is_due(now_ms) {
            self.sampler.mark_read(now_ms);
            match hw.read_temperature_raw() {
                Ok(raw) => {
                    self.temperature_c = raw_to_celsius(raw, &self.analog);
                    debug!("temperature: {:.1} C (raw {raw})", self.temperature_c);
                    events.push(AlarmEvent::TemperatureSampled(self.temperature_c));
                }
                Err(err) => warn!("temperature read failed, keeping last value: {err}"),
            }
        }

        match hw.flame_line_high() {
            Ok(line_high) => {
                let flame = flame_from_line(line_high);
                if flame != self.flame_detected {
                    info!("flame sensor: {}", if flame { "FLAME" } else { "clear" });
                    events.push(AlarmEvent::FlameChanged(flame));
                }
                self.flame_detected = flame;
            }
            Err(err) => warn!("flame read failed, keeping last value: {err}"),
        }
    }

    fn service_button<H>(&mut self, now_ms: u64, hw: &mut H, events: &mut Vec<AlarmEvent>)
    where
        H: Sensors + Actuators,
    {
        let pressed = match hw.button_line_high() {
            Ok(line_high) => self.button.update(line_high, now_ms),
            Err(err) => {
                warn!("button read failed: {err}");
                false
            }
        };

        if !pressed {
            return;
        }

        if self.alarm.acknowledge(hw) {
            events.push(AlarmEvent::Acknowledged);
        } else {
            debug!("button press ignored; alarm is idle");
        }
    }

    fn record_notification(&mut self, now_ms: u64, activation: &Activation) {
        let (delivered, error) = match activation {
            Activation::Notified => (true, None),
            Activation::NotifyFailed(err) => (false, Some(err.to_string())),
            Activation::Ignored | Activation::Suppressed => return,
        };
        self.last_notification = Some(NotificationRecord {
            message: self.fire.message.clone(),
            delivered,
            error,
            at_ms: now_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ports::{HardwareError, NotifyError};

    #[derive(Default)]
    struct Board {
        raw: u16,
        flame_high: bool,
        button_high: bool,
        outputs_on: bool,
        adc_broken: bool,
    }

    impl Board {
        fn calm() -> Self {
            Self {
                // 25.0 C with the default 12-bit, 3.3 V front end.
                raw: 310,
                flame_high: true,
                button_high: true,
                ..Self::default()
            }
        }
    }

    impl Sensors for Board {
        fn read_temperature_raw(&mut self) -> Result<u16, HardwareError> {
            if self.adc_broken {
                return Err(HardwareError::Adc("timeout".to_string()));
            }
            Ok(self.raw)
        }

        fn flame_line_high(&mut self) -> Result<bool, HardwareError> {
            Ok(self.flame_high)
        }

        fn button_line_high(&mut self) -> Result<bool, HardwareError> {
            Ok(self.button_high)
        }
    }

    impl Actuators for Board {
        fn set_alarm_outputs(&mut self, on: bool) -> Result<(), HardwareError> {
            self.outputs_on = on;
            Ok(())
        }
    }

    struct Link(bool);

    impl Connectivity for Link {
        fn is_up(&mut self) -> bool {
            self.0
        }

        fn reconnect(&mut self, _timeout_ms: u64) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct Relay(Vec<String>);

    impl Notifier for Relay {
        fn send(&mut self, message: &str) -> Result<(), NotifyError> {
            self.0.push(message.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Lcd(Vec<(String, String)>);

    impl TextDisplay for Lcd {
        fn render(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError> {
            self.0.push((line1.to_string(), line2.to_string()));
            Ok(())
        }
    }

    fn engine() -> FireAlarmEngine {
        FireAlarmEngine::new(AlarmConfig::default(), AnalogFrontEnd::default())
    }

    #[test]
    fn first_tick_samples_and_renders_telemetry() {
        let mut engine = engine();
        let mut board = Board::calm();
        let mut lcd = Lcd::default();

        let events = engine.tick(0, &mut board, &mut Link(true), &mut Relay::default(), &mut lcd);

        assert!(matches!(events.first(), Some(AlarmEvent::TemperatureSampled(_))));
        assert_eq!(engine.last_temp_read_ms(), Some(0));
        assert_eq!(
            lcd.0.last(),
            Some(&("Temp: 25.0 C".to_string(), "Flame: NO".to_string()))
        );
    }

    #[test]
    fn temperature_is_only_resampled_on_cadence() {
        let mut engine = engine();
        let mut board = Board::calm();
        let mut link = Link(true);
        let mut relay = Relay::default();
        let mut lcd = Lcd::default();

        engine.tick(0, &mut board, &mut link, &mut relay, &mut lcd);
        board.raw = 1_000;
        engine.tick(100, &mut board, &mut link, &mut relay, &mut lcd);
        assert!((engine.temperature_c() - 24.98).abs() < 0.1);

        engine.tick(500, &mut board, &mut link, &mut relay, &mut lcd);
        assert!(engine.temperature_c() > 80.0);
    }

    #[test]
    fn adc_failure_keeps_previous_reading() {
        let mut engine = engine();
        let mut board = Board::calm();
        let mut link = Link(true);
        let mut relay = Relay::default();
        let mut lcd = Lcd::default();

        engine.tick(0, &mut board, &mut link, &mut relay, &mut lcd);
        let before = engine.temperature_c();
        board.adc_broken = true;
        let events = engine.tick(500, &mut board, &mut link, &mut relay, &mut lcd);

        assert_eq!(engine.temperature_c(), before);
        assert!(!events
            .iter()
            .any(|event| matches!(event, AlarmEvent::TemperatureSampled(_))));
    }

    #[test]
    fn connectivity_check_updates_link_state() {
        let mut engine = engine();
        engine.set_link_up(true);
        let mut board = Board::calm();
        let mut relay = Relay::default();
        let mut lcd = Lcd::default();

        let events = engine.tick(5_000, &mut board, &mut Link(false), &mut relay, &mut lcd);

        assert!(events.contains(&AlarmEvent::Connectivity(ConnectivityCheck::StillDown)));
        assert!(!engine.is_link_up());
        assert_eq!(engine.last_conn_check_ms(), 5_000);
    }

    #[test]
    fn status_reflects_active_alarm() {
        let mut engine = engine();
        let mut board = Board {
            flame_high: false,
            ..Board::calm()
        };
        let mut relay = Relay::default();
        let mut lcd = Lcd::default();

        engine.tick(1_000, &mut board, &mut Link(true), &mut relay, &mut lcd);
        let status = engine.status(11_000);

        assert_eq!(status.state, "ACTIVE");
        assert!(status.alarm_active);
        assert!(status.fire_alert_sent);
        assert!(status.flame_detected);
        assert_eq!(status.alarm_elapsed_ms, 10_000);
        assert_eq!(status.alarm_remaining_ms, 50_000);
        assert_eq!(
            status.last_notification.map(|record| record.delivered),
            Some(true)
        );

        let json = serde_json::to_value(engine.status(11_000)).unwrap();
        assert_eq!(json["state"], "ACTIVE");
        assert_eq!(json["fireAlertSent"], true);
    }

    #[test]
    fn construction_sanitizes_the_alarm_config() {
        let config = AlarmConfig {
            temp_threshold_c: f32::NAN,
            debounce_ms: 50,
            ..AlarmConfig::default()
        };
        let mut engine = FireAlarmEngine::new(config, AnalogFrontEnd::default());
        assert_eq!(engine.config().temp_threshold_c, 60.0);

        let mut board = Board::calm();
        board.raw = 1_000;
        engine.tick(0, &mut board, &mut Link(true), &mut Relay::default(), &mut Lcd::default());
        assert!(engine.fire().detected);
        assert_eq!(engine.state(), AlarmState::Active);
    }
}
