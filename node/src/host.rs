use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{debug, info, warn};

use fire_alarm_common::{
    display::{CONNECTING_LINES, SPLASH_LINES},
    Actuators, AlarmEvent, AlarmStatus, AnalogFrontEnd, Connectivity, FireAlarmEngine,
    HardwareError, Notifier, NotifyError, RelayConfig, RelayRequest, RuntimeConfig, Sensors,
    TextDisplay,
};

const TICK_PERIOD_MS: u64 = 100;

#[derive(Clone)]
struct AppState {
    status: Arc<Mutex<AlarmStatus>>,
    scenario: Scenario,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    status: AlarmStatus,
    scenario: &'static str,
    #[serde(rename = "uptimeMs")]
    uptime_ms: u64,
    #[serde(rename = "nowEpoch")]
    now_epoch: i64,
}

/// Scripted sensor and network conditions for running without hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    Calm,
    Flame,
    Overheat,
    FlakyWifi,
}

impl Scenario {
    fn from_env() -> Self {
        let raw = std::env::var("FIRE_ALARM_SCENARIO").unwrap_or_default();
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "calm" => Self::Calm,
            "flame" => Self::Flame,
            "overheat" => Self::Overheat,
            "flaky-wifi" => Self::FlakyWifi,
            other => {
                warn!("unknown scenario `{other}`; using `calm`");
                Self::Calm
            }
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Calm => "calm",
            Self::Flame => "flame",
            Self::Overheat => "overheat",
            Self::FlakyWifi => "flaky-wifi",
        }
    }

    fn temperature_c(self, now_ms: u64) -> f32 {
        let secs = now_ms as f32 / 1_000.0;
        let ambient = 24.0 + ((now_ms / 1_000) % 5) as f32 * 0.4;
        match self {
            Self::Overheat if secs >= 10.0 && secs < 60.0 => 25.0 + (secs - 10.0),
            Self::Overheat if secs >= 60.0 => (75.0 - (secs - 60.0)).max(ambient),
            _ => ambient,
        }
    }

    fn flame(self, now_ms: u64) -> bool {
        match self {
            Self::Flame | Self::FlakyWifi => (10_000..25_000).contains(&now_ms),
            _ => false,
        }
    }

    fn button_pressed(self, now_ms: u64) -> bool {
        match self {
            Self::Flame | Self::FlakyWifi => (45_000..45_300).contains(&now_ms),
            _ => false,
        }
    }

    fn network_available(self, now_ms: u64) -> bool {
        match self {
            Self::FlakyWifi => !(5_000..30_000).contains(&now_ms),
            _ => true,
        }
    }
}

struct SimulatedBoard {
    scenario: Scenario,
    analog: AnalogFrontEnd,
    now_ms: u64,
    outputs_on: bool,
}

impl SimulatedBoard {
    fn advance(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }
}

impl Sensors for SimulatedBoard {
    fn read_temperature_raw(&mut self) -> Result<u16, HardwareError> {
        let millivolts = self.scenario.temperature_c(self.now_ms) * self.analog.mv_per_degree_c;
        let raw = millivolts * f32::from(self.analog.raw_max) / self.analog.reference_mv;
        Ok(raw.round().clamp(0.0, f32::from(u16::MAX)) as u16)
    }

    fn flame_line_high(&mut self) -> Result<bool, HardwareError> {
        Ok(!self.scenario.flame(self.now_ms))
    }

    fn button_line_high(&mut self) -> Result<bool, HardwareError> {
        Ok(!self.scenario.button_pressed(self.now_ms))
    }
}

impl Actuators for SimulatedBoard {
    fn set_alarm_outputs(&mut self, on: bool) -> Result<(), HardwareError> {
        if on != self.outputs_on {
            info!("LED + buzzer {}", if on { "ON" } else { "OFF" });
        }
        self.outputs_on = on;
        Ok(())
    }
}

struct SimulatedLink {
    scenario: Scenario,
    available: bool,
    up: Arc<AtomicBool>,
}

impl SimulatedLink {
    fn advance(&mut self, now_ms: u64) {
        self.available = self.scenario.network_available(now_ms);
        if !self.available && self.up.swap(false, Ordering::Relaxed) {
            warn!("simulated wifi dropped");
        }
    }
}

impl Connectivity for SimulatedLink {
    fn is_up(&mut self) -> bool {
        self.up.load(Ordering::Relaxed)
    }

    fn reconnect(&mut self, timeout_ms: u64) -> bool {
        debug!("simulated wifi association (timeout {timeout_ms} ms)");
        self.up.store(self.available, Ordering::Relaxed);
        self.available
    }
}

/// Builds the real relay request but only logs it.
struct DryRunRelay {
    relay: RelayConfig,
    up: Arc<AtomicBool>,
}

impl Notifier for DryRunRelay {
    fn send(&mut self, message: &str) -> Result<(), NotifyError> {
        if !self.up.load(Ordering::Relaxed) {
            warn!("notification dropped, wifi not connected: {message}");
            return Err(NotifyError::Offline);
        }
        let request = RelayRequest::new(&self.relay, message);
        info!("relay GET {}", request.redacted_url());
        Ok(())
    }
}

#[derive(Default)]
struct ConsoleDisplay {
    last: Option<(String, String)>,
}

impl TextDisplay for ConsoleDisplay {
    fn render(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError> {
        let frame = (line1.to_string(), line2.to_string());
        if self.last.as_ref() != Some(&frame) {
            info!("lcd |{line1:<16}|{line2:<16}|");
            self.last = Some(frame);
        }
        Ok(())
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = RuntimeConfig::from_build_env();
    apply_env_overrides(&mut runtime);
    runtime.sanitize();
    if let Err(err) = runtime.validate() {
        warn!("configuration incomplete ({err}); notifications will be dry-run only");
    }
    info!(
        "runtime config: {}",
        serde_json::to_string(&runtime.redacted()).context("failed to render config")?
    );

    let scenario = Scenario::from_env();
    info!("simulating scenario `{}`", scenario.as_str());

    let link_up = Arc::new(AtomicBool::new(false));
    let mut board = SimulatedBoard {
        scenario,
        analog: runtime.analog.clone(),
        now_ms: 0,
        outputs_on: false,
    };
    let mut link = SimulatedLink {
        scenario,
        available: scenario.network_available(0),
        up: link_up.clone(),
    };
    let relay = DryRunRelay {
        relay: runtime.relay.clone(),
        up: link_up,
    };
    let mut display = ConsoleDisplay::default();

    display.render(SPLASH_LINES.0, SPLASH_LINES.1)?;
    board.set_alarm_outputs(false)?;
    display.render(CONNECTING_LINES.0, CONNECTING_LINES.1)?;
    let connected = link.reconnect(runtime.alarm.wifi_connect_timeout_ms);
    if connected {
        info!("wifi connected to `{}`", runtime.network.wifi_ssid);
    } else {
        warn!("wifi unavailable at boot; continuing with local alarm only");
    }

    let mut engine = FireAlarmEngine::new(runtime.alarm.clone(), runtime.analog.clone());
    engine.set_link_up(connected);

    let status = Arc::new(Mutex::new(engine.status(monotonic_ms())));
    spawn_control_loop(engine, board, link, relay, display, status.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .with_state(AppState { status, scenario });

    let port = std::env::var("FIRE_ALARM_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status server at {addr}"))?;

    info!("status endpoint on http://{addr}/api/status");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("fire alarm node stopped");
    Ok(())
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    if let Ok(ssid) = std::env::var("WIFI_SSID") {
        runtime.network.wifi_ssid = ssid;
    }
    if let Ok(pass) = std::env::var("WIFI_PASS") {
        runtime.network.wifi_pass = pass;
    }
    if let Ok(phone) = std::env::var("ALERT_PHONE") {
        runtime.relay.phone = phone;
    }
    if let Ok(api_key) = std::env::var("ALERT_API_KEY") {
        runtime.relay.api_key = api_key;
    }
    if let Ok(endpoint) = std::env::var("ALERT_RELAY_URL") {
        runtime.relay.endpoint = endpoint;
    }
}

fn spawn_control_loop(
    mut engine: FireAlarmEngine,
    mut board: SimulatedBoard,
    mut link: SimulatedLink,
    mut relay: DryRunRelay,
    mut display: ConsoleDisplay,
    status: Arc<Mutex<AlarmStatus>>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_PERIOD_MS));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            board.advance(now_ms);
            link.advance(now_ms);

            let events = engine.tick(now_ms, &mut board, &mut link, &mut relay, &mut display);
            for event in &events {
                match event {
                    AlarmEvent::TemperatureSampled(_) => {}
                    other => debug!("alarm event: {other:?}"),
                }
            }

            *status.lock().await = engine.status(now_ms);
        }
    });
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.status.lock().await.clone();
    Json(StatusResponse {
        status,
        scenario: state.scenario.as_str(),
        uptime_ms: monotonic_ms(),
        now_epoch: chrono::Utc::now().timestamp(),
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fire_alarm_common::sampler::raw_to_celsius;

    fn board(scenario: Scenario) -> SimulatedBoard {
        SimulatedBoard {
            scenario,
            analog: AnalogFrontEnd::default(),
            now_ms: 0,
            outputs_on: false,
        }
    }

    #[test]
    fn simulated_temperature_survives_adc_conversion() {
        let mut board = board(Scenario::Overheat);
        board.advance(50_000);
        let raw = board.read_temperature_raw().unwrap();
        let celsius = raw_to_celsius(raw, &board.analog);
        assert!((celsius - 65.0).abs() < 0.5, "got {celsius}");
    }

    #[test]
    fn flame_line_is_active_low() {
        let mut board = board(Scenario::Flame);
        board.advance(1_000);
        assert!(board.flame_line_high().unwrap());
        board.advance(12_000);
        assert!(!board.flame_line_high().unwrap());
    }

    #[test]
    fn flaky_wifi_drops_and_recovers() {
        let up = Arc::new(AtomicBool::new(true));
        let mut link = SimulatedLink {
            scenario: Scenario::FlakyWifi,
            available: true,
            up: up.clone(),
        };

        link.advance(6_000);
        assert!(!link.is_up());
        assert!(!link.reconnect(20_000));

        link.advance(31_000);
        assert!(link.reconnect(20_000));
        assert!(up.load(Ordering::Relaxed));
    }

    #[test]
    fn relay_refuses_while_offline() {
        let up = Arc::new(AtomicBool::new(false));
        let mut relay = DryRunRelay {
            relay: RuntimeConfig::default().relay,
            up: up.clone(),
        };
        assert_eq!(relay.send("fire"), Err(NotifyError::Offline));

        up.store(true, Ordering::Relaxed);
        assert_eq!(relay.send("fire"), Ok(()));
    }

    #[test]
    fn scenario_names_are_stable() {
        for scenario in [
            Scenario::Calm,
            Scenario::Flame,
            Scenario::Overheat,
            Scenario::FlakyWifi,
        ] {
            assert!(!scenario.as_str().is_empty());
        }
        assert!(!Scenario::Calm.flame(12_000));
        assert!(Scenario::Calm.network_available(10_000));
    }
}
