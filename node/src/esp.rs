use core::convert::TryInto;
use std::{
    sync::{Arc, Mutex, OnceLock},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use embedded_svc::{
    http::{client::Client as HttpClient, Method, Status},
    io::Write,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    adc::{
        attenuation::DB_11,
        oneshot::{config::AdcChannelConfig, AdcChannelDriver, AdcDriver},
        ADC1,
    },
    gpio::{AnyInputPin, AnyOutputPin, Gpio34, Input, Output, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::{
        client::{Configuration as HttpClientConfiguration, EspHttpConnection},
        server::{Configuration as HttpConfiguration, EspHttpServer},
    },
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};
use log::{debug, info, warn};
use serde::Serialize;

use fire_alarm_common::{
    config::NetworkConfig,
    display::{CONNECTING_LINES, SPLASH_LINES},
    notify::is_success_status,
    Actuators, AlarmEvent, AlarmStatus, Connectivity, FireAlarmEngine, HardwareError, Notifier,
    NotifyError, PinConfig, RelayConfig, RelayRequest, RuntimeConfig, Sensors, TextDisplay,
};

use crate::lcd::Lcd;

const LOOP_PERIOD_MS: u64 = 50;
const WATCHDOG_TIMEOUT_SEC: u32 = 30;
const WIFI_POLL_MS: u64 = 250;
const RELAY_HTTP_TIMEOUT_SEC: u64 = 10;

struct EspBoard {
    temperature: AdcChannelDriver<'static, Gpio34, AdcDriver<'static, ADC1>>,
    flame: PinDriver<'static, AnyInputPin, Input>,
    button: PinDriver<'static, AnyInputPin, Input>,
    led: PinDriver<'static, AnyOutputPin, Output>,
    buzzer: PinDriver<'static, AnyOutputPin, Output>,
}

impl EspBoard {
    /// The temperature channel is fixed to GPIO34 on ADC1; the digital lines
    /// come from the pin map.
    fn new(adc1: ADC1, gpio34: Gpio34, pins: &PinConfig) -> anyhow::Result<Self> {
        let adc = AdcDriver::new(adc1).context("failed to take ADC1")?;
        let channel_config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let temperature = AdcChannelDriver::new(adc, gpio34, &channel_config)
            .context("failed to configure temperature channel")?;

        let mut flame = unsafe { PinDriver::input(AnyInputPin::new(pins.flame_pin)) }
            .with_context(|| format!("flame input on GPIO{}", pins.flame_pin))?;
        flame.set_pull(Pull::Up)?;

        let mut button = unsafe { PinDriver::input(AnyInputPin::new(pins.button_pin)) }
            .with_context(|| format!("button input on GPIO{}", pins.button_pin))?;
        button.set_pull(Pull::Up)?;

        let mut led = unsafe { PinDriver::output(AnyOutputPin::new(pins.led_pin)) }
            .with_context(|| format!("led output on GPIO{}", pins.led_pin))?;
        led.set_low()?;

        let mut buzzer = unsafe { PinDriver::output(AnyOutputPin::new(pins.buzzer_pin)) }
            .with_context(|| format!("buzzer output on GPIO{}", pins.buzzer_pin))?;
        buzzer.set_low()?;

        info!(
            "board ready: temp=GPIO34 flame=GPIO{} button=GPIO{} led=GPIO{} buzzer=GPIO{}",
            pins.flame_pin, pins.button_pin, pins.led_pin, pins.buzzer_pin
        );

        Ok(Self {
            temperature,
            flame,
            button,
            led,
            buzzer,
        })
    }
}

impl Sensors for EspBoard {
    fn read_temperature_raw(&mut self) -> Result<u16, HardwareError> {
        self.temperature
            .read_raw()
            .map_err(|err| HardwareError::Adc(format!("{err:?}")))
    }

    fn flame_line_high(&mut self) -> Result<bool, HardwareError> {
        Ok(self.flame.is_high())
    }

    fn button_line_high(&mut self) -> Result<bool, HardwareError> {
        Ok(self.button.is_high())
    }
}

impl Actuators for EspBoard {
    fn set_alarm_outputs(&mut self, on: bool) -> Result<(), HardwareError> {
        let result = if on {
            self.led.set_high().and_then(|_| self.buzzer.set_high())
        } else {
            self.led.set_low().and_then(|_| self.buzzer.set_low())
        };
        result.map_err(|err| HardwareError::Gpio(format!("{err:?}")))
    }
}

struct WifiLink {
    wifi: BlockingWifi<EspWifi<'static>>,
    configured: bool,
    ssid: String,
}

impl WifiLink {
    fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs_partition: EspDefaultNvsPartition,
        network: &NetworkConfig,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

        if network.wifi_ssid.trim().is_empty() {
            warn!("wifi ssid not configured; running without network");
            return Ok(Self {
                wifi,
                configured: false,
                ssid: String::new(),
            });
        }

        let auth_method = if network.wifi_pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: network
                .wifi_ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("wifi ssid too long"))?,
            password: network
                .wifi_pass
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("wifi password too long"))?,
            auth_method,
            ..Default::default()
        }))?;

        wifi.start()?;
        info!("wifi started in station mode for `{}`", network.wifi_ssid);

        Ok(Self {
            wifi,
            configured: true,
            ssid: network.wifi_ssid.clone(),
        })
    }
}

impl Connectivity for WifiLink {
    fn is_up(&mut self) -> bool {
        self.configured && is_wifi_station_connected()
    }

    fn reconnect(&mut self, timeout_ms: u64) -> bool {
        if !self.configured {
            return false;
        }

        let _ = self.wifi.wifi_mut().disconnect();
        if let Err(err) = self.wifi.wifi_mut().connect() {
            warn!("wifi connect to `{}` failed to start: {err:?}", self.ssid);
            return false;
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        while Instant::now() < deadline {
            feed_watchdog();
            if self.wifi.is_up().unwrap_or(false) {
                disable_wifi_power_save();
                return true;
            }
            thread::sleep(Duration::from_millis(WIFI_POLL_MS));
        }

        warn!("wifi `{}` not up within {timeout_ms} ms", self.ssid);
        false
    }
}

struct HttpRelay {
    relay: RelayConfig,
}

impl Notifier for HttpRelay {
    fn send(&mut self, message: &str) -> Result<(), NotifyError> {
        if !is_wifi_station_connected() {
            return Err(NotifyError::Offline);
        }

        let request = RelayRequest::new(&self.relay, message);
        info!("relay GET {}", request.redacted_url());

        match relay_get(request.url()) {
            Ok(status) if is_success_status(status) => Ok(()),
            Ok(status) => Err(NotifyError::Rejected(status)),
            Err(err) => Err(NotifyError::Transport(format!("{err:#}"))),
        }
    }
}

fn relay_get(url: &str) -> anyhow::Result<u16> {
    let http_conf = HttpClientConfiguration {
        timeout: Some(Duration::from_secs(RELAY_HTTP_TIMEOUT_SEC)),
        crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
        ..Default::default()
    };
    let mut client = HttpClient::wrap(EspHttpConnection::new(&http_conf)?);
    let request = client.request(Method::Get, url, &[])?;
    let response = request.submit().map_err(|e| anyhow!("{e:?}"))?;
    Ok(response.status())
}

enum DisplayBackend {
    Lcd(Lcd),
    Disabled,
}

impl TextDisplay for DisplayBackend {
    fn render(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError> {
        match self {
            Self::Lcd(lcd) => lcd.render(line1, line2),
            Self::Disabled => Ok(()),
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut runtime = RuntimeConfig::from_build_env();
    runtime.sanitize();
    if let Err(err) = runtime.validate() {
        warn!("configuration incomplete: {err}");
    }
    info!(
        "runtime config: {}",
        serde_json::to_string(&runtime.redacted()).context("failed to render config")?
    );

    let Peripherals {
        modem,
        adc1,
        i2c0,
        pins,
        ..
    } = Peripherals::take()?;

    let mut board = EspBoard::new(adc1, pins.gpio34, &runtime.pins)
        .context("failed to initialize alarm board")?;

    let mut display = match Lcd::new(
        i2c0,
        runtime.pins.lcd_sda_pin,
        runtime.pins.lcd_scl_pin,
        runtime.pins.lcd_address,
    ) {
        Ok(lcd) => DisplayBackend::Lcd(lcd),
        Err(err) => {
            warn!("lcd unavailable, continuing headless: {err:#}");
            DisplayBackend::Disabled
        }
    };

    let _ = display.render(SPLASH_LINES.0, SPLASH_LINES.1);
    if let Err(err) = board.set_alarm_outputs(false) {
        warn!("failed to reset alarm outputs: {err}");
    }

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;

    let mut link = WifiLink::new(modem, sys_loop, nvs_partition, &runtime.network)
        .context("wifi startup failed")?;
    let _ = display.render(CONNECTING_LINES.0, CONNECTING_LINES.1);
    let connected = link.reconnect(runtime.alarm.wifi_connect_timeout_ms);
    if connected {
        info!("wifi connected");
    } else {
        warn!("wifi unavailable at boot; alarm runs locally until the link returns");
    }

    let mut relay = HttpRelay {
        relay: runtime.relay.clone(),
    };

    let mut engine = FireAlarmEngine::new(runtime.alarm.clone(), runtime.analog.clone());
    engine.set_link_up(connected);

    let status = Arc::new(Mutex::new(engine.status(monotonic_ms())));
    // Keep the server alive for the program lifetime.
    let _server = create_http_server(status.clone())?;

    loop {
        feed_watchdog();
        let now_ms = monotonic_ms();

        let events = engine.tick(now_ms, &mut board, &mut link, &mut relay, &mut display);
        for event in &events {
            match event {
                AlarmEvent::TemperatureSampled(_) => {}
                other => debug!("alarm event: {other:?}"),
            }
        }

        if let Ok(mut snapshot) = status.lock() {
            *snapshot = engine.status(now_ms);
        }

        thread::sleep(Duration::from_millis(LOOP_PERIOD_MS));
    }
}

fn create_http_server(status: Arc<Mutex<AlarmStatus>>) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: 8 * 1024,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&conf)?;

    server.fn_handler("/api/status", Method::Get, move |req| {
        let payload = status
            .lock()
            .map_err(|_| anyhow!("status lock poisoned"))?
            .clone();
        write_json(req, &payload)
    })?;

    Ok(server)
}

fn write_json<T: Serialize>(
    req: esp_idf_svc::http::server::Request<
        &mut esp_idf_svc::http::server::EspHttpConnection<'_>,
    >,
    payload: &T,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(payload)?;
    req.into_response(
        200,
        Some("OK"),
        &[("Content-Type", "application/json; charset=utf-8")],
    )?
    .write_all(&body)?;
    Ok(())
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc != esp_idf_svc::sys::ESP_OK {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}

fn is_wifi_station_connected() -> bool {
    let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
    rc == esp_idf_svc::sys::ESP_OK
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
