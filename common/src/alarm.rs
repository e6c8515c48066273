//! Alarm state machine.
//!
//! `IDLE -> ACTIVE` on a fire condition, `ACTIVE -> IDLE` on acknowledgment or
//! timeout. The `fire_alert_sent` latch limits notifications to one per fire
//! episode: acknowledgment clears it, timeout does not, and an idle tick with
//! no fire clears it.

use log::{debug, info, warn};

use crate::{
    ports::{Actuators, Notifier, NotifyError},
    types::AlarmState,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// Already active; nothing happened.
    Ignored,
    /// Alarm raised and the notification went out.
    Notified,
    /// Alarm raised; the notification was attempted and failed.
    NotifyFailed(NotifyError),
    /// Alarm raised; a notification was already sent for this episode.
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct AlarmMachine {
    timeout_ms: u64,
    active: bool,
    fire_alert_sent: bool,
    started_at_ms: Option<u64>,
}

impl AlarmMachine {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            active: false,
            fire_alert_sent: false,
            started_at_ms: None,
        }
    }

    pub fn state(&self) -> AlarmState {
        if self.active {
            AlarmState::Active
        } else {
            AlarmState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn fire_alert_sent(&self) -> bool {
        self.fire_alert_sent
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match self.started_at_ms {
            Some(start) if self.active => now_ms.saturating_sub(start),
            _ => 0,
        }
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        if !self.active {
            return 0;
        }
        self.timeout_ms.saturating_sub(self.elapsed_ms(now_ms))
    }

    pub fn activate(
        &mut self,
        now_ms: u64,
        message: &str,
        outputs: &mut impl Actuators,
        notifier: &mut impl Notifier,
    ) -> Activation {
        if self.active {
            return Activation::Ignored;
        }

        self.active = true;
        self.started_at_ms = Some(now_ms);
        drive_outputs(outputs, true);
        info!("alarm ACTIVE: {message}");

        if self.fire_alert_sent {
            debug!("notification already sent for this fire episode");
            return Activation::Suppressed;
        }

        let result = notifier.send(message);
        self.fire_alert_sent = true;
        match result {
            Ok(()) => {
                info!("fire notification sent");
                Activation::Notified
            }
            Err(err) => {
                warn!("fire notification failed: {err}");
                Activation::NotifyFailed(err)
            }
        }
    }

    /// Manual override. Returns whether the alarm was active.
    pub fn acknowledge(&mut self, outputs: &mut impl Actuators) -> bool {
        if !self.active {
            return false;
        }
        self.deactivate(outputs);
        self.fire_alert_sent = false;
        info!("alarm acknowledged by button");
        true
    }

    /// Returns whether the alarm timed out on this call.
    pub fn expire_if_due(&mut self, now_ms: u64, outputs: &mut impl Actuators) -> bool {
        if !self.active {
            return false;
        }
        let Some(start) = self.started_at_ms else {
            return false;
        };
        if now_ms.saturating_sub(start) < self.timeout_ms {
            return false;
        }
        // The latch stays set: a fire that outlives the timeout does not
        // notify again until acknowledged or cleared.
        self.deactivate(outputs);
        warn!("alarm timed out after {} ms without acknowledgment", self.timeout_ms);
        true
    }

    /// Idle tick without a fire condition ends the episode.
    pub fn clear_episode(&mut self) {
        if !self.active {
            self.fire_alert_sent = false;
        }
    }

    fn deactivate(&mut self, outputs: &mut impl Actuators) {
        self.active = false;
        self.started_at_ms = None;
        drive_outputs(outputs, false);
    }
}

fn drive_outputs(outputs: &mut impl Actuators, on: bool) {
    if let Err(err) = outputs.set_alarm_outputs(on) {
        warn!("failed to switch alarm outputs {}: {err}", if on { "on" } else { "off" });
    }
}
