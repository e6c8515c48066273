//! Debounced acknowledgment button.
//!
//! Active-low momentary switch with pull-up, sampled once per control tick.
//! A press counts when the line was still read low more than the debounce
//! window after it first went low, and is reported once, on release. Holding the button never stalls
//! the loop and never produces more than one event.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonState {
    Released,
    Pressed { since_ms: u64, last_low_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct AckButton {
    debounce_ms: u64,
    state: ButtonState,
}

impl AckButton {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            state: ButtonState::Released,
        }
    }

    pub fn is_held(&self) -> bool {
        matches!(self.state, ButtonState::Pressed { .. })
    }

    /// Feed the current line level. Returns `true` for a completed press.
    pub fn update(&mut self, line_high: bool, now_ms: u64) -> bool {
        let pressed = !line_high;

        match (self.state, pressed) {
            (ButtonState::Released, true) => {
                self.state = ButtonState::Pressed {
                    since_ms: now_ms,
                    last_low_ms: now_ms,
                };
                false
            }
            (ButtonState::Pressed { since_ms, .. }, true) => {
                self.state = ButtonState::Pressed {
                    since_ms,
                    last_low_ms: now_ms,
                };
                false
            }
            // Only time the line was actually observed low counts.
            (ButtonState::Pressed { since_ms, last_low_ms }, false) => {
                self.state = ButtonState::Released;
                last_low_ms.saturating_sub(since_ms) > self.debounce_ms
            }
            (ButtonState::Released, false) => false,
        }
    }
}
