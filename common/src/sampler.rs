use crate::config::AnalogFrontEnd;

/// Converts a raw ADC count into degrees Celsius.
///
/// No plausibility check is applied: an out-of-range count yields an
/// out-of-range temperature.
pub fn raw_to_celsius(raw: u16, front_end: &AnalogFrontEnd) -> f32 {
    let millivolts = f32::from(raw) * front_end.reference_mv / f32::from(front_end.raw_max);
    millivolts / front_end.mv_per_degree_c
}

/// The flame module pulls its output low while it sees a flame.
pub fn flame_from_line(line_high: bool) -> bool {
    !line_high
}

/// Fixed-cadence gate for the temperature channel.
#[derive(Debug, Clone)]
pub struct TemperatureSampler {
    interval_ms: u64,
    last_read_ms: Option<u64>,
}

impl TemperatureSampler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_read_ms: None,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.last_read_ms
            .map(|last| now_ms.saturating_sub(last) >= self.interval_ms)
            .unwrap_or(true)
    }

    pub fn mark_read(&mut self, now_ms: u64) {
        self.last_read_ms = Some(now_ms);
    }

    pub fn last_read_ms(&self) -> Option<u64> {
        self.last_read_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_full_scale_to_reference_over_ten() {
        let front_end = AnalogFrontEnd::default();
        let celsius = raw_to_celsius(4_095, &front_end);
        assert!((celsius - 330.0).abs() < 1e-3);
    }

    #[test]
    fn converts_midscale_reading() {
        let front_end = AnalogFrontEnd {
            reference_mv: 5_000.0,
            raw_max: 1_023,
            mv_per_degree_c: 10.0,
        };
        // 51 counts of a 10-bit 5 V converter is ~249 mV.
        let celsius = raw_to_celsius(51, &front_end);
        assert!((celsius - 24.926).abs() < 0.01);
    }

    #[test]
    fn zero_counts_is_zero_degrees() {
        assert_eq!(raw_to_celsius(0, &AnalogFrontEnd::default()), 0.0);
    }

    #[test]
    fn counts_above_range_pass_through() {
        let celsius = raw_to_celsius(u16::MAX, &AnalogFrontEnd::default());
        assert!(celsius > 330.0);
    }

    #[test]
    fn flame_is_active_low() {
        assert!(flame_from_line(false));
        assert!(!flame_from_line(true));
    }

    #[test]
    fn first_sample_is_always_due() {
        let sampler = TemperatureSampler::new(500);
        assert!(sampler.is_due(0));
        assert!(sampler.is_due(12_345));
    }

    #[test]
    fn sampling_respects_interval() {
        let mut sampler = TemperatureSampler::new(500);
        sampler.mark_read(1_000);

        assert!(!sampler.is_due(1_000));
        assert!(!sampler.is_due(1_499));
        assert!(sampler.is_due(1_500));
        assert_eq!(sampler.last_read_ms(), Some(1_000));
    }
}
