//! Fire condition evaluation.
//!
//! The flame check runs first and the temperature check second; when both
//! trip, the temperature message replaces the flame message.

pub const FLAME_ALERT_MESSAGE: &str = "FIRE ALERT! Flame detected by sensor!";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FireAssessment {
    pub detected: bool,
    pub message: String,
}

pub fn evaluate(temperature_c: f32, flame_detected: bool, threshold_c: f32) -> FireAssessment {
    let mut assessment = FireAssessment::default();

    if flame_detected {
        assessment.detected = true;
        assessment.message = FLAME_ALERT_MESSAGE.to_string();
    }

    if temperature_c > threshold_c {
        assessment.detected = true;
        assessment.message = temperature_alert_message(temperature_c);
    }

    assessment
}

pub fn temperature_alert_message(temperature_c: f32) -> String {
    format!("FIRE ALERT! High temperature detected: {temperature_c:.1} C")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calm_conditions_report_nothing() {
        let assessment = evaluate(25.0, false, 60.0);
        assert!(!assessment.detected);
        assert!(assessment.message.is_empty());
    }

    #[test]
    fn flame_alone_uses_flame_message() {
        let assessment = evaluate(25.0, true, 60.0);
        assert!(assessment.detected);
        assert_eq!(assessment.message, FLAME_ALERT_MESSAGE);
    }

    #[test]
    fn temperature_message_has_one_decimal() {
        let assessment = evaluate(65.3, false, 60.0);
        assert!(assessment.detected);
        assert_eq!(
            assessment.message,
            "FIRE ALERT! High temperature detected: 65.3 C"
        );
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!evaluate(60.0, false, 60.0).detected);
        assert!(evaluate(60.01, false, 60.0).detected);
    }

    #[test]
    fn temperature_message_wins_when_both_trip() {
        let assessment = evaluate(72.45, true, 60.0);
        assert!(assessment.detected);
        assert!(assessment.message.contains("High temperature"));
        assert!(!assessment.message.contains("Flame"));
    }

    #[test]
    fn same_inputs_give_same_output() {
        let first = evaluate(61.25, true, 60.0);
        let second = evaluate(61.25, true, 60.0);
        assert_eq!(first, second);
    }

    #[test]
    fn custom_threshold_is_respected() {
        assert!(evaluate(45.5, false, 45.0).detected);
        assert!(!evaluate(45.5, false, 50.0).detected);
    }
}
