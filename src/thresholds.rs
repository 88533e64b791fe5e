//! Threshold evaluation for incoming readings
//!
//! The evaluator is a pure function over a single reading: no state, no
//! side effects, no error path. Checks run in fixed priority order and the
//! first violated limit wins, so one reading yields at most one alert.

use crate::{Alert, AlertKind, Reading, config::Thresholds};

#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    thresholds: Thresholds,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate one reading. Priority: power, then current, then voltage.
    pub fn evaluate(&self, reading: &Reading) -> Option<Alert> {
        let Thresholds {
            max_power,
            max_current,
            min_voltage,
            max_voltage,
        } = self.thresholds;

        if reading.power > max_power {
            return Some(Alert {
                device_id: reading.device_id.clone(),
                alert_type: AlertKind::HighPower,
                message: format!("Power exceeded: {:.2}W", reading.power),
                threshold: max_power,
                actual_value: reading.power,
                timestamp_ms: reading.timestamp_ms,
            });
        }

        if reading.current > max_current {
            return Some(Alert {
                device_id: reading.device_id.clone(),
                alert_type: AlertKind::HighCurrent,
                message: format!("Current exceeded: {:.2}A", reading.current),
                threshold: max_current,
                actual_value: reading.current,
                timestamp_ms: reading.timestamp_ms,
            });
        }

        if reading.voltage < min_voltage || reading.voltage > max_voltage {
            return Some(Alert {
                device_id: reading.device_id.clone(),
                alert_type: AlertKind::VoltageAbnormal,
                message: format!("Voltage abnormal: {:.2}V", reading.voltage),
                threshold: min_voltage,
                actual_value: reading.voltage,
                timestamp_ms: reading.timestamp_ms,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(voltage: f64, current: f64, power: f64) -> Reading {
        Reading {
            device_id: "dev1".to_string(),
            timestamp_ms: 1_700_000_000_000,
            voltage,
            current,
            power,
            energy: 1.5,
            frequency: 50.0,
            power_factor: 0.95,
        }
    }

    fn evaluator() -> ThresholdEvaluator {
        ThresholdEvaluator::new(Thresholds::default())
    }

    #[test]
    fn test_nominal_reading_produces_no_alert() {
        assert!(evaluator().evaluate(&reading(230.0, 5.0, 1100.0)).is_none());
    }

    #[test]
    fn test_high_power_alert() {
        let alert = evaluator().evaluate(&reading(230.0, 5.0, 2500.0)).unwrap();
        assert_eq!(alert.alert_type, AlertKind::HighPower);
        assert_eq!(alert.threshold, 2200.0);
        assert_eq!(alert.actual_value, 2500.0);
        assert_eq!(alert.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn test_high_current_alert() {
        let alert = evaluator().evaluate(&reading(230.0, 12.0, 1100.0)).unwrap();
        assert_eq!(alert.alert_type, AlertKind::HighCurrent);
        assert_eq!(alert.threshold, 10.0);
    }

    #[test]
    fn test_voltage_abnormal_low_and_high() {
        let low = evaluator().evaluate(&reading(190.0, 5.0, 1100.0)).unwrap();
        assert_eq!(low.alert_type, AlertKind::VoltageAbnormal);

        let high = evaluator().evaluate(&reading(250.0, 5.0, 1100.0)).unwrap();
        assert_eq!(high.alert_type, AlertKind::VoltageAbnormal);
        assert_eq!(high.actual_value, 250.0);
    }

    #[test]
    fn test_priority_power_beats_current() {
        // both limits violated, power wins
        let alert = evaluator().evaluate(&reading(230.0, 12.0, 2500.0)).unwrap();
        assert_eq!(alert.alert_type, AlertKind::HighPower);
    }

    #[test]
    fn test_priority_current_beats_voltage() {
        let alert = evaluator().evaluate(&reading(190.0, 12.0, 1100.0)).unwrap();
        assert_eq!(alert.alert_type, AlertKind::HighCurrent);
    }

    #[test]
    fn test_values_at_limit_do_not_alert() {
        assert!(
            evaluator()
                .evaluate(&reading(240.0, 10.0, 2200.0))
                .is_none()
        );
        assert!(evaluator().evaluate(&reading(200.0, 5.0, 1100.0)).is_none());
    }

    #[test]
    fn test_custom_thresholds_are_honored() {
        let evaluator = ThresholdEvaluator::new(Thresholds {
            max_power: 100.0,
            max_current: 1.0,
            min_voltage: 110.0,
            max_voltage: 130.0,
        });

        let alert = evaluator.evaluate(&reading(120.0, 0.5, 150.0)).unwrap();
        assert_eq!(alert.alert_type, AlertKind::HighPower);
        assert_eq!(alert.threshold, 100.0);
    }
}
