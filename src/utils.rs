use chrono::NaiveDateTime;

use crate::domain::types::{AlertKind, Coordinate};
use crate::simulation::random::RandomSource;

/// Uniform value in `[min_val, max_val]`. A collapsed range returns `min_val`.
pub fn generate_random_value(rng: &mut dyn RandomSource, min_val: f64, max_val: f64) -> f64 {
    min_val + (max_val - min_val) * rng.draw_uniform()
}

/// True with the given probability, expressed in percent.
pub fn check_probability(rng: &mut dyn RandomSource, probability_percent: f64) -> bool {
    rng.draw_uniform() < probability_percent / 100.0
}

pub fn calculate_percentage(current_value: f64, max_value: f64) -> f64 {
    if max_value == 0.0 {
        return 0.0;
    }
    (current_value / max_value) * 100.0
}

/// Canonical alert line: `YYYY-MM-DD HH:MM:SS - [TYPE] message[ en (lat, lon)]`.
pub fn format_alert(
    timestamp: &NaiveDateTime,
    kind: AlertKind,
    message: &str,
    location: Option<Coordinate>,
) -> String {
    let mut log_entry = format!(
        "{} - [{}] {}",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        kind.tag(),
        message
    );
    if let Some(loc) = location {
        log_entry.push_str(&format!(" en ({:.4}, {:.4})", loc.lat, loc.lon));
    }
    log_entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::random::ScriptedSource;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|d| d.and_hms_opt(12, 5, 9))
            .unwrap()
    }

    #[test]
    fn percentage_of_zero_capacity_is_zero() {
        assert_eq!(calculate_percentage(5.0, 0.0), 0.0);
        assert_eq!(calculate_percentage(0.0, 0.0), 0.0);
    }

    #[test]
    fn percentage_of_half() {
        assert_eq!(calculate_percentage(4.5, 9.0), 50.0);
    }

    #[test]
    fn probability_gate_is_strict() {
        let mut rng = ScriptedSource::new(vec![0.05, 0.049]);
        assert!(!check_probability(&mut rng, 5.0));
        assert!(check_probability(&mut rng, 5.0));
    }

    #[test]
    fn zero_probability_never_fires() {
        let mut rng = ScriptedSource::new(vec![0.0]);
        assert!(!check_probability(&mut rng, 0.0));
    }

    #[test]
    fn random_value_spans_range() {
        let mut rng = ScriptedSource::new(vec![0.0, 0.5]);
        assert_eq!(generate_random_value(&mut rng, 6.3, 8.55), 6.3);
        assert!((generate_random_value(&mut rng, 2.0, 4.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn alert_without_location() {
        let line = format_alert(&noon(), AlertKind::Info, "Ruta completada.", None);
        assert_eq!(line, "2024-03-07 12:05:09 - [INFO] Ruta completada.");
    }

    #[test]
    fn alert_with_location_uses_four_decimals() {
        let loc = Coordinate::new(20.6736, -103.344);
        let line = format_alert(&noon(), AlertKind::Alert, "Puerta abierta.", Some(loc));
        assert_eq!(
            line,
            "2024-03-07 12:05:09 - [ALERTA] Puerta abierta. en (20.6736, -103.3440)"
        );
    }
}
