//! Small numeric helpers shared by the pose adapter and the scorers.
//!
//! Aggregates return `None` instead of NaN so callers can tell "no data" apart from a
//! legitimately small value.

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values
        .iter()
        .map(|value| (value - avg).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}

pub fn finite_or_none(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(0.123456, 5), 0.12346);
        assert_eq!(round_to(-1.005, 0), -1.0);
        assert_eq!(round_to(172.4567, 2), 172.46);
    }

    #[test]
    fn empty_inputs_have_no_aggregate() {
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn std_dev_is_population() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
        assert_eq!(std_dev(&[3.0]), Some(0.0));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert_eq!(finite_or_none(f64::NAN), None);
        assert_eq!(finite_or_none(f64::INFINITY), None);
        assert_eq!(finite_or_none(1.5), Some(1.5));
    }
}
