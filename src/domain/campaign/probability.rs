//! Advisory recovery likelihood for reporting.
//!
//! Nothing in the engine branches on this value.

const ATTEMPT_DECAY: f64 = 0.85;
const FLOOR: f64 = 0.02;
const CEILING: f64 = 0.98;

fn reason_base(failure_reason: &str) -> f64 {
    match failure_reason {
        "insufficient_funds" => 0.45,
        "card_expired" | "expired_card" => 0.65,
        "card_declined" | "do_not_honor" => 0.35,
        "processing_error" | "network_error" => 0.8,
        _ => 0.5,
    }
}

fn segment_multiplier(segment: Option<&str>) -> f64 {
    match segment {
        Some("enterprise") => 1.15,
        Some("consumer") => 0.9,
        _ => 1.0,
    }
}

/// Estimated probability that the failed payment is eventually recovered.
pub fn success_probability(failure_reason: &str, attempt_count: u32, segment: Option<&str>) -> f64 {
    let decay = ATTEMPT_DECAY.powi(attempt_count.saturating_sub(1) as i32);
    let p = reason_base(failure_reason) * decay * segment_multiplier(segment);
    (p.clamp(FLOOR, CEILING) * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_reason_base() {
        assert_eq!(success_probability("insufficient_funds", 1, None), 0.45);
        assert_eq!(success_probability("something_else", 1, None), 0.5);
    }

    #[test]
    fn decays_with_attempts() {
        let first = success_probability("card_declined", 1, None);
        let third = success_probability("card_declined", 3, None);
        assert!(third < first);
    }

    #[test]
    fn segment_adjusts_and_result_is_clamped() {
        assert!(success_probability("processing_error", 1, Some("enterprise")) <= CEILING);
        assert_eq!(success_probability("card_declined", 40, Some("consumer")), FLOOR);
        assert!((success_probability("card_expired", 1, Some("enterprise")) - 0.7475).abs() < 0.001);
    }
}
