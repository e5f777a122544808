//! Threshold-triggered advisory messages

use crate::config::ProjectorConfig;

/// Build advisories for a likely-scenario day count and daily burn
///
/// At most one urgency advisory is emitted (the tightest threshold that
/// applies), followed by the optional burn advisory and the standing
/// monitoring advisories.
pub fn advisories(config: &ProjectorConfig, likely_days: Option<i64>, daily_burn: f64) -> Vec<String> {
    let mut messages = Vec::new();
    let [urgent, warning, caution] = config.advisory_days;

    if let Some(days) = likely_days {
        if days < urgent {
            messages.push(format!(
                "URGENT: Fund insolvency projected within {} days. Immediate legislative action required.",
                urgent
            ));
        } else if days < warning {
            messages.push(format!(
                "WARNING: Fund insolvency projected within {} days. Consider emergency funding measures.",
                warning
            ));
        } else if days < caution {
            messages.push(format!(
                "CAUTION: Fund insolvency projected within {} days. Begin contingency planning.",
                caution
            ));
        }
    }

    if let Some(threshold) = config.high_burn_daily_threshold {
        if daily_burn > threshold {
            messages.push(format!(
                "Daily burn rate of {:.2} exceeds {:.2}. Evaluate claims processing controls.",
                daily_burn, threshold
            ));
        }
    }

    messages.push("Monitor claims volume trends weekly for early detection of acceleration.".to_string());
    messages.push("Maintain reserve fund analysis with updated actuarial projections.".to_string());

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_levels() {
        let config = ProjectorConfig::default();

        assert!(advisories(&config, Some(45), 1.0)[0].starts_with("URGENT"));
        assert!(advisories(&config, Some(120), 1.0)[0].starts_with("WARNING"));
        assert!(advisories(&config, Some(300), 1.0)[0].starts_with("CAUTION"));
        assert_eq!(advisories(&config, Some(900), 1.0).len(), 2);
        assert_eq!(advisories(&config, None, 1.0).len(), 2);
    }

    #[test]
    fn test_high_burn_advisory() {
        let config = ProjectorConfig {
            high_burn_daily_threshold: Some(2.5),
            ..Default::default()
        };

        let messages = advisories(&config, Some(900), 3.0);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("3.00 exceeds 2.50"));

        assert_eq!(advisories(&config, Some(900), 2.0).len(), 2);
    }

    #[test]
    fn test_high_burn_advisory_fires_with_defaults() {
        let messages = advisories(&ProjectorConfig::default(), Some(900), 1.5);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("1.50 exceeds 1.00"));
    }
}
