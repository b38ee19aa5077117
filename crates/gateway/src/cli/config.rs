//! `switchboard config` — validate and show the resolved configuration.

use std::str::FromStr;

use swb_domain::config::Config;

/// Semantic validation beyond what TOML parsing catches.  Returns `true`
/// when the configuration is usable.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let mut ok = true;

    let hours = &config.business_hours;
    if hours.open_hour >= hours.close_hour || hours.close_hour > 24 {
        eprintln!(
            "business_hours: open_hour ({}) must be before close_hour ({}, max 24)",
            hours.open_hour, hours.close_hour
        );
        ok = false;
    }
    if chrono_tz::Tz::from_str(&hours.timezone).is_err() {
        eprintln!("business_hours: unknown timezone {:?}", hours.timezone);
        ok = false;
    }

    let handoff = &config.handoff;
    for (name, value) in [
        ("request_timeout_ms", handoff.request_timeout_ms),
        ("inactivity_timeout_ms", handoff.inactivity_timeout_ms),
        ("waiting_tick_ms", handoff.waiting_tick_ms),
        ("duration_tick_ms", handoff.duration_tick_ms),
    ] {
        if value == 0 {
            eprintln!("handoff: {name} must be greater than zero");
            ok = false;
        }
    }

    if config.store.pending_ttl_secs * 1_000 < handoff.request_timeout_ms {
        eprintln!(
            "store: pending_ttl_secs ({}s) expires before the handoff timeout ({}ms) can fire",
            config.store.pending_ttl_secs, handoff.request_timeout_ms
        );
        ok = false;
    }

    if ok {
        println!("{config_path}: OK");
    }
    ok
}

/// Print the resolved configuration (defaults applied) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(toml) => println!("{toml}"),
        Err(e) => eprintln!("serializing config: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default(), "config.toml"));
    }

    #[test]
    fn inverted_hours_rejected() {
        let mut config = Config::default();
        config.business_hours.open_hour = 20;
        config.business_hours.close_hour = 8;
        assert!(!validate(&config, "config.toml"));
    }

    #[test]
    fn unknown_timezone_rejected() {
        let mut config = Config::default();
        config.business_hours.timezone = "Mars/Olympus_Mons".into();
        assert!(!validate(&config, "config.toml"));
    }

    #[test]
    fn zero_timer_rejected() {
        let mut config = Config::default();
        config.handoff.request_timeout_ms = 0;
        assert!(!validate(&config, "config.toml"));
    }

    #[test]
    fn pending_ttl_shorter_than_timeout_rejected() {
        let mut config = Config::default();
        config.store.pending_ttl_secs = 1;
        assert!(!validate(&config, "config.toml"));
    }
}
