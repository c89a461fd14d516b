/*!
 * Tests for application configuration functionality
 */

use vocabclip::app_config::{Config, EgressMode, LogLevel};

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.database_path, "./vocab.db");
    assert_eq!(config.batch.limit, 100);
    assert_eq!(config.batch.max_retries, None);
    assert_eq!(config.batch.sleep_min_secs, 3.0);
    assert_eq!(config.batch.sleep_max_secs, 8.0);
    assert_eq!(config.batch.max_consecutive_errors, 10);
    assert_eq!(config.batch.reprocess_threshold(), None);
    assert_eq!(config.window.max_duration_secs, 15.0);
    assert_eq!(config.window.max_expand, 6);
    assert_eq!(config.egress.mode, EgressMode::None);
    assert_eq!(config.egress.tor.socks_port, 9050);
    assert_eq!(config.egress.tor.control_port, 9051);
    assert_eq!(config.egress.tor.newnym_settle_ms, 3000);
    assert_eq!(config.egress.tor.fallback_wait_ms, 15000);
    assert_eq!(config.provider.language, "en");
    assert_eq!(config.log_level, LogLevel::Info);
}

/// The written default file parses back to the same values
#[test]
fn test_default_config_serialized_shouldParseBack() {
    let json = serde_json::to_string_pretty(&Config::default()).unwrap();

    let parsed: Config = serde_json::from_str(&json).unwrap();

    assert!(json.contains("\"mode\": \"none\""));
    assert_eq!(parsed.egress.tor.host, "127.0.0.1");
    assert_eq!(parsed.window.max_expand, 6);
    assert!(parsed.validate().is_ok());
}

/// Unknown egress modes are rejected at parse time
#[test]
fn test_config_withUnknownEgressMode_shouldFailToParse() {
    let result: Result<Config, _> = serde_json::from_str(r#"{"egress":{"mode":"vpn"}}"#);

    assert!(result.is_err());
}

/// Inline proxies are validated
#[test]
fn test_config_validation_withBadInlineProxy_shouldFail() {
    let mut config = Config::default();
    config.egress.mode = EgressMode::List;
    config.egress.proxies = vec!["10.0.0.1:1080".to_string(), "socks5://".to_string()];

    assert!(config.validate().is_err());

    config.egress.proxies.pop();
    assert!(config.validate().is_ok());
}
