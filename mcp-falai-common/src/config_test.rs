//! Tests for the configuration module.
//!
//! Configuration is loaded through `Config::from_lookup` so these tests never
//! touch the process environment.

use proptest::prelude::*;
use std::collections::HashMap;

use crate::config::{Config, DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
use crate::error::ConfigError;

fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|name| map.get(name).cloned())
}

#[test]
fn missing_api_key_is_an_error() {
    let err = load(&[]).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "FALAI_API_KEY"));
}

#[test]
fn blank_api_key_is_treated_as_missing() {
    let err = load(&[("FALAI_API_KEY", "   ")]).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar(_)));
}

#[test]
fn defaults_apply_when_only_key_is_set() {
    let config = load(&[("FALAI_API_KEY", "secret")]).unwrap();
    assert_eq!(config.api_key, "secret");
    assert_eq!(config.api_base, DEFAULT_API_BASE);
    assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert!(!config.embed_images);
}

#[test]
fn api_base_trailing_slash_is_trimmed() {
    let config = load(&[
        ("FALAI_API_KEY", "secret"),
        ("FALAI_API_BASE", "http://localhost:9000/"),
    ])
    .unwrap();
    assert_eq!(config.api_base, "http://localhost:9000");
    assert_eq!(
        config.endpoint("fal-ai/esrgan"),
        "http://localhost:9000/fal-ai/esrgan"
    );
}

#[test]
fn invalid_timeout_is_rejected() {
    for bad in ["0", "-5", "soon"] {
        let err = load(&[("FALAI_API_KEY", "secret"), ("FALAI_TIMEOUT_SECS", bad)]).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue(ref v, _) if v == "FALAI_TIMEOUT_SECS"),
            "timeout '{}' should be rejected",
            bad
        );
    }
}

#[test]
fn embed_images_flag_parsing() {
    for (raw, expected) in [("1", true), ("TRUE", true), ("on", true), ("no", false), ("0", false)] {
        let config = load(&[("FALAI_API_KEY", "k"), ("FALAI_EMBED_IMAGES", raw)]).unwrap();
        assert_eq!(config.embed_images, expected, "flag value '{}'", raw);
    }

    let err = load(&[("FALAI_API_KEY", "k"), ("FALAI_EMBED_IMAGES", "maybe")]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue(_, _)));
}

#[test]
fn debug_output_redacts_api_key() {
    let config = Config::new("super-secret-key");
    let debug_str = format!("{:?}", config);
    assert!(!debug_str.contains("super-secret-key"));
    assert!(debug_str.contains("redacted"));
    assert!(debug_str.contains(DEFAULT_API_BASE));
}

proptest! {
    /// Endpoints always join the base and model with exactly one slash.
    #[test]
    fn endpoint_joins_base_and_model(model in "[a-z][a-z0-9-]{2,12}/[a-z0-9-]{2,12}") {
        let config = Config::new("k");
        let endpoint = config.endpoint(&model);
        prop_assert_eq!(endpoint, format!("{}/{}", DEFAULT_API_BASE, model));

        let leading = config.endpoint(&format!("/{}", model));
        prop_assert!(!leading.contains("run//"));
    }

    /// Timeouts that parse as positive integers are preserved exactly.
    #[test]
    fn positive_timeouts_are_preserved(secs in 1u64..100_000) {
        let raw = secs.to_string();
        let config = load(&[("FALAI_API_KEY", "k"), ("FALAI_TIMEOUT_SECS", raw.as_str())]).unwrap();
        prop_assert_eq!(config.timeout_secs, secs);
    }
}
