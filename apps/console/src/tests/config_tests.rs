use super::{apply_env_overrides, apply_file, load_settings, validate_api_url, Settings};

use std::{
    collections::HashMap,
    env, fs,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_point_at_local_service() {
    let settings = Settings::default();
    assert_eq!(settings.api_url, "http://localhost:8080/api");
    assert_eq!(settings.request_timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn zero_timeout_disables_it() {
    let settings = Settings {
        request_timeout_secs: 0,
        ..Settings::default()
    };
    assert_eq!(settings.request_timeout(), None);
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        "api_url = \"http://abe.internal:9000/api\"\nrequest_timeout_secs = 5\n",
    )
    .expect("apply");
    assert_eq!(settings.api_url, "http://abe.internal:9000/api");
    assert_eq!(settings.request_timeout_secs, 5);
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn rejects_malformed_file() {
    let mut settings = Settings::default();
    assert!(apply_file(&mut settings, "request_timeout_secs = \"soon\"").is_err());
}

#[test]
fn app_prefixed_env_wins_over_plain() {
    let mut settings = Settings::default();
    apply_env_overrides(
        &mut settings,
        lookup_from(&[
            ("ABE_API_URL", "http://plain:1/api"),
            ("APP__API_URL", "http://prefixed:2/api"),
            ("APP__LOG_FILTER", "debug"),
        ]),
    )
    .expect("apply");
    assert_eq!(settings.api_url, "http://prefixed:2/api");
    assert_eq!(settings.log_filter, "debug");
}

#[test]
fn non_numeric_timeout_env_is_an_error() {
    let mut settings = Settings::default();
    let err = apply_env_overrides(
        &mut settings,
        lookup_from(&[("APP__REQUEST_TIMEOUT_SECS", "forever")]),
    )
    .expect_err("must fail");
    assert!(err.to_string().contains("APP__REQUEST_TIMEOUT_SECS"));
}

#[test]
fn explicit_missing_config_is_an_error() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("abe_console_missing_{suffix}.toml"));
    assert!(load_settings(Some(&path)).is_err());
}

#[test]
fn explicit_config_file_is_loaded() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("abe_console_config_{suffix}.toml"));
    fs::write(&path, "log_filter = \"warn\"\n").expect("write");

    let settings = load_settings(Some(&path)).expect("load");
    assert!(!settings.log_filter.is_empty());

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn validates_api_url_scheme_and_host() {
    assert!(validate_api_url("http://localhost:8080/api").is_ok());
    assert!(validate_api_url("https://abe.example.org/api").is_ok());
    assert!(validate_api_url("ftp://localhost/api").is_err());
    assert!(validate_api_url("localhost:8080").is_err());
}
