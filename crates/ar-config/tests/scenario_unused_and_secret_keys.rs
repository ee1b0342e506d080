//! Unused-key guard, secret-literal guard and secret resolution.
//!
//! # Invariants under test
//!
//! 1. A misspelled key is reported as unused; `Fail` turns it into an error.
//! 2. A literal private key anywhere in config aborts loading, and the
//!    error never echoes the value.
//! 3. `identity_key_env` empty → no key; set + present → key; set + absent →
//!    error naming the variable.

use ar_config::{
    load_layered_yaml_from_strings, report_unused_keys, resolve_secrets, AutoretrieveConfig,
    UnusedKeyPolicy, DEFAULT_YAML,
};

#[test]
fn typo_key_is_reported_unused() {
    let loaded = load_layered_yaml_from_strings(&[
        DEFAULT_YAML,
        "announce:\n  tick_intervall_secs: 5\n",
    ])
    .unwrap();

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/announce/tick_intervall_secs".to_string()]
    );

    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn literal_private_key_is_rejected_and_redacted() {
    let key = "CAESQHJ1bm5pbmctb3V0LW9mLWlkZWFzLWZvci1mYWtlLWtleXM=";
    let overlay = format!("provider:\n  identity_key_env: \"{key}\"\n");
    let err = load_layered_yaml_from_strings(&[DEFAULT_YAML, &overlay]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"));
    assert!(msg.contains("/provider/identity_key_env"));
    assert!(!msg.contains(key));
}

fn config_with_key_env(name: &str) -> AutoretrieveConfig {
    let overlay = format!("provider:\n  identity_key_env: \"{name}\"\n");
    let loaded = load_layered_yaml_from_strings(&[DEFAULT_YAML, &overlay]).unwrap();
    AutoretrieveConfig::from_loaded(&loaded).unwrap()
}

#[test]
fn empty_key_env_means_ephemeral_identity() {
    let loaded = load_layered_yaml_from_strings(&[DEFAULT_YAML]).unwrap();
    let cfg = AutoretrieveConfig::from_loaded(&loaded).unwrap();
    let secrets = resolve_secrets(&cfg).unwrap();
    assert!(secrets.provider_identity_key.is_none());
}

#[test]
fn configured_key_env_resolves_and_debug_redacts() {
    // unique name per test; env is process-global
    let var = "AR_TEST_SECRETS_PRESENT_KEY";
    std::env::set_var(var, "c29tZS1rZXk=");
    let secrets = resolve_secrets(&config_with_key_env(var)).unwrap();
    assert_eq!(secrets.provider_identity_key.as_deref(), Some("c29tZS1rZXk="));
    assert!(!format!("{secrets:?}").contains("c29tZS1rZXk="));
    std::env::remove_var(var);
}

#[test]
fn configured_but_missing_key_env_is_an_error_naming_the_var() {
    let var = "AR_TEST_SECRETS_ABSENT_KEY";
    std::env::remove_var(var);
    let err = resolve_secrets(&config_with_key_env(var)).unwrap_err();
    assert!(err.to_string().contains(var));
}
