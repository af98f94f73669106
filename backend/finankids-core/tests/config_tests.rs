use finankids_core::services::achievement_service::ClaimPolicy;
use finankids_core::services::reward::BonusPrecedence;
use finankids_core::Config;
use serial_test::serial;

const VARS: &[&str] = &[
    "APP_ENV",
    "MONGO_URI",
    "MONGO_DATABASE",
    "APP__DATABASE__MONGO_DATABASE",
    "APP__EVENTS__BUS_CAPACITY",
    "APP__ACHIEVEMENTS__CLAIM_POLICY",
    "APP__LESSONS__BONUS_PRECEDENCE",
    "APP__LESSONS__PERFECT_BONUS_MULTIPLIER",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
    std::env::set_var("APP_ENV", "integration");
    std::env::set_var("SKIP_ROOT_ENV", "1");
}

#[test]
#[serial]
fn load_without_sources_uses_defaults() {
    clear_env();
    let config = Config::load().unwrap();
    assert_eq!(config.mongo_database, "finankids");
    assert_eq!(config.bus_capacity, None);
    assert_eq!(config.claim_policy, ClaimPolicy::Strict);
    assert_eq!(config.bonus_precedence, BonusPrecedence::Compound);
}

#[test]
#[serial]
fn prefixed_env_overrides_settings() {
    clear_env();
    std::env::set_var("APP__EVENTS__BUS_CAPACITY", "16");
    std::env::set_var("APP__ACHIEVEMENTS__CLAIM_POLICY", "permissive");
    std::env::set_var("APP__LESSONS__BONUS_PRECEDENCE", "additive");

    let config = Config::load().unwrap();
    assert_eq!(config.bus_capacity, Some(16));
    assert_eq!(config.claim_policy, ClaimPolicy::Permissive);
    assert_eq!(config.bonus_precedence, BonusPrecedence::Additive);

    clear_env();
}

#[test]
#[serial]
fn legacy_env_is_used_when_prefixed_key_is_missing() {
    clear_env();
    std::env::set_var("MONGO_DATABASE", "finankids_legacy");
    assert_eq!(Config::load().unwrap().mongo_database, "finankids_legacy");

    std::env::set_var("APP__DATABASE__MONGO_DATABASE", "finankids_app");
    assert_eq!(Config::load().unwrap().mongo_database, "finankids_app");

    clear_env();
}

#[test]
#[serial]
fn invalid_multiplier_fails_to_load() {
    clear_env();
    std::env::set_var("APP__LESSONS__PERFECT_BONUS_MULTIPLIER", "0.5");
    assert!(Config::load().is_err());
    clear_env();
}
