use std::collections::BTreeMap;

use stepper_engine::{FeedConfig, StepperConfig, DEFAULT_CACHE_ENTRIES, DEFAULT_IDLE_TIMEOUT_SECS};
use tracing::info;

#[test]
fn test_default_config() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = StepperConfig::default();

    assert_eq!(config.cache.max_entries, DEFAULT_CACHE_ENTRIES);
    assert_eq!(config.session.idle_timeout_secs, DEFAULT_IDLE_TIMEOUT_SECS);
    assert_eq!(config.session.default_timeout_ms, stepper_common::DEFAULT_STEP_TIMEOUT_MS);
    assert_eq!(config.store.root, None);
    assert!(config.feeds.is_empty());
}

#[test]
fn test_child_stream_encodings() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut config = StepperConfig::default().with_feed_encoding("FEED", "ISO-8859-1");
    config.feeds.insert(
        "CTX_FEED".to_string(),
        FeedConfig {
            encoding: None,
            child_encodings: BTreeMap::from([("Context".to_string(), "ISO-8859-1".to_string())]),
        },
    );

    let properties = config.feed_properties();
    assert_eq!(properties.encoding("FEED", None), "ISO-8859-1");
    // Children inherit the feed's encoding unless they set their own.
    assert_eq!(properties.encoding("FEED", Some("Context")), "ISO-8859-1");
    assert_eq!(properties.encoding("CTX_FEED", None), "UTF-8");
    assert_eq!(properties.encoding("CTX_FEED", Some("Context")), "ISO-8859-1");
}

#[test]
fn test_config_clone() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = StepperConfig::default().with_cache_entries(3);

    let cloned = config.clone();

    assert_eq!(config, cloned);
    assert_eq!(cloned.cache.max_entries, 3);
}
