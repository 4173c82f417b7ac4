use std::sync::{Arc, Mutex};
use std::time::Duration;

use quire::application::shaping::{connection_quality, debounce, should_use_cache, throttle};
use quire::cache::{CacheConfig, DomainCache, KeyParams, Sweeper};
use quire::domain::entities::User;
use quire::domain::types::{ConnectionQuality, EffectiveType};
use quire::infra::network::StaticNetworkQuality;

#[test]
fn adaptive_policy_tracks_reported_signal() {
    let network = StaticNetworkQuality::default();
    assert_eq!(connection_quality(&network), ConnectionQuality::Unknown);
    assert!(!should_use_cache(&network));

    for (signal, quality, cached) in [
        ("slow-2g", ConnectionQuality::Slow, true),
        ("2g", ConnectionQuality::Slow, true),
        ("3g", ConnectionQuality::Medium, true),
        ("4g", ConnectionQuality::Fast, false),
        ("wifi", ConnectionQuality::Unknown, false),
    ] {
        network.report(signal);
        assert_eq!(connection_quality(&network), quality, "signal {signal}");
        assert_eq!(should_use_cache(&network), cached, "signal {signal}");
    }
}

#[tokio::test(start_paused = true)]
async fn debounced_search_fires_once_after_typing_stops() {
    let queries = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&queries);
    let search = debounce(
        move |query: String| sink.lock().expect("sink").push(query),
        Duration::from_millis(250),
    );

    for prefix in ["r", "ru", "rus", "rust"] {
        search.call(prefix.to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(queries.lock().expect("queries").is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*queries.lock().expect("queries"), vec!["rust".to_string()]);

    // A clone shares the pending slot.
    let clone = search.clone();
    search.call("again".to_string());
    assert!(clone.cancel());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(queries.lock().expect("queries").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn throttled_scroll_handler_runs_on_leading_edge() {
    let offsets = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&offsets);
    let on_scroll = throttle(
        move |offset: u32| sink.lock().expect("sink").push(offset),
        Duration::from_millis(100),
    );

    let mut ran = Vec::new();
    for offset in 0..10u32 {
        ran.push(on_scroll.call(offset));
        tokio::time::advance(Duration::from_millis(30)).await;
    }

    // Runs at 0ms, 120ms, 240ms.
    assert_eq!(*offsets.lock().expect("offsets"), vec![0, 4, 8]);
    assert_eq!(ran.iter().filter(|ran| **ran).count(), 3);
}

#[tokio::test(start_paused = true)]
async fn sweeper_clears_expired_domain_entries() {
    let config = CacheConfig {
        listing_ttl_secs: 60,
        sweep_interval_secs: 90,
        ..Default::default()
    };
    let cache = DomainCache::from_config(config.clone());
    cache.put_listing("blogs", "all", &KeyParams::new(), Vec::new());
    cache.put_user("u1", User::unknown("u1"));

    let sweeper = Sweeper::start(cache.store().clone(), config.sweep_interval());
    tokio::time::sleep(Duration::from_secs(91)).await;

    let stats = cache.stats();
    assert_eq!(stats.size, 1);
    assert_eq!(stats.keys[0].as_str(), "user:u1:");

    sweeper.stop().await;
}
