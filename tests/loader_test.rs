mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use common::TestBackend;
use proteus::domain::LoadingStatus;
use proteus::error::FormError;
use proteus::remote::{CachePolicy, FormLoader, RetryPolicy};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(40),
    }
}

#[tokio::test]
async fn config_cache_is_idempotent_within_ttl() -> anyhow::Result<()> {
    let backend = TestBackend::start().await;
    let loader = FormLoader::new();
    let url = backend.url("/config/ok");

    let first = loader.load_config(&url, false).await?;
    let second = loader.load_config(&url, false).await?;

    assert_eq!(first, second);
    assert_eq!(backend.hits.config.load(Ordering::SeqCst), 1);

    // Bypassing the cache issues a fresh network call.
    loader.load_config(&url, true).await?;
    assert_eq!(backend.hits.config.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn expired_entries_trigger_a_refetch() -> anyhow::Result<()> {
    let backend = TestBackend::start().await;
    let loader = FormLoader::with_policies(
        fast_retry(),
        CachePolicy {
            config_ttl: Duration::from_millis(150),
            options_ttl: Duration::from_millis(150),
        },
    );
    let url = backend.url("/config/ok");

    loader.load_config(&url, false).await?;
    loader.load_config(&url, false).await?;
    assert_eq!(backend.hits.config.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    loader.load_config(&url, false).await?;
    assert_eq!(backend.hits.config.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn backoff_schedule_recovers_transparently() -> anyhow::Result<()> {
    let backend = TestBackend::start().await;
    let loader = FormLoader::with_policies(fast_retry(), CachePolicy::default());
    let url = backend.url("/config/flaky");

    let started = Instant::now();
    let config = loader.load_config(&url, false).await?;
    assert_eq!(config.elements.len(), 2);

    // Exactly three attempts: fail, fail, succeed.
    assert_eq!(backend.hits.flaky.load(Ordering::SeqCst), 3);

    // Inter-attempt delays follow initial * 2^(n-1): 40ms then 80ms.
    let times = backend.hits.flaky_times.lock().unwrap().clone();
    assert!(times[1] - times[0] >= Duration::from_millis(40));
    assert!(times[2] - times[1] >= Duration::from_millis(80));
    assert!(started.elapsed() >= Duration::from_millis(120));
    Ok(())
}

#[tokio::test]
async fn exhausted_retries_propagate_transport_error() {
    let backend = TestBackend::start().await;
    let loader = FormLoader::with_policies(fast_retry(), CachePolicy::default());

    let err = loader
        .load_config(&backend.url("/broken"), false)
        .await
        .unwrap_err();
    match err {
        FormError::Transport { status, .. } => assert_eq!(status, Some(500)),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn schema_failure_is_distinct_from_transport_failure() {
    let backend = TestBackend::start().await;
    let loader = FormLoader::with_policies(fast_retry(), CachePolicy::default());
    let url = backend.url("/config/invalid");

    let err = loader.load_config(&url, false).await.unwrap_err();
    match err {
        FormError::Schema(violations) => {
            assert!(violations.iter().any(|v| v.code == "unrecognized_type"));
        }
        other => panic!("expected schema error, got {other:?}"),
    }

    // The HTTP call succeeded exactly once; nothing was retried or cached.
    assert_eq!(backend.hits.config.load(Ordering::SeqCst), 1);
    loader.load_config(&url, false).await.unwrap_err();
    assert_eq!(backend.hits.config.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn loading_state_reaches_one_terminal_state_per_load() -> anyhow::Result<()> {
    let backend = TestBackend::start().await;
    let loader = FormLoader::new();
    let state = loader.loading_state();

    assert_eq!(state.borrow().status, LoadingStatus::Idle);

    loader.load_config(&backend.url("/config/ok"), false).await?;
    {
        let current = state.borrow();
        assert_eq!(current.status, LoadingStatus::Success);
        assert!(current.has_data());
        assert!(current.duration().is_some());
    }

    loader
        .load_config(&backend.url("/config/invalid"), false)
        .await
        .unwrap_err();
    {
        let current = state.borrow();
        assert_eq!(current.status, LoadingStatus::Error);
        let error = current.error.clone().unwrap();
        assert!(error.message.contains("invalid form configuration"));
    }
    Ok(())
}

#[tokio::test]
async fn option_lists_are_cached_and_mapped() -> anyhow::Result<()> {
    let backend = TestBackend::start().await;
    let loader = FormLoader::new();
    let url = backend.url("/options/countries");

    let options = loader.load_options(&url, false).await?;
    loader.load_options(&url, false).await?;
    assert_eq!(backend.hits.options.load(Ordering::SeqCst), 1);

    let mapped = proteus::remote::map_options(&options, Some("id"), Some("name"));
    assert_eq!(mapped.len(), 3);
    assert_eq!(mapped[0].value, Some(serde_json::json!("AT")));
    assert_eq!(mapped[0].label.as_deref(), Some("Austria"));
    Ok(())
}

#[tokio::test]
async fn non_array_option_body_is_a_load_failure() {
    let backend = TestBackend::start().await;
    let loader = FormLoader::with_policies(fast_retry(), CachePolicy::default());

    let err = loader
        .load_options(&backend.url("/config/ok"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Transport { .. }));
}
