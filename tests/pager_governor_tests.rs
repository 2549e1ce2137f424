use music_library_platform_sync::error::PlatformError;
use music_library_platform_sync::governor::{with_retry, write_chunked, ChunkReport, RetryPolicy};
use music_library_platform_sync::pager::{collect_pages, dedup_by_key, Page};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff_floor: Duration::from_millis(0),
        inter_call_delay: Duration::from_millis(0),
    }
}

fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("id{}", i)).collect()
}

#[test]
fn collect_pages_accumulates_until_next_is_absent() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let pages = vec![vec![1, 2], vec![3, 4], vec![5]];

    let items = rt
        .block_on(collect_pages(0usize, |offset| {
            let page = pages[offset].clone();
            let next = if offset + 1 < pages.len() {
                Some(offset + 1)
            } else {
                None
            };
            async move {
                Ok(Page {
                    items: page,
                    next,
                })
            }
        }))
        .unwrap();

    assert_eq!(items, vec![1, 2, 3, 4, 5]);
}

#[test]
fn collect_pages_propagates_page_errors() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let res: Result<Vec<u32>, _> = rt.block_on(collect_pages(0u32, |_| async {
        Err(PlatformError::Api("boom".into()))
    }));
    assert!(res.is_err());
}

#[test]
fn dedup_preserves_first_seen_order() {
    let mut items = vec!["a", "b", "a", "c", "b"];
    dedup_by_key(&mut items, |s| s.to_string());
    assert_eq!(items, vec!["a", "b", "c"]);
}

#[test]
fn chunks_are_exact_and_ordered() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let calls: Arc<Mutex<Vec<usize>>> = Default::default();
    let all = ids(130);

    let report = {
        let calls = calls.clone();
        rt.block_on(write_chunked(&all, 50, &fast_policy(3), move |chunk| {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(chunk.len());
                Ok(())
            }
        }))
        .unwrap()
    };

    assert_eq!(*calls.lock().unwrap(), vec![50, 50, 30]);
    assert_eq!(
        report,
        ChunkReport {
            written: 130,
            skipped: 0
        }
    );
}

#[test]
fn rate_limited_chunk_is_retried_in_place() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let calls: Arc<Mutex<Vec<Vec<String>>>> = Default::default();
    let all = ids(4);

    let report = {
        let calls = calls.clone();
        rt.block_on(write_chunked(&all, 2, &fast_policy(3), move |chunk| {
            let calls = calls.clone();
            async move {
                let mut log = calls.lock().unwrap();
                let first_attempt_of_first_chunk = log.is_empty();
                log.push(chunk);
                if first_attempt_of_first_chunk {
                    Err(PlatformError::RateLimited { retry_after: None })
                } else {
                    Ok(())
                }
            }
        }))
        .unwrap()
    };

    let log = calls.lock().unwrap();
    // same chunk re-issued, no other chunk interleaved, nothing skipped
    assert_eq!(log.len(), 3);
    assert_eq!(log[0], log[1]);
    assert_ne!(log[1], log[2]);
    assert_eq!(
        report,
        ChunkReport {
            written: 4,
            skipped: 0
        }
    );
}

#[test]
fn exhausted_rate_limit_retries_skip_the_chunk() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let all = ids(3);

    let report = rt
        .block_on(write_chunked(&all, 2, &fast_policy(2), |_chunk| async {
            Err(PlatformError::RateLimited {
                retry_after: Some(Duration::from_millis(0)),
            })
        }))
        .unwrap();

    assert_eq!(
        report,
        ChunkReport {
            written: 0,
            skipped: 3
        }
    );
}

#[test]
fn non_retryable_chunk_error_skips_only_that_chunk() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let calls: Arc<Mutex<u32>> = Default::default();
    let all = ids(6);

    let report = {
        let calls = calls.clone();
        rt.block_on(write_chunked(&all, 2, &fast_policy(3), move |_chunk| {
            let calls = calls.clone();
            async move {
                let mut n = calls.lock().unwrap();
                *n += 1;
                if *n == 2 {
                    Err(PlatformError::Api("500 => server error".into()))
                } else {
                    Ok(())
                }
            }
        }))
        .unwrap()
    };

    assert_eq!(
        report,
        ChunkReport {
            written: 4,
            skipped: 2
        }
    );
}

#[test]
fn token_expiry_aborts_the_run() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let calls: Arc<Mutex<u32>> = Default::default();
    let all = ids(6);

    let res = {
        let calls = calls.clone();
        rt.block_on(write_chunked(&all, 2, &fast_policy(3), move |_chunk| {
            let calls = calls.clone();
            async move {
                let mut n = calls.lock().unwrap();
                *n += 1;
                if *n == 2 {
                    Err(PlatformError::TokenExpired)
                } else {
                    Ok(())
                }
            }
        }))
    };

    assert!(matches!(res, Err(PlatformError::TokenExpired)));
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[test]
fn with_retry_recovers_from_transient_rate_limits() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let attempts: Arc<Mutex<u32>> = Default::default();

    let res = {
        let attempts = attempts.clone();
        rt.block_on(with_retry(&fast_policy(3), move || {
            let attempts = attempts.clone();
            async move {
                let mut n = attempts.lock().unwrap();
                *n += 1;
                if *n < 3 {
                    Err(PlatformError::RateLimited { retry_after: None })
                } else {
                    Ok(42u32)
                }
            }
        }))
    };

    assert_eq!(res.unwrap(), 42);
    assert_eq!(*attempts.lock().unwrap(), 3);
}

#[test]
fn with_retry_gives_up_after_max_attempts() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let attempts: Arc<Mutex<u32>> = Default::default();

    let res: Result<u32, _> = {
        let attempts = attempts.clone();
        rt.block_on(with_retry(&fast_policy(2), move || {
            let attempts = attempts.clone();
            async move {
                *attempts.lock().unwrap() += 1;
                Err(PlatformError::RateLimited { retry_after: None })
            }
        }))
    };

    assert!(matches!(res, Err(PlatformError::RateLimited { .. })));
    assert_eq!(*attempts.lock().unwrap(), 2);
}

#[test]
fn with_retry_passes_other_errors_through() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let res: Result<u32, _> = rt.block_on(with_retry(&fast_policy(3), || async {
        Err(PlatformError::TokenExpired)
    }));
    assert!(matches!(res, Err(PlatformError::TokenExpired)));
}
