//! TTL Memo demo
//!
//! Wraps a slow lookup, calls it a few times, and prints the cache statistics.
//! Run with `RUST_LOG=ttl_memo=debug cargo run --example memo_demo` to see
//! hit/miss decisions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ttl_memo::{MemoConfig, Memoized};

async fn slow_square(x: u64) -> anyhow::Result<u64> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(x * x)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_demo=info,ttl_memo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MemoConfig::from_secs_f64(1.0)?.with_name("slow_square");
    let memo = Arc::new(Memoized::new(slow_square, config));

    for x in [3, 3, 4, 3] {
        let started = Instant::now();
        let value = memo.call(x).await?;
        info!("square({}) = {} in {:?}", x, value, started.elapsed());
    }

    // Eight concurrent callers, one computation
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let memo = Arc::clone(&memo);
            tokio::spawn(async move { memo.call(9).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let value = memo.call(3).await?;
    info!("square(3) = {} after expiry", value);

    let stats = memo.stats();
    info!(
        "hits={}, coalesced={}, misses={}, entries={}, hit_rate={:.2}",
        stats.hits,
        stats.coalesced,
        stats.misses,
        stats.total_entries,
        stats.hit_rate()
    );

    Ok(())
}
