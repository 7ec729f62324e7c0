//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check key canonicalization and memoization behavior over
//! generated arguments.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CallArgs, Keyable, ManualClock};
use crate::config::MemoConfig;
use crate::memo::BlockingMemoized;

// == Test Configuration ==
const TEST_TTL_SECS: u64 = 60;

// == Strategies ==
/// Generates argument tuples of mixed scalar types
fn args_strategy() -> impl Strategy<Value = (i64, String, bool)> {
    (any::<i64>(), "[a-zA-Z0-9_ ]{0,32}", any::<bool>())
}

/// Generates small string-keyed maps
fn map_strategy() -> impl Strategy<Value = BTreeMap<String, i32>> {
    prop::collection::btree_map("[a-z]{1,8}", any::<i32>(), 0..16)
}

/// Builds a blocking wrapper that counts how often the operation runs
fn counting_memo(
    ttl: Duration,
    clock: Arc<ManualClock>,
) -> (
    Arc<AtomicUsize>,
    BlockingMemoized<i64, i64, anyhow::Error, impl Fn(i64) -> anyhow::Result<i64>>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let memo = BlockingMemoized::with_clock(
        move |x: i64| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(x.wrapping_mul(2))
        },
        MemoConfig::new(ttl),
        clock,
    );
    (calls, memo)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Equal arguments always canonicalize to the same key.
    #[test]
    fn prop_key_determinism(args in args_strategy()) {
        let copy = args.clone();
        prop_assert_eq!(args.cache_key().unwrap(), copy.cache_key().unwrap());
    }

    // Different arguments never share a key.
    #[test]
    fn prop_key_discrimination(a in args_strategy(), b in args_strategy()) {
        prop_assume!(a != b);
        prop_assert_ne!(a.cache_key().unwrap(), b.cache_key().unwrap());
    }

    // Map insertion order does not influence the key.
    #[test]
    fn prop_map_order_independence(map in map_strategy()) {
        let forward: HashMap<String, i32> = map.clone().into_iter().collect();
        let mut reversed = HashMap::with_capacity(map.len());
        for (k, v) in map.iter().rev() {
            reversed.insert(k.clone(), *v);
        }
        prop_assert_eq!(forward.cache_key().unwrap(), reversed.cache_key().unwrap());
        prop_assert_eq!(forward.cache_key().unwrap(), map.cache_key().unwrap());
    }

    // The order named arguments are bound in does not influence the key.
    #[test]
    fn prop_named_args_form_a_set(map in map_strategy(), positional in any::<i32>()) {
        let mut forward = CallArgs::new().arg(positional).unwrap();
        for (k, v) in &map {
            forward = forward.named(k.clone(), *v).unwrap();
        }
        let mut backward = CallArgs::new().arg(positional).unwrap();
        for (k, v) in map.iter().rev() {
            backward = backward.named(k.clone(), *v).unwrap();
        }
        prop_assert_eq!(forward.cache_key().unwrap(), backward.cache_key().unwrap());
    }

    // Repeated calls within the TTL invoke the operation once per distinct argument.
    #[test]
    fn prop_hits_within_ttl(xs in prop::collection::vec(-50i64..50, 1..64)) {
        let clock = Arc::new(ManualClock::new());
        let (calls, memo) = counting_memo(Duration::from_secs(TEST_TTL_SECS), clock);

        for x in &xs {
            prop_assert_eq!(memo.call(*x).unwrap(), x * 2);
        }

        let distinct: std::collections::HashSet<_> = xs.iter().collect();
        prop_assert_eq!(calls.load(Ordering::SeqCst), distinct.len());
        prop_assert_eq!(memo.len(), distinct.len());
    }

    // With a zero TTL every call invokes the operation.
    #[test]
    fn prop_zero_ttl_never_hits(xs in prop::collection::vec(-5i64..5, 1..64)) {
        let clock = Arc::new(ManualClock::new());
        let (calls, memo) = counting_memo(Duration::ZERO, clock);

        for x in &xs {
            memo.call(*x).unwrap();
        }

        prop_assert_eq!(calls.load(Ordering::SeqCst), xs.len());
        prop_assert_eq!(memo.stats().hits, 0);
    }

    // Once the TTL has elapsed, each argument is recomputed exactly once more.
    #[test]
    fn prop_expiry_recomputes(xs in prop::collection::vec(-20i64..20, 1..32), extra in 0u64..3600) {
        let clock = Arc::new(ManualClock::new());
        let (calls, memo) = counting_memo(Duration::from_secs(TEST_TTL_SECS), clock.clone());

        for x in &xs {
            memo.call(*x).unwrap();
        }
        let first_round = calls.load(Ordering::SeqCst);

        clock.advance(Duration::from_secs(TEST_TTL_SECS + extra));
        for x in &xs {
            memo.call(*x).unwrap();
        }

        prop_assert_eq!(calls.load(Ordering::SeqCst), first_round * 2);
    }
}
