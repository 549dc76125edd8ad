//! Single-flight
//!
//! Deduplicates identical concurrent loads: the first caller for a key
//! starts the work, later callers for the same key await the same shared
//! future. The flight removes itself from the pending map when it
//! completes, so a later call starts fresh (failures are never cached).

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::ReplaceResult;

type Flight<V> = Shared<BoxFuture<'static, ReplaceResult<V>>>;

struct Pending<K, V> {
    flights: HashMap<K, (u64, Flight<V>)>,
    next_id: u64,
    stats: FlightStats,
}

/// Counters for started and joined flights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlightStats {
    pub started: u64,
    pub joined: u64,
}

/// Per-key in-flight deduplication
pub struct SingleFlight<K, V> {
    pending: Arc<Mutex<Pending<K, V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(Pending {
                flights: HashMap::new(),
                next_id: 0,
                stats: FlightStats::default(),
            })),
        }
    }

    /// Run `work` for `key` unless a flight for `key` is already pending,
    /// in which case its result is shared.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> ReplaceResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ReplaceResult<V>> + Send + 'static,
    {
        let flight = {
            let mut pending = self.pending.lock().unwrap();
            if let Some((_, flight)) = pending.flights.get(&key) {
                let flight = flight.clone();
                pending.stats.joined += 1;
                flight
            } else {
                let id = pending.next_id;
                pending.next_id += 1;
                pending.stats.started += 1;

                let registry = Arc::clone(&self.pending);
                let owned_key = key.clone();
                let fut = work();
                let flight = async move {
                    let result = fut.await;
                    let mut pending = registry.lock().unwrap();
                    if pending.flights.get(&owned_key).is_some_and(|(fid, _)| *fid == id) {
                        pending.flights.remove(&owned_key);
                    }
                    result
                }
                .boxed()
                .shared();

                pending.flights.insert(key, (id, flight.clone()));
                flight
            }
        };
        flight.await
    }

    /// Whether a flight for `key` is pending
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().unwrap().flights.contains_key(key)
    }

    /// Forget pending flights. Current waiters still get their result; new
    /// callers start a fresh flight.
    pub fn forget(&self, key: Option<&K>) {
        let mut pending = self.pending.lock().unwrap();
        match key {
            Some(key) => {
                pending.flights.remove(key);
            }
            None => pending.flights.clear(),
        }
    }

    pub fn stats(&self) -> FlightStats {
        self.pending.lock().unwrap().stats
    }
}

impl<K, V> std::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.pending.lock().unwrap();
        f.debug_struct("SingleFlight")
            .field("pending", &pending.flights.len())
            .field("stats", &pending.stats)
            .finish()
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplaceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_concurrent_callers_share_one_run() {
        let flight: SingleFlight<String, u32> = SingleFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let results = smol::block_on(futures::future::join_all((0..4).map(|_| {
            let runs = runs.clone();
            flight.run("k".to_string(), move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                smol::future::yield_now().await;
                Ok(7)
            })
        })));

        assert!(results.iter().all(|r| *r == Ok(7)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flight.stats(), FlightStats { started: 1, joined: 3 });
        assert!(!flight.is_pending(&"k".to_string()));
    }

    #[test]
    fn test_failure_is_not_cached() {
        let flight: SingleFlight<&'static str, u32> = SingleFlight::new();

        let first = smol::block_on(flight.run("k", || async {
            Err(ReplaceError::Parse("bad".into()))
        }));
        assert!(first.is_err());

        let second = smol::block_on(flight.run("k", || async { Ok(1) }));
        assert_eq!(second, Ok(1));
        assert_eq!(flight.stats().started, 2);
    }

    #[test]
    fn test_distinct_keys_run_separately() {
        let flight: SingleFlight<u8, u8> = SingleFlight::new();
        let (a, b) = smol::block_on(futures::future::join(
            flight.run(1, || async { Ok(10) }),
            flight.run(2, || async { Ok(20) }),
        ));
        assert_eq!((a, b), (Ok(10), Ok(20)));
        assert_eq!(flight.stats().started, 2);
    }
}
