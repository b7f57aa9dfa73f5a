//! Read-through cache in front of a market-data port.
//!
//! Successful responses are kept per `(symbol, start, end)` for a fixed TTL
//! measured from when the provider call completed. Concurrent identical
//! requests share one provider call: the first caller becomes the loader and
//! the rest block on the same slot until it is filled. Failures are handed to
//! every caller waiting on that call and then dropped from the cache, so the
//! next request goes back to the provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::domain::error::ChartError;
use crate::domain::fetcher::SharedDataPort;
use crate::domain::ohlcv::RawBar;
use crate::ports::data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    symbol: String,
    start: NaiveDate,
    end: NaiveDate,
}

type Outcome = (Instant, Result<Vec<RawBar>, ChartError>);

/// One provider call, possibly still running.
#[derive(Default)]
struct Flight {
    outcome: OnceLock<Outcome>,
}

impl Flight {
    fn expired(&self, ttl: Duration) -> bool {
        matches!(self.outcome.get(), Some((at, _)) if at.elapsed() >= ttl)
    }
}

pub struct CachedDataPort {
    inner: SharedDataPort,
    ttl: Duration,
    flights: DashMap<CacheKey, Arc<Flight>>,
    provider_calls: AtomicUsize,
}

impl CachedDataPort {
    pub fn new(inner: SharedDataPort, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            flights: DashMap::new(),
            provider_calls: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of calls that actually reached the wrapped port.
    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::SeqCst)
    }

    /// Entries currently held, including in-flight ones.
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Drops completed entries older than the TTL.
    pub fn evict_expired(&self) {
        self.flights.retain(|_, flight| !flight.expired(self.ttl));
    }

    pub fn clear(&self) {
        self.flights.clear();
    }

    fn slot(&self, key: &CacheKey) -> Arc<Flight> {
        // The shard guard must not outlive this function: loaders block while
        // holding only the Arc.
        match self.flights.entry(key.clone()) {
            Entry::Occupied(o) => Arc::clone(o.get()),
            Entry::Vacant(v) => {
                let flight = Arc::new(Flight::default());
                v.insert(Arc::clone(&flight));
                flight
            }
        }
    }

    fn forget(&self, key: &CacheKey, flight: &Arc<Flight>) {
        self.flights
            .remove_if(key, |_, current| Arc::ptr_eq(current, flight));
    }
}

impl MarketDataPort for CachedDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, ChartError> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            start: start_date,
            end: end_date,
        };

        loop {
            let flight = self.slot(&key);

            if flight.expired(self.ttl) {
                debug!(%symbol, %start_date, %end_date, "cache entry expired");
                self.forget(&key, &flight);
                continue;
            }

            let mut loaded_here = false;
            let (_, result) = flight.outcome.get_or_init(|| {
                loaded_here = true;
                self.provider_calls.fetch_add(1, Ordering::SeqCst);
                debug!(%symbol, %start_date, %end_date, "cache miss, calling provider");
                let result = self.inner.fetch_ohlcv(symbol, start_date, end_date);
                (Instant::now(), result)
            });

            if !loaded_here {
                debug!(%symbol, %start_date, %end_date, "served from cache");
            }
            if result.is_err() {
                self.forget(&key, &flight);
            }
            return result.clone();
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, ChartError> {
        self.inner.list_symbols()
    }
}
