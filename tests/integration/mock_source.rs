//! Scripted price source for integration testing.
//!
//! Serves queued snapshots in order, then repeats the last one. A forced
//! error makes the next fetch fail, mimicking an upstream outage.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use arbscope::prices::PriceSource;
use arbscope::types::{PriceSample, SamplesByPair};

#[derive(Clone, Default)]
pub struct MockSource {
    queue: Arc<Mutex<VecDeque<SamplesByPair>>>,
    last: Arc<Mutex<SamplesByPair>>,
    force_error: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockSource {
    pub fn new(snapshots: Vec<SamplesByPair>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(snapshots.into())),
            ..Default::default()
        }
    }

    /// Fail the next fetch with `msg`.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PriceSource for MockSource {
    async fn fetch_prices(&self) -> Result<SamplesByPair> {
        *self.calls.lock().unwrap() += 1;

        if let Some(msg) = self.force_error.lock().unwrap().take() {
            return Err(anyhow!(msg));
        }

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

/// Build a snapshot from `(pair, [(exchange, price)])` rows.
pub fn snapshot(rows: &[(&str, Vec<(&str, Decimal)>)]) -> SamplesByPair {
    rows.iter()
        .map(|(pair, quotes)| {
            let samples = quotes
                .iter()
                .map(|(exchange, price)| PriceSample::new(exchange, pair, *price, 1_700_000_000_000))
                .collect();
            (pair.to_string(), samples)
        })
        .collect()
}
