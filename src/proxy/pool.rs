//! Bounded fan-out of proxy probes

use crate::proxy::checker::{CheckerConfig, ProxyChecker};
use crate::proxy::models::{ProbeResult, Progress, ProxyEntry};
use futures::future;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

/// Dispatches probes across a fixed number of workers
#[derive(Debug, Clone)]
pub struct PoolRunner {
    checker: ProxyChecker,
}

impl PoolRunner {
    pub fn new(config: CheckerConfig) -> Self {
        Self {
            checker: ProxyChecker::with_config(config),
        }
    }

    pub fn checker(&self) -> &ProxyChecker {
        &self.checker
    }

    fn concurrency(&self) -> usize {
        self.checker.config().concurrency.max(1)
    }

    /// Check every proxy, calling `on_result` as each one finishes.
    ///
    /// Results arrive in completion order, not input order.
    pub async fn check_proxies<F>(&self, entries: Vec<ProxyEntry>, on_result: F) -> Vec<ProbeResult>
    where
        F: FnMut(&ProbeResult, &Progress),
    {
        self.check_while(entries, on_result, || true).await
    }

    /// Like `check_proxies`, but no new check starts once `keep_going` says no.
    /// Checks already in flight still finish and report.
    async fn check_while<F, K>(&self, entries: Vec<ProxyEntry>, mut on_result: F, keep_going: K) -> Vec<ProbeResult>
    where
        F: FnMut(&ProbeResult, &Progress),
        K: Fn() -> bool,
    {
        let concurrency = self.concurrency();
        let mut progress = Progress::new(entries.len());
        info!(total = progress.total, concurrency, mode = %self.checker.config().mode, "starting checks");

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut completed = stream::iter(entries)
            .take_while(|_| future::ready(keep_going()))
            .map(|entry| {
                let sem = Arc::clone(&semaphore);
                let checker = self.checker.clone();
                async move {
                    // The semaphore is never closed while the stream is alive
                    let _permit = sem.acquire_owned().await.ok();
                    checker.check_proxy(&entry).await
                }
            })
            .buffer_unordered(concurrency);

        let mut results = Vec::with_capacity(progress.total);
        while let Some(result) = completed.next().await {
            progress.record(&result);
            on_result(&result, &progress);
            results.push(result);
        }

        info!(checked = progress.checked, working = progress.working, "checks finished");
        results
    }

    /// Check proxies in the background, delivering each result over a channel.
    ///
    /// The channel closes once the last proxy has reported. Dropping the
    /// receiver stops the remaining proxies from being checked.
    pub fn check_proxies_stream(&self, entries: Vec<ProxyEntry>) -> mpsc::UnboundedReceiver<ProbeResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = self.clone();

        tokio::spawn(async move {
            let results = runner
                .check_while(
                    entries,
                    |result, _| {
                        if tx.send(result.clone()).is_err() {
                            debug!("result receiver dropped");
                        }
                    },
                    || !tx.is_closed(),
                )
                .await;
            debug!(checked = results.len(), "result stream finished");
        });

        rx
    }

    /// Check proxies and split them into working and failed, each in input order
    pub async fn check_and_separate(
        &self,
        entries: Vec<ProxyEntry>,
    ) -> (Vec<ProbeResult>, Vec<ProbeResult>) {
        let results = self.check_proxies(entries, |_, _| {}).await;
        split_in_input_order(results)
    }
}

/// Partition results into (working, failed), both sorted by input position
pub fn split_in_input_order(mut results: Vec<ProbeResult>) -> (Vec<ProbeResult>, Vec<ProbeResult>) {
    results.sort_by_key(|r| r.index);
    results.into_iter().partition(|r| r.is_working())
}
