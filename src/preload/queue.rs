//! Worker pool decoding images off the core thread.
//!
//! - Fixed pool of worker threads fed through a flume channel
//! - Workers never touch engine state; results come back on a second channel
//! - The core drains results with `poll_results` / `recv_timeout`

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use flume::{Receiver, Sender};
use tracing::{debug, error, trace, warn};

use super::decoder::{Decoded, Decoder, ImageKind};
use crate::error::EngineError;

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 2;

/// Maximum number of worker threads.
const MAX_WORKERS: usize = 8;

/// How long an idle worker waits before re-checking for shutdown.
const IDLE_POLL_MS: u64 = 100;

/// A request to decode one image.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub index: usize,
    pub path: PathBuf,
    pub kind: ImageKind,
    /// Generation live when the request was issued
    pub generation: u64,
}

/// A finished decode sent back to the core thread.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub index: usize,
    pub kind: ImageKind,
    pub generation: u64,
    pub outcome: Result<Decoded, EngineError>,
}

/// Pool of decode workers.
pub struct LoadQueue {
    /// Sender for new requests.
    request_tx: Sender<LoadRequest>,
    /// Receiver for completed results (core thread reads this).
    result_rx: Receiver<LoadResult>,
    workers: Vec<JoinHandle<()>>,
    /// Flag to signal workers to stop.
    shutdown: Arc<AtomicBool>,
}

impl LoadQueue {
    pub fn new(workers: usize, decoder: Arc<dyn Decoder>) -> anyhow::Result<Self> {
        let num_workers = workers.clamp(1, MAX_WORKERS);

        let (request_tx, request_rx) = flume::unbounded();
        let (result_tx, result_rx) = flume::unbounded();

        let shutdown = Arc::new(AtomicBool::new(false));

        let mut worker_handles = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let rx = request_rx.clone();
            let tx = result_tx.clone();
            let shutdown = Arc::clone(&shutdown);
            let decoder = Arc::clone(&decoder);

            let handle = thread::Builder::new()
                .name(format!("decode-worker-{}", worker_id))
                .spawn(move || {
                    worker_loop(worker_id, rx, tx, shutdown, decoder);
                })
                .context("Failed to spawn decode worker")?;

            worker_handles.push(handle);
        }

        debug!(num_workers, "Started decode worker queue");

        Ok(Self {
            request_tx,
            result_rx,
            workers: worker_handles,
            shutdown,
        })
    }

    /// Hand a request to the workers. Returns false if the workers are gone.
    pub fn submit(&self, req: LoadRequest) -> bool {
        trace!(index = req.index, kind = ?req.kind, generation = req.generation, "Submitting load");
        match self.request_tx.send(req) {
            Ok(()) => true,
            Err(_) => {
                error!("Decode queue disconnected");
                false
            }
        }
    }

    /// Drain completed results (non-blocking).
    pub fn poll_results(&self) -> Vec<LoadResult> {
        self.result_rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next result.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadResult> {
        self.result_rx.recv_timeout(timeout).ok()
    }

    /// Stop the workers. Requests still queued are abandoned.
    pub fn shutdown(&mut self) {
        debug!("Shutting down decode queue");

        self.shutdown.store(true, Ordering::SeqCst);

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        debug!("Decode queue shutdown complete");
    }
}

impl Drop for LoadQueue {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}

/// Worker thread loop.
fn worker_loop(
    worker_id: usize,
    rx: Receiver<LoadRequest>,
    tx: Sender<LoadResult>,
    shutdown: Arc<AtomicBool>,
    decoder: Arc<dyn Decoder>,
) {
    debug!(worker_id, "Decode worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match rx.recv_timeout(Duration::from_millis(IDLE_POLL_MS)) {
            Ok(req) => {
                let result = process_request(&req, decoder.as_ref());

                if let Err(e) = tx.send(result) {
                    warn!(worker_id, error = ?e, "Failed to send load result");
                }
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker_id, "Decode worker stopped");
}

/// Decode a single request.
fn process_request(req: &LoadRequest, decoder: &dyn Decoder) -> LoadResult {
    trace!(?req.path, kind = ?req.kind, "Processing load request");

    let outcome = decoder
        .decode(&req.path, req.kind)
        .map_err(|e| EngineError::Load {
            path: req.path.clone(),
            reason: format!("{:#}", e),
        });

    LoadResult {
        index: req.index,
        kind: req.kind,
        generation: req.generation,
        outcome,
    }
}

/// Builder for LoadQueue with configuration options.
pub struct LoadQueueBuilder {
    workers: usize,
    decoder: Arc<dyn Decoder>,
}

impl LoadQueueBuilder {
    pub fn new(decoder: Arc<dyn Decoder>) -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            decoder,
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    pub fn build(self) -> anyhow::Result<LoadQueue> {
        LoadQueue::new(self.workers, self.decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preload::decoder::testing::{FakeDecoder, Gate};

    const WAIT: Duration = Duration::from_secs(5);

    fn request(index: usize, path: &str) -> LoadRequest {
        LoadRequest {
            index,
            path: PathBuf::from(path),
            kind: ImageKind::Full,
            generation: 7,
        }
    }

    #[test]
    fn test_result_carries_request_tags() {
        let queue = LoadQueueBuilder::new(Arc::new(FakeDecoder::default()))
            .workers(1)
            .build()
            .unwrap();
        assert!(queue.submit(request(3, "a.png")));

        let result = queue.recv_timeout(WAIT).unwrap();
        assert_eq!(result.index, 3);
        assert_eq!(result.generation, 7);
        assert_eq!(result.kind, ImageKind::Full);
        assert_eq!(result.outcome.unwrap().width, 400);
    }

    #[test]
    fn test_failure_becomes_load_error() {
        let queue = LoadQueue::new(2, Arc::new(FakeDecoder::failing(&["bad.png"]))).unwrap();
        queue.submit(request(0, "bad.png"));

        let result = queue.recv_timeout(WAIT).unwrap();
        match result.outcome {
            Err(EngineError::Load { path, .. }) => assert_eq!(path, PathBuf::from("bad.png")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_poll_does_not_block_on_stalled_loads() {
        let gate = Gate::closed();
        let mut queue = LoadQueue::new(1, Arc::new(FakeDecoder::gated(gate.clone()))).unwrap();
        queue.submit(request(0, "a.png"));

        assert!(queue.poll_results().is_empty());

        gate.open();
        assert!(queue.recv_timeout(WAIT).is_some());
        queue.shutdown();
    }
}
