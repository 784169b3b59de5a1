use kornia_image::{Image, allocator::CpuAllocator};
use std::{
    sync::{Arc, Mutex, mpsc},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crate::{
    blend::blend,
    config::StylizerConfig,
    error::{Result, StylizerError},
    request::encode_request_with_weights,
    response::{decode_image, decode_response},
    transport::PredictTransport,
    weights::StyleWeights,
};

/// Represents the current state of the stylizer engine.
#[derive(Clone, Debug, PartialEq)]
pub enum StylizerEngineState {
    /// Nothing is queued or in flight.
    Idle,
    /// At least one scheduled request has not produced a response yet.
    Processing,
}

impl StylizerEngineState {
    /// Returns the state as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StylizerEngineState::Idle => "idle",
            StylizerEngineState::Processing => "processing",
        }
    }
}

/// A captured image and the style to apply to it.
pub struct StylizeRequest {
    pub image: Image<u8, 3, CpuAllocator>,
    pub style_index: i64,
}

struct StylizerEngineRequest {
    id: u8,
    request: StylizeRequest,
}

/// Outcome of one scheduled request, with timing for telemetry.
pub struct StylizerEngineResponse {
    /// Identifier returned by [`StylizerEngine::schedule`].
    pub id: u8,
    pub style_index: i64,
    pub start_time: Instant,
    pub duration: Duration,
    /// The stylized image blended over the source, or why it could not be produced.
    pub result: Result<Image<u8, 3, CpuAllocator>>,
}

/// Result type returned when polling the engine.
pub enum StylizerEngineResult {
    /// A request finished, successfully or not.
    Success(StylizerEngineResponse),
    /// Nothing finished yet, with the current engine state.
    Empty(StylizerEngineState),
    /// The engine itself is no longer usable.
    Error(String),
}

/// Runs a full round-trip for one image: encode, predict, decode and blend.
pub fn stylize<T: PredictTransport>(
    transport: &mut T,
    config: &StylizerConfig,
    request: &StylizeRequest,
) -> Result<Image<u8, 3, CpuAllocator>> {
    let weights = StyleWeights::one_hot(request.style_index)?;
    let body = encode_request_with_weights(&request.image, weights, config.jpeg_quality)?;

    if let Some(path) = &config.debug_dump {
        body.write_debug_dump(path)?;
    }

    let response = transport
        .predict(&config.model_path(), &body)
        .map_err(|e| StylizerError::Transport(Box::new(e)))?;

    let stylized = decode_image(&decode_response(&response)?)?;
    blend(&stylized, &request.image, config.blend_alpha)
}

/// Background worker that owns a transport and stylizes images one at a time.
///
/// Requests are queued with [`schedule`](Self::schedule) and results collected
/// with [`try_poll_response`](Self::try_poll_response), so the caller never
/// blocks on the network. A failed request is reported through its response
/// and does not stop the worker.
pub struct StylizerEngine {
    // requests scheduled but not yet answered
    pending: Arc<Mutex<usize>>,
    req_tx: Option<mpsc::Sender<StylizerEngineRequest>>,
    rep_rx: Arc<Mutex<mpsc::Receiver<StylizerEngineResponse>>>,
    worker_handle: Option<JoinHandle<()>>,
    id_counter: Arc<Mutex<u8>>,
}

impl StylizerEngine {
    /// Spawns the worker thread; `transport` is moved onto it.
    pub fn new<T>(mut transport: T, config: StylizerConfig) -> Self
    where
        T: PredictTransport + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<StylizerEngineRequest>();
        let (rep_tx, rep_rx) = mpsc::channel::<StylizerEngineResponse>();
        let pending = Arc::new(Mutex::new(0usize));

        let worker_handle = std::thread::spawn({
            let pending = pending.clone();
            move || {
                while let Ok(req) = req_rx.recv() {
                    log::debug!(
                        "Stylizing request {} with style {}",
                        req.id,
                        req.request.style_index
                    );

                    let start_time = Instant::now();

                    let result = stylize(&mut transport, &config, &req.request);
                    let duration = start_time.elapsed();

                    match &result {
                        Ok(_) => log::debug!("Request {} completed in {:?}", req.id, duration),
                        Err(e) => log::error!("Request {} failed: {}", req.id, e),
                    }

                    {
                        let mut pending = pending.lock().unwrap();
                        *pending = pending.saturating_sub(1);
                    }

                    if rep_tx
                        .send(StylizerEngineResponse {
                            id: req.id,
                            style_index: req.request.style_index,
                            start_time,
                            duration,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            }
        });

        Self {
            pending,
            req_tx: Some(req_tx),
            rep_rx: Arc::new(Mutex::new(rep_rx)),
            worker_handle: Some(worker_handle),
            id_counter: Arc::new(Mutex::new(0)),
        }
    }

    /// Returns the current state of the engine.
    ///
    /// The engine is [`Processing`](StylizerEngineState::Processing) from the
    /// moment a request is scheduled until the worker has finished it.
    pub fn state(&self) -> StylizerEngineState {
        if *self.pending.lock().unwrap() > 0 {
            StylizerEngineState::Processing
        } else {
            StylizerEngineState::Idle
        }
    }

    /// Attempts to retrieve a finished request without blocking.
    ///
    /// # Returns
    /// * `Success` - A finished request, successful or not
    /// * `Empty` - Nothing finished yet, with the current engine state
    /// * `Error` - The worker is gone and no responses remain
    pub fn try_poll_response(&self) -> StylizerEngineResult {
        match self.rep_rx.lock().unwrap().try_recv() {
            Ok(response) => StylizerEngineResult::Success(response),
            Err(mpsc::TryRecvError::Empty) => StylizerEngineResult::Empty(self.state()),
            Err(mpsc::TryRecvError::Disconnected) => {
                log::error!("Response channel disconnected");
                StylizerEngineResult::Error("Response channel disconnected".to_string())
            }
        }
    }

    /// Waits up to `timeout` for the next finished request.
    pub fn poll_response_timeout(&self, timeout: Duration) -> StylizerEngineResult {
        match self.rep_rx.lock().unwrap().recv_timeout(timeout) {
            Ok(response) => StylizerEngineResult::Success(response),
            Err(mpsc::RecvTimeoutError::Timeout) => StylizerEngineResult::Empty(self.state()),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::error!("Response channel disconnected");
                StylizerEngineResult::Error("Response channel disconnected".to_string())
            }
        }
    }

    /// Queues a request for the worker.
    ///
    /// # Arguments
    /// * `request` - The image and style to stylize
    ///
    /// # Returns
    /// The id reported back in [`StylizerEngineResponse::id`], or `None` once
    /// the engine is stopped.
    pub fn schedule(&self, request: StylizeRequest) -> Option<u8> {
        let Some(tx) = &self.req_tx else {
            log::warn!("Engine is stopped, dropping request");
            return None;
        };

        let id = {
            let mut counter = self.id_counter.lock().unwrap();
            let id = *counter;
            *counter = counter.wrapping_add(1);
            id
        };

        *self.pending.lock().unwrap() += 1;
        if tx.send(StylizerEngineRequest { id, request }).is_err() {
            log::error!("Worker is gone, dropping request {}", id);
            *self.pending.lock().unwrap() -= 1;
            return None;
        }
        Some(id)
    }

    /// Closes the queue and waits for the worker to drain it.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StylizerEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
