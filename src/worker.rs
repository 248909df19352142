// SPDX: CC0-1.0

//! Intersection searches on a background thread.
//!
//! The worker owns nothing but its channels: every [`Request`] carries a
//! complete [`Job`], and every answer names the request it belongs to.
//! Requests are served in order and never cancelled, so a caller that has
//! moved on simply discards answers to ids it no longer cares about.

use crate::pipeline::{self, Job, JobError, Outcome};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use thiserror::Error;

pub type RequestId = u64;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Answered with [`Response::Pong`].
    Ping {
        request_id: RequestId,
        /// Sender's clock, milliseconds since the Unix epoch.
        timestamp: i64,
    },
    ComputeIntersections {
        request_id: RequestId,
        #[serde(flatten)]
        job: Job,
    },
    /// Any request type this worker does not know; ignored.
    #[serde(other)]
    Unknown,
}

impl Request {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong {
        request_id: RequestId,
        /// Echo of the ping's timestamp.
        timestamp: i64,
        /// Worker's clock when the ping arrived.
        received: i64,
    },
    Success {
        request_id: RequestId,
        #[serde(flatten)]
        outcome: Outcome,
    },
    Error {
        request_id: RequestId,
        error: String,
    },
    /// The computation panicked; the worker keeps serving. Carries the id
    /// of the request that panicked when it is known.
    Fault {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        error: String,
    },
}

impl Response {
    pub const fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Pong { request_id, .. }
            | Self::Success { request_id, .. }
            | Self::Error { request_id, .. } => Some(*request_id),
            Self::Fault { request_id, .. } => *request_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread")]
    Spawn(#[source] io::Error),
    #[error("worker is no longer running")]
    Disconnected,
    #[error("no response to request {0} in time")]
    Timeout(RequestId),
    #[error("malformed request")]
    Json(#[from] serde_json::Error),
}

/// Handle to a running worker; dropping it stops the thread.
#[derive(Debug)]
pub struct WorkerHandle {
    requests: Option<Sender<Request>>,
    responses: Receiver<Response>,
    next_id: RequestId,
    thread: Option<JoinHandle<()>>,
}

/// Spawns a worker that runs [`pipeline::run`].
pub fn spawn_worker() -> Result<WorkerHandle, WorkerError> {
    spawn_with(pipeline::run)
}

/// Spawns a worker that answers compute requests with `compute`.
pub fn spawn_with<F>(compute: F) -> Result<WorkerHandle, WorkerError>
where
    F: Fn(&Job) -> Result<Outcome, JobError> + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::channel();
    let (response_tx, response_rx) = mpsc::channel();

    let thread = thread::Builder::new()
        .name("intersections".to_string())
        .spawn(move || serve(&compute, request_rx, response_tx))
        .map_err(WorkerError::Spawn)?;
    info!("worker spawned");

    Ok(WorkerHandle {
        requests: Some(request_tx),
        responses: response_rx,
        next_id: 0,
        thread: Some(thread),
    })
}

fn serve<F>(compute: &F, requests: Receiver<Request>, responses: Sender<Response>)
where
    F: Fn(&Job) -> Result<Outcome, JobError>,
{
    for request in requests {
        let response = match request {
            Request::Ping {
                request_id,
                timestamp,
            } => Response::Pong {
                request_id,
                timestamp,
                received: Utc::now().timestamp_millis(),
            },

            Request::ComputeIntersections { request_id, job } => {
                debug!("worker: request {request_id} over {} functions", job.functions.len());
                match panic::catch_unwind(AssertUnwindSafe(|| compute(&job))) {
                    Ok(Ok(outcome)) => Response::Success {
                        request_id,
                        outcome,
                    },
                    Ok(Err(err)) => Response::Error {
                        request_id,
                        error: err.to_string(),
                    },
                    Err(payload) => {
                        let error = panic_message(payload.as_ref());
                        warn!("worker: request {request_id} panicked: {error}");
                        Response::Fault {
                            request_id: Some(request_id),
                            error,
                        }
                    }
                }
            }

            Request::Unknown => {
                warn!("worker: ignoring request of unknown type");
                continue;
            }
        };

        if responses.send(response).is_err() {
            info!("worker: response channel closed, shutting down");
            return;
        }
    }
    info!("worker: request channel closed, shutting down");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl WorkerHandle {
    pub fn send(&self, request: Request) -> Result<(), WorkerError> {
        self.requests
            .as_ref()
            .ok_or(WorkerError::Disconnected)?
            .send(request)
            .map_err(|_| WorkerError::Disconnected)
    }

    /// Parses and sends a JSON-encoded request.
    pub fn send_json(&self, text: &str) -> Result<(), WorkerError> {
        self.send(Request::from_json(text)?)
    }

    fn fresh_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn ping(&mut self) -> Result<RequestId, WorkerError> {
        let request_id = self.fresh_id();
        self.send(Request::Ping {
            request_id,
            timestamp: Utc::now().timestamp_millis(),
        })?;
        Ok(request_id)
    }

    pub fn compute(&mut self, job: Job) -> Result<RequestId, WorkerError> {
        let request_id = self.fresh_id();
        self.send(Request::ComputeIntersections { request_id, job })?;
        Ok(request_id)
    }

    /// Next response, if one has arrived.
    pub fn try_recv(&self) -> Option<Response> {
        self.responses.try_recv().ok()
    }

    /// Blocks until the answer to `id` arrives, discarding answers to other
    /// requests. A [`Response::Fault`] without a request id also ends the
    /// wait.
    pub fn wait_for(&self, id: RequestId, timeout: Duration) -> Result<Response, WorkerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let response = match self.responses.recv_timeout(remaining) {
                Ok(response) => response,
                Err(RecvTimeoutError::Timeout) => return Err(WorkerError::Timeout(id)),
                Err(RecvTimeoutError::Disconnected) => return Err(WorkerError::Disconnected),
            };
            match response.request_id() {
                Some(got) if got != id => debug!("discarding stale response to request {got}"),
                _ => return Ok(response),
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // closing the request channel ends the serve loop
        drop(self.requests.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}
