//! HTTP status endpoint adapter.
//!
//! Implements [`StatusPort`].  The domain owns the
//! [`StatusPresenter`]; the adapter only decides how requests reach it.
//!
//! The server is started through [`StatusPort::start`], so a failed start
//! leaves the device running without the endpoint until a retry succeeds.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspHttpServer` on port 80.  Handlers run
//!   in the httpd task and answer from a shared presenter snapshot, which
//!   `serve_pending` refreshes whenever the presenter's revision changes.
//!   The handlers count what they serve so the loop can pulse for it.
//! - **all other targets**: a queue of simulated requests answered
//!   synchronously by `serve_pending`.

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

#[cfg(target_os = "espidf")]
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

#[cfg(target_os = "espidf")]
use embedded_svc::{http::Method, io::Write};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;
use log::info;

use crate::app::ports::{StatusError, StatusPort};
#[cfg(target_os = "espidf")]
use crate::app::status::HttpMethod;
use crate::app::status::StatusPresenter;
#[cfg(not(target_os = "espidf"))]
use crate::app::status::{HttpMethod, StatusReply};

pub struct StatusServer {
    #[cfg(target_os = "espidf")]
    server: Option<EspHttpServer<'static>>,
    #[cfg(target_os = "espidf")]
    snapshot: Arc<Mutex<StatusPresenter>>,
    #[cfg(target_os = "espidf")]
    served: Arc<AtomicUsize>,
    #[cfg(target_os = "espidf")]
    revision: Option<u32>,
    #[cfg(not(target_os = "espidf"))]
    running: bool,
    #[cfg(not(target_os = "espidf"))]
    start_failures: u32,
    #[cfg(not(target_os = "espidf"))]
    pending: VecDeque<(HttpMethod, String)>,
    #[cfg(not(target_os = "espidf"))]
    replies: Vec<StatusReply>,
}

impl Default for StatusServer {
    fn default() -> Self {
        Self::new()
    }
}

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl StatusServer {
    /// Nothing listens until [`StatusPort::start`] succeeds.
    pub fn new() -> Self {
        Self {
            server: None,
            snapshot: Arc::new(Mutex::new(StatusPresenter::default())),
            served: Arc::new(AtomicUsize::new(0)),
            revision: None,
        }
    }

    fn platform_start(&self) -> Result<EspHttpServer<'static>, EspError> {
        let mut server = EspHttpServer::new(&Configuration {
            uri_match_wildcard: true,
            ..Default::default()
        })?;

        for path in ["/", "/config", "/*"] {
            for method in [Method::Get, Method::Post, Method::Put, Method::Delete] {
                let kind = match method {
                    Method::Get => HttpMethod::Get,
                    Method::Post => HttpMethod::Post,
                    _ => HttpMethod::Other,
                };
                let snapshot = self.snapshot.clone();
                let served = self.served.clone();
                server.fn_handler::<anyhow::Error, _>(path, method, move |req| {
                    let reply = snapshot
                        .lock()
                        .map_err(|_| anyhow::anyhow!("status snapshot poisoned"))?
                        .respond(kind, req.uri());
                    served.fetch_add(1, Ordering::Relaxed);
                    req.into_response(reply.status, None, &[("Content-Type", reply.content_type)])?
                        .write_all(reply.body.as_bytes())?;
                    Ok(())
                })?;
            }
        }
        Ok(server)
    }
}

#[cfg(target_os = "espidf")]
impl StatusPort for StatusServer {
    fn start(&mut self) -> Result<(), StatusError> {
        if self.server.is_none() {
            let server = self.platform_start().map_err(|e| StatusError::Server(e.code()))?;
            self.server = Some(server);
            info!("http: listening on port 80");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.server.is_some()
    }

    fn serve_pending(&mut self, presenter: &StatusPresenter) -> usize {
        if self.revision != Some(presenter.revision()) {
            if let Ok(mut shared) = self.snapshot.lock() {
                shared.clone_from(presenter);
                self.revision = Some(presenter.revision());
            }
        }
        self.served.swap(0, Ordering::Relaxed)
    }
}

// ── Simulation backend ────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl StatusServer {
    pub fn new() -> Self {
        Self { running: false, start_failures: 0, pending: VecDeque::new(), replies: Vec::new() }
    }

    /// Simulation: the next `n` starts fail.
    pub fn fail_next_start(&mut self, n: u32) {
        self.start_failures = n;
    }

    /// Simulation: queue a request for the next `serve_pending`.
    pub fn request(&mut self, method: HttpMethod, uri: &str) {
        self.pending.push_back((method, uri.to_string()));
    }

    /// Replies produced so far, oldest first.
    pub fn replies(&self) -> &[StatusReply] {
        &self.replies
    }
}

#[cfg(not(target_os = "espidf"))]
impl StatusPort for StatusServer {
    fn start(&mut self) -> Result<(), StatusError> {
        if self.running {
            return Ok(());
        }
        if self.start_failures > 0 {
            self.start_failures -= 1;
            return Err(StatusError::Server(-1));
        }
        self.running = true;
        info!("http(sim): listening");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    /// Requests queued while stopped wait for the server to come up.
    fn serve_pending(&mut self, presenter: &StatusPresenter) -> usize {
        if !self.running {
            return 0;
        }
        let mut served = 0;
        while let Some((method, uri)) = self.pending.pop_front() {
            self.replies.push(presenter.respond(method, &uri));
            served += 1;
        }
        served
    }
}
