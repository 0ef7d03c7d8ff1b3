// HTTP front end for the config editor

pub mod routes;

use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Request, Response, Server};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::config::ServerSettings;
use crate::editor::ConfigEditor;
use crate::error::{EditorError, EditorResult};

pub use routes::{ApiResponse, Router};

/// Blocking HTTP server with a fixed pool of worker threads
pub struct HttpServer {
    server: Arc<Server>,
    router: Router,
    runtime: Handle,
    workers: usize,
    max_body_bytes: usize,
    stopping: Arc<AtomicBool>,
}

/// Stops a running `HttpServer` from another thread
#[derive(Clone)]
pub struct ShutdownHandle {
    server: Arc<Server>,
    stopping: Arc<AtomicBool>,
    workers: usize,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        info!("Shutting down HTTP server");
        self.stopping.store(true, Ordering::SeqCst);
        // Each call wakes one blocked worker
        for _ in 0..self.workers {
            self.server.unblock();
        }
    }
}

impl HttpServer {
    /// Bind the listener. Must be called from within a tokio runtime.
    pub fn bind(editor: ConfigEditor, settings: &ServerSettings) -> EditorResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| EditorError::other(format!("No tokio runtime available: {}", e)))?;

        let server = Server::http(settings.bind.as_str()).map_err(|e| {
            EditorError::other(format!("Failed to bind {}: {}", settings.bind, e))
        })?;

        Ok(Self {
            server: Arc::new(server),
            router: Router::new(editor),
            runtime,
            workers: settings.workers.max(1),
            max_body_bytes: settings.max_body_bytes,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server: self.server.clone(),
            stopping: self.stopping.clone(),
            workers: self.workers,
        }
    }

    /// Serve requests until shut down. Blocks the calling thread.
    pub fn run(self) -> EditorResult<()> {
        match self.local_addr() {
            Some(addr) => info!("Listening on http://{} with {} workers", addr, self.workers),
            None => info!("Listening with {} workers", self.workers),
        }

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let worker = Worker {
                id,
                server: self.server.clone(),
                router: self.router.clone(),
                runtime: self.runtime.clone(),
                max_body_bytes: self.max_body_bytes,
                stopping: self.stopping.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("cfgedit-http-{}", id))
                .spawn(move || worker.run())
                .map_err(|e| EditorError::other(format!("Failed to spawn worker: {}", e)))?;
            handles.push(handle);
        }

        for handle in handles {
            if handle.join().is_err() {
                error!("HTTP worker panicked");
            }
        }

        info!("HTTP server stopped");
        Ok(())
    }
}

struct Worker {
    id: usize,
    server: Arc<Server>,
    router: Router,
    runtime: Handle,
    max_body_bytes: usize,
    stopping: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);
        while !self.stopping.load(Ordering::SeqCst) {
            match self.server.recv() {
                Ok(request) => self.serve(request),
                Err(e) => {
                    if self.stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!("Worker {} failed to receive request: {}", self.id, e);
                }
            }
        }
        debug!("Worker {} stopped", self.id);
    }

    fn serve(&self, mut request: Request) {
        let method = request.method().clone();
        let url = request.url().to_string();

        let response = match read_body(&mut request, self.max_body_bytes) {
            Ok(body) => self
                .runtime
                .block_on(self.router.handle(&method, &url, &body)),
            Err(e) => ApiResponse::from_error(&e),
        };

        info!("{} {} -> {}", method, url, response.status);

        let mut reply = Response::from_string(response.body).with_status_code(response.status);
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], response.content_type.as_bytes())
        {
            reply = reply.with_header(header);
        }

        if let Err(e) = request.respond(reply) {
            warn!("Failed to send response for {} {}: {}", method, url, e);
        }
    }
}

fn read_body(request: &mut Request, limit: usize) -> EditorResult<Vec<u8>> {
    if matches!(request.body_length(), Some(len) if len > limit) {
        return Err(EditorError::PayloadTooLarge { limit });
    }

    let mut body = Vec::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut body)?;

    if body.len() > limit {
        return Err(EditorError::PayloadTooLarge { limit });
    }
    Ok(body)
}
