// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accepts connections on the daemon's Unix socket and dispatches each
//! request line to the orchestrator, one spawned task per connection.
//!
//! Grounded in the teacher's `listener::Listener::run`/`handle_connection`
//! shape, scaled down from dozens of `Request` variants to Substrat's
//! eight RPC methods and a single shared `Orchestrator`.

use std::sync::Arc;

use substrat_core::{Clock, CoreError, IdGen};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::orchestrator::Orchestrator;
use crate::protocol::{self, ProtocolError, Response};

pub struct Listener<C: Clock, G: IdGen> {
    socket: UnixListener,
    orchestrator: Arc<Mutex<Orchestrator<C, G>>>,
}

impl<C: Clock + 'static, G: IdGen + 'static> Listener<C, G> {
    pub fn new(socket: UnixListener, orchestrator: Arc<Mutex<Orchestrator<C, G>>>) -> Self {
        Self { socket, orchestrator }
    }

    /// Runs until the process is torn down; the caller is expected to
    /// abort this task as part of graceful shutdown rather than rely on
    /// it to exit on its own.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _addr)) => {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, orchestrator).await {
                            match e {
                                ProtocolError::ConnectionClosed => debug!("client disconnected"),
                                ProtocolError::Timeout => warn!("connection timed out"),
                                other => error!("connection error: {}", other),
                            }
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

async fn handle_connection<C: Clock, G: IdGen>(
    stream: UnixStream,
    orchestrator: Arc<Mutex<Orchestrator<C, G>>>,
) -> Result<(), ProtocolError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = tokio::io::BufReader::new(read_half);

    loop {
        let request = match protocol::read_request(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };

        info!(method = %request.method, id = request.id, "received request");
        let response = {
            let mut orchestrator = orchestrator.lock().await;
            match orchestrator.handle_request(&request).await {
                Ok(result) => Response::ok(request.id, result),
                Err(e) => {
                    let (code, message) = rpc_error(&e);
                    Response::err(request.id, code, message)
                }
            }
        };

        protocol::write_response(&mut write_half, &response).await?;
    }
}

/// Maps a `CoreError` to a small, stable numeric RPC error code. Codes
/// are namespaced per error kind rather than reusing HTTP status codes,
/// since this protocol has no HTTP semantics to borrow from.
fn rpc_error(err: &CoreError) -> (i32, String) {
    let code = match err {
        CoreError::NotFound(_) => 1,
        CoreError::SessionState { .. } => 2,
        CoreError::SlotsExhausted => 3,
        CoreError::RouteInvalid { .. } => 4,
        CoreError::NameConflict { .. } => 5,
        CoreError::ProviderFailure(_) => 6,
        CoreError::IoFailure(_) => 7,
        CoreError::CorruptLog(_) => 8,
        CoreError::InvalidOperation(_) => 9,
    };
    (code, err.to_string())
}
