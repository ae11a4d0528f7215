//! HTTP server implementation.
//!
//! hyper http1 with TokioIo; one task per connection, routing handled
//! by `resources`. The expiration sweeper is spawned here alongside the
//! accept loop, sharing the engine's store.

use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::engine::{spawn_sweeper, Engine};
use crate::types::CensusError;

use super::resources;

/// Shared application state.
pub struct AppState {
    pub args: Args,
    pub engine: Engine,
}

impl AppState {
    pub fn new(args: Args, engine: Engine) -> Self {
        Self { args, engine }
    }
}

/// Start the HTTP server.
pub async fn run(state: Arc<AppState>) -> Result<(), CensusError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Census listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    let interval = Duration::from_secs(state.args.sweep_interval_secs);
    spawn_sweeper(state.engine.store(), interval);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { resources::handle(state, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}
