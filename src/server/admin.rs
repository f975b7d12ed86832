// src/server/admin.rs
//! Admin listener: Prometheus metrics and the published routing snapshot.
use crate::config::AdminConfig;
use crate::metrics::MetricsRegistry;
use crate::synthesizer::ConfigSynthesizer;
use anyhow::{Context, Result};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AdminServer {
    config: AdminConfig,
    synthesizer: Arc<ConfigSynthesizer>,
    registry: Arc<MetricsRegistry>,
}

impl AdminServer {
    pub fn new(
        config: AdminConfig,
        synthesizer: Arc<ConfigSynthesizer>,
        registry: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            registry,
        }
    }

    pub fn handle(&self, req: &Request<Body>) -> Response<Body> {
        if req.method() != Method::GET {
            return respond(StatusCode::METHOD_NOT_ALLOWED, "text/plain", "Method Not Allowed");
        }

        let path = req.uri().path();
        if path == self.config.config_path {
            let snapshot = self.synthesizer.get_config();
            match serde_json::to_vec(&*snapshot) {
                Ok(body) => respond(StatusCode::OK, "application/json", body),
                Err(e) => {
                    error!("Failed to encode routing snapshot: {}", e);
                    respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "Encoding error")
                }
            }
        } else if path == self.config.metrics_path {
            match self.registry.gather() {
                Ok(body) => respond(StatusCode::OK, "text/plain; version=0.0.4", body),
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "Encoding error")
                }
            }
        } else {
            respond(StatusCode::NOT_FOUND, "text/plain", "Not Found")
        }
    }

    /// Serves until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind;
        let admin = Arc::new(self);

        let make_service = make_service_fn(move |_| {
            let admin = admin.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let response = admin.handle(&req);
                    async move { Ok::<_, Infallible>(response) }
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .with_context(|| format!("Failed to bind admin listener on {}", addr))?
            .serve(make_service)
            .with_graceful_shutdown(shutdown);

        info!("Admin server listening on http://{}", addr);
        server.await.context("Admin server error")?;
        Ok(())
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
