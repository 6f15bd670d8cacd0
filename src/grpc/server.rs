//! gRPC server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::turnstile::v1::admission_server::AdmissionServer;
use super::service::AdmissionServiceImpl;
use crate::error::{Result, TurnstileError};
use crate::ratelimit::{ActionRules, RateLimiter};

/// gRPC server for the admission service.
pub struct GrpcServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The shared rate limiter
    rate_limiter: Arc<RateLimiter>,
    /// Per-action limits
    rules: Arc<ActionRules>,
}

impl GrpcServer {
    /// Create a new gRPC server around a shared rate limiter.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<RateLimiter>, rules: ActionRules) -> Self {
        Self {
            addr,
            rate_limiter,
            rules: Arc::new(rules),
        }
    }

    /// Get the bind address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let service = AdmissionServiceImpl::new(self.rate_limiter, self.rules);

        info!(
            addr = %self.addr,
            "Starting gRPC server for Admission service"
        );

        Server::builder()
            .add_service(AdmissionServer::new(service))
            .serve_with_shutdown(self.addr, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                TurnstileError::Grpc(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimiterConfig;
    use std::time::Duration;

    fn create_test_limiter() -> Arc<RateLimiter> {
        let config = RateLimiterConfig::new(Duration::from_secs(60), 100).unwrap();
        Arc::new(RateLimiter::new(config).unwrap())
    }

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let server = GrpcServer::new(addr, create_test_limiter(), ActionRules::new());
        assert_eq!(server.addr(), addr);
    }

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = GrpcServer::new(addr, create_test_limiter(), ActionRules::new());

        let result = server.serve_with_shutdown(async {}).await;
        assert!(result.is_ok());
    }
}
