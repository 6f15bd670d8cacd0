//! Admission service implementation.

use std::sync::Arc;
use std::time::Duration;
use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument, warn};

use super::proto::turnstile::v1::{
    admission_server::Admission, check_response::Code, CheckRequest, CheckResponse,
};

use crate::ratelimit::{client_identifier, ActionRules, RateLimiter};

/// Implementation of the `turnstile.v1.Admission` gRPC interface.
pub struct AdmissionServiceImpl {
    /// The shared rate limiter
    rate_limiter: Arc<RateLimiter>,
    /// Limits for requests that do not carry one
    rules: Arc<ActionRules>,
}

impl AdmissionServiceImpl {
    /// Create a new AdmissionServiceImpl with the given rate limiter and rules.
    pub fn new(rate_limiter: Arc<RateLimiter>, rules: Arc<ActionRules>) -> Self {
        Self {
            rate_limiter,
            rules,
        }
    }
}

fn to_proto_duration(duration: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: duration.as_secs() as i64,
        nanos: duration.subsec_nanos() as i32,
    }
}

#[tonic::async_trait]
impl Admission for AdmissionServiceImpl {
    /// Decide whether the calling client may perform the requested action.
    ///
    /// A denial is reported in the response code, not as an error status.
    #[instrument(
        skip(self, request),
        fields(
            action = %request.get_ref().action,
            limit = request.get_ref().limit
        )
    )]
    async fn check(
        &self,
        request: Request<CheckRequest>,
    ) -> Result<Response<CheckResponse>, Status> {
        let client = client_identifier(request.metadata());
        let req = request.into_inner();

        if req.action.is_empty() {
            warn!("Received admission check with empty action");
            return Err(Status::invalid_argument("action is required"));
        }

        let limit = self.rules.limit_for(&req.action, req.limit);
        debug!(client = %client, limit = limit, "Processing admission check");

        let response = match self.rate_limiter.check_client(&client, limit, &req.action) {
            Ok(admission) => CheckResponse {
                code: Code::Ok.into(),
                remaining: admission.remaining,
                limit,
                retry_after: Some(to_proto_duration(admission.reset_after)),
            },
            Err(exceeded) => {
                info!(
                    key = %exceeded.key,
                    retry_after_ms = exceeded.retry_after.as_millis() as u64,
                    "Admission denied"
                );
                CheckResponse {
                    code: Code::OverLimit.into(),
                    remaining: 0,
                    limit,
                    retry_after: Some(to_proto_duration(exceeded.retry_after)),
                }
            }
        };

        Ok(Response::new(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::identity::{FORWARDED_FOR, REAL_IP};
    use crate::ratelimit::{ManualClock, RateLimiterConfig};
    use tokio_test::{assert_err, assert_ok};

    fn create_test_service(rules: ActionRules) -> (AdmissionServiceImpl, ManualClock) {
        let clock = ManualClock::new();
        let config = RateLimiterConfig::new(Duration::from_millis(1000), 16).unwrap();
        let rate_limiter = Arc::new(RateLimiter::with_clock(config, clock.clone()).unwrap());
        (
            AdmissionServiceImpl::new(rate_limiter, Arc::new(rules)),
            clock,
        )
    }

    fn check_request(action: &str, limit: u32, client: &str) -> Request<CheckRequest> {
        let mut request = Request::new(CheckRequest {
            action: action.to_string(),
            limit,
        });
        request
            .metadata_mut()
            .insert(FORWARDED_FOR, client.parse().unwrap());
        request
    }

    #[tokio::test]
    async fn test_empty_action_rejected() {
        let (service, _) = create_test_service(ActionRules::new());

        let result = service.check(check_request("", 5, "10.0.0.1")).await;
        let status = assert_err!(result);
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_valid_request_returns_ok() {
        let (service, _) = create_test_service(ActionRules::new());

        let response = assert_ok!(service.check(check_request("LOGIN", 5, "10.0.0.1")).await);
        let response = response.into_inner();

        assert_eq!(response.code(), Code::Ok);
        assert_eq!(response.remaining, 4);
        assert_eq!(response.limit, 5);
    }

    #[tokio::test]
    async fn test_over_limit_carries_retry_hint() {
        let (service, clock) = create_test_service(ActionRules::new());

        for _ in 0..2 {
            service
                .check(check_request("LOGIN", 2, "10.0.0.1"))
                .await
                .unwrap();
        }

        clock.advance(Duration::from_millis(250));
        let response = service
            .check(check_request("LOGIN", 2, "10.0.0.1"))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.code(), Code::OverLimit);
        assert_eq!(response.remaining, 0);
        assert_eq!(
            response.retry_after,
            Some(prost_types::Duration {
                seconds: 0,
                nanos: 750_000_000,
            })
        );
    }

    #[tokio::test]
    async fn test_unset_limit_uses_rules() {
        let rules = ActionRules::from_yaml(
            r#"
default_limit: 4
actions:
  - action: CREATE_ADMIN
    limit: 1
"#,
        )
        .unwrap();
        let (service, _) = create_test_service(rules);

        let first = service
            .check(check_request("CREATE_ADMIN", 0, "10.0.0.1"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(first.limit, 1);
        assert_eq!(first.code(), Code::Ok);

        let second = service
            .check(check_request("CREATE_ADMIN", 0, "10.0.0.1"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(second.code(), Code::OverLimit);

        let other = service
            .check(check_request("UPLOAD", 0, "10.0.0.1"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(other.limit, 4);
    }

    #[tokio::test]
    async fn test_clients_identified_from_metadata() {
        let (service, _) = create_test_service(ActionRules::new());

        service
            .check(check_request("LOGIN", 1, "203.0.113.7, 10.0.0.1"))
            .await
            .unwrap();
        let same_client = service
            .check(check_request("LOGIN", 1, "203.0.113.7"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(same_client.code(), Code::OverLimit);

        let mut request = Request::new(CheckRequest {
            action: "LOGIN".to_string(),
            limit: 1,
        });
        request
            .metadata_mut()
            .insert(REAL_IP, "198.51.100.1".parse().unwrap());
        let other_client = service.check(request).await.unwrap().into_inner();
        assert_eq!(other_client.code(), Code::Ok);
    }

    #[tokio::test]
    async fn test_missing_headers_share_loopback_budget() {
        let (service, _) = create_test_service(ActionRules::new());

        let request = || {
            Request::new(CheckRequest {
                action: "LOGIN".to_string(),
                limit: 1,
            })
        };

        let first = service.check(request()).await.unwrap().into_inner();
        assert_eq!(first.code(), Code::Ok);
        let second = service.check(request()).await.unwrap().into_inner();
        assert_eq!(second.code(), Code::OverLimit);
    }
}
