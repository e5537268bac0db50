use service_core::axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use service_core::middleware::tracing::RequestId;
use std::convert::Infallible;

use crate::dtos::Requester;

/// Caller id asserted by the authenticating gateway.
pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-userid";
/// Managed account the caller acts for.
pub const MANAGED_FOR_HEADER: &str = "x-managed-for";
/// Managed token the gateway already holds for that account.
pub const MANAGED_TOKEN_HEADER: &str = "x-authenticated-for";

/// Requester context of a read. All parts are optional; this service does
/// not authenticate.
pub struct RequesterContext(pub Requester);

#[async_trait]
impl<S> FromRequestParts<S> for RequesterContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(RequesterContext(Requester {
            requested_by: header(AUTHENTICATED_USER_HEADER),
            managed_for: header(MANAGED_FOR_HEADER),
            managed_token: header(MANAGED_TOKEN_HEADER),
            request_id: parts
                .extensions
                .get::<RequestId>()
                .map(|id| id.as_str().to_string()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::http::Request;

    #[tokio::test]
    async fn test_reads_gateway_headers() {
        let mut request = Request::builder()
            .header(AUTHENTICATED_USER_HEADER, "parent")
            .header(MANAGED_FOR_HEADER, " ")
            .header(MANAGED_TOKEN_HEADER, "tok")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(RequestId("req-1".to_string()));
        let (mut parts, _) = request.into_parts();

        let RequesterContext(requester) =
            RequesterContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(requester.requested_by.as_deref(), Some("parent"));
        assert!(requester.managed_for.is_none());
        assert_eq!(requester.managed_token.as_deref(), Some("tok"));
        assert_eq!(requester.request_id.as_deref(), Some("req-1"));
    }
}
