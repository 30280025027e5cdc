//! Request extractors.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::gateway::TENANT_HEADER;

/// Raw `X-Tenant-ID` header, if present and valid UTF-8.
#[derive(Debug, Clone)]
pub struct TenantHeader(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for TenantHeader
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        Ok(TenantHeader(tenant))
    }
}

/// `Content-Type` header, empty when absent.
#[derive(Debug, Clone)]
pub struct ContentType(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ContentType
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(ContentType(content_type))
    }
}
