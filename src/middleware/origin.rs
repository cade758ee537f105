//! Origin restriction for the v2 API.
//!
//! Browsers may only reach `/api/v2` from the configured origins; the trusted
//! bot identifies itself with `X-Discord-User-ID` instead. Everything else is
//! refused with 403 before authentication runs.

use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Header the trusted bot sends its user ID in.
pub const BOT_USER_HEADER: &str = "x-discord-user-id";

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Authorization, Content-Type, X-Discord-User-ID";

/// Who may call the v2 API.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed_origins: Vec<String>,
    trusted_bot_user_id: Option<String>,
}

/// Outcome of checking one request against the policy.
#[derive(Debug, PartialEq, Eq)]
pub enum OriginDecision {
    /// Trusted bot; passes without CORS headers
    Bot,
    /// Browser request from this allowed origin
    Allowed(String),
    /// CORS preflight from this allowed origin, answered by the guard itself
    Preflight(String),
    Denied,
}

impl OriginPolicy {
    /// Build a policy, normalizing each origin to `scheme://host[:port]`.
    ///
    /// Returns `None` when no origins are configured, which leaves the API open.
    pub fn new(
        allowed_origins: &[String],
        trusted_bot_user_id: Option<String>,
    ) -> Result<Option<Self>, url::ParseError> {
        let allowed_origins = allowed_origins
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(|o| url::Url::parse(o).map(|u| u.origin().ascii_serialization()))
            .collect::<Result<Vec<_>, _>>()?;

        if allowed_origins.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            allowed_origins,
            trusted_bot_user_id,
        }))
    }

    fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }

    /// Decide whether a request may proceed.
    ///
    /// Checked in order: bot header, preflight, `Origin`, then `Referer` prefix.
    pub fn decide(&self, method: &Method, headers: &HeaderMap) -> OriginDecision {
        if let (Some(trusted), Some(sent)) = (
            &self.trusted_bot_user_id,
            header_str(headers, BOT_USER_HEADER),
        ) {
            if trusted == sent {
                return OriginDecision::Bot;
            }
        }

        if let Some(origin) = header_str(headers, header::ORIGIN.as_str()) {
            if self.is_allowed(origin) {
                if *method == Method::OPTIONS {
                    return OriginDecision::Preflight(origin.to_string());
                }
                return OriginDecision::Allowed(origin.to_string());
            }
        }

        if let Some(referer) = header_str(headers, header::REFERER.as_str()) {
            if let Some(allowed) = self
                .allowed_origins
                .iter()
                .find(|o| referer.starts_with(o.as_str()))
            {
                return OriginDecision::Allowed(allowed.clone());
            }
        }

        OriginDecision::Denied
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

/// Origin guard middleware for the `/api/v2` router.
pub async fn origin_guard(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match policy.decide(request.method(), request.headers()) {
        OriginDecision::Bot => Ok(next.run(request).await),
        OriginDecision::Allowed(origin) => {
            let mut response = next.run(request).await;
            apply_cors_headers(response.headers_mut(), &origin);
            Ok(response)
        }
        OriginDecision::Preflight(origin) => {
            let mut response = StatusCode::OK.into_response();
            apply_cors_headers(response.headers_mut(), &origin);
            Ok(response)
        }
        OriginDecision::Denied => {
            tracing::debug!(path = %request.uri().path(), "rejected request from unknown origin");
            Err(AppError::OriginDenied)
        }
    }
}
