use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;

pub const OWNER_HEADER: &str = "X-User-Id";

/// Id of the user on whose behalf the request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

pub fn owner_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Header first, then the value supplied in the request body.
pub fn resolve_owner(headers: &HeaderMap, body_owner: Option<&str>) -> Result<OwnerId, ApiError> {
    owner_from_headers(headers)
        .or_else(|| {
            body_owner
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        })
        .map(OwnerId)
        .ok_or_else(|| {
            ApiError::Unauthorized(format!("Missing owner id. Set {OWNER_HEADER} header."))
        })
}

pub async fn require_owner(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let owner = resolve_owner(request.headers(), None)?;

    request.extensions_mut().insert(owner);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_wins_over_body_owner() {
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, HeaderValue::from_static("user-a"));

        let owner = resolve_owner(&headers, Some("user-b")).expect("owner");

        assert_eq!(owner, OwnerId("user-a".into()));
    }

    #[test]
    fn falls_back_to_body_owner_and_rejects_blank() {
        let headers = HeaderMap::new();
        assert_eq!(
            resolve_owner(&headers, Some(" user-b ")).expect("owner"),
            OwnerId("user-b".into())
        );
        assert!(matches!(
            resolve_owner(&headers, Some("  ")),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(resolve_owner(&headers, None), Err(ApiError::Unauthorized(_))));
    }
}
