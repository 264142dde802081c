use axum::http::HeaderMap;
use syncreads_core::models::User;

use crate::error::AppError;

/// The dashboard user a request acts for
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Read the API key from `Authorization`, bare or as `Bearer <key>`
pub fn extract_api_key(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let key = match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token,
        Some(_) => {
            return Err(AppError::unauthorized(
                "Authorization must be `<key>` or `Bearer <key>`",
            ))
        }
        None => header,
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::unauthorized("API key is empty"));
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_bare_and_bearer_keys() {
        assert_eq!(extract_api_key(&headers("abc123")).unwrap(), "abc123");
        assert_eq!(extract_api_key(&headers("Bearer abc123")).unwrap(), "abc123");
        assert_eq!(extract_api_key(&headers("bearer  abc123 ")).unwrap(), "abc123");
    }

    #[test]
    fn rejects_missing_empty_and_foreign_schemes() {
        assert!(extract_api_key(&HeaderMap::new()).is_err());
        assert!(extract_api_key(&headers("Bearer ")).is_err());
        assert!(extract_api_key(&headers("Basic dXNlcjpwYXNz")).is_err());
    }
}
