use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::AppState;

pub const ADMIN_ROLE: &str = "admin";
/// Header the hosting platform attaches to its own cron invocations.
pub const PLATFORM_CRON_HEADER: &str = "x-vercel-cron";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub subject: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

pub fn issue_token(
    subject: &str,
    role: &str,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (Utc::now() + Duration::seconds(expiration_secs as i64)).timestamp() as usize;
    let claims = Claims {
        sub: subject.to_string(),
        role: role.to_string(),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Unauthorized",
            "detail": "Authentication required or session invalid"
        })),
    )
        .into_response()
}

/// Admin routes: a valid HS256 token carrying the admin role.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(req.headers()) {
        Some(t) => t,
        None => return unauthorized(),
    };

    let decoding_key = DecodingKey::from_secret(state.config.jwt_secret.as_ref());
    let claims = match decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256)) {
        Ok(data) => data.claims,
        Err(e) => {
            tracing::debug!("Rejected token: {}", e);
            return unauthorized();
        }
    };

    let auth_user = AuthUser {
        subject: claims.sub,
        role: claims.role,
    };
    if !auth_user.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "Forbidden",
                "detail": "Administrator role required"
            })),
        )
            .into_response();
    }

    req.extensions_mut().insert(auth_user);
    next.run(req).await
}

/// The cron endpoint accepts the shared secret as a bearer token, or the platform cron header
/// when `CRON_ALLOW_PLATFORM_HEADER` is on.
pub fn cron_authorized(headers: &HeaderMap, config: &Config) -> bool {
    if let (Some(secret), Some(token)) = (config.cron_secret.as_deref(), bearer_token(headers)) {
        if constant_time_eq(secret.as_bytes(), token.as_bytes()) {
            return true;
        }
    }
    config.cron_allow_platform_header && headers.contains_key(PLATFORM_CRON_HEADER)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(secret: Option<&str>, allow_platform: bool) -> Config {
        let mut config = Config::from_env().unwrap();
        config.cron_secret = secret.map(str::to_string);
        config.cron_allow_platform_header = allow_platform;
        config
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn cron_accepts_matching_bearer_secret() {
        let cfg = config(Some("s3cret"), false);
        assert!(cron_authorized(&headers(&[("authorization", "Bearer s3cret")]), &cfg));
        assert!(!cron_authorized(&headers(&[("authorization", "Bearer wrong")]), &cfg));
        assert!(!cron_authorized(&headers(&[]), &cfg));
    }

    #[test]
    fn cron_platform_header_depends_on_config() {
        let h = headers(&[("x-vercel-cron", "1")]);
        assert!(cron_authorized(&h, &config(None, true)));
        assert!(!cron_authorized(&h, &config(None, false)));
    }

    #[test]
    fn cron_without_secret_rejects_any_bearer() {
        let cfg = config(None, false);
        assert!(!cron_authorized(&headers(&[("authorization", "Bearer ")]), &cfg));
        assert!(!cron_authorized(&headers(&[("authorization", "Bearer anything")]), &cfg));
    }

    #[test]
    fn issued_tokens_decode_with_same_secret() {
        let token = issue_token("ops@example.org", ADMIN_ROLE, "k", 60).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"k"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "ops@example.org");
        assert_eq!(data.claims.role, "admin");
    }
}
