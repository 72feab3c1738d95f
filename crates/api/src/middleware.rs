use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use netops_auth::{JwtClaims, validate_claims};

use crate::context::{PrincipalContext, TenantContext};

#[derive(Clone)]
pub struct AuthState {
    decoding_key: Arc<DecodingKey>,
}

impl AuthState {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(jwt_secret.as_bytes())),
        }
    }

    fn decode(&self, token: &str) -> Result<JwtClaims, StatusCode> {
        // Claims carry RFC 3339 timestamps, not the numeric `exp`/`iat`
        // jsonwebtoken validates; the time window is checked explicitly.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;
        validate_claims(&data.claims, Utc::now()).map_err(|_| StatusCode::UNAUTHORIZED)?;
        Ok(data.claims)
    }
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;
    let claims = state.decode(token)?;

    req.extensions_mut()
        .insert(TenantContext::new(claims.tenant_id));
    req.extensions_mut().insert(PrincipalContext::new(
        claims.sub,
        claims.tenant_id,
        claims.roles.clone(),
    ));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use netops_auth::Role;
    use netops_core::UserId;

    fn mint(secret: &str, expires_in: Duration) -> String {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: UserId::new(),
            tenant_id: None,
            roles: vec![Role::Admin],
            issued_at: now - Duration::minutes(1),
            expires_at: now + expires_in,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_decodes() {
        let state = AuthState::new("s3cret");
        let token = mint("s3cret", Duration::minutes(5));
        assert!(state.decode(&token).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let state = AuthState::new("s3cret");
        let token = mint("other", Duration::minutes(5));
        assert_eq!(state.decode(&token), Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn expired_token_is_rejected() {
        let state = AuthState::new("s3cret");
        let token = mint("s3cret", Duration::seconds(-30));
        assert_eq!(state.decode(&token), Err(StatusCode::UNAUTHORIZED));
    }
}
