use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::value_objects::iam::{AuthContext, Role},
    infrastructure::axum_http::error_responses::AppError,
};

pub const AUDIENCES: [&str; 2] = ["authenticated", "service_role"];

/// HS256 secret shared with the auth service; installed as a request
/// extension by `http_serve`.
#[derive(Clone)]
pub struct JwtSecret(pub String);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: String,
    pub role: String,
    pub email: Option<String>,
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

pub fn validate_supabase_jwt(token: &str, secret: &str) -> Result<SupabaseClaims> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&AUDIENCES);

    let token_data = decode::<SupabaseClaims>(token, &decoding_key, &validation)
        .map_err(|e| anyhow!("JWT validation failed: {}", e))?;

    Ok(token_data.claims)
}

/// `app_metadata.role` is set by operators and wins over the token role.
pub fn auth_context_from_claims(claims: SupabaseClaims) -> Result<AuthContext> {
    let user_id = Uuid::parse_str(&claims.sub).context("invalid user id in token")?;
    let expires_at =
        DateTime::<Utc>::from_timestamp(claims.exp, 0).context("invalid expiry in token")?;
    let role = claims
        .app_metadata
        .role
        .as_deref()
        .map(Role::from_claim)
        .filter(|role| *role == Role::Admin)
        .unwrap_or_else(|| Role::from_claim(&claims.role));

    Ok(AuthContext {
        user_id,
        email: claims.email,
        role,
        expires_at,
    })
}

/// The caller behind a `Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secret = parts
            .extensions
            .get::<Arc<JwtSecret>>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow!("jwt secret is not installed")))?;

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("missing bearer token".to_string()))?;

        let claims = validate_supabase_jwt(bearer.token(), &secret.0)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
        let context =
            auth_context_from_claims(claims).map_err(|e| AppError::Unauthorized(e.to_string()))?;

        Ok(AuthUser(context))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::{Request, header::AUTHORIZATION};
    use jsonwebtoken::{EncodingKey, Header, encode};

    pub(crate) const SECRET: &str = "supersecretjwtsecretforunittesting123";

    pub(crate) fn token(user_id: Uuid, role: &str, admin_metadata: bool, exp: i64) -> String {
        let claims = SupabaseClaims {
            sub: user_id.to_string(),
            role: role.to_string(),
            email: Some("test@example.com".to_string()),
            aud: "authenticated".to_string(),
            exp,
            app_metadata: AppMetadata {
                role: admin_metadata.then(|| "admin".to_string()),
            },
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> i64 {
        Utc::now().timestamp() + 3600
    }

    async fn extract(authorization: Option<String>) -> Result<AuthUser, AppError> {
        let mut builder = Request::builder().uri("/api/v1/payments/TXN-1");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let mut request = builder.body(()).unwrap();
        request
            .extensions_mut()
            .insert(Arc::new(JwtSecret(SECRET.to_string())));
        let (mut parts, _) = request.into_parts();
        AuthUser::from_request_parts(&mut parts, &()).await
    }

    #[test]
    fn valid_token_yields_customer_context() {
        let user_id = Uuid::new_v4();
        let claims =
            validate_supabase_jwt(&token(user_id, "authenticated", false, far_future()), SECRET)
                .unwrap();
        let context = auth_context_from_claims(claims).unwrap();
        assert_eq!(context.user_id, user_id);
        assert_eq!(context.role, Role::Customer);
    }

    #[test]
    fn admin_metadata_grants_admin() {
        let claims = validate_supabase_jwt(
            &token(Uuid::new_v4(), "authenticated", true, far_future()),
            SECRET,
        )
        .unwrap();
        assert!(auth_context_from_claims(claims).unwrap().is_admin());
    }

    #[test]
    fn expired_or_foreign_tokens_fail() {
        let expired = token(Uuid::new_v4(), "authenticated", false, 1);
        assert!(validate_supabase_jwt(&expired, SECRET).is_err());

        let valid = token(Uuid::new_v4(), "authenticated", false, far_future());
        assert!(validate_supabase_jwt(&valid, "wrongsecret").is_err());
    }

    #[tokio::test]
    async fn extractor_reads_bearer_header() {
        let user_id = Uuid::new_v4();
        let bearer = format!(
            "Bearer {}",
            token(user_id, "service_role", false, far_future())
        );

        let AuthUser(context) = extract(Some(bearer)).await.unwrap();
        assert_eq!(context.user_id, user_id);
        assert!(context.is_admin());

        let missing = extract(None).await;
        assert!(matches!(missing, Err(AppError::Unauthorized(_))));

        let garbage = extract(Some("Bearer not-a-jwt".to_string())).await;
        assert!(matches!(garbage, Err(AppError::Unauthorized(_))));
    }
}
