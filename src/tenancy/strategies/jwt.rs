use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::tenancy::{MultiTenancyStrategy, RequestContext, Tenant};

pub const TENANT_CLAIM: &str = "tenantid";

/// Uses the `tenantid` claim of a bearer token as the tenant id.
///
/// Only the payload is read: the algorithm, signature and expiry are never
/// checked, so unsigned (`alg: none`) tokens work too. Tokens that cannot be
/// decoded identify no tenant.
#[derive(Debug, Default, Clone, Copy)]
pub struct JwtStrategy;

#[async_trait]
impl MultiTenancyStrategy for JwtStrategy {
    fn name(&self) -> &str {
        "jwt"
    }

    async fn identify_tenant(&self, ctx: &RequestContext) -> Result<Option<Tenant>> {
        let authorization = match ctx.header(AUTHORIZATION.as_str()) {
            Some(value) if value.starts_with("Bearer ") => value,
            _ => return Ok(None),
        };

        // "Bearer <token>": the token is the second space-separated part
        let token = authorization.split(' ').nth(1).unwrap_or_default();
        let claims = match decode_unverified(token) {
            Some(claims) => claims,
            None => {
                tracing::debug!("Bearer token could not be decoded");
                return Ok(None);
            }
        };

        let tenant_id = match claims.get(TENANT_CLAIM) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Ok(tenant_id.map(Tenant::new))
    }
}

/// Decodes the claims of a compact JWS `header.payload.signature`.
///
/// The signature part may be empty. Header and payload must both be JSON
/// objects.
fn decode_unverified(token: &str) -> Option<Map<String, Value>> {
    let mut parts = token.split('.');
    let (header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    decode_segment(header)?;
    decode_segment(payload)
}

fn decode_segment(segment: &str) -> Option<Map<String, Value>> {
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn unsigned_token(alg: &str, claims: Value) -> String {
        let header = serde_json::json!({ "alg": alg, "typ": "JWT" });
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    fn token(claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"not-checked"),
        )
        .unwrap()
    }

    async fn identify(authorization: Option<&str>) -> Option<Tenant> {
        let mut builder = Request::builder().uri("/users");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        let ctx = RequestContext::from_request(&builder.body(()).unwrap());
        JwtStrategy.identify_tenant(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_tenant_claim_from_bearer_token() {
        let jwt = token(serde_json::json!({ "sub": "u1", "tenantid": "abc" }));
        let tenant = identify(Some(&format!("Bearer {}", jwt))).await;
        assert_eq!(tenant, Some(Tenant::new("abc")));
    }

    #[tokio::test]
    async fn test_expired_token_still_identifies() {
        let jwt = token(serde_json::json!({ "tenantid": "xyz", "exp": 1 }));
        let tenant = identify(Some(&format!("Bearer {}", jwt))).await;
        assert_eq!(tenant, Some(Tenant::new("xyz")));
    }

    #[tokio::test]
    async fn test_algorithm_is_not_checked() {
        let claims = serde_json::json!({ "tenantid": "abc" });
        for alg in ["none", "ES512", "made-up"] {
            let jwt = unsigned_token(alg, claims.clone());
            let tenant = identify(Some(&format!("Bearer {}", jwt))).await;
            assert_eq!(tenant, Some(Tenant::new("abc")), "alg {}", alg);
        }

        let signed = format!("{}signature", unsigned_token("ES512", claims));
        let tenant = identify(Some(&format!("Bearer {}", signed))).await;
        assert_eq!(tenant, Some(Tenant::new("abc")));
    }

    #[tokio::test]
    async fn test_numeric_claim() {
        let jwt = token(serde_json::json!({ "tenantid": 42 }));
        let tenant = identify(Some(&format!("Bearer {}", jwt))).await;
        assert_eq!(tenant, Some(Tenant::new("42")));
    }

    #[tokio::test]
    async fn test_no_signal() {
        let jwt = token(serde_json::json!({ "sub": "u1" }));
        assert_eq!(identify(Some(&format!("Bearer {}", jwt))).await, None);
        assert_eq!(identify(Some(&format!("Basic {}", jwt))).await, None);
        assert_eq!(identify(Some("Bearer not.a.jwt")).await, None);
        assert_eq!(identify(Some(&format!("Bearer {}.extra", jwt))).await, None);
        let array_payload = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(r#"["tenantid"]"#)
        );
        assert_eq!(identify(Some(&format!("Bearer {}", array_payload))).await, None);
        assert_eq!(identify(Some("Bearer ")).await, None);
        assert_eq!(identify(None).await, None);
    }
}
