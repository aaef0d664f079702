use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, JwtHeader, User};

type HmacSha256 = Hmac<Sha256>;

/// Hospital role carried by the token. `app_metadata.role` wins over the
/// top-level claim, which Supabase sets to `authenticated` for every user.
fn role_from_claims(claims: &JwtClaims) -> Option<String> {
    let metadata_role = claims
        .app_metadata
        .as_ref()
        .and_then(|metadata| metadata.get("role"))
        .and_then(Value::as_str)
        .map(str::to_string);

    metadata_role.or_else(|| {
        claims
            .role
            .clone()
            .filter(|role| role != "authenticated" && role != "anon")
    })
}

fn decode_segment(segment: &str, what: &str) -> Result<String, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| format!("Invalid {} encoding", what))?;
    String::from_utf8(bytes).map_err(|_| format!("Invalid {} encoding", what))
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let header: JwtHeader = serde_json::from_str(&decode_segment(header_b64, "header")?)
        .map_err(|_| "Invalid header format".to_string())?;
    if header.alg != "HS256" {
        debug!("Rejected token signed with {}", header.alg);
        return Err("Unsupported token algorithm".to_string());
    }

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims: JwtClaims = match serde_json::from_str(&decode_segment(claims_b64, "claims")?) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        role: role_from_claims(&claims),
        id: claims.sub,
        email: claims.email,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn accepts_valid_token() {
        let user = TestUser::nurse("nurse@example.com");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.role.as_deref(), Some("nurse"));
    }

    #[test]
    fn rejects_expired_and_forged_tokens() {
        let user = TestUser::default();
        let expired = JwtTestUtils::create_expired_token(&user, SECRET);
        assert_eq!(validate_token(&expired, SECRET).unwrap_err(), "Token expired");

        let forged = JwtTestUtils::create_invalid_signature_token(&user);
        assert_eq!(validate_token(&forged, SECRET).unwrap_err(), "Invalid token signature");

        assert!(validate_token(&JwtTestUtils::create_malformed_token(), SECRET).is_err());
        assert!(validate_token(&JwtTestUtils::create_test_token(&user, SECRET, None), "").is_err());
    }

    #[test]
    fn app_metadata_role_overrides_supabase_role() {
        let user = TestUser::admin("admin@example.com");
        let token = JwtTestUtils::create_supabase_style_token(&user, SECRET);

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.role.as_deref(), Some("admin"));
    }
}
