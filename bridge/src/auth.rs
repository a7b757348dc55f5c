//! JWT lifecycle: decode, expiry checks, refresh, and anonymous acquisition.
//!
//! Tokens live in the project `.env` (`WARP_JWT`, `WARP_REFRESH_TOKEN`) and
//! are re-read per request so rotations land immediately. All refresh and
//! acquisition paths serialize behind one async lock: parallel quota hits
//! cause a single anonymous acquisition, not many.

use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::settings::{
    api_key_from_refresh_url, CLIENT_VERSION, FALLBACK_API_KEY, GRAPHQL_URL, IDENTITY_TOOLKIT_URL,
    OS_CATEGORY, OS_NAME, OS_VERSION, REFRESH_TOKEN_B64, REFRESH_URL,
};

/// Buffer before `exp` at which a per-request JWT check refreshes.
pub const REQUEST_EXPIRY_BUFFER_MINUTES: i64 = 2;
/// Buffer before `exp` at which a background check refreshes.
pub const BACKGROUND_EXPIRY_BUFFER_MINUTES: i64 = 15;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable JWT remains after refresh and anonymous provisioning.
    #[error("WARP_JWT is not set and refresh failed")]
    Unauthenticated,

    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("anonymous acquisition failed: {0}")]
    AnonymousAcquisition(String),

    #[error("env file: {0}")]
    EnvFile(#[from] std::io::Error),
}

/// Decodes the JWT payload (middle base64url segment) to a JSON object.
/// Returns `None` for anything that is not a three-segment token with a
/// JSON-object payload.
pub fn decode_jwt_payload(token: &str) -> Option<Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('=')).ok()?;
    let payload: Value = serde_json::from_slice(&bytes).ok()?;
    payload.is_object().then_some(payload)
}

/// True when the token expires within `buffer_minutes`. Undecodable tokens
/// and tokens without `exp` count as expired.
pub fn is_token_expired(token: &str, buffer_minutes: i64) -> bool {
    let Some(payload) = decode_jwt_payload(token) else {
        return true;
    };
    let Some(exp) = payload.get("exp").and_then(Value::as_i64) else {
        return true;
    };
    exp - Utc::now().timestamp() <= buffer_minutes * 60
}

/// Owns the env-file credentials and the refresh/acquisition HTTP flows.
pub struct CredentialManager {
    env_path: PathBuf,
    http: reqwest::Client,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl CredentialManager {
    pub fn new(env_path: PathBuf) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            env_path,
            http,
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Current JWT from the env file (falling back to the process env).
    pub fn current_jwt(&self) -> Option<String> {
        warp_config::env_file_var(&self.env_path, "WARP_JWT")
    }

    fn current_refresh_token(&self) -> Option<String> {
        warp_config::env_file_var(&self.env_path, "WARP_REFRESH_TOKEN")
    }

    /// Form body for the token refresh call. Prefers the rotating
    /// `WARP_REFRESH_TOKEN`; otherwise the baked-in payload.
    fn refresh_payload(&self) -> Vec<u8> {
        match self.current_refresh_token() {
            Some(token) => format!("grant_type=refresh_token&refresh_token={token}").into_bytes(),
            None => STANDARD.decode(REFRESH_TOKEN_B64).unwrap_or_default(),
        }
    }

    /// POSTs the refresh request. Returns the token response object, or
    /// `None` on a non-200 (logged, not fatal: callers fall back to the
    /// existing token).
    async fn request_refresh(&self) -> Result<Option<Value>, AuthError> {
        info!("refreshing JWT token");
        let payload = self.refresh_payload();
        let resp = self
            .http
            .post(REFRESH_URL)
            .header("x-warp-client-version", CLIENT_VERSION)
            .header("x-warp-os-category", OS_CATEGORY)
            .header("x-warp-os-name", OS_NAME)
            .header("x-warp-os-version", OS_VERSION)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("accept", "*/*")
            .body(payload)
            .send()
            .await?;
        if resp.status().is_success() {
            let data: Value = resp.json().await?;
            info!("token refresh successful");
            Ok(Some(data))
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("token refresh failed: HTTP {status}: {body}");
            Ok(None)
        }
    }

    fn persist_jwt(&self, jwt: &str) -> Result<(), AuthError> {
        warp_config::upsert_env_var(&self.env_path, "WARP_JWT", jwt)?;
        info!("updated env file with new JWT token");
        Ok(())
    }

    fn persist_refresh_token(&self, token: &str) -> Result<(), AuthError> {
        warp_config::upsert_env_var(&self.env_path, "WARP_REFRESH_TOKEN", token)?;
        info!("updated env file with new refresh token");
        Ok(())
    }

    /// Refreshes when the current token is missing or within the 15-minute
    /// background buffer of expiry. Returns whether a usable token is in
    /// place afterwards.
    pub async fn check_and_refresh(&self) -> Result<bool, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.check_and_refresh_locked().await
    }

    async fn check_and_refresh_locked(&self) -> Result<bool, AuthError> {
        let Some(current) = self.current_jwt() else {
            warn!("no JWT token found");
            return match self.request_refresh().await? {
                Some(data) => match data.get("access_token").and_then(Value::as_str) {
                    Some(token) => {
                        self.persist_jwt(token)?;
                        Ok(true)
                    }
                    None => Ok(false),
                },
                None => Ok(false),
            };
        };

        if !is_token_expired(&current, BACKGROUND_EXPIRY_BUFFER_MINUTES) {
            debug!("current JWT token is still valid");
            return Ok(true);
        }

        info!("JWT token is expired or expiring soon, refreshing");
        match self.request_refresh().await? {
            Some(data) => match data.get("access_token").and_then(Value::as_str) {
                Some(token) if !is_token_expired(token, 0) => {
                    self.persist_jwt(token)?;
                    Ok(true)
                }
                Some(_) => {
                    warn!("refreshed token is already expired");
                    Ok(false)
                }
                None => {
                    error!("refresh response carried no access_token");
                    Ok(false)
                }
            },
            None => Ok(false),
        }
    }

    /// Returns a JWT usable for the next upstream call, refreshing when it
    /// is within the 2-minute per-request buffer of expiry. Fails only when
    /// no token remains at all.
    pub async fn get_valid_jwt(&self) -> Result<String, AuthError> {
        let jwt = match self.current_jwt() {
            Some(jwt) => jwt,
            None => {
                info!("no JWT token found, attempting refresh");
                self.check_and_refresh().await?;
                self.current_jwt().ok_or(AuthError::Unauthenticated)?
            }
        };

        if is_token_expired(&jwt, REQUEST_EXPIRY_BUFFER_MINUTES) {
            info!("JWT token expiring soon, attempting refresh");
            match self.check_and_refresh().await {
                Ok(true) => {
                    if let Some(fresh) = self.current_jwt() {
                        if is_token_expired(&fresh, 0) {
                            warn!("new token has short expiry, proceeding anyway");
                        }
                        return Ok(fresh);
                    }
                }
                Ok(false) | Err(_) => {
                    warn!("JWT refresh failed, trying existing token");
                }
            }
        }
        Ok(jwt)
    }

    /// Best-effort refresh for `/api/auth/refresh` and process startup.
    pub async fn refresh_if_needed(&self) -> bool {
        match self.check_and_refresh().await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                error!("JWT refresh failed: {e}");
                false
            }
        }
    }

    /// Provisions an anonymous identity after a quota-exhaustion 429.
    ///
    /// Two steps: a GraphQL `CreateAnonymousUser` mutation yields an
    /// `idToken`; the identity-toolkit `signInWithCustomToken` exchange
    /// turns it into a refresh token, which is persisted and then exchanged
    /// for an access token through the normal refresh path.
    pub async fn acquire_anonymous_access_token(&self) -> Result<String, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        info!("acquiring anonymous access token");

        let mutation = json!({
            "operationName": "CreateAnonymousUser",
            "variables": {
                "input": {
                    "anonymousUserType": "NATIVE_CLIENT_ANONYMOUS_USER_FEATURE_GATED",
                    "expirationType": "NO_EXPIRATION",
                    "referralCode": null,
                }
            },
            "query": "mutation CreateAnonymousUser($input: CreateAnonymousUserInput!) {\n  createAnonymousUser(input: $input) {\n    __typename\n    ... on CreateAnonymousUserOutput {\n      expiresAt\n      anonymousUserType\n      firebaseUid\n      idToken\n      isInviteValid\n    }\n    ... on UserFacingError {\n      error {\n        __typename\n        message\n      }\n    }\n  }\n}",
        });
        let resp = self
            .http
            .post(GRAPHQL_URL)
            .header("x-warp-client-version", CLIENT_VERSION)
            .header("x-warp-os-category", OS_CATEGORY)
            .header("x-warp-os-name", OS_NAME)
            .header("x-warp-os-version", OS_VERSION)
            .json(&mutation)
            .send()
            .await?;
        let body: Value = resp.json().await?;
        let id_token = body
            .pointer("/data/createAnonymousUser/idToken")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AuthError::AnonymousAcquisition("no idToken in GraphQL response".to_string())
            })?;

        let key = api_key_from_refresh_url().unwrap_or(FALLBACK_API_KEY);
        let resp = self
            .http
            .post(format!("{IDENTITY_TOOLKIT_URL}?key={key}"))
            .form(&[("returnSecureToken", "true"), ("token", id_token)])
            .send()
            .await?;
        let body: Value = resp.json().await?;
        let refresh_token = body
            .get("refreshToken")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AuthError::AnonymousAcquisition(
                    "no refreshToken in identity-toolkit response".to_string(),
                )
            })?;
        self.persist_refresh_token(refresh_token)?;

        let data = self.request_refresh().await?.ok_or_else(|| {
            AuthError::AnonymousAcquisition("token exchange after acquisition failed".to_string())
        })?;
        let access = data
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AuthError::AnonymousAcquisition("exchange response carried no access_token".into())
            })?;
        self.persist_jwt(access)?;
        Ok(access.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_jwt(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn decode_payload_round_trip() {
        let token = make_jwt(&json!({"exp": 1_700_000_000, "sub": "u1"}));
        let payload = decode_jwt_payload(&token).unwrap();
        assert_eq!(payload["exp"], 1_700_000_000);
        assert_eq!(payload["sub"], "u1");
    }

    #[test]
    fn decode_payload_tolerates_padding() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let body = format!(
            "{}==",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json!({"exp": 1})).unwrap())
        );
        let token = format!("{header}.{body}.s");
        assert!(decode_jwt_payload(&token).is_some());
    }

    #[test]
    fn decode_payload_rejects_malformed() {
        assert!(decode_jwt_payload("only.two").is_none());
        assert!(decode_jwt_payload("a.!!!.c").is_none());
        assert!(decode_jwt_payload("").is_none());
    }

    #[test]
    fn expired_when_exp_missing() {
        let token = make_jwt(&json!({"sub": "u1"}));
        assert!(is_token_expired(&token, 0));
    }

    #[test]
    fn expired_when_undecodable() {
        assert!(is_token_expired("garbage", 0));
    }

    #[test]
    fn fresh_token_not_expired() {
        let exp = Utc::now().timestamp() + 3600;
        let token = make_jwt(&json!({"exp": exp}));
        assert!(!is_token_expired(&token, 0));
        // Within a one-hour buffer it counts as expiring.
        assert!(is_token_expired(&token, 61));
    }

    #[test]
    fn past_token_expired() {
        let exp = Utc::now().timestamp() - 10;
        let token = make_jwt(&json!({"exp": exp}));
        assert!(is_token_expired(&token, 0));
    }

    #[test]
    fn refresh_payload_prefers_env_token() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(&env_path, "WARP_REFRESH_TOKEN=tok-123\n").unwrap();
        let mgr = CredentialManager::new(env_path).unwrap();
        let payload = mgr.refresh_payload();
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            "grant_type=refresh_token&refresh_token=tok-123"
        );
    }

    #[test]
    fn refresh_payload_falls_back_to_baked_in() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CredentialManager::new(dir.path().join(".env")).unwrap();
        let payload = mgr.refresh_payload();
        assert!(String::from_utf8(payload)
            .unwrap()
            .starts_with("grant_type=refresh_token&refresh_token="));
    }

    #[test]
    fn current_jwt_reads_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(&env_path, "WARP_JWT=abc\n").unwrap();
        let mgr = CredentialManager::new(env_path).unwrap();
        assert_eq!(mgr.current_jwt().as_deref(), Some("abc"));
    }
}
