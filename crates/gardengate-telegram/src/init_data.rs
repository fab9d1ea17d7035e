//! Telegram WebApp initData verification.
//!
//! The web view receives `initData` as a URL-encoded string. Telegram signs it
//! with a key derived from the bot token:
//!
//! ```text
//! secret_key = HMAC_SHA256(key = "WebAppData", msg = bot_token)
//! hash       = hex(HMAC_SHA256(key = secret_key, msg = data_check_string))
//! ```
//!
//! where `data_check_string` is every field except `hash`, sorted by key,
//! rendered `key=value` and joined with `\n`.

use std::time::Duration;

use gardengate_core::VerifiedIdentity;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::VerifyError;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_DATA: &[u8] = b"WebAppData";

/// Verifies initData for one bot. Holds only the derived key, never the token.
#[derive(Clone)]
pub struct InitDataVerifier {
    secret_key: Vec<u8>,
    max_age: Option<Duration>,
}

impl std::fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitDataVerifier")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

/// The `user` object embedded in initData. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct WebAppUser {
    id: Option<i64>,
    username: Option<String>,
}

impl InitDataVerifier {
    pub fn new(bot_token: &str) -> Result<Self, VerifyError> {
        Ok(Self {
            secret_key: hmac_sha256(WEB_APP_DATA, bot_token.as_bytes())?,
            max_age: None,
        })
    }

    /// Also reject payloads whose `auth_date` is older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn verify(&self, init_data: &str) -> Result<VerifiedIdentity, VerifyError> {
        self.verify_at(init_data, chrono::Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock (unix seconds).
    pub fn verify_at(&self, init_data: &str, now: i64) -> Result<VerifiedIdentity, VerifyError> {
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(init_data.as_bytes())
            .into_owned()
            .collect();

        let hash = pairs
            .iter()
            .find(|(k, _)| k == "hash")
            .map(|(_, v)| v.clone())
            .ok_or(VerifyError::MissingHash)?;
        pairs.retain(|(k, _)| k != "hash");

        let expected = decode_hash(&hash).ok_or(VerifyError::HashMismatch)?;
        let mut mac = keyed_mac(&self.secret_key)?;
        mac.update(data_check_string(&pairs).as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| VerifyError::HashMismatch)?;

        if let Some(max_age) = self.max_age {
            check_freshness(&pairs, now, max_age)?;
        }

        let user = match pairs.iter().find(|(k, _)| k == "user") {
            Some((_, raw)) => serde_json::from_str::<WebAppUser>(raw)
                .map_err(|e| VerifyError::Malformed(format!("user payload: {e}")))?,
            None => return Ok(VerifiedIdentity::default()),
        };

        let username = user.username.filter(|u| !u.trim().is_empty());
        Ok(VerifiedIdentity::from_verified_claims(user.id, username))
    }
}

/// One-shot form of [`InitDataVerifier::verify`].
pub fn verify(init_data: &str, bot_token: &str) -> Result<VerifiedIdentity, VerifyError> {
    InitDataVerifier::new(bot_token)?.verify(init_data)
}

/// Build a signed initData string the way Telegram does. Used for fixtures and
/// local tooling that needs to impersonate the web view.
pub fn sign(pairs: &[(&str, &str)], bot_token: &str) -> Result<String, VerifyError> {
    let owned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let secret_key = hmac_sha256(WEB_APP_DATA, bot_token.as_bytes())?;
    let hash = hex::encode(hmac_sha256(&secret_key, data_check_string(&owned).as_bytes())?);

    let mut out = form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        out.append_pair(k, v);
    }
    out.append_pair("hash", &hash);
    Ok(out.finish())
}

/// Sorted `key=value` lines; ties on key are broken by value so the result
/// never depends on input order.
fn data_check_string(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort();
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Telegram sends 64 lowercase hex chars; anything else cannot match.
fn decode_hash(hash: &str) -> Option<Vec<u8>> {
    let well_formed = hash.len() == 64
        && hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed {
        return None;
    }
    hex::decode(hash).ok()
}

fn check_freshness(
    pairs: &[(String, String)],
    now: i64,
    max_age: Duration,
) -> Result<(), VerifyError> {
    let auth_date = pairs
        .iter()
        .find(|(k, _)| k == "auth_date")
        .and_then(|(_, v)| v.parse::<i64>().ok());

    match auth_date {
        Some(ts) if now.saturating_sub(ts) <= max_age.as_secs() as i64 => Ok(()),
        _ => Err(VerifyError::Expired { auth_date }),
    }
}

fn keyed_mac(key: &[u8]) -> Result<HmacSha256, VerifyError> {
    HmacSha256::new_from_slice(key).map_err(|_| VerifyError::InvalidKey)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, VerifyError> {
    let mut mac = keyed_mac(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456:TEST-bot-token";
    const BOB: &str = r#"{"id":42,"first_name":"Bob","username":"Bob"}"#;

    fn bob_token() -> String {
        sign(
            &[("query_id", "AAH"), ("user", BOB), ("auth_date", "1700000000")],
            TOKEN,
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_embedded_identity() {
        let identity = verify(&bob_token(), TOKEN).unwrap();
        assert_eq!(identity.id(), Some(42));
        assert_eq!(identity.username(), Some("Bob"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let err = verify(&bob_token(), "123456:other-token").unwrap_err();
        assert!(matches!(err, VerifyError::HashMismatch));
    }

    #[test]
    fn missing_hash_is_malformed() {
        let err = verify("auth_date=1700000000&user=%7B%7D", TOKEN).unwrap_err();
        assert!(matches!(err, VerifyError::MissingHash));
    }

    #[test]
    fn tampering_any_value_breaks_the_signature() {
        let pairs = [("query_id", "AAH"), ("user", BOB), ("auth_date", "1700000000")];
        let signed = sign(&pairs, TOKEN).unwrap();
        let hash = signed.rsplit("hash=").next().unwrap().to_string();

        for i in 0..pairs.len() {
            let mut tampered: Vec<(String, String)> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            tampered[i].1.push('x');

            let mut enc = form_urlencoded::Serializer::new(String::new());
            for (k, v) in &tampered {
                enc.append_pair(k, v);
            }
            enc.append_pair("hash", &hash);

            let err = verify(&enc.finish(), TOKEN).unwrap_err();
            assert!(matches!(err, VerifyError::HashMismatch), "field {i}");
        }
    }

    #[test]
    fn field_order_does_not_matter() {
        let signed = bob_token();
        let hash = signed.rsplit("hash=").next().unwrap().to_string();

        let mut enc = form_urlencoded::Serializer::new(String::new());
        enc.append_pair("hash", &hash);
        enc.append_pair("auth_date", "1700000000");
        enc.append_pair("user", BOB);
        enc.append_pair("query_id", "AAH");

        let identity = verify(&enc.finish(), TOKEN).unwrap();
        assert_eq!(identity.id(), Some(42));
    }

    #[test]
    fn uppercase_or_short_hash_never_matches() {
        let signed = bob_token();
        let (body, hash) = signed.rsplit_once("hash=").unwrap();

        let upper = format!("{body}hash={}", hash.to_ascii_uppercase());
        assert!(matches!(verify(&upper, TOKEN), Err(VerifyError::HashMismatch)));

        let short = format!("{body}hash={}", &hash[..10]);
        assert!(matches!(verify(&short, TOKEN), Err(VerifyError::HashMismatch)));
    }

    #[test]
    fn missing_user_gives_anonymous_identity() {
        let token = sign(&[("auth_date", "1700000000")], TOKEN).unwrap();
        let identity = verify(&token, TOKEN).unwrap();
        assert!(identity.is_anonymous());
    }

    #[test]
    fn signed_but_invalid_user_json_is_rejected() {
        let token = sign(&[("auth_date", "1700000000"), ("user", "{not json")], TOKEN).unwrap();
        let err = verify(&token, TOKEN).unwrap_err();
        assert!(matches!(err, VerifyError::Malformed(_)));
    }

    #[test]
    fn garbage_input_is_a_rejection_not_a_panic() {
        assert!(verify("%%%&&&==", TOKEN).is_err());
        assert!(verify("", TOKEN).is_err());
        assert!(verify("hash=zz", TOKEN).is_err());
    }

    #[test]
    fn empty_username_is_absent() {
        let token = sign(&[("user", r#"{"id":7,"username":""}"#)], TOKEN).unwrap();
        let identity = verify(&token, TOKEN).unwrap();
        assert_eq!(identity.id(), Some(7));
        assert_eq!(identity.username(), None);
    }

    #[test]
    fn key_derivation_accepts_any_token_length() {
        let long = "9".repeat(512);
        for token in ["", "1:a", long.as_str()] {
            let verifier = InitDataVerifier::new(token).unwrap();
            let signed = sign(&[("auth_date", "1700000000")], token).unwrap();
            assert!(verifier.verify(&signed).is_ok(), "token length {}", token.len());
        }
    }

    #[test]
    fn freshness_window_is_enforced_when_configured() {
        let verifier = InitDataVerifier::new(TOKEN).unwrap().with_max_age(Duration::from_secs(60));
        let token = bob_token();

        assert!(verifier.verify_at(&token, 1_700_000_030).is_ok());
        assert!(verifier.verify_at(&token, 1_700_000_060).is_ok());
        assert!(matches!(
            verifier.verify_at(&token, 1_700_000_061),
            Err(VerifyError::Expired { auth_date: Some(1_700_000_000) })
        ));

        let undated = sign(&[("user", BOB)], TOKEN).unwrap();
        assert!(matches!(
            verifier.verify_at(&undated, 1_700_000_000),
            Err(VerifyError::Expired { auth_date: None })
        ));
    }

    #[test]
    fn known_vector_matches_reference_construction() {
        // data_check_string for a fixed payload, signed with an independent
        // two-step HMAC to pin the key derivation direction.
        let pairs = vec![
            ("auth_date".to_string(), "1".to_string()),
            ("user".to_string(), r#"{"id":1}"#.to_string()),
        ];
        assert_eq!(data_check_string(&pairs), "auth_date=1\nuser={\"id\":1}");

        let mut outer = HmacSha256::new_from_slice(b"WebAppData").unwrap();
        outer.update(TOKEN.as_bytes());
        let key = outer.finalize().into_bytes();
        let mut inner = HmacSha256::new_from_slice(&key).unwrap();
        inner.update(b"auth_date=1\nuser={\"id\":1}");
        let hash = hex::encode(inner.finalize().into_bytes());

        let signed = sign(&[("auth_date", "1"), ("user", r#"{"id":1}"#)], TOKEN).unwrap();
        assert!(signed.ends_with(&format!("hash={hash}")));
    }
}
