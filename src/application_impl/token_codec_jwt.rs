use crate::application_port::{CodecError, IssuedToken, TokenCodec};
use crate::domain_model::*;
use crate::domain_port::Clock;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::DateTime;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const PINNED_ALGORITHM: &str = "HS256";

#[derive(Debug, thiserror::Error)]
pub enum SigningKeyError {
    #[error("default signing key is empty")]
    EmptyDefault,
    #[error("signing key for audience {0} is empty")]
    EmptyAudience(AudienceId),
}

/// HMAC secrets: one default plus optional per-audience overrides.
#[derive(Clone)]
pub struct SigningKeys {
    default: Vec<u8>,
    audiences: HashMap<AudienceId, Vec<u8>>,
}

impl SigningKeys {
    pub fn new(default: impl Into<Vec<u8>>) -> Result<Self, SigningKeyError> {
        let default = default.into();
        if default.is_empty() {
            return Err(SigningKeyError::EmptyDefault);
        }
        Ok(SigningKeys {
            default,
            audiences: HashMap::new(),
        })
    }

    pub fn with_audience(
        mut self,
        audience_id: AudienceId,
        key: impl Into<Vec<u8>>,
    ) -> Result<Self, SigningKeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(SigningKeyError::EmptyAudience(audience_id));
        }
        self.audiences.insert(audience_id, key);
        Ok(self)
    }

    fn for_audience(&self, audience_id: Option<&AudienceId>) -> &[u8] {
        audience_id
            .and_then(|aid| self.audiences.get(aid))
            .unwrap_or(&self.default)
    }
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeys")
            .field("audiences", &self.audiences.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    exp: i64,
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aid: Option<String>,
    kind: TokenKind,
    jti: String, // keeps same-second tokens distinct
}

#[derive(Debug, Deserialize)]
struct HeaderPeek {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Read the JOSE header ourselves so that algorithms jsonwebtoken cannot even
/// parse (`none`) are still reported as unsupported.
fn peek_header(token: &str) -> Result<HeaderPeek, CodecError> {
    let (header, _) = token.split_once('.').ok_or(CodecError::InvalidSignature)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| CodecError::InvalidSignature)?;
    serde_json::from_slice(&bytes).map_err(|_| CodecError::InvalidSignature)
}

pub struct JwtHs256Codec {
    keys: SigningKeys,
    clock: Arc<dyn Clock>,
}

impl JwtHs256Codec {
    pub fn new(keys: SigningKeys, clock: Arc<dyn Clock>) -> Self {
        JwtHs256Codec { keys, clock }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn validation() -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        // expiry is checked against our clock after the signature
        v.validate_exp = false;
        v.validate_aud = false;
        v.set_required_spec_claims(&["exp", "sub"]);
        v
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue(&self, grant: Grant, ttl: Duration) -> Result<IssuedToken, CodecError> {
        if ttl.as_secs() == 0 {
            return Err(CodecError::EncodingError(
                "ttl must be at least one second".to_string(),
            ));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CodecError::EncodingError(e.to_string()))?;

        let iat_dt = self.clock.now();
        // exp travels as whole seconds; truncate now so verify yields the same claims
        let exp = (iat_dt + ttl).timestamp();
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| CodecError::EncodingError("expiry out of range".to_string()))?;
        let claims = grant.stamp(expires_at);

        let wire = WireClaims {
            sub: claims.subject_id.to_string(),
            role: claims.role,
            exp,
            iat: iat_dt.timestamp(),
            aid: claims.audience_id.as_ref().map(|aid| aid.to_string()),
            kind: claims.kind,
            jti: Self::gen_jti(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = claims.audience_id.as_ref().map(|aid| aid.to_string());

        let key = self.keys.for_audience(claims.audience_id.as_ref());
        let token = encode(&header, &wire, &EncodingKey::from_secret(key))
            .map_err(|e| CodecError::EncodingError(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    fn verify(&self, token: &str) -> Result<Claims, CodecError> {
        let peek = peek_header(token)?;
        if peek.alg != PINNED_ALGORITHM {
            return Err(CodecError::UnsupportedAlgorithm(peek.alg));
        }

        let audience_id = peek.kid.map(AudienceId);
        let key = self.keys.for_audience(audience_id.as_ref());
        let data = decode::<WireClaims>(token, &DecodingKey::from_secret(key), &Self::validation())
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidAlgorithm => {
                    CodecError::UnsupportedAlgorithm(PINNED_ALGORITHM.to_string())
                }
                _ => CodecError::InvalidSignature,
            })?;
        let wire = data.claims;

        if wire.aid.as_deref() != audience_id.as_ref().map(AudienceId::as_str) {
            return Err(CodecError::InvalidSignature);
        }

        let subject_id = wire
            .sub
            .parse::<SubjectId>()
            .map_err(|_| CodecError::InvalidSignature)?;
        let expires_at =
            DateTime::from_timestamp(wire.exp, 0).ok_or(CodecError::InvalidSignature)?;

        let claims = Claims {
            subject_id,
            role: wire.role,
            expires_at,
            audience_id,
            kind: wire.kind,
        };

        if claims.is_expired_at(self.clock.now()) {
            return Err(CodecError::Expired(Box::new(claims)));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::ManualClock;

    const TTL: Duration = Duration::from_secs(15 * 60);

    fn codec_with(keys: SigningKeys) -> (JwtHs256Codec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (JwtHs256Codec::new(keys, clock.clone()), clock)
    }

    fn codec() -> (JwtHs256Codec, Arc<ManualClock>) {
        codec_with(SigningKeys::new("test-secret-key-12345").unwrap())
    }

    fn forge(header_json: &str, payload_json: &str, signature: &[u8]) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(payload_json),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    #[test]
    fn test_issue_then_verify_returns_claims() {
        let (codec, clock) = codec();
        let grant = Grant::access(SubjectId::generate(), Role::ArticleAdmin, None);

        let issued = codec.issue(grant.clone(), TTL).unwrap();
        let claims = codec.verify(&issued.token).unwrap();

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.subject_id, grant.subject_id);
        assert_eq!(claims.role, Some(Role::ArticleAdmin));
        assert!(claims.expires_at > clock.now());
        assert!(claims.expires_at <= clock.now() + chrono::Duration::minutes(15));
    }

    #[test]
    fn test_refresh_token_round_trip_keeps_audience() {
        let (codec, _) = codec();
        let grant = Grant::refresh(SubjectId::generate(), Some(AudienceId::new("postman")));

        let issued = codec.issue(grant, TTL).unwrap();
        let claims = codec.verify(&issued.token).unwrap();

        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.role, None);
        assert_eq!(claims.audience_id, Some(AudienceId::new("postman")));
    }

    #[test]
    fn test_flipped_signature_byte_rejected() {
        let (codec, _) = codec();
        let issued = codec
            .issue(Grant::access(SubjectId::generate(), Role::User, None), TTL)
            .unwrap();
        let (signing_input, signature) = issued.token.rsplit_once('.').unwrap();
        let signature = URL_SAFE_NO_PAD.decode(signature).unwrap();

        for i in 0..signature.len() {
            let mut tampered = signature.clone();
            tampered[i] ^= 0x01;
            let token = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(&tampered));
            assert!(
                matches!(codec.verify(&token), Err(CodecError::InvalidSignature)),
                "byte {} accepted",
                i
            );
        }
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let (codec, _) = codec();
        let issued = codec
            .issue(Grant::access(SubjectId::generate(), Role::User, None), TTL)
            .unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["role"] = serde_json::json!("admin");
        let token = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(payload.to_string()),
            parts[2]
        );

        assert!(matches!(codec.verify(&token), Err(CodecError::InvalidSignature)));
    }

    #[test]
    fn test_different_secrets_reject() {
        let (codec1, _) = codec_with(SigningKeys::new("secret1").unwrap());
        let (codec2, _) = codec_with(SigningKeys::new("secret2").unwrap());
        let issued = codec1
            .issue(Grant::access(SubjectId::generate(), Role::User, None), TTL)
            .unwrap();

        assert!(matches!(codec2.verify(&issued.token), Err(CodecError::InvalidSignature)));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let (codec, _) = codec();
        for token in ["", "invalid", "invalid.token.here", "a.b", "...."] {
            assert!(
                matches!(codec.verify(token), Err(CodecError::InvalidSignature)),
                "{:?} accepted",
                token
            );
        }
    }

    #[test]
    fn test_alg_none_rejected() {
        let (codec, clock) = codec();
        let payload = format!(
            r#"{{"sub":"{}","role":"admin","exp":{},"iat":0,"kind":"access","jti":"x"}}"#,
            SubjectId::generate(),
            (clock.now() + chrono::Duration::hours(1)).timestamp()
        );
        let token = forge(r#"{"alg":"none","typ":"JWT"}"#, &payload, b"");

        assert!(matches!(
            codec.verify(&token),
            Err(CodecError::UnsupportedAlgorithm(alg)) if alg == "none"
        ));
    }

    #[test]
    fn test_asymmetric_alg_rejected() {
        let (codec, clock) = codec();
        let payload = format!(
            r#"{{"sub":"{}","role":"admin","exp":{},"iat":0,"kind":"access","jti":"x"}}"#,
            SubjectId::generate(),
            (clock.now() + chrono::Duration::hours(1)).timestamp()
        );
        let token = forge(r#"{"alg":"RS256","typ":"JWT"}"#, &payload, b"signature");

        assert!(matches!(
            codec.verify(&token),
            Err(CodecError::UnsupportedAlgorithm(alg)) if alg == "RS256"
        ));
    }

    #[test]
    fn test_expired_token_returns_claims() {
        let (codec, clock) = codec();
        let subject_id = SubjectId::generate();
        let issued = codec
            .issue(Grant::access(subject_id, Role::User, None), TTL)
            .unwrap();

        clock.advance(chrono::Duration::minutes(15));

        match codec.verify(&issued.token) {
            Err(CodecError::Expired(claims)) => assert_eq!(claims.subject_id, subject_id),
            other => panic!("expected expiry, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_until_ttl_elapses() {
        let (codec, clock) = codec();
        let issued = codec
            .issue(Grant::access(SubjectId::generate(), Role::User, None), TTL)
            .unwrap();

        clock.advance(chrono::Duration::minutes(14));
        assert!(codec.verify(&issued.token).is_ok());
    }

    #[test]
    fn test_audience_key_is_used() {
        let keys = SigningKeys::new("default")
            .unwrap()
            .with_audience(AudienceId::new("mobile"), "mobile-secret")
            .unwrap();
        let (codec, _) = codec_with(keys);
        let (default_only, _) = codec_with(SigningKeys::new("default").unwrap());

        let issued = codec
            .issue(
                Grant::access(SubjectId::generate(), Role::User, Some(AudienceId::new("mobile"))),
                TTL,
            )
            .unwrap();

        assert!(codec.verify(&issued.token).is_ok());
        assert!(matches!(
            default_only.verify(&issued.token),
            Err(CodecError::InvalidSignature)
        ));
    }

    #[test]
    fn test_unregistered_audience_falls_back_to_default_key() {
        let (codec, _) = codec();
        let issued = codec
            .issue(
                Grant::access(SubjectId::generate(), Role::User, Some(AudienceId::new("cli"))),
                TTL,
            )
            .unwrap();

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.audience_id, Some(AudienceId::new("cli")));
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let (codec, _) = codec();
        let subject_id = SubjectId::generate();
        let first = codec.issue(Grant::refresh(subject_id, None), TTL).unwrap();
        let second = codec.issue(Grant::refresh(subject_id, None), TTL).unwrap();
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_sub_second_ttl_rejected() {
        let (codec, _) = codec();
        let result = codec.issue(
            Grant::access(SubjectId::generate(), Role::User, None),
            Duration::from_millis(500),
        );
        assert!(matches!(result, Err(CodecError::EncodingError(_))));
    }

    #[test]
    fn test_empty_keys_rejected() {
        assert!(matches!(SigningKeys::new(""), Err(SigningKeyError::EmptyDefault)));
        let result = SigningKeys::new("default")
            .unwrap()
            .with_audience(AudienceId::new("web"), Vec::new());
        assert!(matches!(result, Err(SigningKeyError::EmptyAudience(_))));
    }
}
