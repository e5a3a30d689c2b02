use crate::domain_model::*;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("token encoding failed: {0}")]
    EncodingError(String),
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// The signature is good but the token is past its expiry.
    #[error("token expired")]
    Expired(Box<Claims>),
}

/// A freshly signed token together with the claims it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

pub trait TokenCodec: Send + Sync {
    /// Sign `grant` with an expiry of `now + ttl`.
    fn issue(&self, grant: Grant, ttl: Duration) -> Result<IssuedToken, CodecError>;

    /// Check signature, algorithm and expiry, in that order.
    fn verify(&self, token: &str) -> Result<Claims, CodecError>;
}
