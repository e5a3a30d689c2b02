mod access_gate;
mod auth_service_impl;
mod credential_hasher_impl;
mod credential_verifier;
mod token_codec_jwt;

pub use access_gate::*;
pub use auth_service_impl::*;
pub use credential_hasher_impl::*;
pub use credential_verifier::*;
pub use token_codec_jwt::*;
