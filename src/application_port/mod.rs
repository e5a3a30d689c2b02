mod access_gate;
mod auth_service;
mod call_context;
mod token_codec;

pub use access_gate::*;
pub use auth_service::*;
pub use call_context::*;
pub use token_codec::*;
