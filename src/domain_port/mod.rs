mod clock;
mod credential_store;
mod session_cache;

pub use clock::*;
pub use credential_store::*;
pub use session_cache::*;
