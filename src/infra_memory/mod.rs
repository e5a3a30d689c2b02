mod credential_store_memory;
mod manual_clock;
mod session_cache_memory;

pub use credential_store_memory::*;
pub use manual_clock::*;
pub use session_cache_memory::*;
