mod credential_store_mysql;
mod util;

pub use credential_store_mysql::*;
