mod audience;
mod claims;
mod credential;
mod role;
mod subject;
mod token;

pub use audience::*;
pub use claims::*;
pub use credential::*;
pub use role::*;
pub use subject::*;
pub use token::*;
