//! Authentication: password storage, signed tokens, request identity.

pub mod extract;
pub mod password;
pub mod token;

pub use extract::AuthUser;
