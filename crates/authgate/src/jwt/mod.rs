//! Identity-token handling: the provider key cache, the validator, and the
//! validated-claims type.

pub mod claims;
pub mod jwks;
pub mod validator;

pub use claims::DecodedClaims;
pub use jwks::{KeySetCache, SigningKey};
pub use validator::IdentityTokenValidator;
