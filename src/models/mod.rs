pub mod claims;
pub mod identity;

pub use claims::{AccessClaims, Fingerprint};
pub use identity::Identity;
