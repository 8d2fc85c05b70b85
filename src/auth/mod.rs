pub mod issuer;
pub mod revocation;
pub mod validator;

pub use issuer::{IssueRequest, IssuedToken, TokenIssuer};
pub use revocation::RevocationList;
pub use validator::TokenValidator;
