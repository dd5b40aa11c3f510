pub mod claims;
pub mod jwt;
pub mod password;

pub use claims::{AccessClaims, RefreshClaims, TokenKind};
pub use jwt::TokenService;
