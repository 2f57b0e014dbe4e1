//! Authentication utilities
//!
//! Tokens are issued by the account service; the gateway only verifies them.

mod jwt;

pub use jwt::{Claims, JwtService, TokenType};
