//! Claims carried by access and refresh tokens.
//!
//! Both kinds share one shape and differ only in `type` and lifetime. `jti` makes
//! every issued token unique, so two refresh tokens minted in the same second for the
//! same user still compare unequal in the refresh token store.

use entity::Id;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Id,
    pub exp: u64,
    pub iat: u64,
    pub jti: Id,
    #[serde(rename = "type")]
    pub kind: TokenKind,
}
