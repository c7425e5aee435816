//! Execution session identifiers.
//!
//! A [`SessionId`] is a v4 UUID minted when a session starts. Logs print the
//! full hyphenated form; [`SessionId::short`] gives the eight-digit prefix
//! used in compact console output.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Identity of one live execution session.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Uuid", into = "Uuid")]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mints a fresh identifier for a session that is starting.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, enough to tell live sessions apart on a console.
    #[must_use]
    pub fn short(self) -> String {
        format!("{:08x}", self.0.as_fields().0)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0.hyphenated(), f)
    }
}

impl TryFrom<Uuid> for SessionId {
    type Error = Error;

    fn try_from(uuid: Uuid) -> Result<Self> {
        if uuid.is_nil() {
            return Err(Error::NilSessionId);
        }
        Ok(Self(uuid))
    }
}

impl From<SessionId> for Uuid {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl FromStr for SessionId {
    type Err = Error;

    /// Accepts the hyphenated form printed in logs as well as the bare
    /// 32-digit form.
    fn from_str(s: &str) -> Result<Self> {
        Self::try_from(Uuid::parse_str(s.trim())?)
    }
}
