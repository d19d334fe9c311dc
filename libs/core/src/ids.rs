use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nullable surrogate key assigned to a message by the backend.
///
/// The absent value renders as `"null"` so callback URLs and logs stay
/// unambiguous before the backend has written the message.
///
/// ```
/// use mercury_core::MsgId;
///
/// assert_eq!(MsgId::new(42).to_string(), "42");
/// assert_eq!(MsgId::NIL.to_string(), "null");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(Option<i64>);

impl MsgId {
    /// The nil id, used before the backend has assigned one.
    pub const NIL: MsgId = MsgId(None);

    pub fn new(id: i64) -> Self {
        Self(Some(id))
    }

    pub fn value(self) -> Option<i64> {
        self.0
    }

    pub fn is_nil(self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => f.write_str("null"),
        }
    }
}

impl From<i64> for MsgId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

/// Process-independent message identifier, assigned at creation time.
///
/// Unlike [`MsgId`] this survives persistence-layer key reuse and is safe to
/// hand to external systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgUuid(Uuid);

impl MsgUuid {
    /// The zero-value uuid.
    pub const NIL: MsgUuid = MsgUuid(Uuid::nil());

    /// Generates a new random (v4) message uuid.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MsgUuid {
    fn default() -> Self {
        Self::NIL
    }
}

impl fmt::Display for MsgUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for MsgUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
