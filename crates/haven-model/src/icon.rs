use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The icon shown for a group or entry.
///
/// Builtin icons are numbered; custom icons live in the database
/// [`Metadata`](crate::Metadata) and are referenced by UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Icon {
    Number(u32),
    Custom(Uuid),
}

impl Default for Icon {
    fn default() -> Self {
        Self::Number(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_first_builtin() {
        assert_eq!(Icon::default(), Icon::Number(0));
    }

    #[test]
    fn serde_roundtrip() {
        let icon = Icon::Custom(Uuid::new_v4());
        let json = serde_json::to_string(&icon).unwrap();
        let parsed: Icon = serde_json::from_str(&json).unwrap();
        assert_eq!(icon, parsed);
    }
}
