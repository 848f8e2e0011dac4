//! Source identifier type.

use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

/// Identifies a registered byte source.
///
/// Equality and hashing use the uuid only; the label is free-form text for
/// humans and logs. Two ids with the same uuid but different labels are
/// the same id.
///
/// # Example
/// ```
/// use pagecache::BufferId;
/// use uuid::Uuid;
///
/// let uuid = Uuid::new_v4();
/// assert_eq!(BufferId::new(uuid, "a.txt"), BufferId::new(uuid, "renamed"));
/// ```
#[derive(Debug, Clone)]
pub struct BufferId {
    id: Uuid,
    label: String,
}

impl BufferId {
    /// Create an id from an existing uuid.
    pub fn new(id: Uuid, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    /// Create an id with a fresh random uuid.
    pub fn random(label: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4(), label)
    }

    /// The identifying uuid.
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The human-readable label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for BufferId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BufferId {}

impl Hash for BufferId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}
