use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error_handling::types::ContractViolation;

/// Coarse activity type advertised to other devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ActivityCategory {
    #[default]
    Generic,
    WatchTogether,
    ListenTogether,
    Workout,
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityCategory::Generic => write!(f, "generic"),
            ActivityCategory::WatchTogether => write!(f, "watch-together"),
            ActivityCategory::ListenTogether => write!(f, "listen-together"),
            ActivityCategory::Workout => write!(f, "workout"),
        }
    }
}

/// Discoverability metadata of an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActivityMetadata {
    pub title: String,
    pub subtitle: String,
    pub category: ActivityCategory,
}

/// A shareable activity type.
///
/// Implementors are plain values; a handler calls [`GroupActivity::descriptor`]
/// once at construction and keeps the result for its whole lifetime.
pub trait GroupActivity: Send + Sync + 'static {
    /// Identifier the platform uses to match sessions to this activity.
    const ACTIVITY_IDENTIFIER: &'static str;

    fn metadata(&self) -> ActivityMetadata;

    /// Builds the immutable descriptor for this activity.
    ///
    /// # Panics
    /// An empty [`GroupActivity::ACTIVITY_IDENTIFIER`] is a
    /// [`ContractViolation::MissingActivityIdentifier`].
    fn descriptor(&self) -> ActivityDescriptor {
        ActivityDescriptor::new(Self::ACTIVITY_IDENTIFIER, self.metadata())
    }
}

/// Identity and metadata of the activity a handler coordinates.
///
/// Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDescriptor {
    identifier: String,
    title: String,
    subtitle: String,
    category: ActivityCategory,
}

impl ActivityDescriptor {
    pub fn new(identifier: &str, metadata: ActivityMetadata) -> Self {
        if identifier.trim().is_empty() {
            ContractViolation::MissingActivityIdentifier.raise();
        }

        Self {
            identifier: identifier.to_string(),
            title: metadata.title,
            subtitle: metadata.subtitle,
            category: metadata.category,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn category(&self) -> ActivityCategory {
        self.category
    }
}

impl fmt::Display for ActivityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.identifier)
    }
}
