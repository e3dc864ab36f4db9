//! Advisory data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A travel advisory headline as delivered by the upstream feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Advisory {
    /// Stable identifier assigned by the feed
    pub id: String,

    /// Headline text; may be edited upstream after arrival
    pub text: String,

    /// When the item first reached the store
    pub arrival_time: DateTime<Utc>,
}

impl Advisory {
    pub fn new(id: impl Into<String>, text: impl Into<String>, arrival_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            arrival_time,
        }
    }

    /// Format advisory for display using a template.
    ///
    /// Supported placeholders: `{id}`, `{text}`, `{arrival}`
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{id}", &self.id)
            .replace("{text}", &self.text)
            .replace("{arrival}", &self.arrival_time.to_rfc3339())
    }
}
