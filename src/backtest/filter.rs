//! Splits the constituent feed into addition and deletion events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{ChangeType, ConstituentChange, ConstituentChangeEvent};

/// Addition and deletion streams, each in feed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventStreams {
    pub deletions: Vec<ConstituentChangeEvent>,
    pub additions: Vec<ConstituentChangeEvent>,
}

impl EventStreams {
    pub fn for_change(&self, change_type: ChangeType) -> &[ConstituentChangeEvent] {
        match change_type {
            ChangeType::Added => &self.additions,
            ChangeType::Removed => &self.deletions,
        }
    }

    pub fn len(&self) -> usize {
        self.deletions.len() + self.additions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Event filter keeping changes effective on or after `start_date`.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    start_date: NaiveDate,
}

impl EventFilter {
    pub fn new(start_date: NaiveDate) -> Self {
        Self { start_date }
    }

    /// Split `changes` into deletion and addition events.
    ///
    /// A replacement row yields one event in each stream. Deletions trade the
    /// removed ticker; additions trade the row's symbol. Rows with neither an
    /// added security nor a removed ticker are dropped.
    pub fn split(&self, changes: &[ConstituentChange]) -> EventStreams {
        let mut streams = EventStreams::default();

        for change in changes.iter().filter(|c| c.date >= self.start_date) {
            if let Some(removed) = &change.removed_ticker {
                streams.deletions.push(ConstituentChangeEvent {
                    effective_date: change.date,
                    symbol: removed.clone(),
                    change_type: ChangeType::Removed,
                    security: change.removed_security.clone(),
                    reason: change.reason.clone(),
                });
            }

            if change.added_security.is_some() && !change.symbol.is_empty() {
                streams.additions.push(ConstituentChangeEvent {
                    effective_date: change.date,
                    symbol: change.symbol.clone(),
                    change_type: ChangeType::Added,
                    security: change.added_security.clone(),
                    reason: change.reason.clone(),
                });
            }
        }

        streams
    }
}
