//! Task identifier type using TypeID format.
//!
//! A `TaskId` names one scheduled tool invocation in the task store.
//! Format: `task_01h455vb4pex5vsknk084sn02q`. Ids are UUIDv7-based, so their
//! string form sorts by creation time; the libSQL store orders listings by it.

use mti::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Identifier of a persisted task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(MagicTypeId);

/// Error returned when a string is not a task identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTaskId {
    /// Not a TypeID at all
    Parse(String),
    /// A TypeID for some other entity
    WrongPrefix {
        /// The expected prefix
        expected: &'static str,
        /// The prefix that was found
        actual: String,
    },
}

impl fmt::Display for InvalidTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "invalid task ID: {e}"),
            Self::WrongPrefix { expected, actual } => {
                write!(f, "expected task ID prefix '{expected}', got '{actual}'")
            }
        }
    }
}

impl std::error::Error for InvalidTaskId {}

impl TaskId {
    /// TypeID prefix shared by every task identifier.
    pub const PREFIX: &'static str = "task";

    /// Mints a fresh, time-sortable task ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    /// Parses a task ID, rejecting TypeIDs minted for other entities.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTaskId::Parse` for malformed input and
    /// `InvalidTaskId::WrongPrefix` for a TypeID whose prefix is not `task`.
    pub fn parse(s: &str) -> Result<Self, InvalidTaskId> {
        let id = MagicTypeId::from_str(s).map_err(|e| InvalidTaskId::Parse(e.to_string()))?;

        let prefix = id.prefix().as_str();
        if prefix != Self::PREFIX {
            return Err(InvalidTaskId::WrongPrefix {
                expected: Self::PREFIX,
                actual: prefix.to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Parses every id in `ids`, preserving order.
    ///
    /// # Errors
    ///
    /// Returns the first parse failure, paired with the offending input.
    pub fn parse_all<S: AsRef<str>>(ids: &[S]) -> Result<Vec<Self>, (String, InvalidTaskId)> {
        ids.iter()
            .map(|raw| Self::parse(raw.as_ref()).map_err(|e| (raw.as_ref().to_string(), e)))
            .collect()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.to_string().cmp(&other.0.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = InvalidTaskId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TaskId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_carry_the_task_prefix() {
        assert!(TaskId::new().to_string().starts_with("task_"));
    }

    #[test]
    fn parse_accepts_own_output() {
        let id = TaskId::new();
        assert_eq!(TaskId::parse(&id.to_string()), Ok(id));
    }

    #[test]
    fn parse_rejects_other_prefixes() {
        let result = TaskId::parse("agent_01h455vb4pex5vsknk084sn02q");
        assert!(matches!(
            result,
            Err(InvalidTaskId::WrongPrefix {
                expected: "task",
                ..
            })
        ));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            TaskId::parse("not-a-valid-typeid"),
            Err(InvalidTaskId::Parse(_))
        ));
    }

    #[test]
    fn parse_all_reports_offending_input() {
        let good = TaskId::new().to_string();
        let err = TaskId::parse_all(&[good.as_str(), "nope"]).unwrap_err();
        assert_eq!(err.0, "nope");
    }

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let first = TaskId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = TaskId::new();
        assert!(first < second);
    }

    #[test]
    fn deserialization_validates_prefix() {
        let result: Result<TaskId, _> =
            serde_json::from_str("\"agent_01h455vb4pex5vsknk084sn02q\"");
        assert!(result.is_err());
    }
}
