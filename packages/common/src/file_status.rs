use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scan lifecycle of a stored file.
///
/// The server only ever writes `Queued`; scan workers report the rest.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum FileStatus {
    /// Waiting for a scan worker. Also the state a rescan starts from.
    #[default]
    Queued,
    /// A worker picked the file up.
    Processing,
    /// Analysis is available.
    Finished,
}

impl FileStatus {
    /// All possible status values.
    pub const ALL: &'static [FileStatus] = &[Self::Queued, Self::Processing, Self::Finished];

    /// Returns true once analysis results are available.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Whether a record in `self` may move to `next`.
    ///
    /// Status advances one step at a time, or resets to `Queued` for a new
    /// scan cycle. A rescan of a finished file goes straight back to
    /// `Processing` when a worker picks it up. Same-state reports are not
    /// transitions.
    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing)
                | (Self::Processing, Self::Finished)
                | (Self::Processing, Self::Queued)
                | (Self::Finished, Self::Processing)
                | (Self::Finished, Self::Queued)
        )
    }

    /// Returns the string representation (PascalCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Processing => "Processing",
            Self::Finished => "Finished",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            FileStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for FileStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(Self::Queued),
            "Processing" => Ok(Self::Processing),
            "Finished" => Ok(Self::Finished),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}
