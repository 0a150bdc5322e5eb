use thiserror::Error;

/// Input rejected on the client before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("volume {0} is outside 0..=100")]
    VolumeOutOfRange(i64),
    #[error("Please enter a group name")]
    EmptyGroupName,
    #[error("Please select at least one speaker for the group")]
    EmptyGroupMembers,
}
