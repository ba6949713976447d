use crate::policy::Operation;
use crate::types::{Address, ChangeId, EntryState};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("journal error at line {line}: {message}")]
    Journal { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("journal could not be rolled back after a failed write: {0}")]
    Rollback(std::io::Error),

    #[error("registry is out of step with its sinks after a failed rollback; reopen it")]
    Poisoned,
}

#[derive(Debug, thiserror::Error)]
pub enum AddressParseError {
    #[error("address must start with 0x")]
    MissingPrefix,

    #[error("address must be 20 bytes of hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Why a change id was refused by an approve/reject batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidChangeReason {
    OutOfRange { len: u64 },
    AlreadyFinal(EntryState),
}

impl std::fmt::Display for InvalidChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { len } => write!(f, "out of range (log has {len} changes)"),
            Self::AlreadyFinal(state) => write!(f, "already {state}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{caller} is not allowed to {operation}")]
    Unauthorized { caller: Address, operation: Operation },

    #[error("length mismatch: {identifiers} identifiers but {labels} labels")]
    LengthMismatch { identifiers: usize, labels: usize },

    #[error("invalid change id {change_id}: {reason}")]
    InvalidChangeId {
        change_id: ChangeId,
        reason: InvalidChangeReason,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}
