//! Caller-error category.
//!
//! Business-rule rejections are plain [`crate::rules::Reason`] values so the
//! caller can inspect the code without unwinding. Precondition violations are
//! a different animal: the call itself was malformed and retrying without
//! fixing it cannot succeed. Those surface as `Err(PreconditionError)`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("array length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("empty wallet address")]
    EmptyWallet,

    #[error("empty investor id")]
    EmptyInvestorId,

    #[error("empty country code")]
    EmptyCountryCode,

    #[error("value must be positive")]
    ZeroValue,

    #[error("lock index {index} out of range for investor {investor}")]
    LockIndexOutOfRange { investor: String, index: usize },

    #[error("seize destination must carry the issuer role")]
    SeizeDestinationNotIssuer,

    #[error("back-dated issuance is disallowed by configuration")]
    BackDatedIssuance,

    #[error("unknown partition id {0}")]
    UnknownPartition(u64),

    #[error("partition amounts do not reconcile: requested {requested}, supplied {supplied}")]
    PartitionMismatch { requested: u64, supplied: u64 },

    #[error("partition {partition} has {available} drawable, {needed} needed")]
    PartitionInsufficient {
        partition: u64,
        available: u64,
        needed: u64,
    },
}
