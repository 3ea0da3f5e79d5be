//! System exceptions raised by the transaction interceptors and the
//! exception header carried by exception replies.

use serde::{Deserialize, Serialize};

use crate::cdr::{CdrDecode, CdrEncode, CdrReader, CdrWriter};
use crate::error::CodecError;

/// How far the target got before a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStatus {
    /// The target completed the request.
    Yes,
    /// The target never started processing the request.
    No,
    /// Completion cannot be determined.
    Maybe,
}

impl CompletionStatus {
    /// Maps the wire value; anything outside `0..=2` is `None`.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Yes),
            1 => Some(Self::No),
            2 => Some(Self::Maybe),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Yes => 0,
            Self::No => 1,
            Self::Maybe => 2,
        }
    }
}

/// Standard CORBA system exceptions raised into the ORB dispatch pipeline.
///
/// Every variant carries the minor code and completion status that end up on
/// the wire, so a peer can tell a missing transaction apart from a forbidden
/// one or from an unavailable transaction service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SystemException {
    /// The target requires a transaction and none was propagated.
    #[error("TRANSACTION_REQUIRED (minor {minor}, completed {completed:?})")]
    TransactionRequired { minor: u32, completed: CompletionStatus },
    /// No transaction service is installed but the call needs one.
    #[error("TRANSACTION_UNAVAILABLE (minor {minor}, completed {completed:?})")]
    TransactionUnavailable { minor: u32, completed: CompletionStatus },
    /// A transaction was propagated to a target that forbids one.
    #[error("INVALID_TRANSACTION (minor {minor}, completed {completed:?})")]
    InvalidTransaction { minor: u32, completed: CompletionStatus },
    /// The transaction could not be continued and has been rolled back.
    #[error("TRANSACTION_ROLLEDBACK (minor {minor}, completed {completed:?})")]
    TransactionRolledback { minor: u32, completed: CompletionStatus },
    /// Codec failure: the peers disagree on the encoding.
    #[error("INTERNAL (minor {minor}, completed {completed:?})")]
    Internal { minor: u32, completed: CompletionStatus },
}

impl SystemException {
    #[must_use]
    pub fn transaction_required() -> Self {
        Self::TransactionRequired {
            minor: 0,
            completed: CompletionStatus::No,
        }
    }

    #[must_use]
    pub fn transaction_unavailable() -> Self {
        Self::TransactionUnavailable {
            minor: 0,
            completed: CompletionStatus::No,
        }
    }

    #[must_use]
    pub fn invalid_transaction(completed: CompletionStatus) -> Self {
        Self::InvalidTransaction {
            minor: 0,
            completed,
        }
    }

    #[must_use]
    pub fn transaction_rolledback(completed: CompletionStatus) -> Self {
        Self::TransactionRolledback {
            minor: 0,
            completed,
        }
    }

    #[must_use]
    pub fn internal(completed: CompletionStatus) -> Self {
        Self::Internal {
            minor: 0,
            completed,
        }
    }

    #[must_use]
    pub fn minor(&self) -> u32 {
        match self {
            Self::TransactionRequired { minor, .. }
            | Self::TransactionUnavailable { minor, .. }
            | Self::InvalidTransaction { minor, .. }
            | Self::TransactionRolledback { minor, .. }
            | Self::Internal { minor, .. } => *minor,
        }
    }

    #[must_use]
    pub fn completed(&self) -> CompletionStatus {
        match self {
            Self::TransactionRequired { completed, .. }
            | Self::TransactionUnavailable { completed, .. }
            | Self::InvalidTransaction { completed, .. }
            | Self::TransactionRolledback { completed, .. }
            | Self::Internal { completed, .. } => *completed,
        }
    }

    /// Short upper-case exception name, as used in repository ids.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransactionRequired { .. } => "TRANSACTION_REQUIRED",
            Self::TransactionUnavailable { .. } => "TRANSACTION_UNAVAILABLE",
            Self::InvalidTransaction { .. } => "INVALID_TRANSACTION",
            Self::TransactionRolledback { .. } => "TRANSACTION_ROLLEDBACK",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Repository id, e.g. `IDL:omg.org/CORBA/TRANSACTION_REQUIRED:1.0`.
    #[must_use]
    pub fn repository_id(&self) -> String {
        format!("IDL:omg.org/CORBA/{}:1.0", self.name())
    }

    /// Header this exception produces on the wire.
    #[must_use]
    pub fn header(&self) -> ExceptionHeader {
        ExceptionHeader {
            repository_id: self.repository_id(),
            minor: self.minor(),
            completed: self.completed(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExceptionHeader
// ---------------------------------------------------------------------------

/// Leading fields of a marshalled exception: repository id, minor code and
/// completion status.
///
/// User exceptions that the ORB cannot type reach the interceptors as
/// `UNKNOWN` with minor code 1; every other header is a system exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHeader {
    pub repository_id: String,
    pub minor: u32,
    pub completed: CompletionStatus,
}

impl ExceptionHeader {
    /// Minor code the ORB uses for an `UNKNOWN` that wraps a user exception.
    pub const UNKNOWN_USER_EXCEPTION_MINOR: u32 = 1;

    /// Whether this header stands for a user exception rather than a
    /// system exception.
    #[must_use]
    pub fn is_user_exception(&self) -> bool {
        self.repository_id.contains("UNKNOWN")
            && self.minor == Self::UNKNOWN_USER_EXCEPTION_MINOR
    }
}

impl CdrEncode for ExceptionHeader {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_string(&self.repository_id);
        w.write_ulong(self.minor);
        w.write_ulong(self.completed.as_u32());
    }
}

impl CdrDecode for ExceptionHeader {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        let repository_id = r.read_string()?;
        let minor = r.read_ulong()?;
        let raw = r.read_ulong()?;
        let completed = CompletionStatus::from_u32(raw)
            .ok_or_else(|| CodecError::format(format!("invalid completion status {raw}")))?;
        Ok(Self {
            repository_id,
            minor,
            completed,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdr::{from_encapsulation, to_encapsulation};

    #[test]
    fn completion_status_wire_values() {
        assert_eq!(CompletionStatus::from_u32(0), Some(CompletionStatus::Yes));
        assert_eq!(CompletionStatus::from_u32(1), Some(CompletionStatus::No));
        assert_eq!(CompletionStatus::from_u32(2), Some(CompletionStatus::Maybe));
        assert_eq!(CompletionStatus::from_u32(3), None);
    }

    #[test]
    fn default_constructors_complete_no() {
        assert_eq!(
            SystemException::transaction_required().completed(),
            CompletionStatus::No
        );
        assert_eq!(SystemException::transaction_unavailable().minor(), 0);
    }

    #[test]
    fn raised_conditions_have_corba_names() {
        let names: Vec<_> = [
            SystemException::transaction_required(),
            SystemException::transaction_unavailable(),
            SystemException::invalid_transaction(CompletionStatus::No),
            SystemException::transaction_rolledback(CompletionStatus::No),
            SystemException::internal(CompletionStatus::No),
        ]
        .iter()
        .map(SystemException::name)
        .collect();
        assert_eq!(
            names,
            [
                "TRANSACTION_REQUIRED",
                "TRANSACTION_UNAVAILABLE",
                "INVALID_TRANSACTION",
                "TRANSACTION_ROLLEDBACK",
                "INTERNAL",
            ]
        );
    }

    #[test]
    fn repository_id_format() {
        let e = SystemException::transaction_rolledback(CompletionStatus::Yes);
        assert_eq!(
            e.repository_id(),
            "IDL:omg.org/CORBA/TRANSACTION_ROLLEDBACK:1.0"
        );
        assert_eq!(e.header().completed, CompletionStatus::Yes);
    }

    #[test]
    fn unknown_with_minor_one_is_user_exception() {
        let h = ExceptionHeader {
            repository_id: "IDL:omg.org/CORBA/UNKNOWN:1.0".to_string(),
            minor: 1,
            completed: CompletionStatus::Yes,
        };
        assert!(h.is_user_exception());
    }

    #[test]
    fn unknown_with_other_minor_is_system_exception() {
        let h = ExceptionHeader {
            repository_id: "IDL:omg.org/CORBA/UNKNOWN:1.0".to_string(),
            minor: 2,
            completed: CompletionStatus::Maybe,
        };
        assert!(!h.is_user_exception());
    }

    #[test]
    fn header_decodes_from_encapsulation() {
        let header = SystemException::internal(CompletionStatus::Maybe).header();
        let decoded: ExceptionHeader = from_encapsulation(&to_encapsulation(&header)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_rejects_bad_completion_status() {
        let mut w = CdrWriter::new();
        w.write_string("IDL:omg.org/CORBA/INTERNAL:1.0");
        w.write_ulong(0);
        w.write_ulong(9);
        assert!(from_encapsulation::<ExceptionHeader>(&w.into_bytes()).is_err());
    }
}
