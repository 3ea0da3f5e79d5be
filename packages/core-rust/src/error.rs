//! Codec and policy-creation errors.

/// Errors raised while encoding or decoding CDR encapsulations.
///
/// Variant names follow the `IOP::Codec` exception set so that callers can
/// map them onto the ORB's own codec contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The octets are not a valid encoding (truncated, bad flag, bad UTF-8...).
    #[error("format mismatch: {reason}")]
    FormatMismatch { reason: String },
    /// The decoded value does not have the requested type.
    #[error("type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },
    /// The value cannot be encoded with this codec.
    #[error("invalid type for encoding: {kind}")]
    InvalidTypeForEncoding { kind: &'static str },
    /// The requested encoding is not supported by the factory.
    #[error("unknown encoding: format {format} version {major}.{minor}")]
    UnknownEncoding { format: i16, major: u8, minor: u8 },
}

impl CodecError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Self::FormatMismatch {
            reason: reason.into(),
        }
    }
}

/// Reason code: the policy type is not the one the factory handles.
pub const BAD_POLICY: i16 = 0;
/// Reason code: the policy value is outside the legal set for its type.
pub const UNSUPPORTED_POLICY: i16 = 1;
/// Reason code: the policy type is unknown to the ORB.
pub const BAD_POLICY_TYPE: i16 = 2;
/// Reason code: the policy value has the wrong representation.
pub const BAD_POLICY_VALUE: i16 = 3;
/// Reason code: the policy value is well formed but not supported.
pub const UNSUPPORTED_POLICY_VALUE: i16 = 4;

/// Failure to create a policy object from a `(type, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("policy error (reason {reason})")]
pub struct PolicyError {
    /// One of [`BAD_POLICY`], [`UNSUPPORTED_POLICY`], [`BAD_POLICY_TYPE`],
    /// [`BAD_POLICY_VALUE`], [`UNSUPPORTED_POLICY_VALUE`].
    pub reason: i16,
}

impl PolicyError {
    /// The requested policy type is not handled by this factory.
    #[must_use]
    pub fn bad_policy() -> Self {
        Self { reason: BAD_POLICY }
    }

    /// The requested value is not a legal value for the policy type.
    #[must_use]
    pub fn unsupported_policy() -> Self {
        Self {
            reason: UNSUPPORTED_POLICY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_error_codes() {
        assert_eq!(PolicyError::bad_policy().reason, 0);
        assert_eq!(PolicyError::unsupported_policy().reason, 1);
    }

    #[test]
    fn codec_error_display() {
        let err = CodecError::format("truncated");
        assert_eq!(err.to_string(), "format mismatch: truncated");
        let err = CodecError::UnknownEncoding {
            format: 1,
            major: 2,
            minor: 0,
        };
        assert_eq!(err.to_string(), "unknown encoding: format 1 version 2.0");
    }
}
