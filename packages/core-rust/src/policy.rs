//! Transaction and invocation policies.
//!
//! Policies are immutable values attached to an object adapter. The OTS
//! policy states whether a target requires, forbids or adapts to a
//! propagated transaction; the invocation policy states whether it accepts
//! shared (implicitly propagated) or unshared transactions.
//!
//! Two different fallbacks apply when no policy was set explicitly:
//!
//! | When | OTS | Invocation |
//! |---|---|---|
//! | invocation time (interceptors) | `Adapts` | `Either` |
//! | reference publication (IOR) | `Forbids` | `Either` |
//!
//! Invocation-time checks use `Adapts` so that forwarded references without
//! an OTS component keep working against legacy peers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cdr::{CdrDecode, CdrEncode, CdrReader, CdrWriter};
use crate::error::CodecError;

/// Policy type of [`InvocationPolicy`].
pub const INVOCATION_POLICY_TYPE: u32 = 55;

/// Policy type of [`OtsPolicy`].
pub const OTS_POLICY_TYPE: u32 = 56;

/// IOR component tag carrying the OTS policy.
pub const TAG_OTS_POLICY: u32 = 31;

/// IOR component tag carrying the invocation policy.
pub const TAG_INV_POLICY: u32 = 32;

// ---------------------------------------------------------------------------
// Policy values
// ---------------------------------------------------------------------------

/// OTS policy value (`CosTransactions::OTSPolicyValue`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtsPolicyValue {
    Requires,
    Forbids,
    Adapts,
}

impl OtsPolicyValue {
    /// Effective value for a target that never set an OTS policy.
    pub const INVOCATION_DEFAULT: Self = Self::Adapts;

    /// Value published in references of adapters without an OTS policy.
    pub const PUBLICATION_DEFAULT: Self = Self::Forbids;

    /// Wire value of the policy.
    #[must_use]
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Requires => 1,
            Self::Forbids => 2,
            Self::Adapts => 3,
        }
    }
}

impl TryFrom<i16> for OtsPolicyValue {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, i16> {
        match value {
            1 => Ok(Self::Requires),
            2 => Ok(Self::Forbids),
            3 => Ok(Self::Adapts),
            other => Err(other),
        }
    }
}

impl fmt::Display for OtsPolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requires => "REQUIRES",
            Self::Forbids => "FORBIDS",
            Self::Adapts => "ADAPTS",
        })
    }
}

/// Invocation policy value (`CosTransactions::InvocationPolicyValue`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvocationPolicyValue {
    Either,
    Shared,
    Unshared,
}

impl InvocationPolicyValue {
    /// Effective value for a target that never set an invocation policy.
    pub const INVOCATION_DEFAULT: Self = Self::Either;

    /// Value published in references of adapters without an invocation policy.
    pub const PUBLICATION_DEFAULT: Self = Self::Either;

    #[must_use]
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Either => 0,
            Self::Shared => 1,
            Self::Unshared => 2,
        }
    }
}

impl TryFrom<i16> for InvocationPolicyValue {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, i16> {
        match value {
            0 => Ok(Self::Either),
            1 => Ok(Self::Shared),
            2 => Ok(Self::Unshared),
            other => Err(other),
        }
    }
}

impl fmt::Display for InvocationPolicyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Either => "EITHER",
            Self::Shared => "SHARED",
            Self::Unshared => "UNSHARED",
        })
    }
}

impl CdrEncode for OtsPolicyValue {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_short(self.as_i16());
    }
}

impl CdrDecode for OtsPolicyValue {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        let raw = r.read_short()?;
        Self::try_from(raw).map_err(|v| CodecError::format(format!("invalid OTS policy value {v}")))
    }
}

impl CdrEncode for InvocationPolicyValue {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_short(self.as_i16());
    }
}

impl CdrDecode for InvocationPolicyValue {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        let raw = r.read_short()?;
        Self::try_from(raw)
            .map_err(|v| CodecError::format(format!("invalid invocation policy value {v}")))
    }
}

// ---------------------------------------------------------------------------
// Policy objects
// ---------------------------------------------------------------------------

/// OTS policy object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OtsPolicy {
    value: OtsPolicyValue,
}

impl OtsPolicy {
    #[must_use]
    pub fn new(value: OtsPolicyValue) -> Self {
        Self { value }
    }

    #[must_use]
    pub fn value(&self) -> OtsPolicyValue {
        self.value
    }

    #[must_use]
    pub fn policy_type(&self) -> u32 {
        OTS_POLICY_TYPE
    }

    #[must_use]
    pub fn copy(&self) -> Self {
        Self::new(self.value)
    }

    /// Returns the policy to its initial `Forbids` value.
    pub fn destroy(&mut self) {
        self.value = OtsPolicyValue::Forbids;
    }
}

impl Default for OtsPolicy {
    fn default() -> Self {
        Self::new(OtsPolicyValue::Forbids)
    }
}

/// Invocation policy object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationPolicy {
    value: InvocationPolicyValue,
}

impl InvocationPolicy {
    #[must_use]
    pub fn new(value: InvocationPolicyValue) -> Self {
        Self { value }
    }

    #[must_use]
    pub fn value(&self) -> InvocationPolicyValue {
        self.value
    }

    #[must_use]
    pub fn policy_type(&self) -> u32 {
        INVOCATION_POLICY_TYPE
    }

    #[must_use]
    pub fn copy(&self) -> Self {
        Self::new(self.value)
    }

    /// Returns the policy to its initial `Either` value.
    pub fn destroy(&mut self) {
        self.value = InvocationPolicyValue::Either;
    }
}

impl Default for InvocationPolicy {
    fn default() -> Self {
        Self::new(InvocationPolicyValue::Either)
    }
}

/// Any policy this subsystem understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    Ots(OtsPolicy),
    Invocation(InvocationPolicy),
}

impl Policy {
    #[must_use]
    pub fn policy_type(&self) -> u32 {
        match self {
            Self::Ots(p) => p.policy_type(),
            Self::Invocation(p) => p.policy_type(),
        }
    }

    #[must_use]
    pub fn copy(&self) -> Self {
        match self {
            Self::Ots(p) => Self::Ots(p.copy()),
            Self::Invocation(p) => Self::Invocation(p.copy()),
        }
    }

    pub fn destroy(&mut self) {
        match self {
            Self::Ots(p) => p.destroy(),
            Self::Invocation(p) => p.destroy(),
        }
    }

    /// The OTS value, if this is an OTS policy.
    #[must_use]
    pub fn as_ots(&self) -> Option<OtsPolicyValue> {
        match self {
            Self::Ots(p) => Some(p.value()),
            Self::Invocation(_) => None,
        }
    }

    /// The invocation value, if this is an invocation policy.
    #[must_use]
    pub fn as_invocation(&self) -> Option<InvocationPolicyValue> {
        match self {
            Self::Invocation(p) => Some(p.value()),
            Self::Ots(_) => None,
        }
    }
}

impl From<OtsPolicy> for Policy {
    fn from(p: OtsPolicy) -> Self {
        Self::Ots(p)
    }
}

impl From<InvocationPolicy> for Policy {
    fn from(p: InvocationPolicy) -> Self {
        Self::Invocation(p)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
