//! Policy factories registered with the ORB so applications can create OTS
//! and invocation policies from `(type, any)` pairs.

use ots_core::{
    AnyValue, InvocationPolicy, InvocationPolicyValue, OtsPolicy, OtsPolicyValue, Policy,
    PolicyError, INVOCATION_POLICY_TYPE, OTS_POLICY_TYPE,
};
use tracing::debug;

/// Creates policy objects of one policy type.
pub trait PolicyFactory: Send + Sync {
    /// The policy type this factory handles.
    fn policy_type(&self) -> u32;

    /// # Errors
    ///
    /// [`PolicyError::bad_policy`] if `policy_type` is not handled here,
    /// [`PolicyError::unsupported_policy`] if `value` is not a short holding
    /// a legal value.
    fn create_policy(&self, policy_type: u32, value: &AnyValue) -> Result<Policy, PolicyError>;
}

/// Reads the policy value out of the `any`, rejecting non-shorts and values
/// outside the enumeration.
fn policy_value<T: TryFrom<i16>>(value: &AnyValue) -> Result<T, PolicyError> {
    let raw = value.as_short().ok_or_else(|| {
        debug!(?value, "policy value is not a short");
        PolicyError::unsupported_policy()
    })?;
    T::try_from(raw).map_err(|_| {
        debug!(raw, "policy value out of range");
        PolicyError::unsupported_policy()
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OtsPolicyFactory;

impl PolicyFactory for OtsPolicyFactory {
    fn policy_type(&self) -> u32 {
        OTS_POLICY_TYPE
    }

    fn create_policy(&self, policy_type: u32, value: &AnyValue) -> Result<Policy, PolicyError> {
        if policy_type != OTS_POLICY_TYPE {
            return Err(PolicyError::bad_policy());
        }
        let value: OtsPolicyValue = policy_value(value)?;
        Ok(OtsPolicy::new(value).into())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InvocationPolicyFactory;

impl PolicyFactory for InvocationPolicyFactory {
    fn policy_type(&self) -> u32 {
        INVOCATION_POLICY_TYPE
    }

    fn create_policy(&self, policy_type: u32, value: &AnyValue) -> Result<Policy, PolicyError> {
        if policy_type != INVOCATION_POLICY_TYPE {
            return Err(PolicyError::bad_policy());
        }
        let value: InvocationPolicyValue = policy_value(value)?;
        Ok(InvocationPolicy::new(value).into())
    }
}
