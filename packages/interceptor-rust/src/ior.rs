//! Publishes the adapter's transaction policies in every object reference it
//! creates, so clients can enforce them before sending a request.

use std::sync::Arc;

use ots_core::{
    Codec, CompletionStatus, InvocationPolicyValue, OtsPolicyValue, SystemException,
    TaggedComponent, INVOCATION_POLICY_TYPE, OTS_POLICY_TYPE, TAG_INV_POLICY, TAG_OTS_POLICY,
};
use tracing::{debug, error};

use crate::traits::{Interceptor, IorInfo, IorInterceptor};

/// IOR interceptor name registered with the ORB.
pub const IOR_INTERCEPTOR_NAME: &str = "ots.TransactionIORInterceptor";

pub struct TransactionIorInterceptor {
    codec: Arc<dyn Codec>,
}

impl TransactionIorInterceptor {
    #[must_use]
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    fn component(&self, tag: u32, value: i16) -> Result<TaggedComponent, SystemException> {
        let component_data = self.codec.encode_short(value).map_err(|e| {
            error!(error = %e, tag, "failed to encode policy component");
            SystemException::internal(CompletionStatus::No)
        })?;
        Ok(TaggedComponent { tag, component_data })
    }
}

impl std::fmt::Debug for TransactionIorInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionIorInterceptor")
            .field("encoding", &self.codec.encoding())
            .finish()
    }
}

impl Interceptor for TransactionIorInterceptor {
    fn name(&self) -> &'static str {
        IOR_INTERCEPTOR_NAME
    }
}

impl IorInterceptor for TransactionIorInterceptor {
    fn establish_components(&self, info: &mut dyn IorInfo) -> Result<(), SystemException> {
        // Adapters without explicit policies publish the conservative defaults.
        let ots = info
            .effective_policy(OTS_POLICY_TYPE)
            .and_then(|p| p.as_ots())
            .unwrap_or(OtsPolicyValue::PUBLICATION_DEFAULT);
        let invocation = info
            .effective_policy(INVOCATION_POLICY_TYPE)
            .and_then(|p| p.as_invocation())
            .unwrap_or(InvocationPolicyValue::PUBLICATION_DEFAULT);

        debug!(ots = %ots, invocation = %invocation, "establishing policy components");

        let ots_component = self.component(TAG_OTS_POLICY, ots.as_i16())?;
        let inv_component = self.component(TAG_INV_POLICY, invocation.as_i16())?;
        info.add_ior_component(ots_component);
        info.add_ior_component(inv_component);
        Ok(())
    }
}
