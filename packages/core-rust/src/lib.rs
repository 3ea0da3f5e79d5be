//! OTS Core — CDR encapsulation, codecs, propagation contexts and
//! transaction policies shared by the transaction interceptors.

pub mod cdr;
pub mod codec;
pub mod context;
pub mod error;
pub mod exception;
pub mod policy;
pub mod service_context;

pub use codec::{CdrCodecFactory, Codec, CodecFactory, Encoding, TypeCode, Value};
pub use context::{AnyValue, ObjectRef, Otid, PropagationContext, TaggedProfile, TransIdentity};
pub use error::{CodecError, PolicyError};
pub use exception::{CompletionStatus, ExceptionHeader, SystemException};
pub use policy::{
    InvocationPolicy, InvocationPolicyValue, OtsPolicy, OtsPolicyValue, Policy,
    INVOCATION_POLICY_TYPE, OTS_POLICY_TYPE, TAG_INV_POLICY, TAG_OTS_POLICY,
};
pub use service_context::{ServiceContext, TaggedComponent, TRANSACTION_SERVICE_ID};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
