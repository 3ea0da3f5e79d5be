//! ORB initializer: registers the transaction interceptors and policy
//! factories while the ORB boots.

use std::sync::Arc;

use ots_core::{CodecError, CodecFactory, Encoding};
use tracing::info;

use crate::config::InterceptorConfig;
use crate::interceptor::TransactionInterceptor;
use crate::ior::TransactionIorInterceptor;
use crate::policy_factory::{InvocationPolicyFactory, OtsPolicyFactory, PolicyFactory};
use crate::traits::{
    ClientRequestInterceptor, IorInterceptor, ServerRequestInterceptor, TargetInspector,
};

/// Errors raised while wiring the interceptors into the ORB.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("codec unavailable: {0}")]
    Codec(#[from] CodecError),

    #[error("an interceptor named {0} is already registered")]
    DuplicateName(String),
}

/// Registration surface the ORB exposes during initialization.
pub trait OrbInitInfo {
    fn codec_factory(&self) -> &dyn CodecFactory;

    /// # Errors
    ///
    /// [`InitError::DuplicateName`] if an interceptor with the same name
    /// is already registered.
    fn add_client_request_interceptor(
        &mut self,
        interceptor: Arc<dyn ClientRequestInterceptor>,
    ) -> Result<(), InitError>;

    /// # Errors
    ///
    /// [`InitError::DuplicateName`] if an interceptor with the same name
    /// is already registered.
    fn add_server_request_interceptor(
        &mut self,
        interceptor: Arc<dyn ServerRequestInterceptor>,
    ) -> Result<(), InitError>;

    /// # Errors
    ///
    /// [`InitError::DuplicateName`] if an interceptor with the same name
    /// is already registered.
    fn add_ior_interceptor(&mut self, interceptor: Arc<dyn IorInterceptor>)
        -> Result<(), InitError>;

    fn register_policy_factory(&mut self, policy_type: u32, factory: Arc<dyn PolicyFactory>);
}

/// Builds and registers the transaction interceptors.
pub struct TransactionOrbInitializer {
    config: InterceptorConfig,
    target_inspector: Arc<dyn TargetInspector>,
}

impl TransactionOrbInitializer {
    #[must_use]
    pub fn new(config: InterceptorConfig, target_inspector: Arc<dyn TargetInspector>) -> Self {
        Self {
            config,
            target_inspector,
        }
    }

    /// Registers the OTS and invocation policy factories.
    pub fn pre_init(&self, info: &mut dyn OrbInitInfo) {
        let factories: [Arc<dyn PolicyFactory>; 2] =
            [Arc::new(OtsPolicyFactory), Arc::new(InvocationPolicyFactory)];
        for factory in factories {
            info.register_policy_factory(factory.policy_type(), factory);
        }
    }

    /// Creates the interceptors and registers them.
    ///
    /// The returned interceptor is the instance registered on both the
    /// client and the server side; install the transaction manager through
    /// [`TransactionInterceptor::set_transaction_service`] once it exists.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::Codec`] if the ORB cannot supply a CDR 1.2
    /// codec, or [`InitError::DuplicateName`] if registration collides.
    pub fn post_init(
        &self,
        info: &mut dyn OrbInitInfo,
    ) -> Result<Arc<TransactionInterceptor>, InitError> {
        let codec = info
            .codec_factory()
            .create_codec(Encoding::CDR_ENCAPS_1_2)?;

        let interceptor = Arc::new(TransactionInterceptor::new(
            Arc::clone(&codec),
            self.config,
            Arc::clone(&self.target_inspector),
        ));
        info.add_client_request_interceptor(interceptor.clone())?;
        info.add_server_request_interceptor(interceptor.clone())?;
        info.add_ior_interceptor(Arc::new(TransactionIorInterceptor::new(codec)))?;

        info!(
            check_policy = self.config.check_policy,
            interop_mode = self.config.interop_mode,
            "transaction interceptors registered"
        );
        Ok(interceptor)
    }
}

impl std::fmt::Debug for TransactionOrbInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionOrbInitializer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
