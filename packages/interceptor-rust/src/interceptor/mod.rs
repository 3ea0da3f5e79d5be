//! Transaction request/reply interceptor.
//!
//! One [`TransactionInterceptor`] serves both sides of every invocation:
//!
//! - **client** (`client`): checks the target's OTS policy, attaches the
//!   propagation context to outgoing requests and hands reply contexts back
//!   to the transaction manager;
//! - **server** (`server`): checks the adapter's OTS policy, imports inbound
//!   contexts, tracks per-request state on the thread-local frame stack and
//!   attaches the reply context.
//!
//! The transaction manager can be installed after the interceptor has been
//! registered with the ORB; until then every point behaves as if the
//! transaction service were unavailable.

mod client;
mod server;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use ots_core::{Codec, CodecError, CompletionStatus, PropagationContext, SystemException};
use tracing::error;

use crate::config::InterceptorConfig;
use crate::traits::{
    ClientRequestInfo, ClientRequestInterceptor, Interceptor, ServerRequestInfo,
    ServerRequestInterceptor, TargetInspector, TransactionService,
};

/// Interceptor name registered with the ORB.
pub const INTERCEPTOR_NAME: &str = "ots.TransactionInterceptor";

/// Client and server request interceptor for transaction propagation.
pub struct TransactionInterceptor {
    codec: Arc<dyn Codec>,
    config: InterceptorConfig,
    target_inspector: Arc<dyn TargetInspector>,
    tx_service: ArcSwapOption<TransactionService>,
}

impl TransactionInterceptor {
    /// Creates an interceptor with no transaction service installed.
    #[must_use]
    pub fn new(
        codec: Arc<dyn Codec>,
        config: InterceptorConfig,
        target_inspector: Arc<dyn TargetInspector>,
    ) -> Self {
        Self {
            codec,
            config,
            target_inspector,
            tx_service: ArcSwapOption::empty(),
        }
    }

    /// Installs the transaction manager hooks.
    pub fn set_transaction_service(&self, service: TransactionService) {
        self.tx_service.store(Some(Arc::new(service)));
    }

    /// Currently installed transaction manager hooks, if any.
    #[must_use]
    pub fn transaction_service(&self) -> Option<Arc<TransactionService>> {
        self.tx_service.load_full()
    }

    #[must_use]
    pub fn config(&self) -> InterceptorConfig {
        self.config
    }

    fn encode_context(
        &self,
        ctx: &PropagationContext,
        completed: CompletionStatus,
    ) -> Result<Vec<u8>, SystemException> {
        self.codec
            .encode_context(ctx)
            .map_err(|e| codec_failure(&e, completed))
    }

    fn decode_context(
        &self,
        data: &[u8],
        completed: CompletionStatus,
    ) -> Result<PropagationContext, SystemException> {
        self.codec
            .decode_context(data)
            .map_err(|e| codec_failure(&e, completed))
    }
}

impl std::fmt::Debug for TransactionInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionInterceptor")
            .field("config", &self.config)
            .field("encoding", &self.codec.encoding())
            .field("tx_service_installed", &self.tx_service.load().is_some())
            .finish_non_exhaustive()
    }
}

/// Codec failures mean the peers disagree on the encoding; they are never
/// recoverable here.
fn codec_failure(err: &CodecError, completed: CompletionStatus) -> SystemException {
    error!(error = %err, "transaction context codec failure");
    SystemException::internal(completed)
}

fn thread_name() -> String {
    let current = std::thread::current();
    current
        .name()
        .map_or_else(|| format!("{:?}", current.id()), str::to_owned)
}

// ---------------------------------------------------------------------------
// Interceptor trait impls
// ---------------------------------------------------------------------------

impl Interceptor for TransactionInterceptor {
    fn name(&self) -> &'static str {
        INTERCEPTOR_NAME
    }
}

impl ClientRequestInterceptor for TransactionInterceptor {
    fn send_request(&self, ri: &mut dyn ClientRequestInfo) -> Result<(), SystemException> {
        self.client_send_request(ri)
    }

    fn receive_reply(&self, ri: &dyn ClientRequestInfo) -> Result<(), SystemException> {
        self.client_receive(ri, client::ReceivePoint::Reply)
    }

    fn receive_exception(&self, ri: &dyn ClientRequestInfo) -> Result<(), SystemException> {
        self.client_receive(ri, client::ReceivePoint::Exception)
    }

    fn receive_other(&self, ri: &dyn ClientRequestInfo) -> Result<(), SystemException> {
        self.client_receive(ri, client::ReceivePoint::Other)
    }
}

impl ServerRequestInterceptor for TransactionInterceptor {
    fn receive_request_service_contexts(
        &self,
        ri: &dyn ServerRequestInfo,
    ) -> Result<(), SystemException> {
        self.server_receive(ri)
    }

    fn send_reply(&self, ri: &mut dyn ServerRequestInfo) -> Result<(), SystemException> {
        self.server_send(ri, server::SendPoint::Reply)
    }

    fn send_exception(&self, ri: &mut dyn ServerRequestInfo) -> Result<(), SystemException> {
        self.server_send(ri, server::SendPoint::Exception)
    }

    fn send_other(&self, ri: &mut dyn ServerRequestInfo) -> Result<(), SystemException> {
        self.server_send(ri, server::SendPoint::Other)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{codec, FixedInspector, TestManager};

    #[test]
    fn name_and_config() {
        let interceptor = TransactionInterceptor::new(
            codec(),
            InterceptorConfig::default(),
            Arc::new(FixedInspector(false)),
        );
        assert_eq!(interceptor.name(), "ots.TransactionInterceptor");
        assert_eq!(interceptor.config(), InterceptorConfig::default());
    }

    #[test]
    fn transaction_service_installed_late() {
        let interceptor = TransactionInterceptor::new(
            codec(),
            InterceptorConfig::default(),
            Arc::new(FixedInspector(false)),
        );
        assert!(interceptor.transaction_service().is_none());
        interceptor.set_transaction_service(TestManager::new(true).service());
        assert!(interceptor.transaction_service().is_some());
        assert!(format!("{interceptor:?}").contains("tx_service_installed: true"));
    }
}
