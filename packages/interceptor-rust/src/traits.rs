//! Contracts between the interceptors, the ORB and the transaction manager.
//!
//! The ORB supplies the request-info objects, the IOR info and the
//! co-location check. The transaction manager supplies the sender/receiver
//! hooks and the "is a transaction associated with this thread" query.

use std::sync::Arc;

use ots_core::{
    CompletionStatus, ObjectRef, Policy, PropagationContext, ServiceContext, SystemException,
    TaggedComponent,
};

// ---------------------------------------------------------------------------
// Request info (ORB side)
// ---------------------------------------------------------------------------

/// Client-side view of an in-flight request.
pub trait ClientRequestInfo {
    fn request_id(&self) -> u32;

    fn operation(&self) -> &str;

    /// The target reference's tagged component with `tag`, if present.
    fn effective_component(&self, tag: u32) -> Option<TaggedComponent>;

    /// The reference the request is actually sent to (after forwarding).
    fn effective_target(&self) -> &ObjectRef;

    fn add_request_service_context(&mut self, svc: ServiceContext, replace: bool);

    fn reply_service_context(&self, context_id: u32) -> Option<ServiceContext>;

    /// CDR encapsulation of the received exception, for exception replies.
    fn received_exception(&self) -> Option<Vec<u8>>;

    /// Repository id of the received exception, for exception replies.
    fn received_exception_id(&self) -> Option<String>;
}

/// Server-side view of an in-flight request.
pub trait ServerRequestInfo {
    fn request_id(&self) -> u32;

    fn operation(&self) -> &str;

    /// The target adapter's policy of the given type, if one was set.
    fn server_policy(&self, policy_type: u32) -> Option<Policy>;

    fn request_service_context(&self, context_id: u32) -> Option<ServiceContext>;

    fn add_reply_service_context(&mut self, svc: ServiceContext, replace: bool);

    /// CDR encapsulation of the exception being sent, for exception replies.
    fn sending_exception(&self) -> Option<Vec<u8>>;
}

/// Object-adapter view used while its references are being built.
pub trait IorInfo {
    /// The adapter's effective policy of the given type, if one was set.
    fn effective_policy(&self, policy_type: u32) -> Option<Policy>;

    fn add_ior_component(&mut self, component: TaggedComponent);
}

/// Decides whether a target lives in this process and ORB.
pub trait TargetInspector: Send + Sync {
    fn is_local(&self, target: &ObjectRef) -> bool;
}

// ---------------------------------------------------------------------------
// Transaction manager hooks
// ---------------------------------------------------------------------------

/// Raised by [`Sender::received_reply`] when the reply's transaction does not
/// match the one the request was sent under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("wrong transaction")]
pub struct WrongTransaction;

/// Exception information handed to [`Sender::received_reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyEnvironment {
    /// Normal reply, user exception, or location forward.
    NoException,
    /// The target raised a system exception.
    SystemException { completed: CompletionStatus },
}

/// Client-side transaction manager hook.
pub trait Sender: Send + Sync {
    /// Exports the calling thread's transaction for a request.
    fn sending_request(&self, request_id: u32) -> Option<PropagationContext>;

    /// Imports the context returned with a reply.
    ///
    /// # Errors
    ///
    /// Returns [`WrongTransaction`] if the reply belongs to another
    /// transaction.
    fn received_reply(
        &self,
        request_id: u32,
        ctx: &PropagationContext,
        env: ReplyEnvironment,
    ) -> Result<(), WrongTransaction>;
}

/// Server-side transaction manager hook.
pub trait Receiver: Send + Sync {
    /// Associates the imported transaction with the current thread.
    ///
    /// # Errors
    ///
    /// Returns the system exception to raise if the context cannot be
    /// imported.
    fn received_request(
        &self,
        request_id: u32,
        ctx: &PropagationContext,
    ) -> Result<(), SystemException>;

    /// Exports the (possibly completed) transaction for the reply.
    fn sending_reply(&self, request_id: u32) -> Option<PropagationContext>;
}

/// Answers whether the calling thread has a transaction.
pub trait TransactionCurrent: Send + Sync {
    fn is_tx_associated(&self) -> bool;
}

/// Hooks of an installed transaction manager.
///
/// An interceptor without one behaves as if the transaction service were
/// unavailable.
#[derive(Clone)]
pub struct TransactionService {
    pub sender: Arc<dyn Sender>,
    pub receiver: Arc<dyn Receiver>,
    pub current: Arc<dyn TransactionCurrent>,
}

impl std::fmt::Debug for TransactionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionService").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Interceptors
// ---------------------------------------------------------------------------

/// Common interceptor identity.
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn destroy(&self) {}
}

/// Client-side request interception points.
pub trait ClientRequestInterceptor: Interceptor {
    /// # Errors
    ///
    /// Returns the system exception that aborts the request.
    fn send_request(&self, ri: &mut dyn ClientRequestInfo) -> Result<(), SystemException>;

    fn send_poll(&self, _ri: &dyn ClientRequestInfo) {}

    /// # Errors
    ///
    /// Returns the system exception that replaces the reply.
    fn receive_reply(&self, ri: &dyn ClientRequestInfo) -> Result<(), SystemException>;

    /// # Errors
    ///
    /// Returns the system exception that replaces the received one.
    fn receive_exception(&self, ri: &dyn ClientRequestInfo) -> Result<(), SystemException>;

    /// # Errors
    ///
    /// Returns the system exception that replaces the reply.
    fn receive_other(&self, ri: &dyn ClientRequestInfo) -> Result<(), SystemException>;
}

/// Server-side request interception points.
pub trait ServerRequestInterceptor: Interceptor {
    /// # Errors
    ///
    /// Returns the system exception that rejects the request.
    fn receive_request_service_contexts(
        &self,
        ri: &dyn ServerRequestInfo,
    ) -> Result<(), SystemException>;

    /// # Errors
    ///
    /// Returns the system exception that rejects the request.
    fn receive_request(&self, _ri: &dyn ServerRequestInfo) -> Result<(), SystemException> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the system exception that replaces the reply.
    fn send_reply(&self, ri: &mut dyn ServerRequestInfo) -> Result<(), SystemException>;

    /// # Errors
    ///
    /// Returns the system exception that replaces the outgoing one.
    fn send_exception(&self, ri: &mut dyn ServerRequestInfo) -> Result<(), SystemException>;

    /// # Errors
    ///
    /// Returns the system exception that replaces the reply.
    fn send_other(&self, ri: &mut dyn ServerRequestInfo) -> Result<(), SystemException>;
}

/// Object-reference construction point.
pub trait IorInterceptor: Interceptor {
    /// # Errors
    ///
    /// Returns a system exception if the components cannot be encoded.
    fn establish_components(&self, info: &mut dyn IorInfo) -> Result<(), SystemException>;
}
