//! In-crate fakes for the ORB request-info objects and the transaction
//! manager hooks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ots_core::cdr::to_encapsulation;
use ots_core::{
    CdrCodecFactory, Codec, CodecFactory, Encoding, ExceptionHeader, ObjectRef, OtsPolicyValue,
    Policy, PropagationContext, ServiceContext, SystemException, TaggedComponent,
    TAG_OTS_POLICY, TRANSACTION_SERVICE_ID,
};
use parking_lot::Mutex;

use crate::traits::{
    ClientRequestInfo, IorInfo, ReplyEnvironment, Receiver, Sender, ServerRequestInfo,
    TargetInspector, TransactionCurrent, TransactionService, WrongTransaction,
};

pub(crate) fn codec() -> Arc<dyn Codec> {
    CdrCodecFactory
        .create_codec(Encoding::CDR_ENCAPS_1_2)
        .expect("CDR 1.2 codec")
}

pub(crate) fn ots_component(value: OtsPolicyValue) -> TaggedComponent {
    TaggedComponent {
        tag: TAG_OTS_POLICY,
        component_data: to_encapsulation(&value),
    }
}

fn encoded(ctx: &PropagationContext) -> ServiceContext {
    ServiceContext::transaction(codec().encode_context(ctx).expect("encode"))
}

fn find(contexts: &[ServiceContext], id: u32) -> Option<ServiceContext> {
    contexts.iter().find(|svc| svc.context_id == id).cloned()
}

fn put(contexts: &mut Vec<ServiceContext>, svc: ServiceContext, replace: bool) {
    if let Some(existing) = contexts.iter_mut().find(|s| s.context_id == svc.context_id) {
        assert!(replace, "duplicate service context {}", svc.context_id);
        *existing = svc;
    } else {
        contexts.push(svc);
    }
}

// ---------------------------------------------------------------------------
// ORB side
// ---------------------------------------------------------------------------

/// Co-location check with a fixed answer.
pub(crate) struct FixedInspector(pub bool);

impl TargetInspector for FixedInspector {
    fn is_local(&self, _target: &ObjectRef) -> bool {
        self.0
    }
}

pub(crate) struct FakeClientRequest {
    pub request_id: u32,
    pub target: ObjectRef,
    pub components: Vec<TaggedComponent>,
    pub request_contexts: Vec<ServiceContext>,
    pub reply_contexts: Vec<ServiceContext>,
    pub exception: Option<Vec<u8>>,
    pub exception_id: Option<String>,
}

impl FakeClientRequest {
    pub fn new(request_id: u32) -> Self {
        Self {
            request_id,
            target: ObjectRef::new("IDL:example/Account:1.0", Vec::new()),
            components: Vec::new(),
            request_contexts: Vec::new(),
            reply_contexts: Vec::new(),
            exception: None,
            exception_id: None,
        }
    }

    pub fn with_component(mut self, component: TaggedComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_reply_context(mut self, ctx: &PropagationContext) -> Self {
        self.reply_contexts.push(encoded(ctx));
        self
    }

    pub fn with_exception(mut self, header: &ExceptionHeader) -> Self {
        self.exception = Some(to_encapsulation(header));
        self.exception_id = Some(header.repository_id.clone());
        self
    }

    /// Overrides the repository id the ORB reports for the exception.
    pub fn with_exception_id(mut self, id: &str) -> Self {
        self.exception_id = Some(id.to_owned());
        self
    }
}

impl ClientRequestInfo for FakeClientRequest {
    fn request_id(&self) -> u32 {
        self.request_id
    }

    fn operation(&self) -> &str {
        "transfer"
    }

    fn effective_component(&self, tag: u32) -> Option<TaggedComponent> {
        self.components.iter().find(|c| c.tag == tag).cloned()
    }

    fn effective_target(&self) -> &ObjectRef {
        &self.target
    }

    fn add_request_service_context(&mut self, svc: ServiceContext, replace: bool) {
        put(&mut self.request_contexts, svc, replace);
    }

    fn reply_service_context(&self, context_id: u32) -> Option<ServiceContext> {
        find(&self.reply_contexts, context_id)
    }

    fn received_exception(&self) -> Option<Vec<u8>> {
        self.exception.clone()
    }

    fn received_exception_id(&self) -> Option<String> {
        self.exception_id.clone()
    }
}

pub(crate) struct FakeServerRequest {
    pub request_id: u32,
    pub policies: Vec<Policy>,
    pub request_contexts: Vec<ServiceContext>,
    pub reply_contexts: Vec<ServiceContext>,
    pub exception: Option<Vec<u8>>,
}

impl FakeServerRequest {
    pub fn new(request_id: u32) -> Self {
        Self {
            request_id,
            policies: Vec::new(),
            request_contexts: Vec::new(),
            reply_contexts: Vec::new(),
            exception: None,
        }
    }

    pub fn with_policy(mut self, policy: impl Into<Policy>) -> Self {
        self.policies.push(policy.into());
        self
    }

    pub fn with_request_context(mut self, ctx: &PropagationContext) -> Self {
        self.request_contexts.push(encoded(ctx));
        self
    }

    /// Builds the request a client would produce: the service context it
    /// attached, if any.
    pub fn from_client(request_id: u32, client: &FakeClientRequest) -> Self {
        let mut ri = Self::new(request_id);
        ri.request_contexts.clone_from(&client.request_contexts);
        ri
    }

    pub fn with_sending_exception(mut self, header: &ExceptionHeader) -> Self {
        self.exception = Some(to_encapsulation(header));
        self
    }

    pub fn reply_context(&self) -> Option<PropagationContext> {
        find(&self.reply_contexts, TRANSACTION_SERVICE_ID)
            .map(|svc| codec().decode_context(&svc.context_data).expect("decode"))
    }
}

impl ServerRequestInfo for FakeServerRequest {
    fn request_id(&self) -> u32 {
        self.request_id
    }

    fn operation(&self) -> &str {
        "transfer"
    }

    fn server_policy(&self, policy_type: u32) -> Option<Policy> {
        self.policies
            .iter()
            .find(|p| p.policy_type() == policy_type)
            .copied()
    }

    fn request_service_context(&self, context_id: u32) -> Option<ServiceContext> {
        find(&self.request_contexts, context_id)
    }

    fn add_reply_service_context(&mut self, svc: ServiceContext, replace: bool) {
        put(&mut self.reply_contexts, svc, replace);
    }

    fn sending_exception(&self) -> Option<Vec<u8>> {
        self.exception.clone()
    }
}

#[derive(Default)]
pub(crate) struct FakeIorInfo {
    pub policies: Vec<Policy>,
    pub components: Vec<TaggedComponent>,
}

impl IorInfo for FakeIorInfo {
    fn effective_policy(&self, policy_type: u32) -> Option<Policy> {
        self.policies
            .iter()
            .find(|p| p.policy_type() == policy_type)
            .copied()
    }

    fn add_ior_component(&mut self, component: TaggedComponent) {
        self.components.push(component);
    }
}

// ---------------------------------------------------------------------------
// Transaction manager side
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ManagerState {
    associated: AtomicBool,
    reject_replies: AtomicBool,
    exported: Mutex<Option<PropagationContext>>,
    reply_context: Mutex<Option<PropagationContext>>,
    import_failure: Mutex<Option<SystemException>>,
    sending_request_calls: AtomicUsize,
    received_replies: Mutex<Vec<(u32, PropagationContext, ReplyEnvironment)>>,
    received_requests: Mutex<Vec<(u32, PropagationContext)>>,
    sending_reply_calls: AtomicUsize,
}

/// Scriptable transaction manager recording every hook call.
#[derive(Clone, Default)]
pub(crate) struct TestManager {
    state: Arc<ManagerState>,
}

impl TestManager {
    pub fn new(associated: bool) -> Self {
        let manager = Self::default();
        manager.state.associated.store(associated, Ordering::SeqCst);
        manager
    }

    /// Context returned by `sending_request`.
    pub fn exporting(self, ctx: PropagationContext) -> Self {
        *self.state.exported.lock() = Some(ctx);
        self
    }

    /// Context returned by `sending_reply`.
    pub fn replying(self, ctx: PropagationContext) -> Self {
        *self.state.reply_context.lock() = Some(ctx);
        self
    }

    pub fn rejecting_replies(self) -> Self {
        self.state.reject_replies.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_import(self, err: SystemException) -> Self {
        *self.state.import_failure.lock() = Some(err);
        self
    }

    pub fn service(&self) -> TransactionService {
        TransactionService {
            sender: Arc::new(self.clone()),
            receiver: Arc::new(self.clone()),
            current: Arc::new(self.clone()),
        }
    }

    pub fn sending_request_calls(&self) -> usize {
        self.state.sending_request_calls.load(Ordering::SeqCst)
    }

    pub fn sending_reply_calls(&self) -> usize {
        self.state.sending_reply_calls.load(Ordering::SeqCst)
    }

    pub fn received_replies(&self) -> Vec<(u32, PropagationContext, ReplyEnvironment)> {
        self.state.received_replies.lock().clone()
    }

    pub fn received_requests(&self) -> Vec<(u32, PropagationContext)> {
        self.state.received_requests.lock().clone()
    }
}

impl Sender for TestManager {
    fn sending_request(&self, _request_id: u32) -> Option<PropagationContext> {
        self.state.sending_request_calls.fetch_add(1, Ordering::SeqCst);
        self.state.exported.lock().clone()
    }

    fn received_reply(
        &self,
        request_id: u32,
        ctx: &PropagationContext,
        env: ReplyEnvironment,
    ) -> Result<(), WrongTransaction> {
        self.state
            .received_replies
            .lock()
            .push((request_id, ctx.clone(), env));
        if self.state.reject_replies.load(Ordering::SeqCst) {
            return Err(WrongTransaction);
        }
        Ok(())
    }
}

impl Receiver for TestManager {
    fn received_request(
        &self,
        request_id: u32,
        ctx: &PropagationContext,
    ) -> Result<(), SystemException> {
        self.state
            .received_requests
            .lock()
            .push((request_id, ctx.clone()));
        match self.state.import_failure.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn sending_reply(&self, _request_id: u32) -> Option<PropagationContext> {
        self.state.sending_reply_calls.fetch_add(1, Ordering::SeqCst);
        self.state.reply_context.lock().clone()
    }
}

impl TransactionCurrent for TestManager {
    fn is_tx_associated(&self) -> bool {
        self.state.associated.load(Ordering::SeqCst)
    }
}
