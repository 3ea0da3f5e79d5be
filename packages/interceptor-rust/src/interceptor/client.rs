//! Client interception points.

use ots_core::cdr::from_encapsulation;
use ots_core::{
    CompletionStatus, ExceptionHeader, OtsPolicyValue, PropagationContext, ServiceContext,
    SystemException, TAG_OTS_POLICY, TRANSACTION_SERVICE_ID,
};
use tracing::{debug, warn};

use super::{thread_name, TransactionInterceptor};
use crate::telemetry::{self, ContextKind, Side};
use crate::traits::{ClientRequestInfo, ReplyEnvironment};

/// The three client receive points share one routine; they differ only in
/// the completion status they report and in whether the reply carries an
/// exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReceivePoint {
    Reply,
    Exception,
    Other,
}

impl TransactionInterceptor {
    pub(super) fn client_send_request(
        &self,
        ri: &mut dyn ClientRequestInfo,
    ) -> Result<(), SystemException> {
        let policy = self.target_ots_policy(ri)?;
        let check = self.config.check_policy;

        let Some(ts) = self.tx_service.load_full() else {
            if policy == OtsPolicyValue::Requires && check {
                return Err(telemetry::violation(
                    Side::Client,
                    SystemException::transaction_unavailable(),
                ));
            }
            return Ok(());
        };

        if !ts.current.is_tx_associated() {
            if policy == OtsPolicyValue::Requires && check {
                return Err(telemetry::violation(
                    Side::Client,
                    SystemException::transaction_required(),
                ));
            }
            return Ok(());
        }

        debug!(
            request_id = ri.request_id(),
            operation = ri.operation(),
            thread = %thread_name(),
            "sending_request"
        );

        if policy == OtsPolicyValue::Forbids && check {
            return Err(telemetry::violation(
                Side::Client,
                SystemException::invalid_transaction(CompletionStatus::No),
            ));
        }

        // A co-located target already shares this thread's transaction; the
        // dummy context lets it skip importing (and activating a coordinator).
        let (ctx, kind) = if self.target_inspector.is_local(ri.effective_target()) {
            (PropagationContext::dummy(), ContextKind::Dummy)
        } else if !self.config.interop_mode {
            (PropagationContext::null(), ContextKind::Null)
        } else {
            let Some(ctx) = ts.sender.sending_request(ri.request_id()) else {
                warn!(
                    request_id = ri.request_id(),
                    "transaction manager exported no context for an associated transaction"
                );
                return Err(telemetry::violation(
                    Side::Client,
                    SystemException::transaction_rolledback(CompletionStatus::No),
                ));
            };
            (ctx, ContextKind::Propagated)
        };

        let data = self.encode_context(&ctx, CompletionStatus::No)?;
        ri.add_request_service_context(ServiceContext::transaction(data), false);
        telemetry::context_sent(kind);
        Ok(())
    }

    /// OTS policy published in the target's reference. References without
    /// the component (e.g. location-forwarded ones) count as `Adapts`.
    fn target_ots_policy(
        &self,
        ri: &dyn ClientRequestInfo,
    ) -> Result<OtsPolicyValue, SystemException> {
        let Some(component) = ri.effective_component(TAG_OTS_POLICY) else {
            return Ok(OtsPolicyValue::INVOCATION_DEFAULT);
        };
        let raw = self
            .codec
            .decode_short(&component.component_data)
            .map_err(|e| super::codec_failure(&e, CompletionStatus::No))?;
        OtsPolicyValue::try_from(raw).map_err(|v| {
            warn!(value = v, "unknown OTS policy value in target reference");
            SystemException::internal(CompletionStatus::No)
        })
    }

    pub(super) fn client_receive(
        &self,
        ri: &dyn ClientRequestInfo,
        point: ReceivePoint,
    ) -> Result<(), SystemException> {
        // Replies from targets that never imported the transaction carry no
        // context; nothing to hand back.
        let Some(svc) = ri.reply_service_context(TRANSACTION_SERVICE_ID) else {
            return Ok(());
        };

        let (completed, env) = match point {
            ReceivePoint::Reply => (CompletionStatus::Yes, ReplyEnvironment::NoException),
            ReceivePoint::Other => (CompletionStatus::No, ReplyEnvironment::NoException),
            ReceivePoint::Exception => exception_environment(ri),
        };

        let Some(ts) = self.tx_service.load_full() else {
            return Err(telemetry::violation(
                Side::Client,
                SystemException::transaction_rolledback(completed),
            ));
        };

        debug!(
            request_id = ri.request_id(),
            operation = ri.operation(),
            thread = %thread_name(),
            point = ?point,
            "received_reply"
        );

        let ctx = self.decode_context(&svc.context_data, completed)?;
        ts.sender
            .received_reply(ri.request_id(), &ctx, env)
            .map_err(|_| {
                telemetry::violation(
                    Side::Client,
                    SystemException::invalid_transaction(completed),
                )
            })
    }
}

/// Completion status and environment for an exception reply. The ORB's
/// repository id decides between user and system exception; minor code and
/// completion status come from the payload. A payload that cannot be read
/// is treated as a system exception of unknown completion.
fn exception_environment(ri: &dyn ClientRequestInfo) -> (CompletionStatus, ReplyEnvironment) {
    let header = ri
        .received_exception()
        .and_then(|data| match from_encapsulation::<ExceptionHeader>(&data) {
            Ok(header) => Some(header),
            Err(e) => {
                warn!(error = %e, "unreadable exception reply header");
                None
            }
        })
        .map(|mut header| {
            if let Some(id) = ri.received_exception_id() {
                header.repository_id = id;
            }
            header
        });
    match header {
        Some(h) if h.is_user_exception() => (h.completed, ReplyEnvironment::NoException),
        Some(h) => (
            h.completed,
            ReplyEnvironment::SystemException {
                completed: h.completed,
            },
        ),
        None => (
            CompletionStatus::Maybe,
            ReplyEnvironment::SystemException {
                completed: CompletionStatus::Maybe,
            },
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
