//! Server interception points.

use ots_core::cdr::from_encapsulation;
use ots_core::{
    CompletionStatus, ExceptionHeader, OtsPolicyValue, ServiceContext, SystemException,
    OTS_POLICY_TYPE, TRANSACTION_SERVICE_ID,
};
use tracing::{debug, warn};

use super::{thread_name, TransactionInterceptor};
use crate::telemetry::{self, ContextKind, Side};
use crate::thread_state::{self, FrameGuard, ReplyMarker, RequestFrame};
use crate::traits::ServerRequestInfo;

/// Server send points; they share one completion routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SendPoint {
    Reply,
    Exception,
    Other,
}

impl TransactionInterceptor {
    pub(super) fn server_receive(&self, ri: &dyn ServerRequestInfo) -> Result<(), SystemException> {
        // Without an explicit policy the adapter adapts to whatever arrives.
        let policy = ri
            .server_policy(OTS_POLICY_TYPE)
            .and_then(|p| p.as_ots())
            .unwrap_or(OtsPolicyValue::INVOCATION_DEFAULT);

        let svc = ri.request_service_context(TRANSACTION_SERVICE_ID);

        // The send point never runs when this point fails, so the guard
        // pops the frame on every error path.
        let guard = FrameGuard::push(RequestFrame::on_receive(svc.is_some()));
        self.import_request_context(ri, policy, svc.as_ref())?;
        guard.keep();
        Ok(())
    }

    fn import_request_context(
        &self,
        ri: &dyn ServerRequestInfo,
        policy: OtsPolicyValue,
        svc: Option<&ServiceContext>,
    ) -> Result<(), SystemException> {
        let Some(ts) = self.tx_service.load_full() else {
            if svc.is_some() || policy == OtsPolicyValue::Requires {
                return Err(telemetry::violation(
                    Side::Server,
                    SystemException::transaction_unavailable(),
                ));
            }
            return Ok(());
        };

        let Some(svc) = svc else {
            if policy == OtsPolicyValue::Requires {
                return Err(telemetry::violation(
                    Side::Server,
                    SystemException::transaction_required(),
                ));
            }
            return Ok(());
        };

        if policy == OtsPolicyValue::Forbids {
            return Err(telemetry::violation(
                Side::Server,
                SystemException::invalid_transaction(CompletionStatus::No),
            ));
        }

        debug!(
            request_id = ri.request_id(),
            operation = ri.operation(),
            thread = %thread_name(),
            "received_request"
        );

        if svc.context_id != TRANSACTION_SERVICE_ID {
            return Err(SystemException::invalid_transaction(CompletionStatus::No));
        }

        let ctx = self.decode_context(&svc.context_data, CompletionStatus::No)?;

        if ctx.is_dummy() {
            // Co-located caller: this thread already carries the transaction.
            thread_state::mark_no_reply();
            return Ok(());
        }

        if ctx.is_null() {
            thread_state::mark_null_context();
            thread_state::mark_no_reply();
            return Ok(());
        }

        if !self.config.interop_mode {
            thread_state::mark_null_context();
        }

        ts.receiver.received_request(ri.request_id(), &ctx)
    }

    pub(super) fn server_send(
        &self,
        ri: &mut dyn ServerRequestInfo,
        point: SendPoint,
    ) -> Result<(), SystemException> {
        // Pop before anything else can fail so the stack stays balanced.
        let Some(frame) = thread_state::pop_frame() else {
            return Ok(());
        };
        if frame.reply == ReplyMarker::NoReply {
            return Ok(());
        }

        let completed = match point {
            SendPoint::Reply => CompletionStatus::Yes,
            SendPoint::Other => CompletionStatus::No,
            SendPoint::Exception => sending_exception_status(&*ri),
        };

        let Some(ts) = self.tx_service.load_full() else {
            // The transaction service went away while the request was running.
            return Err(telemetry::violation(
                Side::Server,
                SystemException::transaction_rolledback(completed),
            ));
        };

        debug!(
            request_id = ri.request_id(),
            operation = ri.operation(),
            thread = %thread_name(),
            point = ?point,
            "sending_reply"
        );

        let Some(ctx) = ts.receiver.sending_reply(ri.request_id()) else {
            warn!(
                request_id = ri.request_id(),
                "transaction manager exported no reply context for an imported transaction"
            );
            return Err(telemetry::violation(
                Side::Server,
                SystemException::transaction_rolledback(completed),
            ));
        };

        let data = self.encode_context(&ctx, completed)?;
        ri.add_reply_service_context(ServiceContext::transaction(data), false);
        telemetry::context_sent(ContextKind::Reply);
        Ok(())
    }
}

/// Completion status of the exception being sent; `Maybe` if the payload
/// cannot be read.
fn sending_exception_status(ri: &dyn ServerRequestInfo) -> CompletionStatus {
    match ri
        .sending_exception()
        .map(|data| from_encapsulation::<ExceptionHeader>(&data))
    {
        Some(Ok(header)) => header.completed,
        Some(Err(e)) => {
            warn!(error = %e, "unreadable outgoing exception header");
            CompletionStatus::Maybe
        }
        None => CompletionStatus::Maybe,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
