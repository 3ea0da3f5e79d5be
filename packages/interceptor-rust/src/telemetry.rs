//! Interceptor counters.
//!
//! Recorded through the `metrics` facade; the hosting process decides which
//! recorder (if any) is installed.

use ots_core::SystemException;

/// Counter of policy violations and unavailability errors raised.
pub const POLICY_VIOLATIONS: &str = "ots_policy_violations_total";

/// Counter of transaction service contexts attached to outgoing messages.
pub const CONTEXTS_SENT: &str = "ots_contexts_sent_total";

/// Which side of the invocation raised or sent something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

/// Kind of transaction context attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Dummy,
    Null,
    Propagated,
    Reply,
}

impl ContextKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Dummy => "dummy",
            Self::Null => "null",
            Self::Propagated => "propagated",
            Self::Reply => "reply",
        }
    }
}

/// Counts `err` and hands it back, for use in `Err(...)` position.
pub(crate) fn violation(side: Side, err: SystemException) -> SystemException {
    ::metrics::counter!(POLICY_VIOLATIONS, "side" => side.as_str(), "kind" => err.name())
        .increment(1);
    err
}

pub(crate) fn context_sent(kind: ContextKind) {
    ::metrics::counter!(CONTEXTS_SENT, "kind" => kind.as_str()).increment(1);
}
