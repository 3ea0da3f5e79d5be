//! Service contexts and tagged IOR components.

use serde::{Deserialize, Serialize};

/// Service context id under which every transaction context is carried.
pub const TRANSACTION_SERVICE_ID: u32 = 0;

/// One entry of the service-context list of a request or reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContext {
    pub context_id: u32,
    #[serde(with = "serde_bytes")]
    pub context_data: Vec<u8>,
}

impl ServiceContext {
    /// A transaction service context holding an encoded propagation context.
    #[must_use]
    pub fn transaction(context_data: Vec<u8>) -> Self {
        Self {
            context_id: TRANSACTION_SERVICE_ID,
            context_data,
        }
    }
}

/// A `(tag, data)` component embedded in an object reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedComponent {
    pub tag: u32,
    #[serde(with = "serde_bytes")]
    pub component_data: Vec<u8>,
}
