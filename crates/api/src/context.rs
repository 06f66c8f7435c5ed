use keystone_core::UserId;

/// Per-request context resolved before any handler runs.
///
/// The identity is whatever the upstream identity provider handed over; it is
/// trusted as-is and may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    user_id: Option<UserId>,
    trace_id: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(
        user_id: Option<UserId>,
        trace_id: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            user_id,
            trace_id,
            ip_address,
            user_agent,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}
