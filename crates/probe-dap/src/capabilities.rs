//! Resolved adapter capabilities.

use crate::protocol::Capabilities;

/// Capabilities of the debug adapter, resolved to plain booleans after the
/// `initialize` handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterCapabilities {
    /// Whether the adapter supports `configurationDone`.
    pub supports_configuration_done_request: bool,
    /// Whether the adapter supports function breakpoints.
    pub supports_function_breakpoints: bool,
    /// Whether the adapter supports conditional breakpoints.
    pub supports_conditional_breakpoints: bool,
    /// Whether stop events carry the id of the breakpoint that was hit.
    pub supports_breakpoint_id_on_stop: bool,
    /// Whether the adapter supports the `terminate` request.
    pub supports_terminate_request: bool,
    /// Ids of exception filters the adapter accepts, in advertised order.
    pub exception_filters: Vec<String>,
}

impl AdapterCapabilities {
    /// Build [`AdapterCapabilities`] from the protocol-level [`Capabilities`]
    /// returned by the adapter in the `initialize` response.
    pub fn from_initialize_response(caps: &Capabilities) -> Self {
        Self {
            supports_configuration_done_request: caps
                .supports_configuration_done_request
                .unwrap_or(false),
            supports_function_breakpoints: caps.supports_function_breakpoints.unwrap_or(false),
            supports_conditional_breakpoints: caps
                .supports_conditional_breakpoints
                .unwrap_or(false),
            supports_breakpoint_id_on_stop: caps.supports_breakpoint_id_on_stop.unwrap_or(false),
            supports_terminate_request: caps.supports_terminate_request.unwrap_or(false),
            exception_filters: caps
                .exception_breakpoint_filters
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .map(|f| f.filter.clone())
                .collect(),
        }
    }

    /// Ids of the exception filters the adapter enables by default.
    pub fn default_exception_filters(caps: &Capabilities) -> Vec<String> {
        caps.exception_breakpoint_filters
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .filter(|f| f.default.unwrap_or(false))
            .map(|f| f.filter.clone())
            .collect()
    }
}
