//! `SystemNode`: the shared dispatch contract every node kind
//! (atomic, composite, collection, function) implements.
//!
//! The framework — never the node itself — decides which of the four
//! event kinds fires and in what order; a node only supplies the
//! handler bodies. Any error a handler returns is caught here,
//! annotated with the node's full path, and re-raised as a
//! `KernelError::Node`.

use sydevs_types::{Duration, Scale};

use crate::context::NodeContext;
use crate::error::{KernelError, Result};
use crate::port::NodeInterface;

/// The four points at which the framework may call into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Initialization,
    Unplanned,
    Planned,
    Finalization,
}

impl EventKind {
    pub fn tag(self) -> &'static str {
        match self {
            EventKind::Initialization => "$initialization",
            EventKind::Unplanned => "$unplanned",
            EventKind::Planned => "$planned",
            EventKind::Finalization => "$finalization",
        }
    }
}

/// Declares a node's own precision for reporting planned/elapsed
/// durations. Composite and collection nodes always report
/// [`Scale::NO_SCALE`]: the framework supplies `0_s` for their elapsed
/// durations rather than ask them to round to a meaningful precision.
pub trait SystemNode {
    fn node_full_name(&self) -> &str;

    fn interface(&self) -> &NodeInterface;
    fn interface_mut(&mut self) -> &mut NodeInterface;

    fn time_precision(&self) -> Scale {
        Scale::NO_SCALE
    }

    /// Runs the initialization handler, then scales and returns the
    /// node's first planned duration.
    fn initialization_event(&mut self, ctx: &mut NodeContext) -> Result<Duration>;

    /// Runs the unplanned handler in response to a delivered message,
    /// returning the node's updated planned duration (`inf()` cancels
    /// any prior scheduled event).
    fn unplanned_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<Duration>;

    /// Runs the planned handler, emitting any outgoing messages onto
    /// the node's message-output ports, and returns the next planned
    /// duration.
    fn planned_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<Duration>;

    /// Runs the finalization handler, after which every flow output
    /// must have been assigned.
    fn finalization_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<()>;
}

/// Rescales a handler-reported planned duration to a node's declared
/// `time_precision`, rejecting negative durations. A node whose
/// `time_precision` is [`Scale::NO_SCALE`] cannot itself report a
/// meaningful precision, so its duration passes through unscaled.
pub fn scale_planned_dt(dt: Duration, time_precision: Scale) -> Result<Duration> {
    if !dt.valid() {
        return Err(KernelError::invalid_argument("planned duration must be valid"));
    }
    if dt < Duration::zero() {
        return Err(KernelError::domain("planned duration must be non-negative"));
    }
    if time_precision.is_no_scale() {
        Ok(dt)
    } else {
        Ok(dt.rescaled(time_precision))
    }
}

/// Wraps a handler invocation so that any error it returns is
/// re-raised bearing the firing node's full path, matching the
/// "catch, annotate, re-raise" dispatch contract.
pub fn dispatch<T>(
    node_full_name: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    f().map_err(|err| match err {
        KernelError::Node { .. } => err,
        other => KernelError::from_node(node_full_name.to_string(), other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sydevs_types::levels;

    #[test]
    fn negative_planned_duration_is_rejected() {
        let dt = Duration::new_fixed(-1, levels::UNIT);
        assert!(scale_planned_dt(dt, levels::UNIT).is_err());
    }

    #[test]
    fn no_scale_precision_passes_duration_through() {
        let dt = Duration::new_fixed(5, levels::MILLI);
        let scaled = scale_planned_dt(dt, Scale::NO_SCALE).unwrap();
        assert_eq!(scaled, dt);
    }

    #[test]
    fn dispatch_wraps_errors_with_the_firing_node_path() {
        let result: Result<()> = dispatch("root.leaf", || Err(KernelError::logic("boom")));
        match result {
            Err(KernelError::Node { node_path, .. }) => assert_eq!(node_path, "root.leaf"),
            _ => panic!("expected a wrapped node error"),
        }
    }

    #[test]
    fn dispatch_does_not_double_wrap_an_existing_node_error() {
        let inner = KernelError::from_node("root.child", KernelError::logic("boom"));
        let result: Result<()> = dispatch("root", || Err(inner));
        match result {
            Err(KernelError::Node { node_path, .. }) => assert_eq!(node_path, "root.child"),
            _ => panic!("expected the inner node error to pass through unchanged"),
        }
    }
}
