//! Atomic nodes: leaves of the node tree that implement the dispatch
//! contract directly, with no sub-components of their own.

use sydevs_types::{Duration, Scale};

use crate::context::NodeContext;
use crate::error::Result;
use crate::node::{dispatch, scale_planned_dt, SystemNode};
use crate::port::{NodeInterface, PortGoal, PortMode};

/// User-implemented atomic behavior: the four dispatch handlers
/// themselves, without the framework bookkeeping (`scale_planned_dt`,
/// phase gating, error annotation) that wraps them.
pub trait AtomicNode {
    fn node_full_name(&self) -> &str;
    fn interface(&self) -> &NodeInterface;
    fn interface_mut(&mut self) -> &mut NodeInterface;

    /// A node whose `time_precision` is [`Scale::NO_SCALE`] cannot
    /// report elapsed durations; the framework then always supplies
    /// `0_s` as its handlers' `elapsed_dt`.
    fn time_precision(&self) -> Scale {
        Scale::NO_SCALE
    }

    fn handle_initialization(&mut self, ctx: &mut NodeContext) -> Result<Duration>;
    fn handle_unplanned(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<Duration>;
    fn handle_planned(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<Duration>;
    fn handle_finalization(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<()>;
}

/// Wraps an [`AtomicNode`] to supply the framework-side dispatch
/// contract: phase gating on the interface, planned-duration scaling,
/// and node-path error annotation.
pub struct Atomic<N: AtomicNode> {
    inner: N,
}

impl<N: AtomicNode> Atomic<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut N {
        &mut self.inner
    }
}

impl<N: AtomicNode> SystemNode for Atomic<N> {
    fn node_full_name(&self) -> &str {
        self.inner.node_full_name()
    }

    fn interface(&self) -> &NodeInterface {
        self.inner.interface()
    }

    fn interface_mut(&mut self) -> &mut NodeInterface {
        self.inner.interface_mut()
    }

    fn time_precision(&self) -> Scale {
        self.inner.time_precision()
    }

    fn initialization_event(&mut self, ctx: &mut NodeContext) -> Result<Duration> {
        let node_full_name = self.inner.node_full_name().to_string();
        self.inner.interface_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            self.inner.interface_mut().activate_phase((PortMode::Flow, PortGoal::Input));
            let unassigned = self.inner.interface().unassigned_flow_inputs();
            if let Some(name) = unassigned.first() {
                return Err(crate::error::KernelError::MissingFlowInput((*name).to_string()));
            }
            let dt = self.inner.handle_initialization(ctx)?;
            self.inner.interface_mut().deactivate_phase();
            scale_planned_dt(dt, self.inner.time_precision())
        });
        self.inner.interface_mut().timer_mut().stop();
        result
    }

    fn unplanned_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<Duration> {
        let node_full_name = self.inner.node_full_name().to_string();
        self.inner.interface_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            self.inner.interface_mut().activate_phase((PortMode::Message, PortGoal::Input));
            let dt = self.inner.handle_unplanned(ctx, elapsed_dt)?;
            self.inner.interface_mut().clear_message_inputs();
            self.inner.interface_mut().deactivate_phase();
            scale_planned_dt(dt, self.inner.time_precision())
        });
        self.inner.interface_mut().timer_mut().stop();
        result
    }

    fn planned_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<Duration> {
        let node_full_name = self.inner.node_full_name().to_string();
        self.inner.interface_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            self.inner.interface_mut().activate_phase((PortMode::Message, PortGoal::Output));
            let dt = self.inner.handle_planned(ctx, elapsed_dt)?;
            self.inner.interface_mut().deactivate_phase();
            scale_planned_dt(dt, self.inner.time_precision())
        });
        self.inner.interface_mut().timer_mut().stop();
        result
    }

    fn finalization_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<()> {
        let node_full_name = self.inner.node_full_name().to_string();
        self.inner.interface_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            self.inner.interface_mut().activate_phase((PortMode::Flow, PortGoal::Output));
            self.inner.handle_finalization(ctx, elapsed_dt)?;
            let unassigned = self.inner.interface().unassigned_flow_outputs();
            if let Some(name) = unassigned.first() {
                return Err(crate::error::KernelError::MissingFlowInput((*name).to_string()));
            }
            self.inner.interface_mut().deactivate_phase();
            Ok(())
        });
        self.inner.interface_mut().timer_mut().stop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{NodeContext, Printer, StdRngSource};
    use sydevs_types::levels;

    struct Counter {
        iface: NodeInterface,
        out: usize,
        count_out: usize,
    }

    impl Counter {
        fn new() -> Self {
            let mut iface = NodeInterface::new("root.counter");
            let out = iface.add_port::<i64>("count", PortMode::Flow, PortGoal::Output, false);
            Self { iface, out, count_out: 0 }
        }
    }

    impl AtomicNode for Counter {
        fn node_full_name(&self) -> &str {
            "root.counter"
        }
        fn interface(&self) -> &NodeInterface {
            &self.iface
        }
        fn interface_mut(&mut self) -> &mut NodeInterface {
            &mut self.iface
        }
        fn time_precision(&self) -> Scale {
            levels::UNIT
        }
        fn handle_initialization(&mut self, _ctx: &mut NodeContext) -> Result<Duration> {
            Ok(Duration::new_fixed(1, levels::UNIT))
        }
        fn handle_unplanned(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
            Ok(Duration::inf())
        }
        fn handle_planned(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
            self.count_out += 1;
            Ok(Duration::new_fixed(1, levels::UNIT))
        }
        fn handle_finalization(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<()> {
            let count = self.count_out as i64;
            self.iface.assign_flow_output(self.out, count)
        }
    }

    fn ctx() -> NodeContext {
        NodeContext::new(Box::new(StdRngSource::from_seed(1)), Printer::new(std::io::sink()))
    }

    #[test]
    fn atomic_node_runs_through_its_full_lifecycle() {
        let mut node = Atomic::new(Counter::new());
        let mut ctx = ctx();
        let dt = node.initialization_event(&mut ctx).unwrap();
        assert_eq!(dt, Duration::new_fixed(1, levels::UNIT));
        let dt = node.planned_event(&mut ctx, Duration::zero()).unwrap();
        assert_eq!(dt, Duration::new_fixed(1, levels::UNIT));
        node.finalization_event(&mut ctx, Duration::zero()).unwrap();
        assert_eq!(node.inner().count_out, 1);
        assert!(!node.interface().timer().is_running());
    }
}
