//! Function nodes: flow-only leaves used purely to compute derived
//! flow outputs from flow inputs, with no message ports and no
//! participation in event scheduling.

use sydevs_types::{Duration, Scale};

use crate::context::NodeContext;
use crate::error::Result;
use crate::node::{dispatch, SystemNode};
use crate::port::{NodeInterface, PortGoal, PortMode};

/// User-implemented function behavior: a single pure(ish) evaluation
/// from flow inputs to flow outputs, re-run by the enclosing composite
/// every time its flow inputs may have changed.
pub trait FunctionNode {
    fn node_full_name(&self) -> &str;
    fn interface(&self) -> &NodeInterface;
    fn interface_mut(&mut self) -> &mut NodeInterface;

    fn evaluate(&mut self, ctx: &mut NodeContext) -> Result<()>;
}

/// Wraps a [`FunctionNode`] to participate in the framework's node
/// tree: it is only ever reached through the flow-only initialization
/// and finalization passes of a [`crate::composite::Composite`].
pub struct Function<N: FunctionNode> {
    inner: N,
}

impl<N: FunctionNode> Function<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }
}

impl<N: FunctionNode> SystemNode for Function<N> {
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
        Scale::NO_SCALE
    }

    fn initialization_event(&mut self, ctx: &mut NodeContext) -> Result<Duration> {
        let node_full_name = self.inner.node_full_name().to_string();
        self.inner.interface_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            self.inner.interface_mut().activate_phase((PortMode::Flow, PortGoal::Output));
            self.inner.evaluate(ctx)?;
            self.inner.interface_mut().deactivate_phase();
            Ok(Duration::inf())
        });
        self.inner.interface_mut().timer_mut().stop();
        result
    }

    fn unplanned_event(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
        Ok(Duration::inf())
    }

    fn planned_event(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
        Ok(Duration::inf())
    }

    fn finalization_event(&mut self, ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<()> {
        let node_full_name = self.inner.node_full_name().to_string();
        self.inner.interface_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            self.inner.interface_mut().activate_phase((PortMode::Flow, PortGoal::Output));
            self.inner.evaluate(ctx)?;
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
    use crate::context::{Printer, StdRngSource};

    struct Doubler {
        iface: NodeInterface,
        input: usize,
        output: usize,
    }

    impl Doubler {
        fn new() -> Self {
            let mut iface = NodeInterface::new("root.doubler");
            let input = iface.add_port::<i64>("x", PortMode::Flow, PortGoal::Input, false);
            let output = iface.add_port::<i64>("y", PortMode::Flow, PortGoal::Output, false);
            Self { iface, input, output }
        }
    }

    impl FunctionNode for Doubler {
        fn node_full_name(&self) -> &str {
            "root.doubler"
        }
        fn interface(&self) -> &NodeInterface {
            &self.iface
        }
        fn interface_mut(&mut self) -> &mut NodeInterface {
            &mut self.iface
        }
        fn evaluate(&mut self, _ctx: &mut NodeContext) -> Result<()> {
            self.iface.activate_phase((PortMode::Flow, PortGoal::Input));
            let x: i64 = self.iface.flow_value(self.input)?;
            self.iface.activate_phase((PortMode::Flow, PortGoal::Output));
            self.iface.assign_flow_output(self.output, x * 2)
        }
    }

    #[test]
    fn function_node_evaluates_on_initialization() {
        let mut node = Function::new(Doubler::new());
        node.interface_mut().set_flow_input(0, 21i64);
        let mut ctx = NodeContext::new(Box::new(StdRngSource::from_seed(0)), Printer::new(std::io::sink()));
        node.initialization_event(&mut ctx).unwrap();
        node.interface_mut().activate_phase((PortMode::Flow, PortGoal::Output));
        assert_eq!(node.interface().flow_value::<i64>(1).unwrap(), 42);
    }
}
