//! Composite nodes: own a fixed set of components wired together by
//! typed links, and orchestrate their initialization, event delivery,
//! and finalization as a single node in the surrounding tree.

use std::any::Any;

use sydevs_types::{Duration, Scale};

use crate::context::NodeContext;
use crate::error::{KernelError, Result};
use crate::node::{dispatch, SystemNode};
use crate::port::{NodeInterface, PortGoal, PortMode};
use crate::time_cache::TimeCache;
use crate::time_queue::TimeQueue;

/// One endpoint of a link: either one of the composite's own ports,
/// or a port belonging to one of its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Own(usize),
    Component(usize, usize),
}

/// A typed connection between two ports, validated at construction.
///
/// - **Inward**: composite input -> component input.
/// - **Inner**: component output -> component input.
/// - **Outward**: component output -> composite output.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub source: Endpoint,
    pub dest: Endpoint,
}

/// A composite node: an interface of its own, plus a fixed roster of
/// components connected by inward/inner/outward links.
pub struct Composite {
    node_full_name: String,
    iface: NodeInterface,
    components: Vec<Box<dyn SystemNode>>,
    component_names: Vec<String>,
    message_capable: Vec<bool>,
    initialized: Vec<bool>,
    links: Vec<Link>,
    /// Links whose destination is a flow-input port, keyed by
    /// `(component_index, port_index)` with at most one entry — a
    /// second write would be a `LogicError` at construction time.
    flow_dest_seen: std::collections::HashSet<(usize, usize)>,
    queue: TimeQueue,
    cache: TimeCache,
}

impl Composite {
    pub fn new(node_full_name: impl Into<String>) -> Self {
        Self {
            node_full_name: node_full_name.into(),
            iface: NodeInterface::new("<composite>"),
            components: Vec::new(),
            component_names: Vec::new(),
            message_capable: Vec::new(),
            initialized: Vec::new(),
            links: Vec::new(),
            flow_dest_seen: std::collections::HashSet::new(),
            queue: TimeQueue::new(),
            cache: TimeCache::new(),
        }
    }

    pub fn interface_handle(&mut self) -> &mut NodeInterface {
        &mut self.iface
    }

    /// Adds a component, returning its index for use in [`Link`]s.
    pub fn add_component(&mut self, name: impl Into<String>, node: Box<dyn SystemNode>) -> usize {
        let index = self.components.len();
        let message_capable = (0..node.interface().port_count())
            .any(|i| node.interface().port_mode(i) == PortMode::Message);
        self.component_names.push(name.into());
        self.message_capable.push(message_capable);
        self.initialized.push(false);
        self.components.push(node);
        index
    }

    pub fn add_link(&mut self, link: Link) -> Result<()> {
        self.validate_endpoint(link.source, PortGoal::Output)?;
        self.validate_endpoint(link.dest, PortGoal::Input)?;
        if self.dest_is_flow(link.dest) {
            if !self.flow_dest_seen.insert(self.dest_key(link.dest)) {
                return Err(KernelError::logic("flow input receives more than one inbound link"));
            }
        }
        self.links.push(link);
        Ok(())
    }

    fn dest_key(&self, endpoint: Endpoint) -> (usize, usize) {
        match endpoint {
            Endpoint::Own(p) => (usize::MAX, p),
            Endpoint::Component(c, p) => (c, p),
        }
    }

    fn dest_is_flow(&self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Own(p) => self.iface.port_mode(p) == PortMode::Flow,
            Endpoint::Component(c, p) => self.components[c].interface().port_mode(p) == PortMode::Flow,
        }
    }

    fn validate_endpoint(&self, endpoint: Endpoint, expected_goal: PortGoal) -> Result<()> {
        let (mode_goal_ok, label) = match endpoint {
            Endpoint::Own(p) => {
                if p >= self.iface.port_count() {
                    return Err(KernelError::LinkOutOfScope(format!("composite port #{p}")));
                }
                (self.iface.port_goal(p) == expected_goal, self.iface.port_name(p).to_string())
            }
            Endpoint::Component(c, p) => {
                if c >= self.components.len() || p >= self.components[c].interface().port_count() {
                    return Err(KernelError::LinkOutOfScope(format!("component #{c} port #{p}")));
                }
                (
                    self.components[c].interface().port_goal(p) == expected_goal,
                    self.components[c].interface().port_name(p).to_string(),
                )
            }
        };
        if !mode_goal_ok {
            return Err(KernelError::LinkTypeMismatch(label));
        }
        Ok(())
    }

    fn endpoint_mode(&self, endpoint: Endpoint) -> PortMode {
        match endpoint {
            Endpoint::Own(p) => self.iface.port_mode(p),
            Endpoint::Component(c, p) => self.components[c].interface().port_mode(p),
        }
    }

    fn read_boxed(&self, endpoint: Endpoint) -> Option<Box<dyn Any + Send>> {
        match endpoint {
            Endpoint::Own(p) => self.iface.copy_value_boxed(p),
            Endpoint::Component(c, p) => self.components[c].interface().copy_value_boxed(p),
        }
    }

    fn write_flow_boxed(&mut self, endpoint: Endpoint, value: Box<dyn Any + Send>) {
        match endpoint {
            Endpoint::Own(p) => {
                self.iface.set_value_boxed(p, value);
                self.iface.mark_flow_output_assigned(p);
            }
            Endpoint::Component(c, p) => self.components[c].interface_mut().set_value_boxed(p, value),
        }
    }

    fn write_message_boxed(&mut self, endpoint: Endpoint, value: Box<dyn Any + Send>) {
        match endpoint {
            Endpoint::Own(p) => self.iface.push_outbox_boxed(p, value),
            Endpoint::Component(c, p) => self.components[c].interface_mut().receive_value_boxed(p, value),
        }
    }

    /// Copies every flow-output value currently held across every link
    /// whose source has one, delivering flow links eagerly and message
    /// links only when explicitly requested by the caller (message
    /// links are driven by event delivery, not by this sweep).
    fn propagate_flow_links(&mut self) {
        for link in self.links.clone() {
            if self.endpoint_mode(link.source) != PortMode::Flow {
                continue;
            }
            if let Some(value) = self.read_boxed(link.source) {
                self.write_flow_boxed(link.dest, value);
            }
        }
    }

    fn component_full_name(&self, index: usize) -> String {
        format!("{}.{}", self.node_full_name, self.component_names[index])
    }

    fn inner_and_outward_destinations(&self, source: Endpoint) -> Vec<Endpoint> {
        self.links
            .iter()
            .filter(|l| l.source == source)
            .map(|l| l.dest)
            .collect()
    }

    fn inward_destinations(&self, composite_port: usize) -> Vec<Endpoint> {
        self.links
            .iter()
            .filter(|l| l.source == Endpoint::Own(composite_port))
            .map(|l| l.dest)
            .collect()
    }

    fn forward_flow_inputs(&mut self) {
        for p in 0..self.iface.port_count() {
            if self.iface.port_mode(p) != PortMode::Flow || self.iface.port_goal(p) != PortGoal::Input {
                continue;
            }
            for dest in self.inward_destinations(p) {
                if let Some(value) = self.iface.copy_value_boxed(p) {
                    self.write_flow_boxed(dest, value);
                }
            }
        }
    }

    fn message_ports_with_pending_output(&self, index: usize) -> Vec<usize> {
        let iface = self.components[index].interface();
        (0..iface.port_count())
            .filter(|&p| iface.port_mode(p) == PortMode::Message && iface.port_goal(p) == PortGoal::Output)
            .filter(|&p| !iface.outbox_is_empty(p))
            .collect()
    }

    fn deliver_component_messages(&mut self, source_index: usize, ctx: &mut NodeContext, out: &mut Vec<(usize, i64)>) -> Result<()> {
        for port in self.message_ports_with_pending_output(source_index) {
            let values = self.components[source_index].interface_mut().take_outbox_boxed(port);
            let destinations = self.inner_and_outward_destinations(Endpoint::Component(source_index, port));
            for value in &values {
                for dest in &destinations {
                    let copy = self.components[source_index].interface().clone_boxed(port, value.as_ref());
                    match *dest {
                        Endpoint::Own(p) => self.iface.push_outbox_boxed(p, copy),
                        Endpoint::Component(dest_index, dest_port) => {
                            self.components[dest_index].interface_mut().receive_value_boxed(dest_port, copy);
                            let elapsed = self.component_elapsed(dest_index, ctx);
                            let next_dt = self.components[dest_index].unplanned_event(ctx, elapsed)?;
                            self.retain_component(dest_index, ctx);
                            out.push((dest_index, 0));
                            self.reschedule(dest_index, next_dt)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn reschedule(&mut self, component_index: usize, dt: Duration) -> Result<()> {
        if dt.infinite() {
            self.queue.cancel_event(component_index as i64);
        } else {
            self.queue.plan_event(component_index as i64, dt)?;
        }
        Ok(())
    }

    /// Elapsed duration since `index`'s last event, reported at that
    /// component's own declared precision (`0_s` if it declares none).
    fn component_elapsed(&self, index: usize, ctx: &NodeContext) -> Duration {
        let precision = self.components[index].time_precision();
        if precision.is_no_scale() {
            return Duration::zero();
        }
        let dt = self.cache.duration_since(index as i64, ctx.time().t());
        if dt.finite() {
            dt
        } else {
            Duration::zero()
        }
    }

    /// Retains `index`'s event time at its own declared precision, so a
    /// later `component_elapsed` rounds to what that component asked for.
    fn retain_component(&mut self, index: usize, ctx: &NodeContext) {
        let precision = self.components[index].time_precision();
        if precision.is_no_scale() {
            self.cache.release_event(index as i64);
        } else {
            self.cache.retain_event(index as i64, precision, ctx.time().t());
        }
    }
}

impl SystemNode for Composite {
    fn node_full_name(&self) -> &str {
        &self.node_full_name
    }

    fn interface(&self) -> &NodeInterface {
        &self.iface
    }

    fn interface_mut(&mut self) -> &mut NodeInterface {
        &mut self.iface
    }

    fn time_precision(&self) -> Scale {
        Scale::NO_SCALE
    }

    fn initialization_event(&mut self, ctx: &mut NodeContext) -> Result<Duration> {
        let node_full_name = self.node_full_name.clone();
        self.iface.timer_mut().start();
        let result = dispatch(&node_full_name, || {
            self.forward_flow_inputs();

            // Fixed-point flow pass: fire every component whose flow
            // inputs are all present, then propagate, until no
            // component changes.
            loop {
                let mut progressed = false;
                for i in 0..self.components.len() {
                    if self.initialized[i] {
                        continue;
                    }
                    if !self.components[i].interface().unassigned_flow_inputs().is_empty() {
                        continue;
                    }
                    if self.message_capable[i] {
                        continue;
                    }
                    let dt = self.components[i].initialization_event(ctx)?;
                    self.initialized[i] = true;
                    let _ = dt;
                    self.propagate_flow_links();
                    progressed = true;
                }
                if !progressed {
                    break;
                }
            }

            // Message-capable components, in declaration order.
            for i in 0..self.components.len() {
                if self.initialized[i] || !self.message_capable[i] {
                    continue;
                }
                let dt = self.components[i].initialization_event(ctx)?;
                self.initialized[i] = true;
                self.retain_component(i, ctx);
                self.reschedule(i, dt)?;
                self.propagate_flow_links();
            }

            Ok(self.queue.imminent_duration())
        });
        self.iface.timer_mut().stop();
        result
    }

    fn unplanned_event(&mut self, ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
        let node_full_name = self.node_full_name.clone();
        self.iface.timer_mut().start();
        let result = dispatch(&node_full_name, || {
            for p in 0..self.iface.port_count() {
                if self.iface.port_mode(p) != PortMode::Message || self.iface.port_goal(p) != PortGoal::Input {
                    continue;
                }
                if !self.iface.received(p) {
                    continue;
                }
                for dest in self.inward_destinations(p) {
                    if let Endpoint::Component(dest_index, dest_port) = dest {
                        let Some(copy) = self.iface.copy_value_boxed(p) else { continue };
                        self.components[dest_index].interface_mut().receive_value_boxed(dest_port, copy);
                        let elapsed = self.component_elapsed(dest_index, ctx);
                        let next_dt = self.components[dest_index].unplanned_event(ctx, elapsed)?;
                        self.retain_component(dest_index, ctx);
                        self.reschedule(dest_index, next_dt)?;
                    }
                }
            }
            Ok(self.queue.imminent_duration())
        });
        self.iface.timer_mut().stop();
        result
    }

    fn planned_event(&mut self, ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
        let node_full_name = self.node_full_name.clone();
        self.iface.timer_mut().start();
        let result = dispatch(&node_full_name, || {
            let ids = self.queue.pop_imminent_events()?;
            let mut delivered = Vec::new();
            for source_index in ids {
                let source_index = source_index as usize;
                let elapsed = self.component_elapsed(source_index, ctx);
                let next_dt = self.components[source_index].planned_event(ctx, elapsed)?;
                self.retain_component(source_index, ctx);
                self.reschedule(source_index, next_dt)?;
                self.deliver_component_messages(source_index, ctx, &mut delivered)?;
            }
            self.propagate_flow_links();
            Ok(self.queue.imminent_duration())
        });
        self.iface.timer_mut().stop();
        result
    }

    fn finalization_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<()> {
        let node_full_name = self.node_full_name.clone();
        self.iface.timer_mut().start();
        let result = dispatch(&node_full_name, || {
            for i in 0..self.components.len() {
                if self.message_capable[i] {
                    let component_elapsed = self.component_elapsed(i, ctx);
                    self.components[i].finalization_event(ctx, component_elapsed)?;
                }
            }
            self.propagate_flow_links();
            for i in 0..self.components.len() {
                if !self.message_capable[i] {
                    self.components[i].finalization_event(ctx, elapsed_dt)?;
                }
            }
            self.propagate_flow_links();
            Ok(())
        });
        self.iface.timer_mut().stop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::{Atomic, AtomicNode};
    use crate::context::{NodeContext, Printer, StdRngSource};
    use crate::port::{NodeInterface, PortGoal, PortMode};
    use sydevs_types::levels;

    struct Source {
        iface: NodeInterface,
        out: usize,
    }

    impl Source {
        fn new(full_name: &str) -> Self {
            let mut iface = NodeInterface::new(full_name);
            let out = iface.add_port::<i64>("out", PortMode::Message, PortGoal::Output, false);
            Self { iface, out }
        }
    }

    impl AtomicNode for Source {
        fn node_full_name(&self) -> &str {
            "root.source"
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
            self.iface.send_message(self.out, 7i64)?;
            Ok(Duration::inf())
        }
        fn handle_finalization(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<()> {
            Ok(())
        }
    }

    fn ctx() -> NodeContext {
        NodeContext::new(Box::new(StdRngSource::from_seed(1)), Printer::new(std::io::sink()))
    }

    #[test]
    fn composite_schedules_its_only_component_on_initialization() {
        let mut composite = Composite::new("root");
        composite.add_component("source", Box::new(Atomic::new(Source::new("root.source"))));
        let mut ctx = ctx();
        let dt = composite.initialization_event(&mut ctx).unwrap();
        assert_eq!(dt, Duration::new_fixed(1, levels::UNIT));
    }
}
