//! Ports and the per-node interface that owns them.
//!
//! A port is a typed slot through which a node exchanges flow values
//! (persistent, assigned at most once per simulation) or messages
//! (transient, delivered per event) with its surroundings. `NodeInterface`
//! is the table of every port belonging to one node, gated by which
//! `(mode, goal)` phase is currently active — mirroring the dispatch
//! contract in `node.rs`, where each handler kind only ever sees one
//! combination of flow/message and input/output.

use std::any::Any;
use std::fmt;

use crate::error::{KernelError, Result};
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    Flow,
    Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortGoal {
    Input,
    Output,
}

pub type PortPhase = (PortMode, PortGoal);

struct PortSlot {
    name: String,
    mode: PortMode,
    goal: PortGoal,
    /// Current flow value, or the most recently delivered message.
    value: Option<Box<dyn Any + Send>>,
    /// Outgoing messages queued on a message-output port this event.
    outbox: Vec<Box<dyn Any + Send>>,
    received_this_event: bool,
    to_string: Option<Box<dyn Fn(&(dyn Any)) -> String + Send + Sync>>,
    clone_value: Box<dyn Fn(&(dyn Any)) -> Box<dyn Any + Send> + Send + Sync>,
    print_on_use: bool,
}

impl fmt::Debug for PortSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortSlot")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("goal", &self.goal)
            .finish()
    }
}

/// Owns every port of one node, and the small state machine that
/// tracks which `(mode, goal)` phase is presently active.
#[derive(Debug)]
pub struct NodeInterface {
    node_full_name: String,
    ports: Vec<PortSlot>,
    active_phase: Option<PortPhase>,
    flow_output_assigned: Vec<bool>,
    /// Index of the message-input port presently staged on a prototype
    /// interface, if any — see [`NodeInterface::stage_message_input`].
    staged_message_port: Option<usize>,
    /// Printer observables, set by the node during construction.
    pub print_on_event: bool,
    pub print_on_elapsed_duration: bool,
    pub print_on_planned_duration: bool,
    /// Wall-clock time spent inside this node's handlers, paired
    /// start/stop around every dispatch (see [`crate::timer`]).
    timer: Timer,
}

impl NodeInterface {
    pub fn new(node_full_name: impl Into<String>) -> Self {
        Self {
            node_full_name: node_full_name.into(),
            ports: Vec::new(),
            active_phase: None,
            flow_output_assigned: Vec::new(),
            staged_message_port: None,
            print_on_event: false,
            print_on_elapsed_duration: false,
            print_on_planned_duration: false,
            timer: Timer::new(),
        }
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn node_full_name(&self) -> &str {
        &self.node_full_name
    }

    /// Declares a new port, returning its index for use by a typed
    /// handle (`FlowInput<T>`, `MessageOutput<T>`, ...).
    pub fn add_port<T: Clone + fmt::Debug + Send + 'static>(
        &mut self,
        name: impl Into<String>,
        mode: PortMode,
        goal: PortGoal,
        print_on_use: bool,
    ) -> usize {
        let index = self.ports.len();
        self.ports.push(PortSlot {
            name: name.into(),
            mode,
            goal,
            value: None,
            outbox: Vec::new(),
            received_this_event: false,
            to_string: Some(Box::new(|v: &dyn Any| {
                v.downcast_ref::<T>().map(|v| format!("{v:?}")).unwrap_or_default()
            })),
            clone_value: Box::new(|v: &dyn Any| -> Box<dyn Any + Send> {
                Box::new(v.downcast_ref::<T>().expect("port value type mismatch").clone())
            }),
            print_on_use,
        });
        self.flow_output_assigned.push(false);
        index
    }

    /// Type-erased read of a port's current value, used by composite
    /// and collection nodes to forward values across links without
    /// knowing each port's concrete type.
    pub fn copy_value_boxed(&self, index: usize) -> Option<Box<dyn Any + Send>> {
        let slot = &self.ports[index];
        slot.value.as_deref().map(|v| (slot.clone_value)(v))
    }

    /// Clones an arbitrary boxed value using the clone closure
    /// registered for `index`'s element type — used to fan a single
    /// emitted message out to multiple link destinations.
    pub fn clone_boxed(&self, index: usize, value: &(dyn Any + Send)) -> Box<dyn Any + Send> {
        (self.ports[index].clone_value)(value)
    }

    /// Type-erased write of a port's current value (a flow input, or a
    /// delivered message). Does not mark a message as "received" —
    /// callers delivering messages should use [`NodeInterface::receive_message`].
    pub fn set_value_boxed(&mut self, index: usize, value: Box<dyn Any + Send>) {
        self.ports[index].value = Some(value);
    }

    pub fn receive_value_boxed(&mut self, index: usize, value: Box<dyn Any + Send>) {
        self.ports[index].value = Some(value);
        self.ports[index].received_this_event = true;
    }

    pub fn take_outbox_boxed(&mut self, index: usize) -> Vec<Box<dyn Any + Send>> {
        std::mem::take(&mut self.ports[index].outbox)
    }

    pub fn push_outbox_boxed(&mut self, index: usize, value: Box<dyn Any + Send>) {
        self.ports[index].outbox.push(value);
    }

    pub fn mark_flow_output_assigned(&mut self, index: usize) {
        self.flow_output_assigned[index] = true;
    }

    pub fn port_name(&self, index: usize) -> &str {
        &self.ports[index].name
    }

    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.name.as_str())
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn port_mode(&self, index: usize) -> PortMode {
        self.ports[index].mode
    }

    pub fn port_goal(&self, index: usize) -> PortGoal {
        self.ports[index].goal
    }

    pub fn activate_phase(&mut self, phase: PortPhase) {
        self.active_phase = Some(phase);
    }

    pub fn deactivate_phase(&mut self) {
        self.active_phase = None;
    }

    fn require_active(&self, index: usize) -> Result<()> {
        let slot = &self.ports[index];
        match self.active_phase {
            Some((mode, goal)) if mode == slot.mode && goal == slot.goal => Ok(()),
            _ => Err(KernelError::PortNotActive(slot.name.clone())),
        }
    }

    /// Reads the current value of a flow-input or flow-output port.
    pub fn flow_value<T: Clone + fmt::Debug + 'static>(&self, index: usize) -> Result<T> {
        self.require_active(index)?;
        let slot = &self.ports[index];
        slot.value
            .as_ref()
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| KernelError::MissingFlowInput(slot.name.clone()))
    }

    /// Assigns a flow-output port's value, once per simulation.
    pub fn assign_flow_output<T: Clone + fmt::Debug + Send + 'static>(&mut self, index: usize, value: T) -> Result<()> {
        self.require_active(index)?;
        if self.flow_output_assigned[index] {
            return Err(KernelError::DuplicateFlowAssignment(self.ports[index].name.clone()));
        }
        self.ports[index].value = Some(Box::new(value));
        self.flow_output_assigned[index] = true;
        Ok(())
    }

    /// Sets a flow-input port's value from outside the node (used by a
    /// parent composite forwarding an inward or inner link).
    pub fn set_flow_input<T: Clone + fmt::Debug + Send + 'static>(&mut self, index: usize, value: T) {
        self.ports[index].value = Some(Box::new(value));
    }

    pub fn has_flow_input(&self, index: usize) -> bool {
        self.ports[index].value.is_some()
    }

    pub fn clear_flow_inputs(&mut self) {
        for (i, slot) in self.ports.iter_mut().enumerate() {
            if slot.mode == PortMode::Flow && slot.goal == PortGoal::Input {
                slot.value = None;
                self.flow_output_assigned[i] = false;
            }
        }
    }

    /// Delivers a message to a message-input port, to be read this event.
    pub fn receive_message<T: Clone + fmt::Debug + Send + 'static>(&mut self, index: usize, value: T) {
        self.ports[index].value = Some(Box::new(value));
        self.ports[index].received_this_event = true;
    }

    pub fn received(&self, index: usize) -> bool {
        self.ports[index].received_this_event
    }

    /// Stages a message input on a prototype interface for the next
    /// `affect_agent`. Only one port may hold a pending staged message
    /// at a time; staging a second, different port before the first is
    /// consumed (see [`NodeInterface::clear_staged_message`]) is a
    /// `LogicError`.
    pub fn stage_message_input(&mut self, index: usize, value: Box<dyn Any + Send>) -> Result<()> {
        if let Some(staged) = self.staged_message_port {
            if staged != index {
                return Err(KernelError::DuplicatePrototypeMessage);
            }
        }
        self.ports[index].value = Some(value);
        self.ports[index].received_this_event = true;
        self.staged_message_port = Some(index);
        Ok(())
    }

    /// Clears the pending staged message, called once `affect_agent`
    /// has delivered it to an agent.
    pub fn clear_staged_message(&mut self) {
        self.staged_message_port = None;
    }

    pub fn message_value<T: Clone + fmt::Debug + 'static>(&self, index: usize) -> Result<T> {
        self.require_active(index)?;
        let slot = &self.ports[index];
        slot.value
            .as_ref()
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| KernelError::invalid_argument(format!("port `{}` has no message this event", slot.name)))
    }

    /// Appends a value to a message-output port's outgoing list.
    pub fn send_message<T: fmt::Debug + Send + 'static>(&mut self, index: usize, value: T) -> Result<()> {
        self.require_active(index)?;
        self.ports[index].outbox.push(Box::new(value));
        Ok(())
    }

    pub fn take_outbox<T: Clone + 'static>(&mut self, index: usize) -> Vec<T> {
        std::mem::take(&mut self.ports[index].outbox)
            .into_iter()
            .filter_map(|v| v.downcast::<T>().ok().map(|b| *b))
            .collect()
    }

    pub fn outbox_is_empty(&self, index: usize) -> bool {
        self.ports[index].outbox.is_empty()
    }

    pub fn clear_message_inputs(&mut self) {
        for slot in &mut self.ports {
            if slot.mode == PortMode::Message && slot.goal == PortGoal::Input {
                slot.value = None;
                slot.received_this_event = false;
            }
        }
    }

    /// Renders the printable form of a port's value, if one is set and
    /// the port declares itself printable.
    pub fn printable_value(&self, index: usize) -> Option<String> {
        let slot = &self.ports[index];
        if !slot.print_on_use {
            return None;
        }
        let value = slot.value.as_deref()?;
        slot.to_string.as_ref().map(|f| f(value))
    }

    /// Flow inputs declared but never assigned by the time an
    /// initialization or finalization event needs them.
    pub fn unassigned_flow_inputs(&self) -> Vec<&str> {
        self.ports
            .iter()
            .filter(|p| p.mode == PortMode::Flow && p.goal == PortGoal::Input && p.value.is_none())
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn unassigned_flow_outputs(&self) -> Vec<&str> {
        self.ports
            .iter()
            .enumerate()
            .filter(|(i, p)| p.mode == PortMode::Flow && p.goal == PortGoal::Output && !self.flow_output_assigned[*i])
            .map(|(_, p)| p.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_input_round_trips_through_interface() {
        let mut iface = NodeInterface::new("root.model");
        let idx = iface.add_port::<i64>("x", PortMode::Flow, PortGoal::Input, false);
        iface.set_flow_input(idx, 42i64);
        iface.activate_phase((PortMode::Flow, PortGoal::Input));
        assert_eq!(iface.flow_value::<i64>(idx).unwrap(), 42);
    }

    #[test]
    fn accessing_a_port_outside_its_phase_is_an_error() {
        let mut iface = NodeInterface::new("root.model");
        let idx = iface.add_port::<i64>("x", PortMode::Flow, PortGoal::Input, false);
        iface.set_flow_input(idx, 1i64);
        iface.activate_phase((PortMode::Message, PortGoal::Input));
        assert!(iface.flow_value::<i64>(idx).is_err());
    }

    #[test]
    fn flow_output_cannot_be_assigned_twice() {
        let mut iface = NodeInterface::new("root.model");
        let idx = iface.add_port::<i64>("y", PortMode::Flow, PortGoal::Output, false);
        iface.activate_phase((PortMode::Flow, PortGoal::Output));
        iface.assign_flow_output(idx, 1i64).unwrap();
        assert!(iface.assign_flow_output(idx, 2i64).is_err());
    }

    #[test]
    fn staging_the_same_message_port_twice_is_allowed() {
        let mut iface = NodeInterface::new("root.population");
        let idx = iface.add_port::<i64>("in", PortMode::Message, PortGoal::Input, false);
        iface.stage_message_input(idx, Box::new(1i64)).unwrap();
        iface.stage_message_input(idx, Box::new(2i64)).unwrap();
    }

    #[test]
    fn staging_a_second_port_before_the_first_is_consumed_is_rejected() {
        let mut iface = NodeInterface::new("root.population");
        let a = iface.add_port::<i64>("a", PortMode::Message, PortGoal::Input, false);
        let b = iface.add_port::<i64>("b", PortMode::Message, PortGoal::Input, false);
        iface.stage_message_input(a, Box::new(1i64)).unwrap();
        assert!(iface.stage_message_input(b, Box::new(2i64)).is_err());
        iface.clear_staged_message();
        iface.stage_message_input(b, Box::new(2i64)).unwrap();
    }

    #[test]
    fn message_outbox_collects_sent_values() {
        let mut iface = NodeInterface::new("root.model");
        let idx = iface.add_port::<&'static str>("out", PortMode::Message, PortGoal::Output, false);
        iface.activate_phase((PortMode::Message, PortGoal::Output));
        iface.send_message(idx, "hello").unwrap();
        iface.send_message(idx, "world").unwrap();
        let sent: Vec<&'static str> = iface.take_outbox(idx);
        assert_eq!(sent, vec!["hello", "world"]);
        assert!(iface.outbox_is_empty(idx));
    }
}
