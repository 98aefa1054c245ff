//! Collection nodes: own a dynamically-sized, homogeneous population
//! of "agent" nodes addressed by an application-chosen sortable id,
//! scheduled alongside a sentinel macro event.

use std::any::Any;
use std::collections::HashMap;

use sydevs_types::{Duration, Scale, SortableQualified};

use crate::context::NodeContext;
use crate::error::{KernelError, Result};
use crate::node::{dispatch, SystemNode};
use crate::port::{NodeInterface, PortGoal, PortMode};
use crate::time_cache::TimeCache;
use crate::time_queue::TimeQueue;

/// Sentinel id, always scheduled alongside real agent ids; when it is
/// the imminent entry, the macro planned handler fires instead of an
/// agent's own planned handler.
pub const MACRO_EVENT_ID: i64 = i64::MAX;

/// True when a prototype declares no message ports — mirroring
/// `FunctionNode`'s `node_dmode() == flow`, a flow-only collection's
/// agents are never scheduled and must go through `invoke_agent`.
fn prototype_is_flow_only(prototype: &NodeInterface) -> bool {
    (0..prototype.port_count()).all(|p| prototype.port_mode(p) != PortMode::Message)
}

/// Copies every staged flow input from `prototype` onto `node`'s
/// same-indexed ports, ahead of the agent's initialization event.
fn copy_staged_flow_inputs(prototype: &NodeInterface, node: &mut dyn SystemNode) {
    for p in 0..prototype.port_count() {
        if prototype.port_mode(p) == PortMode::Flow && prototype.port_goal(p) == PortGoal::Input {
            if let Some(value) = prototype.copy_value_boxed(p) {
                node.interface_mut().set_value_boxed(p, value);
            }
        }
    }
}

/// Owns the agent population, their individual schedules, and the
/// bookkeeping needed to defer real deletion of a removed agent to the
/// end of the current macro event (so callers may safely iterate
/// `ids()` while removing agents mid-event).
pub struct AgentTable<Id: SortableQualified> {
    agents: HashMap<Id, Box<dyn SystemNode>>,
    index_of: HashMap<Id, i64>,
    id_of: HashMap<i64, Id>,
    next_index: i64,
    queue: TimeQueue,
    cache: TimeCache,
    pending_removal: Vec<Id>,
}

impl<Id: SortableQualified> AgentTable<Id> {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            index_of: HashMap::new(),
            id_of: HashMap::new(),
            next_index: 0,
            queue: TimeQueue::new(),
            cache: TimeCache::new(),
            pending_removal: Vec::new(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.agents.keys()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.agents.contains_key(id)
    }

    pub fn agent(&self, id: &Id) -> Option<&dyn SystemNode> {
        self.agents.get(id).map(|b| b.as_ref())
    }

    pub fn agent_mut(&mut self, id: &Id) -> Option<&mut (dyn SystemNode + 'static)> {
        self.agents.get_mut(id).map(|b| b.as_mut())
    }

    fn fresh_index(&mut self) -> i64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Elapsed duration since `index`'s last retained event, rounded to
    /// `precision`; `0_s` if `precision` is [`Scale::NO_SCALE`] (the
    /// agent declared it cannot report elapsed durations) or if there
    /// is no prior retention to compare against.
    fn elapsed_at(&self, index: i64, precision: Scale, ctx: &NodeContext) -> Duration {
        if precision.is_no_scale() {
            return Duration::zero();
        }
        let dt = self.cache.duration_since(index, ctx.time().t());
        if dt.finite() {
            dt
        } else {
            Duration::zero()
        }
    }

    fn retain_at(&mut self, index: i64, precision: Scale, ctx: &NodeContext) {
        if precision.is_no_scale() {
            self.cache.release_event(index);
        } else {
            self.cache.retain_event(index, precision, ctx.time().t());
        }
    }

    /// Adds a new agent and runs its initialization event. `LogicError`
    /// if `id` is already in use, or if `prototype` declares no message
    /// ports (a flow-only collection's agents go through
    /// [`AgentTable::invoke_agent`] instead).
    pub fn create_agent(&mut self, id: Id, mut node: Box<dyn SystemNode>, ctx: &mut NodeContext, prototype: &NodeInterface) -> Result<()> {
        if prototype_is_flow_only(prototype) {
            return Err(KernelError::FlowOnlyCollection);
        }
        if self.agents.contains_key(&id) {
            return Err(KernelError::AgentIdCollision);
        }
        copy_staged_flow_inputs(prototype, node.as_mut());
        let dt = node.initialization_event(ctx)?;
        let precision = node.time_precision();
        let index = self.fresh_index();
        self.index_of.insert(id.clone(), index);
        self.id_of.insert(index, id.clone());
        self.retain_at(index, precision, ctx);
        if dt.infinite() {
            self.queue.cancel_event(index);
        } else {
            self.queue.plan_event(index, dt)?;
        }
        self.agents.insert(id, node);
        Ok(())
    }

    /// Delivers a message to one of an agent's ports, firing its
    /// unplanned handler and rescheduling it. Clears the prototype's
    /// staged-message bookkeeping, freeing it for the next `access(...)`.
    pub fn affect_agent(&mut self, id: &Id, port: usize, value: Box<dyn Any + Send>, ctx: &mut NodeContext, prototype: &mut NodeInterface) -> Result<()> {
        prototype.clear_staged_message();
        let Some(&index) = self.index_of.get(id) else {
            return Err(KernelError::NoSuchAgent);
        };
        let node = self.agents.get_mut(id).ok_or(KernelError::NoSuchAgent)?;
        node.interface_mut().receive_value_boxed(port, value);
        let precision = node.time_precision();
        let elapsed = self.elapsed_at(index, precision, ctx);
        let node = self.agents.get_mut(id).ok_or(KernelError::NoSuchAgent)?;
        let dt = node.unplanned_event(ctx, elapsed)?;
        self.retain_at(index, precision, ctx);
        if dt.infinite() {
            self.queue.cancel_event(index);
        } else {
            self.queue.plan_event(index, dt)?;
        }
        Ok(())
    }

    /// Finalizes and removes an agent, copying its flow outputs into
    /// the prototype's interface. Actual removal from `agents` is
    /// deferred to [`AgentTable::flush_removals`], called at the end
    /// of the current macro event, so iterating `ids()` mid-event
    /// remains safe.
    pub fn remove_agent(&mut self, id: &Id, ctx: &mut NodeContext, prototype: &mut NodeInterface) -> Result<()> {
        let &index = self.index_of.get(id).ok_or(KernelError::NoSuchAgent)?;
        let node = self.agents.get_mut(id).ok_or(KernelError::NoSuchAgent)?;
        let precision = node.time_precision();
        let elapsed = self.elapsed_at(index, precision, ctx);
        let node = self.agents.get_mut(id).ok_or(KernelError::NoSuchAgent)?;
        node.finalization_event(ctx, elapsed)?;
        for p in 0..node.interface().port_count() {
            if let Some(value) = node.interface().copy_value_boxed(p) {
                prototype.set_value_boxed(p, value);
            }
        }
        self.queue.cancel_event(index);
        self.cache.release_event(index);
        self.pending_removal.push(id.clone());
        Ok(())
    }

    /// Creates, initializes, finalizes, and immediately destroys an
    /// agent in one step — for flow-only agents in a flow-only
    /// collection, which never receive an unplanned/planned event.
    pub fn invoke_agent(&mut self, id: Id, mut node: Box<dyn SystemNode>, ctx: &mut NodeContext, prototype: &mut NodeInterface) -> Result<()> {
        copy_staged_flow_inputs(prototype, node.as_mut());
        node.initialization_event(ctx)?;
        node.finalization_event(ctx, Duration::zero())?;
        for p in 0..node.interface().port_count() {
            if let Some(value) = node.interface().copy_value_boxed(p) {
                prototype.set_value_boxed(p, value);
            }
        }
        let _ = id;
        Ok(())
    }

    /// Deletes every agent queued by [`AgentTable::remove_agent`]
    /// since the last flush. Must only be called at a macro event
    /// boundary.
    pub fn flush_removals(&mut self) {
        for id in self.pending_removal.drain(..) {
            if let Some(index) = self.index_of.remove(&id) {
                self.id_of.remove(&index);
            }
            self.agents.remove(&id);
        }
    }

    pub fn imminent_duration(&self) -> Duration {
        self.queue.imminent_duration()
    }

    /// Ids whose planned event is imminent this event, excluding the
    /// macro-event sentinel.
    pub fn pop_imminent_agent_ids(&mut self) -> Result<Vec<Id>> {
        if self.queue.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self.queue.imminent_event_ids()?.clone();
        if ids.contains(&MACRO_EVENT_ID) {
            return Ok(Vec::new());
        }
        self.queue.pop_imminent_events()?;
        Ok(ids.into_iter().filter_map(|i| self.id_of.get(&i).cloned()).collect())
    }

    pub fn is_macro_imminent(&self) -> Result<bool> {
        if self.queue.is_empty() {
            return Ok(false);
        }
        Ok(self.queue.imminent_event_ids()?.contains(&MACRO_EVENT_ID))
    }

    pub fn pop_macro_event(&mut self) -> Result<()> {
        self.queue.pop_imminent_event(MACRO_EVENT_ID)
    }

    pub fn reschedule_macro(&mut self, dt: Duration) -> Result<()> {
        if dt.infinite() {
            self.queue.cancel_event(MACRO_EVENT_ID);
            Ok(())
        } else {
            self.queue.plan_event(MACRO_EVENT_ID, dt)
        }
    }

    /// Fires an imminent agent's planned handler, rescheduling it, and
    /// returns the elapsed duration it was given — passed on to
    /// [`CollectionBehavior::micro_planned_event`] by the caller.
    fn fire_agent_planned(&mut self, id: &Id, ctx: &mut NodeContext) -> Result<Duration> {
        let &index = self.index_of.get(id).ok_or(KernelError::NoSuchAgent)?;
        let node = self.agents.get_mut(id).ok_or(KernelError::NoSuchAgent)?;
        let precision = node.time_precision();
        let elapsed = self.elapsed_at(index, precision, ctx);
        let node = self.agents.get_mut(id).ok_or(KernelError::NoSuchAgent)?;
        let dt = node.planned_event(ctx, elapsed)?;
        self.retain_at(index, precision, ctx);
        if dt.infinite() {
            self.queue.cancel_event(index);
        } else {
            self.queue.plan_event(index, dt)?;
        }
        Ok(elapsed)
    }
}

impl<Id: SortableQualified> Default for AgentTable<Id> {
    fn default() -> Self {
        Self::new()
    }
}

/// User-implemented collection behavior: the macro handlers that govern
/// the whole agent population, plus one micro handler run once per
/// imminent agent.
pub trait CollectionBehavior<Id: SortableQualified> {
    fn node_full_name(&self) -> &str;
    fn prototype(&self) -> &NodeInterface;
    fn prototype_mut(&mut self) -> &mut NodeInterface;

    fn macro_initialization_event(&mut self, ctx: &mut NodeContext, agents: &mut AgentTable<Id>) -> Result<Duration>;
    fn macro_unplanned_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration, agents: &mut AgentTable<Id>) -> Result<Duration>;
    fn micro_planned_event(&mut self, ctx: &mut NodeContext, agent_id: &Id, elapsed_dt: Duration, agents: &mut AgentTable<Id>) -> Result<()>;
    fn macro_planned_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration, agents: &mut AgentTable<Id>) -> Result<Duration>;
    fn macro_finalization_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration, agents: &mut AgentTable<Id>) -> Result<()>;
}

/// Wraps a [`CollectionBehavior`] and its agent table as one node in
/// the tree, dispatching the [`MACRO_EVENT_ID`] sentinel alongside each
/// agent's own micro event.
pub struct Collection<Id: SortableQualified, B: CollectionBehavior<Id>> {
    behavior: B,
    agents: AgentTable<Id>,
}

impl<Id: SortableQualified, B: CollectionBehavior<Id>> Collection<Id, B> {
    pub fn new(behavior: B) -> Self {
        Self { behavior, agents: AgentTable::new() }
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn agents(&self) -> &AgentTable<Id> {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut AgentTable<Id> {
        &mut self.agents
    }
}

impl<Id: SortableQualified, B: CollectionBehavior<Id>> SystemNode for Collection<Id, B> {
    fn node_full_name(&self) -> &str {
        self.behavior.node_full_name()
    }

    fn interface(&self) -> &NodeInterface {
        self.behavior.prototype()
    }

    fn interface_mut(&mut self) -> &mut NodeInterface {
        self.behavior.prototype_mut()
    }

    fn time_precision(&self) -> Scale {
        Scale::NO_SCALE
    }

    fn initialization_event(&mut self, ctx: &mut NodeContext) -> Result<Duration> {
        let node_full_name = self.behavior.node_full_name().to_string();
        self.behavior.prototype_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            let dt = self.behavior.macro_initialization_event(ctx, &mut self.agents)?;
            self.agents.reschedule_macro(dt)?;
            Ok(self.agents.imminent_duration())
        });
        self.behavior.prototype_mut().timer_mut().stop();
        result
    }

    fn unplanned_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<Duration> {
        let node_full_name = self.behavior.node_full_name().to_string();
        self.behavior.prototype_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            let dt = self.behavior.macro_unplanned_event(ctx, elapsed_dt, &mut self.agents)?;
            self.agents.reschedule_macro(dt)?;
            Ok(self.agents.imminent_duration())
        });
        self.behavior.prototype_mut().timer_mut().stop();
        result
    }

    fn planned_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<Duration> {
        let node_full_name = self.behavior.node_full_name().to_string();
        self.behavior.prototype_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            if self.agents.is_macro_imminent()? {
                self.agents.pop_macro_event()?;
                let dt = self.behavior.macro_planned_event(ctx, elapsed_dt, &mut self.agents)?;
                self.agents.reschedule_macro(dt)?;
            } else {
                let ids = self.agents.pop_imminent_agent_ids()?;
                for id in ids {
                    let agent_elapsed = self.agents.fire_agent_planned(&id, ctx)?;
                    self.behavior.micro_planned_event(ctx, &id, agent_elapsed, &mut self.agents)?;
                }
            }
            self.agents.flush_removals();
            Ok(self.agents.imminent_duration())
        });
        self.behavior.prototype_mut().timer_mut().stop();
        result
    }

    fn finalization_event(&mut self, ctx: &mut NodeContext, elapsed_dt: Duration) -> Result<()> {
        let node_full_name = self.behavior.node_full_name().to_string();
        self.behavior.prototype_mut().timer_mut().start();
        let result = dispatch(&node_full_name, || {
            self.behavior.macro_finalization_event(ctx, elapsed_dt, &mut self.agents)?;
            self.agents.flush_removals();
            Ok(())
        });
        self.behavior.prototype_mut().timer_mut().stop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::{Atomic, AtomicNode};
    use crate::context::{Printer, StdRngSource};
    use crate::port::{PortGoal, PortMode};
    use sydevs_types::levels;

    #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
    struct AgentId(u64);

    struct Ticker {
        iface: NodeInterface,
    }

    impl Ticker {
        fn new() -> Self {
            Self { iface: NodeInterface::new("agent") }
        }
    }

    impl AtomicNode for Ticker {
        fn node_full_name(&self) -> &str {
            "agent"
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
            Ok(Duration::inf())
        }
        fn handle_finalization(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<()> {
            Ok(())
        }
    }

    struct Population {
        iface: NodeInterface,
        spawned: bool,
    }

    /// A message-capable prototype: declares one message-input port, so
    /// the collection is not mistaken for a flow-only one.
    fn message_capable_prototype() -> NodeInterface {
        let mut iface = NodeInterface::new("root.population");
        iface.add_port::<i64>("msg_in", PortMode::Message, PortGoal::Input, false);
        iface
    }

    impl CollectionBehavior<AgentId> for Population {
        fn node_full_name(&self) -> &str {
            "root.population"
        }
        fn prototype(&self) -> &NodeInterface {
            &self.iface
        }
        fn prototype_mut(&mut self) -> &mut NodeInterface {
            &mut self.iface
        }
        fn macro_initialization_event(&mut self, ctx: &mut NodeContext, agents: &mut AgentTable<AgentId>) -> Result<Duration> {
            agents.create_agent(AgentId(0), Box::new(Atomic::new(Ticker::new())), ctx, &self.iface)?;
            self.spawned = true;
            Ok(Duration::inf())
        }
        fn macro_unplanned_event(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration, _agents: &mut AgentTable<AgentId>) -> Result<Duration> {
            Ok(Duration::inf())
        }
        fn micro_planned_event(&mut self, _ctx: &mut NodeContext, _agent_id: &AgentId, _elapsed_dt: Duration, _agents: &mut AgentTable<AgentId>) -> Result<()> {
            Ok(())
        }
        fn macro_planned_event(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration, _agents: &mut AgentTable<AgentId>) -> Result<Duration> {
            Ok(Duration::inf())
        }
        fn macro_finalization_event(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration, _agents: &mut AgentTable<AgentId>) -> Result<()> {
            Ok(())
        }
    }

    fn ctx() -> NodeContext {
        NodeContext::new(Box::new(StdRngSource::from_seed(0)), Printer::new(std::io::sink()))
    }

    #[test]
    fn collection_creates_and_schedules_an_agent_on_initialization() {
        let mut collection = Collection::new(Population { iface: message_capable_prototype(), spawned: false });
        let mut ctx = ctx();
        collection.initialization_event(&mut ctx).unwrap();
        assert!(collection.behavior().spawned);
        assert_eq!(collection.agents().len(), 1);
        assert_eq!(collection.agents().imminent_duration(), Duration::new_fixed(1, levels::UNIT));
    }

    #[test]
    fn collection_integrity_holds_at_the_macro_event_boundary() {
        let mut collection = Collection::new(Population { iface: message_capable_prototype(), spawned: false });
        let mut ctx = ctx();
        collection.initialization_event(&mut ctx).unwrap();
        collection.planned_event(&mut ctx, Duration::zero()).unwrap();
        let ids: Vec<_> = collection.agents().ids().cloned().collect();
        assert_eq!(ids, vec![AgentId(0)]);
    }

    #[test]
    fn create_agent_on_a_flow_only_prototype_is_rejected() {
        let mut agents: AgentTable<AgentId> = AgentTable::new();
        let flow_only_prototype = NodeInterface::new("root.population");
        let mut ctx = ctx();
        let err = agents
            .create_agent(AgentId(0), Box::new(Atomic::new(Ticker::new())), &mut ctx, &flow_only_prototype)
            .unwrap_err();
        assert!(matches!(err, KernelError::FlowOnlyCollection));
        assert!(agents.is_empty());
    }

    #[test]
    fn create_agent_on_a_message_capable_prototype_succeeds() {
        let mut agents: AgentTable<AgentId> = AgentTable::new();
        let prototype = message_capable_prototype();
        let mut ctx = ctx();
        agents
            .create_agent(AgentId(0), Box::new(Atomic::new(Ticker::new())), &mut ctx, &prototype)
            .unwrap();
        assert_eq!(agents.len(), 1);
    }
}
