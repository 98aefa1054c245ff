//! # sydevs: a discrete-event simulation kernel
//!
//! A cooperative scheduler for dynamic structure DEVS-style models: a
//! node tree of atomic, function, composite, and collection nodes that
//! exchange flow values and messages through typed ports, driven by a
//! single [`Simulation`] at arbitrary-precision time.
//!
//! ## Architecture
//!
//! - [`scale`], [`quantity`], [`time_point`] (in `sydevs-types`): the
//!   dimensioned arithmetic and time representation every node shares.
//! - [`port`]: typed ports and the per-node [`NodeInterface`] that owns
//!   them, gated by the active flow/message phase.
//! - [`node`]: the [`SystemNode`] dispatch contract every node kind
//!   implements.
//! - [`atomic`], [`function`], [`composite`], [`collection`]: the four
//!   node kinds.
//! - [`time_queue`], [`time_cache`]: scheduling primitives shared by
//!   composites, collections, and the top-level [`Simulation`].
//! - [`context`]: the RNG, printer, and current time handed to every
//!   node while it fires.
//! - [`simulation`]: the top-level driver.

pub mod atomic;
pub mod collection;
pub mod composite;
pub mod context;
pub mod discrete_event_time;
pub mod error;
pub mod function;
pub mod node;
pub mod port;
pub mod simulation;
pub mod time_cache;
pub mod time_queue;
pub mod timer;

pub use atomic::{Atomic, AtomicNode};
pub use collection::{AgentTable, Collection, CollectionBehavior};
pub use composite::{Composite, Endpoint, Link};
pub use context::{NodeContext, Printer, Rng, StdRngSource};
pub use discrete_event_time::DiscreteEventTime;
pub use error::{KernelError, NodeError, Result};
pub use function::{Function, FunctionNode};
pub use node::{EventKind, SystemNode};
pub use port::{NodeInterface, PortGoal, PortMode, PortPhase};
pub use simulation::{SimConfig, SimState, Simulation};
pub use time_cache::TimeCache;
pub use time_queue::TimeQueue;
pub use timer::Timer;
