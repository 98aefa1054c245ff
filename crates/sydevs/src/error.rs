//! Kernel-level errors: everything `sydevs_types::Error` covers, plus the
//! node-dispatch and scheduling errors specific to the runtime.

use sydevs_types::Error as ValueError;
use thiserror::Error;

/// Errors raised by the scheduling, dispatch, and composition machinery
/// built on top of the value-type layer.
#[derive(Error, Debug)]
pub enum KernelError {
    // -- value-layer errors, surfaced unchanged --
    #[error(transparent)]
    Value(#[from] ValueError),

    // -- scheduling errors --
    #[error("no events exist to constrain time advancement")]
    QueueEmpty,
    #[error("advancement duration must not set current time later than imminent events")]
    AdvanceBeyondImminent,
    #[error("advancement time must be later than current time of the time queue")]
    AdvanceBeforeCurrentTime,
    #[error("no imminent event has id {0}")]
    NoSuchImminentEvent(i64),
    #[error("duration time index {0} is out of range")]
    TimeIndexOutOfRange(i64),

    // -- port / interface errors --
    #[error("port `{0}` accessed outside its active phase")]
    PortNotActive(String),
    #[error("flow output `{0}` assigned more than once")]
    DuplicateFlowAssignment(String),
    #[error("flow input `{0}` was never assigned before the flow event")]
    MissingFlowInput(String),
    #[error("message input set on two ports of the prototype at once")]
    DuplicatePrototypeMessage,

    // -- composite / collection errors --
    #[error("link source/destination `{0}` does not belong to this composite")]
    LinkOutOfScope(String),
    #[error("link type mismatch on port `{0}`")]
    LinkTypeMismatch(String),
    #[error("agent id already in use")]
    AgentIdCollision,
    #[error("no agent with the given id exists")]
    NoSuchAgent,
    #[error("cannot create an agent in a flow-only collection")]
    FlowOnlyCollection,

    // -- simulation driver errors --
    #[error("the root node of a simulation must have no ports")]
    RootNodeHasPorts,

    // -- dispatch errors --
    #[error("node `{node_path}`: {source}")]
    Node {
        node_path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl KernelError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::Value(ValueError::invalid_argument(msg))
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Value(ValueError::domain(msg))
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self::Value(ValueError::logic(msg))
    }

    /// Wraps an error escaping a user handler, prepending the node's full
    /// path: any exception from a user handler is caught, annotated, and
    /// re-raised so the caller can tell which node in the tree failed.
    pub fn from_node(node_path: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Node {
            node_path: node_path.into(),
            source: Box::new(source),
        }
    }

    /// Like [`KernelError::from_node`] but for a boxed, type-erased cause
    /// (used when re-wrapping a `KernelError` that already escaped an
    /// inner node, to avoid double boxing its path into the message).
    pub fn from_node_boxed(node_path: impl Into<String>, source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Node {
            node_path: node_path.into(),
            source,
        }
    }
}

/// Alias kept for call sites that want to name the node-dispatch variant
/// directly by its conventional external name.
pub type NodeError = KernelError;

pub type Result<T> = std::result::Result<T, KernelError>;
