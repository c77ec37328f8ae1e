pub mod acceptor;
pub mod collector;
pub mod engine;
pub mod error;
pub mod learner;
pub mod stats;
pub mod status;

pub use acceptor::{AcceptOutcome, AcceptorState, PrepareOutcome};
pub use collector::{QuorumCollector, ResponseOutcome};
pub use engine::{choose_value, Decision, PaxosNode};
pub use error::{ConsensusError, Phase};
pub use learner::LearnerState;
pub use stats::{NodeStats, StatsSnapshot};
pub use status::NodeStatus;
