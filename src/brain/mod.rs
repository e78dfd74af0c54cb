//! Adaptive scoring brain
//!
//! Skill normalization, the weight store, the decision function, the policy
//! update rule and durable state. The engine facade in [`crate::engine`]
//! wires these together behind a single-writer lock.

pub mod normalizer;
pub mod weights;
pub mod scorer;
pub mod policy;
pub mod state;
pub mod persist;

pub use normalizer::{normalize, normalize_set};
pub use weights::{WeightBounds, WeightEntry, WeightStore};
pub use scorer::Scorer;
pub use policy::{PolicyUpdater, UpdateReport};
pub use state::{BrainState, PersistedState};
pub use persist::{FileStateSink, RetryPolicy, StateSink};
