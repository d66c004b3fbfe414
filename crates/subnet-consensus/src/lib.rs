// crates/subnet-consensus/src/lib.rs
//
// subnet-consensus: the per-subnet epoch engine.
//
// Once per tempo the engine turns raw stake and peer-scoring weights into a
// consensus score per participant, an updated bonds matrix carried forward to
// the next epoch, and a split of the emission budget into incentive and
// dividend payouts. Stages run strictly in order:
// weights (preprocessing) -> yuma (consensus, clipping) -> bonds -> allocation,
// gated and persisted by epoch (scheduler).

pub mod allocation;
pub mod bonds;
pub mod epoch;
pub mod weights;
pub mod yuma;

pub use allocation::{PoolSplitPolicy, Pools};
pub use bonds::DenseBonds;
pub use epoch::{EngineConfig, EpochEngine, EpochSchedule};
pub use weights::{preprocess, Preprocessed, WeightMatrix};
pub use yuma::{yuma_consensus, EpochComputation};
