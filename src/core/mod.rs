mod engine;
mod types;

pub use engine::{apply_favorable_bias, derive_results, favorable_baseline, normalize, simulate};
pub use types::{
    DEFAULT_IMPLEMENTATION_COST, DEFAULT_TIME_HORIZON_MONTHS, PublicSimulation,
    RawSimulationInput, SimulationConstants, SimulationInput, SimulationOutput, SimulationResult,
};
