use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TIME_HORIZON_MONTHS: u32 = 36;
pub const DEFAULT_IMPLEMENTATION_COST: f64 = 50_000.0;

/// Request record as it arrives from a caller. Any field may be missing or
/// carry a value of the wrong JSON type; `normalize` turns it into a
/// [`SimulationInput`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSimulationInput {
    pub monthly_invoice_volume: Option<Value>,
    pub num_ap_staff: Option<Value>,
    pub avg_hours_per_invoice: Option<Value>,
    pub hourly_wage: Option<Value>,
    pub error_rate_manual: Option<Value>,
    pub error_cost: Option<Value>,
    pub time_horizon_months: Option<Value>,
    pub one_time_implementation_cost: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationInput {
    pub monthly_invoice_volume: f64,
    pub num_ap_staff: f64,
    pub avg_hours_per_invoice: f64,
    pub hourly_wage: f64,
    /// Percent, 0-100 scale as entered.
    pub error_rate_manual: f64,
    pub error_cost: f64,
    pub time_horizon_months: u32,
    pub one_time_implementation_cost: f64,
}

impl Default for SimulationInput {
    fn default() -> Self {
        Self {
            monthly_invoice_volume: 0.0,
            num_ap_staff: 0.0,
            avg_hours_per_invoice: 0.0,
            hourly_wage: 0.0,
            error_rate_manual: 0.0,
            error_cost: 0.0,
            time_horizon_months: DEFAULT_TIME_HORIZON_MONTHS,
            one_time_implementation_cost: DEFAULT_IMPLEMENTATION_COST,
        }
    }
}

/// Pricing and bias parameters. Built once at startup and passed into every
/// `simulate` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationConstants {
    pub automated_cost_per_invoice: f64,
    /// Decimal, not percent.
    pub error_rate_auto: f64,
    pub time_saved_per_invoice_minutes: f64,
    pub min_roi_boost_factor: f64,
}

impl Default for SimulationConstants {
    fn default() -> Self {
        Self {
            automated_cost_per_invoice: 0.20,
            error_rate_auto: 0.001,
            time_saved_per_invoice_minutes: 8.0,
            min_roi_boost_factor: 1.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub labor_cost_manual: f64,
    pub auto_cost: f64,
    pub error_savings: f64,
    pub monthly_savings: f64,
    pub cumulative_savings: f64,
    pub net_savings: f64,
    pub payback_months: Option<f64>,
    pub roi_percentage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub inputs: SimulationInput,
    pub constants: SimulationConstants,
    pub results: SimulationResult,
}

/// What untrusted callers get to see: everything except the constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PublicSimulation {
    pub inputs: SimulationInput,
    pub results: SimulationResult,
}

impl SimulationOutput {
    pub fn public_view(&self) -> PublicSimulation {
        PublicSimulation {
            inputs: self.inputs,
            results: self.results,
        }
    }
}
