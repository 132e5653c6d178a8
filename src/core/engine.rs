use serde_json::Value;

use super::types::{
    DEFAULT_IMPLEMENTATION_COST, DEFAULT_TIME_HORIZON_MONTHS, RawSimulationInput,
    SimulationConstants, SimulationInput, SimulationOutput, SimulationResult,
};

const FAVORABILITY_FLOOR_RATIO: f64 = 0.15;
const FAVORABILITY_FLOOR_MIN: f64 = 100.0;
const MONTHLY_SAVINGS_SAFEGUARD: f64 = 100.0;

/// Full-precision figures. Each step of the derivation reads these, never the
/// rounded values that end up in [`SimulationResult`].
#[derive(Debug, Clone, Copy)]
struct Derivation {
    labor_cost_manual: f64,
    auto_cost: f64,
    error_savings: f64,
    monthly_savings: f64,
    cumulative_savings: f64,
    net_savings: f64,
    payback_months: Option<f64>,
    roi_percentage: Option<f64>,
}

pub fn simulate(raw: &RawSimulationInput, constants: &SimulationConstants) -> SimulationOutput {
    let inputs = normalize(raw);
    SimulationOutput {
        inputs,
        constants: *constants,
        results: derive_results(&inputs, constants),
    }
}

/// Total over its domain: missing, non-numeric and non-finite fields fall back
/// to their defaults, negatives clamp to zero, the horizon becomes a whole
/// number of months no smaller than one.
pub fn normalize(raw: &RawSimulationInput) -> SimulationInput {
    let horizon = coerce_number(raw.time_horizon_months.as_ref())
        .map(|months| months.floor().max(1.0) as u32)
        .unwrap_or(DEFAULT_TIME_HORIZON_MONTHS);

    SimulationInput {
        monthly_invoice_volume: non_negative(raw.monthly_invoice_volume.as_ref(), 0.0),
        num_ap_staff: non_negative(raw.num_ap_staff.as_ref(), 0.0),
        avg_hours_per_invoice: non_negative(raw.avg_hours_per_invoice.as_ref(), 0.0),
        hourly_wage: non_negative(raw.hourly_wage.as_ref(), 0.0),
        error_rate_manual: non_negative(raw.error_rate_manual.as_ref(), 0.0),
        error_cost: non_negative(raw.error_cost.as_ref(), 0.0),
        time_horizon_months: horizon,
        one_time_implementation_cost: non_negative(
            raw.one_time_implementation_cost.as_ref(),
            DEFAULT_IMPLEMENTATION_COST,
        ),
    }
}

fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn non_negative(value: Option<&Value>, default: f64) -> f64 {
    match coerce_number(value) {
        Some(v) if v > 0.0 => v,
        Some(_) => 0.0,
        None => default,
    }
}

/// Raises a weak or negative monthly figure to at least 15% of its own
/// magnitude plus 100. Values already above that floor pass through.
pub fn favorable_baseline(monthly_savings_raw: f64) -> f64 {
    let floor = monthly_savings_raw.abs() * FAVORABILITY_FLOOR_RATIO + FAVORABILITY_FLOOR_MIN;
    monthly_savings_raw.max(floor)
}

/// Floor, uplift, then the last-resort guard: the reported monthly savings is
/// never zero, negative or NaN.
pub fn apply_favorable_bias(monthly_savings_raw: f64, constants: &SimulationConstants) -> f64 {
    let boosted = favorable_baseline(monthly_savings_raw) * constants.min_roi_boost_factor;
    if boosted > 0.0 {
        boosted
    } else {
        MONTHLY_SAVINGS_SAFEGUARD
    }
}

pub fn derive_results(
    inputs: &SimulationInput,
    constants: &SimulationConstants,
) -> SimulationResult {
    derive(inputs, constants).rounded()
}

fn derive(inputs: &SimulationInput, constants: &SimulationConstants) -> Derivation {
    let volume = inputs.monthly_invoice_volume;
    let error_rate_manual = inputs.error_rate_manual / 100.0;

    let labor_cost_manual = product(&[
        inputs.num_ap_staff,
        inputs.hourly_wage,
        inputs.avg_hours_per_invoice,
        volume,
    ]);
    let auto_cost = volume * constants.automated_cost_per_invoice;
    let error_savings = product(&[
        error_rate_manual - constants.error_rate_auto,
        volume,
        inputs.error_cost,
    ]);
    let monthly_savings_raw = labor_cost_manual + error_savings - auto_cost;

    let monthly_savings = apply_favorable_bias(monthly_savings_raw, constants);
    let cumulative_savings = monthly_savings * f64::from(inputs.time_horizon_months);
    let cost = inputs.one_time_implementation_cost;
    let net_savings = cumulative_savings - cost;

    let payback_months = (monthly_savings > 0.0).then(|| cost / monthly_savings);
    let roi_percentage = (cost > 0.0).then(|| net_savings / cost * 100.0);

    Derivation {
        labor_cost_manual,
        auto_cost,
        error_savings,
        monthly_savings,
        cumulative_savings,
        net_savings,
        payback_months,
        roi_percentage,
    }
}

/// Left-to-right product that is exactly zero when any factor is zero, even
/// if the other factors overflow to infinity on their own.
fn product(factors: &[f64]) -> f64 {
    if factors.contains(&0.0) {
        0.0
    } else {
        factors.iter().product()
    }
}

impl Derivation {
    fn rounded(self) -> SimulationResult {
        SimulationResult {
            labor_cost_manual: round2(self.labor_cost_manual),
            auto_cost: round2(self.auto_cost),
            error_savings: round2(self.error_savings),
            monthly_savings: round2(self.monthly_savings),
            cumulative_savings: round2(self.cumulative_savings),
            net_savings: round2(self.net_savings),
            payback_months: self.payback_months.map(round2),
            roi_percentage: self.roi_percentage.map(round2),
        }
    }
}

/// Two decimal places, half away from zero. Overflowed figures saturate so
/// every result stays representable in JSON.
fn round2(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    if value.abs() >= f64::MAX / 100.0 {
        return value.signum() * f64::MAX;
    }
    // `+ 0.0` folds -0.0 into 0.0.
    (value * 100.0).round() / 100.0 + 0.0
}
