//! Triode transfer-equation building blocks.
//!
//! Every triode family computes an "effective voltage" `e` and then applies the
//! same power law:
//!
//! - `ia = e^alpha / kg` for `e > 0`
//! - `ia = 0` otherwise
//!
//! Numerical notes:
//! - `e` is clamped to `>= 0` so the power law never sees a negative base.
//! - NaN is *not* clamped: a singular evaluation (e.g. `0/0` when `kvb = 0` at
//!   `va = 0`) must stay visible so the fitter can reject that step.
//! - `ln(1 + exp(x))` is evaluated literally; overflow yields `inf`, which the
//!   fitter also treats as a rejected step.

/// Simple (Child–Langmuir style) effective voltage: `va/mu + vg + vct`.
pub fn simple_effective(va: f64, vg: f64, vct: f64, mu: f64) -> f64 {
    va / mu + vg + vct
}

/// Koren effective voltage.
///
/// `s = sqrt(kvb + va²)`, `x = kp (1/mu + vg/s)`, `e = (va/kp) ln(1 + e^x)`.
pub fn koren_effective(va: f64, vg: f64, kp: f64, kvb: f64, mu: f64) -> f64 {
    let s = (kvb + va * va).sqrt();
    let x = kp * (1.0 / mu + vg / s);
    clamp_non_negative((va / kp) * softplus(x))
}

/// Improved Koren effective voltage.
///
/// `s = sqrt(kvb + va² + kvb2 va)`, `x = kp (1/mu + (vg + vct)/s)`,
/// `e = (va/kp) ln(1 + e^x)`.
pub fn improved_koren_effective(va: f64, vg: f64, kp: f64, kvb: f64, kvb2: f64, vct: f64, mu: f64) -> f64 {
    let s = (kvb + va * va + kvb2 * va).sqrt();
    let x = kp * (1.0 / mu + (vg + vct) / s);
    clamp_non_negative((va / kp) * softplus(x))
}

/// Shared power law `e^alpha / kg`, zero at and below cutoff.
pub fn power_law(e: f64, alpha: f64, kg: f64) -> f64 {
    if e <= 0.0 {
        return 0.0;
    }
    e.powf(alpha) / kg
}

/// `ln(1 + exp(x))`.
pub fn softplus(x: f64) -> f64 {
    x.exp().ln_1p()
}

fn clamp_non_negative(e: f64) -> f64 {
    if e < 0.0 { 0.0 } else { e }
}
