//! Load-dependent failure model (AFTM)
//!
//! Switch failure rate grows with carried load:
//!
//! ```text
//! λ(L)   = λ₀ · L^α
//! R(t,L) = exp(-λ(L) · t)
//! F(t,L) = 1 - R(t,L)
//! ```
//!
//! Servers and storage arrays use the same exponential law with a constant rate.

use san_core::{Result, SanError};

/// Load-dependent failure rate λ(L) = λ₀ · L^α
pub fn failure_rate(load: f64, base_lambda: f64, alpha: f64) -> f64 {
    base_lambda * load.powf(alpha)
}

/// Probability that a component carrying `load` survives until time `t`
pub fn reliability(t: f64, load: f64, base_lambda: f64, alpha: f64) -> Result<f64> {
    if t.is_nan() || t < 0.0 {
        return Err(SanError::invalid_input(format!(
            "time must be non-negative, got {t}"
        )));
    }
    if load <= 0.0 {
        // No load, no load-induced failures
        return Ok(1.0);
    }

    let r = (-failure_rate(load, base_lambda, alpha) * t).exp();
    Ok(r.clamp(0.0, 1.0))
}

/// Probability that a component carrying `load` has failed by time `t`
pub fn failure_probability(t: f64, load: f64, base_lambda: f64, alpha: f64) -> Result<f64> {
    Ok(1.0 - reliability(t, load, base_lambda, alpha)?)
}

/// Survival probability for a constant-rate component (servers, storage)
pub fn constant_rate_reliability(t: f64, lambda: f64) -> Result<f64> {
    if t.is_nan() || t < 0.0 {
        return Err(SanError::invalid_input(format!(
            "time must be non-negative, got {t}"
        )));
    }
    Ok((-lambda * t).exp().clamp(0.0, 1.0))
}
