//! Clamped ramp regressors for change-point models.
//!
//! - heating ramp: `max(cp - T, 0)`, active below the change point
//! - cooling ramp: `max(T - cp, 0)`, active above the change point
//!
//! Both are continuous in `T` with a single kink at `cp`.

/// Heating degrees below the change point.
#[inline]
pub fn heating_ramp(t: f64, cp: f64) -> f64 {
    (cp - t).max(0.0)
}

/// Cooling degrees above the change point.
#[inline]
pub fn cooling_ramp(t: f64, cp: f64) -> f64 {
    (t - cp).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_clamp_to_zero_on_the_inactive_side() {
        assert_eq!(heating_ramp(60.0, 55.0), 0.0);
        assert_eq!(heating_ramp(50.0, 55.0), 5.0);
        assert_eq!(cooling_ramp(60.0, 70.0), 0.0);
        assert_eq!(cooling_ramp(75.0, 70.0), 5.0);
    }

    #[test]
    fn ramps_are_zero_at_the_kink() {
        assert_eq!(heating_ramp(55.0, 55.0), 0.0);
        assert_eq!(cooling_ramp(55.0, 55.0), 0.0);
    }
}
