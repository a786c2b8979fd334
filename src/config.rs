//! Host-supplied, immutable-after-init configuration (§3).

use crate::error::Error;

/// Host-supplied configuration for one EPD slave.
///
/// Validated once by [`Configuration::validate`] before the Startup
/// Configurator runs; immutable for the life of the slave thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Continuous current limit, A. Seeds `motor_rated_current = limit * 1000` mA.
    pub continuous_current_limit: f32,
    /// Initial max_current ceiling, A. Must not exceed the drive's reported MC[1].
    pub peak_current_limit: f32,
    /// Duration before peak -> continuous foldback, s.
    pub peak_current_time: f32,
    /// Maximum profile acceleration, counts/s^2.
    pub max_profile_accel: f64,
    /// Maximum profile deceleration, counts/s^2.
    pub max_profile_decel: f64,
    /// Velocity tracking error fault threshold.
    pub velocity_tracking_error: f64,
    /// Position tracking error fault threshold.
    pub position_tracking_error: f64,
    /// Motor-stuck current level, percent of rated current. Zero disables the check.
    pub motor_stuck_current_level_pct: f32,
    /// Motor-stuck velocity threshold.
    pub motor_stuck_velocity_threshold: f32,
    /// Motor-stuck timeout, s.
    pub motor_stuck_timeout: f32,
    /// Over-speed fault threshold, counts/s.
    pub over_speed_threshold: f64,
    /// Low position limit, counts. Equal to `high_position_limit` disables the check.
    pub low_position_limit: f64,
    /// High position limit, counts. Equal to `low_position_limit` disables the check.
    pub high_position_limit: f64,
    /// Brake engage delay, ms.
    pub brake_engage_msec: i16,
    /// Brake disengage delay, ms.
    pub brake_disengage_msec: i16,
    /// Interpolation period, ms.
    pub loop_period_ms: u8,
    /// Profile-torque slope, A/s.
    pub torque_slope: f64,
    /// Maximum motor speed, counts/s. Converted to rpm at startup via drive counts/rev.
    pub max_motor_speed: f64,
    /// Smoothing factor passed to SF[1].
    pub smooth_factor: i64,
}

impl Configuration {
    /// Check the invariants §3 places on host-supplied values.
    ///
    /// Does not check `peak_current_limit` against the drive's reported
    /// MC[1]; that bound is only known once the Startup Configurator has
    /// read it from the slave and is enforced there.
    pub fn validate(&self) -> Result<(), Error> {
        if self.continuous_current_limit <= 0.0 {
            return Err(Error::Config("continuous_current_limit must be > 0"));
        }
        if self.continuous_current_limit > self.peak_current_limit {
            return Err(Error::Config(
                "continuous_current_limit must not exceed peak_current_limit",
            ));
        }
        if self.max_motor_speed < 0.0 {
            return Err(Error::Config("max_motor_speed must be >= 0"));
        }
        Ok(())
    }

    /// `motor_rated_current` in mA, derived from `continuous_current_limit`.
    pub fn motor_rated_current_ma(&self) -> u32 {
        (self.continuous_current_limit * 1000.0) as u32
    }
}
