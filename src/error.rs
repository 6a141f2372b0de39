use thiserror::Error;

/// Failures surfaced by a single measurement cycle.
///
/// None of these are retried internally: each indicates a modeling or data
/// defect, and the correction step that raised it has left the filter mean
/// and covariance untouched. The caller decides whether to drop the
/// measurement and continue from the prior state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    /// The innovation covariance S = H·P·Hᵀ + R could not be inverted.
    /// Not expected in normal operation with positive-definite R.
    #[error("innovation covariance is singular")]
    SingularInnovation,

    /// The radar linearization point is at (or within tolerance of) the
    /// origin, where the observation Jacobian is undefined.
    #[error("degenerate radar linearization point near origin (px={px}, py={py})")]
    DegenerateJacobian { px: f64, py: f64 },

    /// A measurement arrived with a timestamp earlier than the last one
    /// processed. Timestamps are an ingestion-layer contract; going
    /// backwards indicates an upstream defect.
    #[error("measurement timestamp {timestamp_us} us precedes previous {previous_us} us")]
    OutOfOrderMeasurement { timestamp_us: i64, previous_us: i64 },
}
