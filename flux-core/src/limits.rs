//! System limits and configuration bounds.
//!
//! Following `TigerStyle`: put limits on everything.
//! Every pool, queue, and frame has an explicit maximum size.
//! This prevents unbounded growth and makes the system predictable.

/// System-wide limits for the exchange data-plane.
///
/// All limits are explicit and configurable. Default values are chosen
/// to be safe for most deployments while allowing customization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    // Frame limits.
    /// Maximum payload size of a single spilled unit in bytes.
    pub max_unit_payload_bytes: u32,

    // Read-ahead limits.
    /// Maximum number of scratch segments in one reader pool.
    pub max_read_segments: u32,
    /// Default number of scratch segments per reader (read-ahead depth).
    pub default_read_segments: u32,
    /// Default capacity of one scratch segment in bytes.
    pub default_segment_bytes: u32,

    // Queue limits.
    /// Maximum number of units queued in one pipelined subpartition.
    pub max_queued_units: u32,
}

impl Limits {
    /// Creates limits with safe defaults.
    ///
    /// These defaults are chosen to be conservative and safe for most
    /// deployments. Production systems should tune these based on their
    /// hardware and workload characteristics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            // Frames: 8MB max unit payload.
            max_unit_payload_bytes: 8 * 1024 * 1024,

            // Read-ahead: 2 segments of 32KB by default, 256 max.
            max_read_segments: 256,
            default_read_segments: 2,
            default_segment_bytes: 32 * 1024,

            // Queues: 64k in-flight units per subpartition.
            max_queued_units: 64 * 1024,
        }
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns an error if any limits are invalid or inconsistent.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_unit_payload_bytes == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_unit_payload_bytes",
                reason: "must be positive",
            });
        }

        if self.default_read_segments == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "default_read_segments",
                reason: "must be positive",
            });
        }

        if self.default_read_segments > self.max_read_segments {
            return Err(crate::Error::InvalidArgument {
                name: "default_read_segments",
                reason: "must be <= max_read_segments",
            });
        }

        if self.default_segment_bytes == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "default_segment_bytes",
                reason: "must be positive",
            });
        }

        if self.max_queued_units == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_queued_units",
                reason: "must be positive",
            });
        }

        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_valid() {
        let limits = Limits::new();
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_zero_payload_size() {
        let mut limits = Limits::new();
        limits.max_unit_payload_bytes = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_zero_read_segments() {
        let mut limits = Limits::new();
        limits.default_read_segments = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_read_segments_above_max() {
        let mut limits = Limits::new();
        limits.default_read_segments = limits.max_read_segments + 1;
        assert!(limits.validate().is_err());
    }
}
