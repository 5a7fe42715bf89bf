//! Protocol configuration.

use serde::{Deserialize, Serialize};

use crate::error::DkgError;

/// Block counts for the twelve GJKR phases, ephemeral key generation through
/// combination. Zero-block phases are purely local computation.
pub const DEFAULT_BLOCKS_PER_PHASE: [u32; 12] = [3, 0, 3, 3, 0, 0, 3, 3, 0, 1, 0, 0];

/// Parameters of one DKG session.
///
/// The group tolerates up to `dishonest_threshold` misbehaving members, and
/// any `honest_threshold + 1` qualified members can later produce a group
/// signature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Number of members in the group
    pub group_size: u32,
    /// T: the degree of each member's secret polynomials
    pub honest_threshold: u32,
    /// M: maximum number of dishonest members tolerated
    pub dishonest_threshold: u32,
    /// Synchronization window, in block ticks, for each GJKR phase
    pub blocks_per_phase: [u32; 12],
}

impl ProtocolConfig {
    /// Create a configuration with the default phase timing.
    ///
    /// Requires `group_size > honest_threshold > dishonest_threshold`.
    pub fn new(
        group_size: u32,
        honest_threshold: u32,
        dishonest_threshold: u32,
    ) -> Result<Self, DkgError> {
        let config = Self {
            group_size,
            honest_threshold,
            dishonest_threshold,
            blocks_per_phase: DEFAULT_BLOCKS_PER_PHASE,
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the per-phase block counts.
    pub fn with_blocks_per_phase(mut self, blocks_per_phase: [u32; 12]) -> Self {
        self.blocks_per_phase = blocks_per_phase;
        self
    }

    pub fn validate(&self) -> Result<(), DkgError> {
        if self.group_size <= self.honest_threshold {
            return Err(DkgError::ConfigInvalid(format!(
                "group size {} must exceed honest threshold {}",
                self.group_size, self.honest_threshold
            )));
        }
        if self.honest_threshold <= self.dishonest_threshold {
            return Err(DkgError::ConfigInvalid(format!(
                "honest threshold {} must exceed dishonest threshold {}",
                self.honest_threshold, self.dishonest_threshold
            )));
        }
        Ok(())
    }

    /// The minimum number of qualified members for the session to finalize.
    pub fn quorum(&self) -> usize {
        self.honest_threshold as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = ProtocolConfig::new(5, 2, 1).unwrap();
        assert_eq!(config.group_size, 5);
        assert_eq!(config.quorum(), 3);
        assert_eq!(config.blocks_per_phase, DEFAULT_BLOCKS_PER_PHASE);
    }

    #[test]
    fn test_group_size_must_exceed_honest_threshold() {
        assert!(matches!(
            ProtocolConfig::new(3, 3, 1),
            Err(DkgError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_honest_must_exceed_dishonest_threshold() {
        assert!(matches!(
            ProtocolConfig::new(5, 2, 2),
            Err(DkgError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_zero_dishonest_threshold_allowed() {
        assert!(ProtocolConfig::new(3, 1, 0).is_ok());
    }
}
