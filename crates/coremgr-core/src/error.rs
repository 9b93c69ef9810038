use coremgr_dsa::{AllocationFailure, CoreId};
use nix::errno::Errno;

/// Errors raised by the core manager.
///
/// Every variant is returned at the point of failure; nothing is retried.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreManagerError {
    /// The request cannot be met from the free pool.
    #[error("cannot reserve cores for '{consumer}': {reason}")]
    AllocationFailed {
        consumer: String,
        reason: AllocationFailure,
    },

    /// Consumer names must be non-empty.
    #[error("consumer name must not be empty")]
    InvalidConsumer,

    /// The kernel refused an affinity mask.
    #[error("failed to set affinity to cpu mask [{mask}]: {source}")]
    AffinitySettingFailed {
        mask: String,
        #[source]
        source: Errno,
    },

    /// The calling thread's affinity could not be read.
    #[error("failed to read the calling thread's affinity: {0}")]
    AffinityGettingFailed(#[source] Errno),

    /// The calling thread's affinity read back empty.
    #[error("calling thread has no cpu affinity set")]
    AffinityNotSet,

    /// Core id beyond what a kernel cpu set can hold.
    #[error("core {core} is out of range (max core is {max})")]
    CoreOutOfRange { core: CoreId, max: CoreId },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreManagerError::AllocationFailed {
            consumer: "trigger".to_string(),
            reason: AllocationFailure::NodeExhausted(1),
        };
        assert_eq!(
            err.to_string(),
            "cannot reserve cores for 'trigger': NUMA node 1 has no free cores"
        );

        let err = CoreManagerError::AffinitySettingFailed {
            mask: "0-3".to_string(),
            source: Errno::EINVAL,
        };
        assert!(err.to_string().starts_with("failed to set affinity to cpu mask [0-3]"));

        let err = CoreManagerError::CoreOutOfRange {
            core: 4096,
            max: 1023,
        };
        assert_eq!(err.to_string(), "core 4096 is out of range (max core is 1023)");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CoreManagerError = io_err.into();
        assert!(matches!(err, CoreManagerError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
