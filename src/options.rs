//! Configuration options for walog.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default maximum segment size before rotation (16MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Default retention budget for the active directory.
pub const DEFAULT_MAX_SEGMENTS: usize = 8;

/// Default housekeeper sync interval.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(1);

/// Name of the archival directory when none is configured.
pub const DEFAULT_ARCHIVE_DIR_NAME: &str = "archival";

/// Log configuration options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum segment size in bytes. Rotation triggers before a staged
    /// write would push the active segment past this cap.
    pub max_file_size: u64,

    /// Maximum number of segment files kept in the active directory.
    /// Excess segments are moved to the archival directory.
    pub max_segments: usize,

    /// Whether sync calls fsync on the active segment. Checkpoint records
    /// are only emitted when this is enabled.
    pub trigger_fsync: bool,

    /// Interval between housekeeper sync ticks.
    pub sync_interval: Duration,

    /// Archival directory for retired segments. Defaults to
    /// `<log_dir>/archival` when unset.
    pub archive_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_segments: DEFAULT_MAX_SEGMENTS,
            trigger_fsync: true,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            archive_dir: None,
        }
    }
}

impl Options {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_segments == 0 {
            return Err(crate::Error::InvalidConfiguration(
                "max_segments must be at least 1".into(),
            ));
        }

        // A segment must hold its header plus at least one framed record.
        if self.max_file_size < 64 {
            return Err(crate::Error::InvalidConfiguration(
                "max_file_size must be at least 64 bytes".into(),
            ));
        }

        if self.sync_interval.is_zero() {
            return Err(crate::Error::InvalidConfiguration(
                "sync_interval must be non-zero".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the archival directory relative to the log directory.
    pub fn archive_path(&self, log_dir: &Path) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| log_dir.join(DEFAULT_ARCHIVE_DIR_NAME))
    }
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max_file_size.
    pub fn max_file_size(mut self, size: u64) -> Self {
        self.options.max_file_size = size;
        self
    }

    /// Set max_segments.
    pub fn max_segments(mut self, count: usize) -> Self {
        self.options.max_segments = count;
        self
    }

    /// Set trigger_fsync.
    pub fn trigger_fsync(mut self, value: bool) -> Self {
        self.options.trigger_fsync = value;
        self
    }

    /// Set sync_interval.
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.options.sync_interval = interval;
        self
    }

    /// Set the archival directory.
    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.archive_dir = Some(dir.into());
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}
