//! Explicit segment registry.
//!
//! Segment lifecycle (create, attach, destroy) is owned by a
//! [`SegmentRegistry`] value instead of process-wide named lookup:
//! a segment id remains the key, but the registry's base directory
//! and the returned [`Segment`] handles make ownership and teardown
//! explicit. Production registries sit on `/dev/shm`; tests point
//! one at a temporary directory.

use crate::error::{SegmentError, SegmentResult};
use crate::layout::{self, SegmentHeader};
use crate::segment::Segment;
use cadence_common::consts::MAX_DOFS;
use memmap2::MmapOptions;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Default base directory for segment files.
pub const DEFAULT_BASE_DIR: &str = "/dev/shm";

/// Geometry of a segment at creation time.
#[derive(Debug, Clone, Copy)]
pub struct SegmentConfig {
    /// Number of degrees of freedom.
    pub dofs: usize,
    /// Observation history depth in ticks.
    pub history_capacity: usize,
    /// Back-end tick frequency in Hz.
    pub frequency_hz: f64,
}

impl SegmentConfig {
    /// Convenience constructor.
    pub const fn new(dofs: usize, history_capacity: usize, frequency_hz: f64) -> Self {
        Self {
            dofs,
            history_capacity,
            frequency_hz,
        }
    }

    fn validate(&self) -> SegmentResult<()> {
        if self.dofs == 0 || self.dofs > MAX_DOFS {
            return Err(SegmentError::InvalidGeometry {
                detail: format!("dofs must be in 1..={MAX_DOFS}, got {}", self.dofs),
            });
        }
        if self.history_capacity == 0 {
            return Err(SegmentError::InvalidGeometry {
                detail: "history_capacity is zero".to_string(),
            });
        }
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(SegmentError::InvalidGeometry {
                detail: format!("frequency must be positive, got {}", self.frequency_hz),
            });
        }
        Ok(())
    }
}

/// Discovery metadata written next to the segment file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Segment id.
    pub id: String,
    /// Number of degrees of freedom.
    pub dofs: usize,
    /// History depth in ticks.
    pub history_capacity: usize,
    /// Configured tick frequency in Hz.
    pub frequency_hz: f64,
    /// Pid of the creating process.
    pub creator_pid: u32,
    /// Creation wall-clock time.
    pub created_at: SystemTime,
}

/// Creates, attaches and destroys segments under one base directory.
pub struct SegmentRegistry {
    base_dir: PathBuf,
}

impl SegmentRegistry {
    /// Registry on the default base directory (`/dev/shm`).
    pub fn new() -> Self {
        Self::with_base_dir(DEFAULT_BASE_DIR)
    }

    /// Registry on an explicit base directory.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn segment_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("cadence_{id}"))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("cadence_{id}.meta"))
    }

    /// Create a new segment. Fails if one with the same id exists.
    pub fn create(&self, id: &str, config: &SegmentConfig) -> SegmentResult<Segment> {
        config.validate()?;

        let path = self.segment_path(id);
        let total = layout::total_size(config.history_capacity);

        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => SegmentError::AlreadyExists {
                    id: id.to_string(),
                },
                _ => SegmentError::Io { source: e },
            })?;
        file.set_len(total as u64)?;

        let mut mmap = unsafe { MmapOptions::new().populate().map_mut(&file)? };

        {
            // Fresh zeroed mapping; initialize the header in place.
            let header = unsafe { &mut *(mmap.as_mut_ptr() as *mut SegmentHeader) };
            header.init(
                config.dofs as u32,
                config.history_capacity as u64,
                config.frequency_hz,
            );
        }

        self.write_metadata(id, config)?;
        debug!(segment = id, dofs = config.dofs, total, "segment created");

        Segment::new(id.to_string(), path, mmap)
    }

    /// Attach to an existing segment.
    pub fn attach(&self, id: &str) -> SegmentResult<Segment> {
        let path = self.segment_path(id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SegmentError::NotFound {
                    id: id.to_string(),
                },
                _ => SegmentError::Io { source: e },
            })?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        debug!(segment = id, "segment attached");
        Segment::new(id.to_string(), path, mmap)
    }

    /// Remove a segment's backing file and metadata sidecar.
    ///
    /// Handles already attached elsewhere keep their mapping until
    /// dropped; new attaches fail with `NotFound`.
    pub fn destroy(&self, id: &str) -> SegmentResult<()> {
        let path = self.segment_path(id);
        if !path.exists() {
            return Err(SegmentError::NotFound {
                id: id.to_string(),
            });
        }
        std::fs::remove_file(&path)?;
        let _ = std::fs::remove_file(self.metadata_path(id));
        debug!(segment = id, "segment destroyed");
        Ok(())
    }

    /// True if a segment file with this id exists.
    pub fn exists(&self, id: &str) -> bool {
        self.segment_path(id).exists()
    }

    /// Read the discovery metadata sidecar.
    pub fn info(&self, id: &str) -> SegmentResult<SegmentInfo> {
        let raw = std::fs::read_to_string(self.metadata_path(id)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SegmentError::NotFound {
                id: id.to_string(),
            },
            _ => SegmentError::Io { source: e },
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_metadata(&self, id: &str, config: &SegmentConfig) -> SegmentResult<()> {
        let info = SegmentInfo {
            id: id.to_string(),
            dofs: config.dofs,
            history_capacity: config.history_capacity,
            frequency_hz: config.frequency_hz,
            creator_pid: nix::unistd::getpid().as_raw() as u32,
            created_at: SystemTime::now(),
        };
        let json = serde_json::to_string_pretty(&info)?;
        std::fs::write(self.metadata_path(id), json)?;
        Ok(())
    }
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe whether a process is alive without signalling it.
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::Error::EPERM) => true, // exists, not ours
        Err(_) => false,
    }
}
