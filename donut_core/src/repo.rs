//! Repository layout and management.
//!
//! A repository root contains the `.donut` marker directory and its
//! `data` subdirectory; the marker's existence is what "initialized"
//! means. The root is always passed in explicitly, never discovered from
//! the process working directory.

use crate::arena::{Arena, PAGE_SIZE};
use crate::checkin;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Marker directory name; its existence means "initialized".
pub const MARKER_DIR: &str = ".donut";

/// Data directory name, under the marker directory.
pub const DATA_DIR: &str = "data";

/// Content identifier width in hex characters.
pub const ID_WIDTH: usize = 32;

/// The dataframe name that maps to the top-level data directory.
pub const DEFAULT_DATAFRAME: &str = "main";

/// Mode for repository directories.
pub(crate) const DIR_MODE: u32 = 0o755;

/// Mode stored files are restricted to after a successful move.
pub(crate) const STORED_MODE: u32 = 0o444;

/// A content-addressed repository rooted at an explicit path.
#[derive(Debug)]
pub struct Repo {
    root: PathBuf,
}

impl Repo {
    /// Initialize a new repository at `root`.
    ///
    /// Creates the marker and data directories with fixed permissions.
    /// Re-initialization is a recoverable error; a partial failure rolls
    /// the marker directory back so no half-initialized state remains.
    pub fn init<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let marker = root.join(MARKER_DIR);
        if marker.exists() {
            return Err(Error::already_initialized(&root));
        }

        create_dir_with_mode(&marker)?;
        if let Err(err) = create_dir_with_mode(&marker.join(DATA_DIR)) {
            let _ = fs::remove_dir(&marker);
            return Err(err);
        }

        Ok(Repo { root })
    }

    /// Open an existing repository, validating that both the marker and
    /// data directories exist.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let marker = root.join(MARKER_DIR);
        if !marker.is_dir() || !marker.join(DATA_DIR).is_dir() {
            return Err(Error::not_initialized(&root));
        }

        Ok(Repo { root })
    }

    /// The repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the marker directory.
    pub fn marker_dir(&self) -> PathBuf {
        self.root.join(MARKER_DIR)
    }

    /// Path of the top-level data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.marker_dir().join(DATA_DIR)
    }

    /// Resolve a dataframe to its destination directory.
    ///
    /// `None` and the default name map to the top-level data directory;
    /// any other name maps to a subdirectory of it. The directory is not
    /// created here; check-in creates it on demand.
    pub fn dataframe_dir(&self, dataframe: Option<&str>) -> Result<PathBuf> {
        match dataframe {
            None => Ok(self.data_dir()),
            Some(name) => {
                validate_dataframe_name(name)?;
                if name == DEFAULT_DATAFRAME {
                    Ok(self.data_dir())
                } else {
                    Ok(self.data_dir().join(name))
                }
            }
        }
    }

    /// List the stored files of one dataframe, sorted by name.
    pub fn ls_data(&self, dataframe: Option<&str>) -> Result<Vec<DataEntry>> {
        let frame = dataframe.unwrap_or(DEFAULT_DATAFRAME);
        let dir = self.dataframe_dir(dataframe)?;

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                let meta = entry.metadata()?;
                entries.push(DataEntry {
                    dataframe: frame.to_string(),
                    name: name.to_string(),
                    size: meta.len(),
                    modified: meta.modified()?,
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Scan the whole data area and report anything that violates the
    /// store's invariants: misnamed entries, contents that no longer
    /// hash to their name, and files left writable.
    pub fn doctor(&self) -> Result<DoctorReport> {
        let mut arena = Arena::new();
        let scratch = arena.acquire(PAGE_SIZE);

        let mut report = DoctorReport {
            checked: 0,
            issues: Vec::new(),
        };

        // Top-level data directory first, then each named dataframe.
        let mut frames = vec![(DEFAULT_DATAFRAME.to_string(), self.data_dir())];
        for entry in fs::read_dir(self.data_dir())? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                frames.push((name.to_string(), entry.path()));
            }
        }

        for (frame, dir) in frames {
            let mut names: Vec<(String, PathBuf)> = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file()
                    && let Some(name) = entry.file_name().to_str()
                {
                    names.push((name.to_string(), entry.path()));
                }
            }
            names.sort();

            for (name, path) in names {
                report.checked += 1;

                let well_formed = name.len() == ID_WIDTH
                    && !name.bytes().any(|b| b.is_ascii_uppercase())
                    && hex::decode(&name).is_ok();
                if !well_formed {
                    report.issues.push(DoctorIssue {
                        dataframe: frame.clone(),
                        name,
                        problem: Problem::BadName,
                    });
                    continue;
                }

                let digest = checkin::hash_file(&mut arena, scratch, &path)?;
                let computed = crate::sha256::to_hex(&digest, ID_WIDTH);
                if computed != name {
                    report.issues.push(DoctorIssue {
                        dataframe: frame.clone(),
                        name,
                        problem: Problem::DigestMismatch { computed },
                    });
                    continue;
                }

                if !fs::metadata(&path)?.permissions().readonly() {
                    report.issues.push(DoctorIssue {
                        dataframe: frame.clone(),
                        name,
                        problem: Problem::Writable,
                    });
                }
            }
        }

        Ok(report)
    }
}

/// One stored file, as reported by `ls-data`.
#[derive(Debug, Clone, Serialize)]
pub struct DataEntry {
    pub dataframe: String,
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// What is wrong with a stored file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Problem {
    /// Name is not a well-formed content identifier.
    BadName,
    /// Content no longer hashes to the stored name.
    DigestMismatch { computed: String },
    /// Write permission bits were left set.
    Writable,
}

/// A single doctor finding.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorIssue {
    pub dataframe: String,
    pub name: String,
    pub problem: Problem,
}

/// Result of a full repository scan.
#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub checked: usize,
    pub issues: Vec<DoctorIssue>,
}

impl DoctorReport {
    /// Whether the scan found nothing wrong.
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

fn validate_dataframe_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_dataframe("name cannot be empty"));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::invalid_dataframe(format!(
            "{name:?} must not contain path separators or \"..\""
        )));
    }
    Ok(())
}

fn create_dir_with_mode(path: &Path) -> Result<()> {
    fs::create_dir(path)?;
    set_dir_mode(path)
}

#[cfg(unix)]
fn set_dir_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(DIR_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path) -> Result<()> {
    Ok(())
}

pub(crate) fn create_dataframe_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    create_dir_with_mode(path)
}
