//! The check-in pipeline.
//!
//! Classifies the source path, streams file bytes through the hash
//! engine, consults the dedup index for the destination directory and
//! relocates only content that is not already stored. Duplicate content
//! is a silent no-op success, observable only as the absence of a
//! filesystem change.

use crate::arena::{Arena, PAGE_SIZE, SlabHandle};
use crate::error::{Error, Result};
use crate::index::DataIndex;
use crate::repo::{self, ID_WIDTH, Repo};
use crate::sha256::{self, DIGEST_SIZE, Sha256};
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Result of checking in one regular file.
#[derive(Debug, Clone, Serialize)]
pub struct CheckinOutcome {
    /// The source path that was hashed.
    pub source: PathBuf,
    /// Content identifier (truncated hex digest, the stored file name).
    pub id: String,
    /// True if the file was moved into the store; false if identical
    /// content was already present and nothing changed on disk.
    pub stored: bool,
}

impl Repo {
    /// Check a file or directory into the given dataframe.
    ///
    /// For a directory, its immediate regular-file children are checked
    /// in (non-recursive) sharing one arena, scratch slab and index, so
    /// later files observe identifiers stored earlier in the same run.
    pub fn check_in(&self, source: &Path, dataframe: Option<&str>) -> Result<Vec<CheckinOutcome>> {
        let meta = fs::symlink_metadata(source).map_err(|_| Error::source_not_found(source))?;

        let dest = self.dataframe_dir(dataframe)?;
        repo::create_dataframe_dir(&dest)?;

        let mut arena = Arena::new();
        let scratch = arena.acquire(PAGE_SIZE);
        let mut index = DataIndex::new();
        index.populate_from_dir(&mut arena, &dest)?;

        if meta.is_file() {
            let outcome = check_in_file(&mut arena, scratch, &mut index, source, &dest)?;
            Ok(vec![outcome])
        } else if meta.is_dir() {
            check_in_dir(&mut arena, scratch, &mut index, source, &dest)
        } else {
            Err(Error::unsupported_file_type(source))
        }
    }

    /// Check in several sources. An empty slice is the recoverable
    /// "no source supplied" error.
    pub fn check_in_all(
        &self,
        sources: &[PathBuf],
        dataframe: Option<&str>,
    ) -> Result<Vec<CheckinOutcome>> {
        if sources.is_empty() {
            return Err(Error::NoSources);
        }

        let mut outcomes = Vec::new();
        for source in sources {
            outcomes.extend(self.check_in(source, dataframe)?);
        }
        Ok(outcomes)
    }
}

/// Stream a file through the hash engine one scratch slab at a time.
///
/// The digest is finalized only once a zero-length read signals EOF.
pub(crate) fn hash_file(
    arena: &mut Arena,
    scratch: SlabHandle,
    path: &Path,
) -> Result<[u8; DIGEST_SIZE]> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();

    loop {
        let buf = arena.slab_mut(scratch).as_bytes_mut();
        let read = match file.read(buf) {
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hasher.finalize())
}

fn check_in_file(
    arena: &mut Arena,
    scratch: SlabHandle,
    index: &mut DataIndex,
    source: &Path,
    dest: &Path,
) -> Result<CheckinOutcome> {
    let digest = hash_file(arena, scratch, source)?;
    let id = sha256::to_hex(&digest, ID_WIDTH);

    if index.contains(arena, &id) {
        // Already stored; the existing copy is authoritative.
        return Ok(CheckinOutcome {
            source: source.to_path_buf(),
            id,
            stored: false,
        });
    }

    let target = dest.join(&id);
    fs::rename(source, &target)?;
    restrict_to_read_only(&target)?;
    index.append(arena, &id);

    Ok(CheckinOutcome {
        source: source.to_path_buf(),
        id,
        stored: true,
    })
}

fn check_in_dir(
    arena: &mut Arena,
    scratch: SlabHandle,
    index: &mut DataIndex,
    source: &Path,
    dest: &Path,
) -> Result<Vec<CheckinOutcome>> {
    let mut outcomes = Vec::new();

    // A check-in must see every regular file, so the usual hidden-file
    // and ignore-file filters are off.
    let walker = ignore::WalkBuilder::new(source)
        .max_depth(Some(1))
        .standard_filters(false)
        .build();

    for entry in walker {
        let entry = entry?;
        let path = entry.path();

        // Skip the directory itself.
        if path == source {
            continue;
        }

        if entry.file_type().is_some_and(|t| t.is_file()) {
            outcomes.push(check_in_file(arena, scratch, index, path, dest)?);
        }
    }

    Ok(outcomes)
}

#[cfg(unix)]
fn restrict_to_read_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(repo::STORED_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_read_only(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo_in(temp_dir: &TempDir) -> Repo {
        Repo::init(temp_dir.path()).unwrap()
    }

    fn data_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_file())
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_check_in_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let content = vec![0x42u8; 2000];
        let source = temp_dir.path().join("report.bin");
        fs::write(&source, &content).unwrap();

        let outcomes = repo.check_in(&source, None).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].stored);
        assert_eq!(outcomes[0].id.len(), ID_WIDTH);
        assert_eq!(
            outcomes[0].id,
            sha256::to_hex(&Sha256::digest(&content), ID_WIDTH)
        );

        // The source was relocated, not copied.
        assert!(!source.exists());
        let stored = repo.data_dir().join(&outcomes[0].id);
        assert!(stored.is_file());
        assert_eq!(fs::read(&stored).unwrap(), content);
    }

    #[test]
    #[cfg(unix)]
    fn test_stored_file_is_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let source = temp_dir.path().join("a.txt");
        fs::write(&source, b"lock me down").unwrap();

        let outcomes = repo.check_in(&source, None).unwrap();
        let stored = repo.data_dir().join(&outcomes[0].id);
        let mode = fs::metadata(&stored).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
    }

    #[test]
    fn test_check_in_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let source = temp_dir.path().join("empty");
        fs::write(&source, b"").unwrap();

        let outcomes = repo.check_in(&source, None).unwrap();
        assert!(outcomes[0].stored);
        // SHA-256 of the empty input, truncated to the identifier width.
        assert_eq!(outcomes[0].id, "e3b0c44298fc1c149afbf4c8996fb924");
    }

    #[test]
    fn test_duplicate_content_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let first = temp_dir.path().join("original.txt");
        let second = temp_dir.path().join("copy.txt");
        fs::write(&first, b"same bytes").unwrap();
        fs::write(&second, b"same bytes").unwrap();

        let outcomes = repo.check_in(&first, None).unwrap();
        assert!(outcomes[0].stored);

        let outcomes = repo.check_in(&second, None).unwrap();
        assert!(!outcomes[0].stored);
        assert_eq!(outcomes[0].id.len(), ID_WIDTH);

        // Exactly one stored file; the duplicate source stays put.
        assert_eq!(data_entries(&repo.data_dir()).len(), 1);
        assert!(second.exists());
    }

    #[test]
    fn test_two_distinct_files() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let big = temp_dir.path().join("big");
        fs::write(&big, vec![7u8; 2000]).unwrap();
        let first = repo.check_in(&big, None).unwrap();

        let small = temp_dir.path().join("small");
        fs::write(&small, b"ten bytes!").unwrap();
        let second = repo.check_in(&small, None).unwrap();

        assert_ne!(first[0].id, second[0].id);

        let entries = data_entries(&repo.data_dir());
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&first[0].id));
        assert!(entries.contains(&second[0].id));

        // The first entry was left untouched by the second check-in.
        let stored = repo.data_dir().join(&first[0].id);
        assert_eq!(fs::read(&stored).unwrap(), vec![7u8; 2000]);
    }

    #[test]
    fn test_directory_check_in_is_nonrecursive() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let source = temp_dir.path().join("incoming");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("one.txt"), b"one").unwrap();
        fs::write(source.join("two.txt"), b"two").unwrap();

        let nested = source.join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("three.txt"), b"three").unwrap();

        let outcomes = repo.check_in(&source, None).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.stored));

        // The nested file was not touched.
        assert!(nested.join("three.txt").exists());
        assert_eq!(data_entries(&repo.data_dir()).len(), 2);
    }

    #[test]
    fn test_directory_with_duplicate_contents() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let source = temp_dir.path().join("incoming");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.txt"), b"shared").unwrap();
        fs::write(source.join("b.txt"), b"shared").unwrap();
        fs::write(source.join("c.txt"), b"unique").unwrap();

        let outcomes = repo.check_in(&source, None).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.stored).count(), 2);
        assert_eq!(data_entries(&repo.data_dir()).len(), 2);
    }

    #[test]
    fn test_index_seeded_from_existing_store() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let first = temp_dir.path().join("first run");
        fs::write(&first, b"persistent").unwrap();
        repo.check_in(&first, None).unwrap();

        // A fresh invocation must see what the previous one stored.
        let second = temp_dir.path().join("second run");
        fs::write(&second, b"persistent").unwrap();
        let outcomes = repo.check_in(&second, None).unwrap();
        assert!(!outcomes[0].stored);
        assert_eq!(data_entries(&repo.data_dir()).len(), 1);
    }

    #[test]
    fn test_named_dataframe_created_on_demand() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let source = temp_dir.path().join("pic");
        fs::write(&source, b"pixels").unwrap();

        let outcomes = repo.check_in(&source, Some("photos")).unwrap();
        let frame_dir = repo.data_dir().join("photos");
        assert!(frame_dir.is_dir());
        assert!(frame_dir.join(&outcomes[0].id).is_file());
    }

    #[test]
    fn test_main_dataframe_is_top_level() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let source = temp_dir.path().join("doc");
        fs::write(&source, b"words").unwrap();

        let outcomes = repo.check_in(&source, Some("main")).unwrap();
        assert!(repo.data_dir().join(&outcomes[0].id).is_file());
        assert!(!repo.data_dir().join("main").exists());
    }

    #[test]
    fn test_dataframes_dedup_independently() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let first = temp_dir.path().join("one");
        fs::write(&first, b"both frames").unwrap();
        repo.check_in(&first, None).unwrap();

        // Same content into a named dataframe is stored again there.
        let second = temp_dir.path().join("two");
        fs::write(&second, b"both frames").unwrap();
        let outcomes = repo.check_in(&second, Some("photos")).unwrap();
        assert!(outcomes[0].stored);
    }

    #[test]
    fn test_missing_source_is_recoverable() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let err = repo
            .check_in(&temp_dir.path().join("ghost"), None)
            .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_source_is_unsupported() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let target = temp_dir.path().join("target");
        fs::write(&target, b"real").unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = repo.check_in(&link, None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType { .. }));
    }

    #[test]
    fn test_check_in_all_requires_sources() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let err = repo.check_in_all(&[], None).unwrap_err();
        assert!(matches!(err, Error::NoSources));
    }

    #[test]
    fn test_check_in_all_spans_sources() {
        let temp_dir = TempDir::new().unwrap();
        let repo = repo_in(&temp_dir);

        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        fs::write(&a, b"alpha").unwrap();
        fs::write(&b, b"alpha").unwrap();

        let outcomes = repo.check_in_all(&[a, b], None).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].stored);
        assert!(!outcomes[1].stored);
    }

    #[test]
    fn test_hash_file_matches_one_shot_digest() {
        let temp_dir = TempDir::new().unwrap();

        // Spans multiple scratch-buffer reads.
        let content: Vec<u8> = (0..PAGE_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let path = temp_dir.path().join("blob");
        fs::write(&path, &content).unwrap();

        let mut arena = Arena::new();
        let scratch = arena.acquire(PAGE_SIZE);
        let digest = hash_file(&mut arena, scratch, &path).unwrap();
        assert_eq!(digest, Sha256::digest(&content));
    }
}
