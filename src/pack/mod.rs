//! # Pack Snapshot Store
//!
//! An immutable, content-addressed materialization of a fact base. A pack
//! is a directory holding one length-framed fact file per predicate plus a
//! JSON manifest with per-predicate fact counts and SHA-256 digests; the
//! pack id is the digest of the predicate digests.
//!
//! ## Lifecycle
//!
//! ```text
//! PackWriter::create (lock + staging dir)
//!     -> set(predicate, key, value) ...
//!     -> commit()  (sorted fact files, manifest last, atomic rename)
//! Pack::open (read-only, shared by all queries for the server's lifetime)
//! ```
//!
//! The writer stages everything under `<dir>.staging` and swaps it into
//! place on commit, so prior contents at the target are discarded
//! atomically and a crashed compile never leaves a half-written pack
//! behind the manifest. The reader never mutates the directory; snapshot
//! rotation is an operator concern.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Magic prefix of a predicate fact file.
const FACT_FILE_MAGIC: &[u8; 8] = b"BDBPACK1";

/// Manifest format identifier.
const MANIFEST_FORMAT: &str = "beingdb-pack/1";

/// Ceiling for a single framed key or value read back from disk. Anything
/// larger is treated as corruption and truncates the file.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Pack store errors
#[derive(Error, Debug)]
pub enum PackError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest (de)serialization error
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Another compile holds the pack lock
    #[error("pack is locked by another writer: {}", .0.display())]
    Locked(PathBuf),

    /// Directory does not contain a pack
    #[error("not a pack directory (missing manifest): {}", .0.display())]
    NotAPack(PathBuf),
}

pub type PackResult<T> = Result<T, PackError>;

/// Per-predicate entry in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub facts: usize,
    pub sha256: String,
}

/// Pack manifest, written last during commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format: String,
    pub pack_id: String,
    pub predicates: Vec<ManifestEntry>,
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn fact_file_name(predicate: &str) -> String {
    format!("{predicate}.facts")
}

// Writer

/// Single-writer handle that stages a fresh pack and commits it atomically.
pub struct PackWriter {
    target: PathBuf,
    staging: PathBuf,
    lock_path: PathBuf,
    entries: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
    committed: bool,
}

impl PackWriter {
    /// Start a fresh pack at `target`.
    ///
    /// Takes a `<target>.lock` file to keep compiles single-writer; a
    /// leftover staging directory from a crashed compile is discarded.
    pub fn create(target: impl Into<PathBuf>) -> PackResult<Self> {
        let target = target.into();
        let lock_path = lock_path_for(&target);
        let staging = staging_path_for(&target);

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PackError::Locked(lock_path));
            }
            Err(e) => return Err(e.into()),
        }

        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        Ok(PackWriter {
            target,
            staging,
            lock_path,
            entries: BTreeMap::new(),
            committed: false,
        })
    }

    /// Ensure a predicate exists in the snapshot even if no facts follow
    /// (an all-comments source file is still a predicate).
    pub fn declare(&mut self, predicate: &str) {
        self.entries.entry(predicate.to_string()).or_default();
    }

    /// Stage a fact at `[predicate, key]`. Re-setting a key overwrites it
    /// (facts are a set).
    pub fn set(&mut self, predicate: &str, key: Vec<u8>, value: Vec<u8>) {
        self.entries
            .entry(predicate.to_string())
            .or_default()
            .insert(key, value);
    }

    /// Number of distinct keys staged for a predicate.
    pub fn staged_count(&self, predicate: &str) -> usize {
        self.entries.get(predicate).map_or(0, BTreeMap::len)
    }

    /// Write fact files and manifest, then swap the staging directory into
    /// place. Consumes the writer and releases the lock.
    pub fn commit(mut self) -> PackResult<Manifest> {
        let mut manifest_entries = Vec::with_capacity(self.entries.len());
        let mut pack_hasher = Sha256::new();

        for (predicate, facts) in &self.entries {
            let mut framed = Vec::new();
            framed.extend_from_slice(FACT_FILE_MAGIC);
            framed.extend_from_slice(&(facts.len() as u32).to_le_bytes());
            for (key, value) in facts {
                framed.extend_from_slice(&(key.len() as u32).to_le_bytes());
                framed.extend_from_slice(key);
                framed.extend_from_slice(&(value.len() as u32).to_le_bytes());
                framed.extend_from_slice(value);
            }

            let digest = hex_digest(&Sha256::digest(&framed));
            pack_hasher.update(predicate.as_bytes());
            pack_hasher.update(digest.as_bytes());

            let path = self.staging.join(fact_file_name(predicate));
            let mut file = BufWriter::new(File::create(&path)?);
            file.write_all(&framed)?;
            file.flush()?;

            manifest_entries.push(ManifestEntry {
                name: predicate.clone(),
                facts: facts.len(),
                sha256: digest,
            });
        }

        let manifest = Manifest {
            format: MANIFEST_FORMAT.to_string(),
            pack_id: hex_digest(&pack_hasher.finalize()),
            predicates: manifest_entries,
        };

        // Manifest goes last: a directory without one is not a pack.
        let manifest_path = self.staging.join("manifest.json");
        fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)?;

        if self.target.exists() {
            fs::remove_dir_all(&self.target)?;
        }
        fs::rename(&self.staging, &self.target)?;

        self.committed = true;
        let _ = fs::remove_file(&self.lock_path);
        Ok(manifest)
    }
}

impl Drop for PackWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_dir_all(&self.staging);
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut os = target.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

fn staging_path_for(target: &Path) -> PathBuf {
    let mut os = target.as_os_str().to_os_string();
    os.push(".staging");
    PathBuf::from(os)
}

// Reader

/// Sorted, immutable view of one predicate's facts.
pub struct PredicateTree {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl PredicateTree {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index` in key order.
    pub fn get(&self, index: usize) -> Option<(&[u8], &[u8])> {
        self.entries
            .get(index)
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Value stored at an exact key.
    pub fn find(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries
            .binary_search_by(|(k, _)| k.as_slice().cmp(key))
            .ok()
            .map(|i| self.entries[i].1.as_slice())
    }

    /// Slice of entries starting at `offset`, at most `length` long.
    pub fn list(&self, offset: usize, length: Option<usize>) -> &[(Vec<u8>, Vec<u8>)] {
        let start = offset.min(self.entries.len());
        let end = match length {
            Some(n) => start.saturating_add(n).min(self.entries.len()),
            None => self.entries.len(),
        };
        &self.entries[start..end]
    }
}

/// Read-only handle to a committed pack snapshot.
///
/// Predicate trees are loaded lazily on first access and cached; the
/// handle is shared by all query handlers for the server's lifetime.
pub struct Pack {
    dir: PathBuf,
    manifest: Manifest,
    trees: RwLock<HashMap<String, Arc<PredicateTree>>>,
}

impl Pack {
    pub fn open(dir: impl Into<PathBuf>) -> PackResult<Self> {
        let dir = dir.into();
        let manifest_path = dir.join("manifest.json");
        if !manifest_path.is_file() {
            return Err(PackError::NotAPack(dir));
        }
        let manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path)?)?;

        Ok(Pack {
            dir,
            manifest,
            trees: RwLock::new(HashMap::new()),
        })
    }

    /// Content digest identifying this snapshot.
    pub fn id(&self) -> &str {
        &self.manifest.pack_id
    }

    /// First-level keys: the predicate names, in manifest (byte) order.
    pub fn list_predicates(&self) -> Vec<String> {
        self.manifest
            .predicates
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    /// Declared fact count for a predicate, if present.
    pub fn fact_count(&self, predicate: &str) -> Option<usize> {
        self.manifest
            .predicates
            .iter()
            .find(|p| p.name == predicate)
            .map(|p| p.facts)
    }

    /// The sorted fact tree for a predicate, or `None` when the predicate
    /// is not in this snapshot.
    pub fn tree(&self, predicate: &str) -> Option<Arc<PredicateTree>> {
        if let Some(tree) = self.trees.read().get(predicate) {
            return Some(Arc::clone(tree));
        }

        let entry = self
            .manifest
            .predicates
            .iter()
            .find(|p| p.name == predicate)?;

        let tree = Arc::new(self.load_tree(entry));
        self.trees
            .write()
            .entry(predicate.to_string())
            .or_insert_with(|| Arc::clone(&tree));
        Some(tree)
    }

    /// Load a predicate's fact file, verifying its digest. Corruption is
    /// logged and degrades to the readable prefix; the decoder downstream
    /// is total, so truncated entries simply fail to match.
    fn load_tree(&self, entry: &ManifestEntry) -> PredicateTree {
        let path = self.dir.join(fact_file_name(&entry.name));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(predicate = %entry.name, error = %e, "fact file unreadable");
                return PredicateTree { entries: Vec::new() };
            }
        };

        if hex_digest(&Sha256::digest(&bytes)) != entry.sha256 {
            tracing::warn!(predicate = %entry.name, "fact file digest mismatch, serving as-is");
        }

        let mut reader = BufReader::new(bytes.as_slice());
        let mut magic = [0u8; 8];
        if reader.read_exact(&mut magic).is_err() || &magic != FACT_FILE_MAGIC {
            tracing::warn!(predicate = %entry.name, "fact file has bad magic");
            return PredicateTree { entries: Vec::new() };
        }

        let declared = match read_u32(&mut reader) {
            Some(n) => n as usize,
            None => return PredicateTree { entries: Vec::new() },
        };

        let mut entries = Vec::with_capacity(declared.min(1 << 20));
        for _ in 0..declared {
            let Some(key) = read_frame(&mut reader) else {
                tracing::warn!(
                    predicate = %entry.name,
                    loaded = entries.len(),
                    declared,
                    "fact file truncated"
                );
                break;
            };
            let Some(value) = read_frame(&mut reader) else {
                tracing::warn!(
                    predicate = %entry.name,
                    loaded = entries.len(),
                    declared,
                    "fact file truncated"
                );
                break;
            };
            entries.push((key, value));
        }

        // Files are written sorted; re-sort defensively so `find` stays
        // correct even over a hand-edited pack.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        PredicateTree { entries }
    }
}

fn read_u32(reader: &mut impl Read) -> Option<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).ok()?;
    Some(u32::from_le_bytes(buf))
}

fn read_frame(reader: &mut impl Read) -> Option<Vec<u8>> {
    let len = read_u32(reader)? as usize;
    if len > MAX_FRAME_LEN {
        return None;
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).ok()?;
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_pack(dir: &Path, facts: &[(&str, &[u8], &[u8])]) -> Manifest {
        let mut writer = PackWriter::create(dir).unwrap();
        for (predicate, key, value) in facts {
            writer.set(predicate, key.to_vec(), value.to_vec());
        }
        writer.commit().unwrap()
    }

    #[test]
    fn test_write_and_read_back() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        write_pack(
            &dir,
            &[
                ("edge", b"1:a:1:b", b""),
                ("edge", b"1:b:1:c", b""),
                ("node", b"1:a", b""),
            ],
        );

        let pack = Pack::open(&dir).unwrap();
        assert_eq!(pack.list_predicates(), vec!["edge", "node"]);
        assert_eq!(pack.fact_count("edge"), Some(2));

        let tree = pack.tree("edge").unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(0).unwrap().0, b"1:a:1:b");
        assert_eq!(tree.find(b"1:b:1:c"), Some(&b""[..]));
        assert!(pack.tree("missing").is_none());
    }

    #[test]
    fn test_entries_sorted_by_key() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        write_pack(&dir, &[("p", b"2:zz", b""), ("p", b"1:a", b""), ("p", b"1:m", b"")]);

        let pack = Pack::open(&dir).unwrap();
        let tree = pack.tree("p").unwrap();
        let keys: Vec<&[u8]> = (0..tree.len()).map(|i| tree.get(i).unwrap().0).collect();
        assert_eq!(keys, vec![&b"1:a"[..], &b"1:m"[..], &b"2:zz"[..]]);
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        write_pack(&dir, &[("p", b"1:a", b""), ("p", b"1:a", b"")]);

        let pack = Pack::open(&dir).unwrap();
        assert_eq!(pack.fact_count("p"), Some(1));
    }

    #[test]
    fn test_recompile_replaces_previous_pack() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        write_pack(&dir, &[("old", b"1:x", b"")]);
        write_pack(&dir, &[("new", b"1:y", b"")]);

        let pack = Pack::open(&dir).unwrap();
        assert_eq!(pack.list_predicates(), vec!["new"]);
    }

    #[test]
    fn test_writer_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        let writer = PackWriter::create(&dir).unwrap();
        assert!(matches!(
            PackWriter::create(&dir),
            Err(PackError::Locked(_))
        ));
        drop(writer);
        // Abandoned writer releases the lock.
        assert!(PackWriter::create(&dir).is_ok());
    }

    #[test]
    fn test_open_missing_manifest() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Pack::open(temp.path()),
            Err(PackError::NotAPack(_))
        ));
    }

    #[test]
    fn test_pack_id_tracks_content() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        let c = temp.path().join("c");
        let id_a = write_pack(&a, &[("p", b"1:x", b"")]).pack_id;
        let id_b = write_pack(&b, &[("p", b"1:x", b"")]).pack_id;
        let id_c = write_pack(&c, &[("p", b"1:y", b"")]).pack_id;
        assert_eq!(id_a, id_b);
        assert_ne!(id_a, id_c);
    }

    #[test]
    fn test_corrupt_fact_file_degrades() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        write_pack(&dir, &[("p", b"1:a", b""), ("p", b"1:b", b"")]);

        // Truncate the fact file mid-record.
        let path = dir.join("p.facts");
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let pack = Pack::open(&dir).unwrap();
        let tree = pack.tree("p").unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_tree_list_windows() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        write_pack(
            &dir,
            &[("p", b"1:a", b""), ("p", b"1:b", b""), ("p", b"1:c", b"")],
        );

        let pack = Pack::open(&dir).unwrap();
        let tree = pack.tree("p").unwrap();
        assert_eq!(tree.list(1, Some(1)).len(), 1);
        assert_eq!(tree.list(1, Some(1))[0].0, b"1:b");
        assert_eq!(tree.list(0, None).len(), 3);
        assert!(tree.list(9, Some(5)).is_empty());
    }

    #[test]
    fn test_empty_pack() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pack");
        let manifest = write_pack(&dir, &[]);
        assert!(manifest.predicates.is_empty());

        let pack = Pack::open(&dir).unwrap();
        assert!(pack.list_predicates().is_empty());
    }
}
