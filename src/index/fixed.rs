//! Fixed Index
//!
//! A point-lookup index from `Key` to a value location, split into a
//! constant number of key-range partitions and rebuilt by merges.
//!
//! ## Directory Layout
//! ```text
//! {dir}/
//!   ├── 3/                                   current generation
//!   │     ├── 00000000000000000000000000000000
//!   │     ├── 01fffffffffffffffffffffffffffffe
//!   │     └── ...                            one file per partition
//!   └── 4.tmp/                               merge in progress
//! ```
//!
//! ## Concurrency
//! Readers take a cheap `Arc` clone of the current snapshot and never block
//! each other. Merges are serialized by an internal lock and publish a new
//! snapshot atomically; the superseded one is deleted after its last reader
//! lets go.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, SegError};

use super::merge::{bounded, check_sorted, merge_join};
use super::{Change, EntryValue, Key, Snapshot};

const TMP_SUFFIX: &str = ".tmp";

/// Partitioned index rebuilt by snapshot merges
pub struct FixedIndex<V: EntryValue> {
    dir: PathBuf,
    partition_num: usize,
    current: RwLock<Arc<Snapshot<V>>>,
    /// Single-writer lock for merges
    merge_lock: Mutex<()>,
}

impl<V: EntryValue> FixedIndex<V> {
    /// Open or create an index in `dir`.
    ///
    /// On startup:
    /// 1. Remove unfinished `.tmp` merge directories
    /// 2. Pick the highest generation; remove older ones
    /// 3. Create generation 0 if none exists
    /// 4. Check the partition count against `config.partition_num`
    pub fn open(dir: &Path, config: &Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(dir)?;

        let (mut generations, unfinished) = scan(dir)?;
        for path in unfinished {
            debug!(path = %path.display(), "removing unfinished merge");
            fs::remove_dir_all(&path)?;
        }

        let generation = generations.pop().map_or(0, |(generation, _)| generation);
        for (stale, path) in generations {
            debug!(generation = stale, "removing superseded generation");
            fs::remove_dir_all(&path)?;
        }

        let snapshot = Snapshot::open(
            &dir.join(generation.to_string()),
            generation,
            config.partition_num,
        )?;
        info!(
            dir = %dir.display(),
            generation,
            partitions = snapshot.partition_count(),
            entries = snapshot.len(),
            "opened fixed index"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            partition_num: config.partition_num,
            current: RwLock::new(Arc::new(snapshot)),
            merge_lock: Mutex::new(()),
        })
    }

    /// Open the latest published generation in `dir` without touching
    /// anything else on disk: unfinished merges and superseded generations
    /// are left in place and nothing is created.
    pub fn latest_snapshot(dir: &Path, config: &Config) -> Result<Snapshot<V>> {
        config.validate()?;
        if !dir.is_dir() {
            return Err(SegError::NotFound(format!("index {}", dir.display())));
        }
        let (generations, _) = scan(dir)?;
        let (generation, path) = generations
            .last()
            .ok_or_else(|| SegError::NotFound(format!("no generation in {}", dir.display())))?;
        Snapshot::inspect(path, *generation, config.partition_num)
    }

    /// Look up `key` in the current snapshot
    pub fn get(&self, key: &Key) -> Result<V> {
        self.snapshot().get(key)
    }

    /// The current snapshot; stays readable even after a later merge
    pub fn snapshot(&self) -> Arc<Snapshot<V>> {
        Arc::clone(&*self.current.read())
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation()
    }

    pub fn partition_num(&self) -> usize {
        self.partition_num
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Merge a delta sorted by strictly ascending key into a new generation
    /// and publish it.
    ///
    /// Each partition of the current snapshot is joined with the delta
    /// changes below the next partition's lower key, then forced. The new
    /// generation is built in `{generation}.tmp/` and renamed into place only
    /// after every partition is durable.
    pub fn merge<I>(&self, delta: I) -> Result<()>
    where
        I: IntoIterator<Item = Change<V>>,
    {
        let _guard = self.merge_lock.lock();

        let delta: Vec<Change<V>> = delta.into_iter().collect();
        check_sorted(&delta)?;
        let changes = delta.len();

        let base = self.snapshot();
        let generation = base.generation() + 1;
        let tmp = self.dir.join(format!("{}{}", generation, TMP_SUFFIX));
        let mut next = Snapshot::create(&tmp, generation, self.partition_num)?;

        let mut delta = delta.into_iter().peekable();
        for index in 0..self.partition_num {
            let partition = base.partition(index)?;
            merge_join(
                bounded(partition.iter(), base.upper_bound(index)),
                &mut delta,
                |entry| next.append(index, &entry),
            )?;
            next.force(index)?;
        }
        next.close();
        drop(next);

        let target = self.dir.join(generation.to_string());
        fs::rename(&tmp, &target)?;
        sync_dir(&self.dir)?;
        let snapshot = Snapshot::open(&target, generation, self.partition_num)?;
        let entries = snapshot.len();

        let old = std::mem::replace(&mut *self.current.write(), Arc::new(snapshot));
        old.retire();
        drop(old);

        info!(generation, changes, entries, "published index snapshot");
        Ok(())
    }

    /// Release the current snapshot's mappings
    pub fn close(self) {
        debug!(dir = %self.dir.display(), "closing fixed index");
    }
}

/// Published generations in ascending order, plus unfinished merges
fn scan(dir: &Path) -> Result<(Vec<(u64, PathBuf)>, Vec<PathBuf>)> {
    let mut generations = Vec::new();
    let mut unfinished = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.ends_with(TMP_SUFFIX) {
            unfinished.push(path);
        } else if let Ok(generation) = name.parse::<u64>() {
            generations.push((generation, path));
        }
    }
    generations.sort_by_key(|(generation, _)| *generation);
    Ok((generations, unfinished))
}

/// Make a rename inside `dir` durable.
///
/// Platforms that cannot open or sync a directory handle are skipped.
fn sync_dir(dir: &Path) -> Result<()> {
    let file = match File::open(dir) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    match file.sync_all() {
        Ok(()) => Ok(()),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
            ) =>
        {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
