//! Parallel loading, merging and persisting of whole dictionaries.

use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::arena::DictionaryBuilder;
use crate::cancel::{CancelToken, Outcome};
use crate::codec::binary::{BinaryWriter, decode_index, decode_part, split_container};
use crate::codec::xml::decode_xml;
use crate::config::LoadConfig;
use crate::error::{DictError, Result};
use crate::index::TranslationIndex;
use crate::snapshot::{DictionarySnapshot, SharedDictionary};
use crate::storage::{ReadStream, Storage};

/// Where a dictionary comes from, relative to the loader's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionarySource {
    /// One binary container; already sorted and usually indexed.
    Binary(String),
    /// A folder of XML word lists, one load job per file.
    XmlFolder(String),
}

impl DictionarySource {
    pub fn name(&self) -> &str {
        match self {
            DictionarySource::Binary(path) | DictionarySource::XmlFolder(path) => path,
        }
    }
}

#[derive(Clone)]
pub struct DictionaryLoader {
    storage: Arc<dyn Storage>,
    config: LoadConfig,
}

impl std::fmt::Debug for DictionaryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryLoader").field("config", &self.config).finish()
    }
}

impl DictionaryLoader {
    pub fn new(storage: Arc<dyn Storage>, config: LoadConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Loads, merges, sorts and indexes `source`. Nothing is returned unless
    /// every part parsed; cancellation yields [`Outcome::Cancelled`].
    pub fn load(&self, source: &DictionarySource, cancel: &CancelToken) -> Result<Outcome<DictionarySnapshot>> {
        let started = Instant::now();
        let outcome = match source {
            DictionarySource::Binary(path) => self.load_binary(path, cancel),
            DictionarySource::XmlFolder(folder) => self.load_xml(folder, cancel),
        };
        match &outcome {
            Ok(Outcome::Complete(snapshot)) => info!(
                source = source.name(),
                records = snapshot.len(),
                meanings = snapshot.meaning_count(),
                index_words = snapshot.index().map_or(0, TranslationIndex::len),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "loaded dictionary"
            ),
            Ok(Outcome::Cancelled) => info!(source = source.name(), "dictionary load cancelled"),
            Err(err) => error!(source = source.name(), %err, "dictionary load failed"),
        }
        outcome
    }

    fn load_binary(&self, path: &str, cancel: &CancelToken) -> Result<Outcome<DictionarySnapshot>> {
        let bytes = {
            let mut stream = self.storage.open_read(path)?;
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes)?;
            bytes
        };
        let container = split_container(&bytes)?;
        let jobs = container
            .parts
            .par_iter()
            .map(|part| decode_part(part, container.version, self.config.build_thumbs, cancel))
            .collect::<Result<Vec<_>>>()?;
        let Some(mut builder) = merge(jobs)? else {
            return Ok(Outcome::Cancelled);
        };

        let mut sorted = true;
        if !builder.is_sorted() {
            warn!(path, "binary dictionary is not sorted, repacking");
            builder = builder.sort()?;
            sorted = false;
        }
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let index = match container.index {
            Some(block) if sorted => {
                let len = builder.len();
                decode_index(block, &mut builder.arena, len)?
            }
            _ => TranslationIndex::build(&mut builder)?,
        };
        debug!(
            path,
            version = container.version.raw(),
            parts = container.parts.len(),
            "decoded binary dictionary"
        );
        Ok(Outcome::Complete(DictionarySnapshot::from_builder(builder, Some(index))))
    }

    fn load_xml(&self, folder: &str, cancel: &CancelToken) -> Result<Outcome<DictionarySnapshot>> {
        let streams = self.storage.open_read_all(folder)?;
        let part_count = streams.len();
        let jobs = streams
            .into_par_iter()
            .map(|stream| self.load_xml_part(stream, cancel))
            .collect::<Result<Vec<_>>>()?;
        let Some(builder) = merge(jobs)? else {
            return Ok(Outcome::Cancelled);
        };

        let mut builder = builder.sort()?;
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        let index = TranslationIndex::build(&mut builder)?;
        debug!(folder, parts = part_count, "decoded XML dictionary");
        Ok(Outcome::Complete(DictionarySnapshot::from_builder(builder, Some(index))))
    }

    fn load_xml_part(&self, mut stream: ReadStream, cancel: &CancelToken) -> Result<Outcome<DictionaryBuilder>> {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        let mut text = String::new();
        stream
            .read_to_string(&mut text)
            .map_err(|err| DictError::Xml(format!("unreadable word list: {err}")))?;
        drop(stream);
        decode_xml(&text, self.config.build_thumbs, cancel)
    }

    /// Writes `snapshot` as a binary container at `path`.
    pub fn save(&self, snapshot: &DictionarySnapshot, path: &str) -> Result<()> {
        let started = Instant::now();
        let writer = BinaryWriter::new().with_part_size(self.config.part_size);
        let mut out = self.storage.open_write(path)?;
        writer.write(snapshot, &mut out)?;
        info!(
            path,
            records = snapshot.len(),
            version = writer.version().raw(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "wrote dictionary"
        );
        Ok(())
    }
}

/// Concatenates job results in job order. `None` when any job was cancelled.
fn merge(jobs: Vec<Outcome<DictionaryBuilder>>) -> Result<Option<DictionaryBuilder>> {
    let mut merged: Option<DictionaryBuilder> = None;
    for job in jobs {
        let Outcome::Complete(part) = job else {
            return Ok(None);
        };
        match merged.as_mut() {
            Some(builder) => builder.append(part)?,
            None => merged = Some(part),
        }
    }
    Ok(Some(merged.unwrap_or_default()))
}

/// A load running on its own thread. The snapshot is installed only when
/// the load completes; failures and cancellation leave the previous one.
#[derive(Debug)]
pub struct LoadTask {
    cancel: CancelToken,
    handle: JoinHandle<Result<Outcome<Arc<DictionarySnapshot>>>>,
}

impl LoadTask {
    pub fn spawn(loader: DictionaryLoader, source: DictionarySource, shared: SharedDictionary) -> Self {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::spawn(move || {
            let outcome = loader.load(&source, &token)?;
            Ok(outcome.map(|snapshot| {
                let snapshot = Arc::new(snapshot);
                shared.install(Arc::clone(&snapshot));
                snapshot
            }))
        });
        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<Outcome<Arc<DictionarySnapshot>>> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
