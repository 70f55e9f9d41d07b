//! Materialize decoded pack entries and write them to the object store

use std::collections::HashMap;

use indicatif::{ProgressBar, ProgressStyle};

use super::decode::DecodedPack;
use super::delta::apply_delta;
use super::entry::EntryKind;
use crate::error::{Error, Result};
use crate::object::{hash_object, Kind, ObjectId};
use crate::store::ObjectStore;

/// Counts reported after a pack has been written out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub objects: usize,
    pub deltas: usize,
    pub external_bases: usize,
}

/// A fully reconstructed object, memoized by pack position
struct Materialized {
    kind: Kind,
    data: Vec<u8>,
}

enum Base {
    Entry(usize),
    External(ObjectId),
}

enum Progress {
    Resolved,
    /// The ref-delta base is not known yet; another pass may find it
    Waiting(ObjectId),
}

pub struct PackIngestor<'a> {
    store: &'a ObjectStore,
    show_progress: bool,
}

/// Decode state for one pack; owned by a single ingest call
struct Resolver<'p> {
    pack: &'p DecodedPack,
    by_offset: HashMap<usize, usize>,
    cache: Vec<Option<Materialized>>,
    by_id: HashMap<ObjectId, usize>,
    external: HashMap<ObjectId, Materialized>,
}

impl<'a> PackIngestor<'a> {
    pub fn new(store: &'a ObjectStore) -> Self {
        Self {
            store,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {msg} [{bar:40.cyan/blue}] {pos}/{len} objects ({eta})")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.set_message("Resolving objects");
        bar
    }

    /// Write every object in the pack, full objects first, then deltas in
    /// dependency order.
    pub fn ingest(&self, pack: &DecodedPack) -> Result<IngestSummary> {
        let bar = self.progress_bar(pack.entries.len());
        let mut resolver = Resolver::new(pack);
        let mut summary = IngestSummary::default();

        for (index, entry) in pack.entries.iter().enumerate() {
            if let EntryKind::Object(kind) = entry.kind {
                self.materialize(&mut resolver, index, kind, entry.data.clone())?;
                summary.objects += 1;
                bar.inc(1);
            }
        }

        let mut pending: Vec<usize> = pack
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_delta())
            .map(|(i, _)| i)
            .collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting_on = None;
            let mut still_pending = Vec::new();
            for index in pending {
                if resolver.cache[index].is_some() {
                    continue;
                }
                match self.resolve_chain(&mut resolver, index)? {
                    Progress::Resolved => {}
                    Progress::Waiting(base) => {
                        waiting_on = Some(base);
                        still_pending.push(index);
                    }
                }
            }
            if let Some(base) = waiting_on.filter(|_| still_pending.len() == before) {
                return Err(Error::corrupt_pack(format!(
                    "delta base {} is neither in the pack nor in the object store",
                    base
                )));
            }
            pending = still_pending;
        }

        summary.deltas = pack.delta_count();
        summary.objects += summary.deltas;
        summary.external_bases = resolver.external.len();
        bar.finish_and_clear();
        tracing::info!(
            "ingested {} objects ({} deltas, {} external bases)",
            summary.objects,
            summary.deltas,
            summary.external_bases
        );
        Ok(summary)
    }

    /// Store one reconstructed object and remember it for later deltas
    fn materialize(
        &self,
        resolver: &mut Resolver<'_>,
        index: usize,
        kind: Kind,
        data: Vec<u8>,
    ) -> Result<ObjectId> {
        let id = self.store.put(kind, &data)?;
        debug_assert_eq!(id, hash_object(kind, &data));
        resolver.by_id.insert(id, index);
        resolver.cache[index] = Some(Materialized { kind, data });
        Ok(id)
    }

    /// Resolve `index` and every unresolved delta beneath it using an
    /// explicit stack, so chain depth never grows the call stack.
    fn resolve_chain(&self, resolver: &mut Resolver<'_>, index: usize) -> Result<Progress> {
        let mut stack = vec![index];
        while let Some(&top) = stack.last() {
            if resolver.cache[top].is_some() {
                stack.pop();
                continue;
            }

            let base = match self.locate_base(resolver, top)? {
                Some(base) => base,
                None => {
                    let missing = match &resolver.pack.entries[top].kind {
                        EntryKind::RefDelta { base } => *base,
                        _ => ObjectId::NULL,
                    };
                    return Ok(Progress::Waiting(missing));
                }
            };

            let delta = &resolver.pack.entries[top].data;
            let (kind, data) = match base {
                Base::Entry(b) => match &resolver.cache[b] {
                    Some(base) => (base.kind, apply_delta(&base.data, delta)?),
                    None => {
                        stack.push(b);
                        continue;
                    }
                },
                Base::External(id) => match resolver.external.get(&id) {
                    Some(base) => (base.kind, apply_delta(&base.data, delta)?),
                    None => {
                        return Err(Error::corrupt_pack(format!(
                            "external base {} vanished",
                            id
                        )))
                    }
                },
            };
            let id = self.materialize(resolver, top, kind, data)?;
            tracing::trace!("resolved delta at offset {} -> {}", resolver.pack.entries[top].offset, id);
            stack.pop();
        }
        Ok(Progress::Resolved)
    }

    /// Where the base of delta entry `index` lives, or `None` if a
    /// ref-delta names an object that is not available yet
    fn locate_base(&self, resolver: &mut Resolver<'_>, index: usize) -> Result<Option<Base>> {
        let entry = &resolver.pack.entries[index];
        match &entry.kind {
            EntryKind::OfsDelta { base_offset } => {
                let base = resolver.by_offset.get(base_offset).copied().ok_or_else(|| {
                    Error::corrupt_pack(format!(
                        "ofs-delta at {} refers to {}, which is not an entry",
                        entry.offset, base_offset
                    ))
                })?;
                Ok(Some(Base::Entry(base)))
            }
            EntryKind::RefDelta { base } => {
                if let Some(&found) = resolver.by_id.get(base) {
                    return Ok(Some(Base::Entry(found)));
                }
                if resolver.external.contains_key(base) {
                    return Ok(Some(Base::External(*base)));
                }
                if !self.store.exists(base) {
                    return Ok(None);
                }
                let object = self.store.read(base)?;
                tracing::debug!("using local object {} as delta base", base);
                resolver.external.insert(
                    *base,
                    Materialized {
                        kind: object.kind,
                        data: object.data,
                    },
                );
                Ok(Some(Base::External(*base)))
            }
            EntryKind::Object(_) => Err(Error::corrupt_pack(format!(
                "entry at {} is not a delta",
                entry.offset
            ))),
        }
    }
}

impl<'p> Resolver<'p> {
    fn new(pack: &'p DecodedPack) -> Self {
        let by_offset = pack
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.offset, i))
            .collect();
        Self {
            pack,
            by_offset,
            cache: pack.entries.iter().map(|_| None).collect(),
            by_id: HashMap::new(),
            external: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::super::decode::decode_pack;
    use super::super::test_pack::{insert_delta, PackBuilder};
    use super::*;

    fn store() -> (TempDir, ObjectStore) {
        let temp = TempDir::new().unwrap();
        let store = ObjectStore::new(temp.path().join("objects"));
        store.initialize().unwrap();
        (temp, store)
    }

    fn ingest(store: &ObjectStore, pack: &[u8]) -> Result<IngestSummary> {
        let decoded = decode_pack(pack)?;
        PackIngestor::new(store).ingest(&decoded)
    }

    #[test]
    fn test_blob_and_ofs_delta() {
        let (_temp, store) = store();
        // copy "hello" then insert " world"
        let delta = [5, 11, 0x90, 5, 6, b' ', b'w', b'o', b'r', b'l', b'd'];
        let pack = PackBuilder::new()
            .object(Kind::Blob, b"hello")
            .ofs_delta(0, &delta)
            .build();

        let summary = ingest(&store, &pack).unwrap();
        assert_eq!(summary.objects, 2);
        assert_eq!(summary.deltas, 1);

        let id = hash_object(Kind::Blob, b"hello world");
        assert_eq!(store.read(&id).unwrap().data, b"hello world");
        assert!(store.exists(&hash_object(Kind::Blob, b"hello")));
    }

    #[test]
    fn test_ref_delta_before_its_base() {
        let (_temp, store) = store();
        let base_id = hash_object(Kind::Tree, b"");
        let pack = PackBuilder::new()
            .ref_delta(base_id, &insert_delta(0, b"not really a tree"))
            .object(Kind::Tree, b"")
            .build();

        ingest(&store, &pack).unwrap();
        let object = store
            .read(&hash_object(Kind::Tree, b"not really a tree"))
            .unwrap();
        assert_eq!(object.kind, Kind::Tree);
    }

    #[test]
    fn test_ref_delta_against_local_store() {
        let (_temp, store) = store();
        let base_id = store.put(Kind::Blob, b"local base").unwrap();
        let pack = PackBuilder::new()
            .ref_delta(base_id, &[10, 5, 0x90, 5])
            .build();

        let summary = ingest(&store, &pack).unwrap();
        assert_eq!(summary.external_bases, 1);
        assert_eq!(
            store.get(&hash_object(Kind::Blob, b"local")).unwrap(),
            b"local"
        );
    }

    #[test]
    fn test_missing_ref_delta_base() {
        let (_temp, store) = store();
        let base_id = hash_object(Kind::Blob, b"nowhere");
        let pack = PackBuilder::new()
            .object(Kind::Blob, b"unrelated")
            .ref_delta(base_id, &insert_delta(7, b"x"))
            .build();

        match ingest(&store, &pack) {
            Err(Error::CorruptPack(msg)) => assert!(msg.contains(&base_id.to_hex()), "{}", msg),
            other => panic!("expected corrupt pack, got {:?}", other),
        }
    }

    #[test]
    fn test_delta_chain_through_ref_and_ofs() {
        let (_temp, store) = store();
        // blob <- ofs(v2) <- ofs(v3); v4 is a ref-delta on v3's id
        let v2 = b"version 2";
        let v3 = b"version 3!";
        let v4 = b"v4";
        let pack = PackBuilder::new()
            .object(Kind::Blob, b"v1")
            .ofs_delta(0, &insert_delta(2, v2))
            .ofs_delta(1, &insert_delta(v2.len(), v3))
            .ref_delta(hash_object(Kind::Blob, v3), &insert_delta(v3.len(), v4))
            .build();

        let summary = ingest(&store, &pack).unwrap();
        assert_eq!(summary.objects, 4);
        for data in [&b"v1"[..], v2, v3, v4] {
            assert_eq!(store.get(&hash_object(Kind::Blob, data)).unwrap(), data);
        }
    }

    #[test]
    fn test_deep_delta_chain() {
        let (_temp, store) = store();
        let depth = 5_000;
        let mut builder = PackBuilder::new().object(Kind::Blob, b"0");
        let mut previous = b"0".to_vec();
        for i in 1..=depth {
            let next = i.to_string().into_bytes();
            builder = builder.ofs_delta(i - 1, &insert_delta(previous.len(), &next));
            previous = next;
        }
        let pack = builder.build();

        let summary = ingest(&store, &pack).unwrap();
        assert_eq!(summary.deltas, depth);
        assert_eq!(
            store.get(&hash_object(Kind::Blob, depth.to_string().as_bytes())).unwrap(),
            depth.to_string().as_bytes()
        );
    }

    #[test]
    fn test_checksum_failure_writes_nothing() {
        let (_temp, store) = store();
        let mut pack = PackBuilder::new().object(Kind::Blob, b"hello").build();
        let last = pack.len() - 1;
        pack[last] ^= 0x55;

        assert!(matches!(ingest(&store, &pack), Err(Error::Checksum { .. })));
        assert!(!store.exists(&hash_object(Kind::Blob, b"hello")));
    }
}
