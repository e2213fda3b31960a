//! JSON artifacts consumed by the game front end.
//!
//! - `relations.json`: `{src: {dst: [distance, direction]}}`
//! - `municipality_list.json`: `{name: id}` sorted by name
//! - `date_list.json`: `{YYYYMMDD: id}`
//!
//! Key order is part of the format, so the maps are serialized by hand
//! instead of going through a `HashMap`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::region::RegionStore;
use crate::relations::RelationGraph;
use crate::rotation::DateAssignment;

pub const RELATIONS_FILE: &str = "relations.json";
pub const MUNICIPALITY_LIST_FILE: &str = "municipality_list.json";
pub const DATE_LIST_FILE: &str = "date_list.json";

/// Round to `decimals` places by the exact binary value, so 5.325 (stored as
/// 5.32500000000000017…) becomes 5.33. Exact ties go to the even digit.
fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Serializable view of a [`RelationGraph`] with rounded values.
pub struct RelationsList<'a>(pub &'a RelationGraph);

struct Neighbors<'a> {
    graph: &'a RelationGraph,
    src: usize,
}

impl Serialize for RelationsList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let graph = self.0;
        let mut map = serializer.serialize_map(Some(graph.len()))?;
        for (src, id) in graph.ids().iter().enumerate() {
            map.serialize_entry(id, &Neighbors { graph, src })?;
        }
        map.end()
    }
}

impl Serialize for Neighbors<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.graph.len().saturating_sub(1)))?;
        for (dst, edge) in self.graph.neighbors(self.src) {
            map.serialize_entry(dst, &[round_to(edge.distance, 0), round_to(edge.direction, 2)])?;
        }
        map.end()
    }
}

/// `(name, id)` pairs sorted by name. A repeated name keeps its first
/// position and takes the id of its last occurrence.
pub fn municipality_entries(store: &RegionStore) -> Vec<(&str, &str)> {
    let mut entries: Vec<(&str, &str)> = store
        .iter()
        .map(|r| (r.name.as_str(), r.id.as_str()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut deduped: Vec<(&str, &str)> = Vec::with_capacity(entries.len());
    for (name, id) in entries {
        match deduped.last_mut() {
            Some(last) if last.0 == name => {
                warn!(name, replaced = last.1, by = id, "duplicate region name");
                last.1 = id;
            }
            _ => deduped.push((name, id)),
        }
    }
    deduped
}

struct OrderedMap<I>(I);

impl<K, V, I> Serialize for OrderedMap<I>
where
    K: Serialize,
    V: Serialize,
    I: Iterator<Item = (K, V)> + Clone,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.clone())
    }
}

pub fn relations_json(graph: &RelationGraph) -> Result<String> {
    Ok(serde_json::to_string(&RelationsList(graph))?)
}

pub fn municipality_list_json(store: &RegionStore) -> Result<String> {
    let entries = municipality_entries(store);
    Ok(serde_json::to_string(&OrderedMap(entries.into_iter()))?)
}

pub fn date_list_json(assignment: &DateAssignment) -> Result<String> {
    Ok(serde_json::to_string(&OrderedMap(assignment.keyed()))?)
}

/// Write `contents` to `dir/name` via a temporary sibling, so readers never
/// see a half-written file.
pub fn write_atomic(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let path = dir.join(name);
    let tmp = dir.join(format!(".{}.tmp", name));
    fs::write(&tmp, contents).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::io(&path, e)
    })?;
    info!(path = %path.display(), bytes = contents.len(), "wrote artifact");
    Ok(path)
}

pub fn write_relations(dir: &Path, graph: &RelationGraph) -> Result<PathBuf> {
    write_atomic(dir, RELATIONS_FILE, relations_json(graph)?.as_bytes())
}

pub fn write_municipality_list(dir: &Path, store: &RegionStore) -> Result<PathBuf> {
    write_atomic(dir, MUNICIPALITY_LIST_FILE, municipality_list_json(store)?.as_bytes())
}

pub fn write_date_list(dir: &Path, assignment: &DateAssignment) -> Result<PathBuf> {
    write_atomic(dir, DATE_LIST_FILE, date_list_json(assignment)?.as_bytes())
}
