//! Named objects grouped under a single catalog.
//!
//! A [Container] keeps the list of its objects in a [Metadata] store inside the container's own
//! partition. Each object lives in a partition derived from the container name, its
//! [ObjectKind] and its (hex encoded) name, so any name can be used without clashing with the
//! partition naming rules of the underlying [Storage].

use crate::{metadata::Metadata, Dataset, Error, Param};
use bytes::{Buf, BufMut};
use geoseis_runtime::Storage;
use geoseis_utils::hex;
use std::{collections::BTreeSet, fmt};
use tracing::{debug, info};

/// Layout version of the encoded catalog.
const VERSION: u8 = 1;

/// Name used by [CreationPolicy::CreateUnderNewName] when none is given.
const UNNAMED: &str = "no_name";

/// Kind of an object stored in a [Container].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Seismic,
    Well,
    Map,
    Horizon,
    Points,
}

impl ObjectKind {
    fn code(self) -> u8 {
        match self {
            Self::Seismic => 0,
            Self::Well => 1,
            Self::Map => 2,
            Self::Horizon => 3,
            Self::Points => 4,
        }
    }

    fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(Self::Seismic),
            1 => Ok(Self::Well),
            2 => Ok(Self::Map),
            3 => Ok(Self::Horizon),
            4 => Ok(Self::Points),
            other => Err(Error::Corrupt(format!("catalog: object kind {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seismic => "seismic",
            Self::Well => "well",
            Self::Map => "map",
            Self::Horizon => "horizon",
            Self::Points => "points",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when creating an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CreationPolicy {
    /// Open an existing object; fail if it is missing.
    Open,
    /// Open the object if it exists, create it otherwise.
    #[default]
    OpenOrCreate,
    /// Create the object; fail if it exists.
    Create,
    /// Replace an existing object with a new one.
    CreateOrOverwrite,
    /// Always create, appending `_1`, `_2`, ... to the name until it is unused.
    CreateUnderNewName,
}

/// Capabilities shared by every object stored in a [Container].
pub trait Object {
    fn name(&self) -> &str;

    fn kind(&self) -> ObjectKind;

    /// Partition holding the object.
    fn partition(&self) -> &str;

    /// Whether both handles refer to the same stored object.
    fn same_object(&self, other: &dyn Object) -> bool {
        self.kind() == other.kind() && self.partition() == other.partition()
    }
}

impl<S: Storage> Object for Dataset<S> {
    fn name(&self) -> &str {
        Dataset::name(self)
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Seismic
    }

    fn partition(&self) -> &str {
        Dataset::partition(self)
    }
}

/// Partition of object `name` of `kind` inside container `container`.
fn object_partition(container: &str, kind: ObjectKind, name: &str) -> String {
    format!("{container}-{kind}-{}", hex(name.as_bytes()))
}

/// First of `base`, `base_1`, `base_2`, ... not in `taken`.
fn unique_name(taken: &[String], base: &str) -> String {
    let base = if base.is_empty() { UNNAMED } else { base };
    if !taken.iter().any(|name| name == base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{base}_{i}"))
        .find(|name| !taken.contains(name))
        .unwrap_or_else(|| base.to_string())
}

fn encode_catalog(objects: &BTreeSet<(ObjectKind, String)>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(VERSION);
    buf.put_u64(objects.len() as u64);
    for (kind, name) in objects {
        buf.put_u8(kind.code());
        buf.put_u32(name.len() as u32);
        buf.put_slice(name.as_bytes());
    }
    buf
}

fn decode_catalog(mut buf: &[u8]) -> Result<BTreeSet<(ObjectKind, String)>, Error> {
    let truncated = || Error::Corrupt("catalog: truncated".into());
    if buf.remaining() < 9 {
        return Err(truncated());
    }
    let version = buf.get_u8();
    if version != VERSION {
        return Err(Error::Corrupt(format!("catalog: version {version}")));
    }
    let count = buf.get_u64();
    let mut objects = BTreeSet::new();
    for _ in 0..count {
        if buf.remaining() < 5 {
            return Err(truncated());
        }
        let kind = ObjectKind::from_code(buf.get_u8())?;
        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(truncated());
        }
        let name = String::from_utf8(buf[..len].to_vec())
            .map_err(|_| Error::Corrupt("catalog: name is not UTF-8".into()))?;
        buf.advance(len);
        objects.insert((kind, name));
    }
    if buf.has_remaining() {
        return Err(Error::Corrupt("catalog: trailing bytes".into()));
    }
    Ok(objects)
}

/// A named collection of objects persisted in a [Storage].
pub struct Container<S: Storage> {
    storage: S,
    name: String,
    catalog: Metadata<S::Blob>,
    objects: BTreeSet<(ObjectKind, String)>,
}

impl<S: Storage> Container<S> {
    /// Create an empty container; fails with [Error::ObjectExists] if `name` already holds one.
    pub fn create(storage: S, name: &str) -> Result<Self, Error> {
        let mut catalog = Metadata::init(&storage, name)?;
        if catalog.get().is_some() {
            return Err(Error::ObjectExists(name.to_string()));
        }
        let objects = BTreeSet::new();
        catalog.put(encode_catalog(&objects))?;
        info!(name, "created container");
        Ok(Self {
            storage,
            name: name.to_string(),
            catalog,
            objects,
        })
    }

    /// Open an existing container; fails with [Error::ObjectMissing] if there is none.
    pub fn open(storage: S, name: &str) -> Result<Self, Error> {
        let catalog = Metadata::init(&storage, name)?;
        let Some(payload) = catalog.get() else {
            return Err(Error::ObjectMissing(name.to_string()));
        };
        let objects = decode_catalog(payload)?;
        debug!(name, objects = objects.len(), "opened container");
        Ok(Self {
            storage,
            name: name.to_string(),
            catalog,
            objects,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Whether the container lists an object of `kind` named `name`.
    pub fn contains(&self, kind: ObjectKind, name: &str) -> bool {
        self.objects.contains(&(kind, name.to_string()))
    }

    /// Names of all objects of `kind`, sorted.
    pub fn names(&self, kind: ObjectKind) -> Vec<String> {
        self.objects
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Drop the blobs in `partition`, if any.
    fn clear(&self, partition: &str) -> Result<(), Error> {
        match self.storage.remove(partition, None) {
            Ok(()) | Err(geoseis_runtime::Error::PartitionMissing(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.catalog.put(encode_catalog(&self.objects))
    }

    /// Remove the object of `kind` named `name` and all of its data.
    ///
    /// Returns whether the object existed.
    pub fn remove(&mut self, kind: ObjectKind, name: &str) -> Result<bool, Error> {
        if !self.objects.remove(&(kind, name.to_string())) {
            return Ok(false);
        }
        self.commit()?;
        self.clear(&object_partition(&self.name, kind, name))?;
        info!(container = self.name, %kind, name, "removed object");
        Ok(true)
    }

    /// Open the seismic dataset named `name`.
    pub fn open_seismic(&self, name: &str) -> Result<Dataset<S>, Error> {
        if !self.contains(ObjectKind::Seismic, name) {
            return Err(Error::ObjectMissing(name.to_string()));
        }
        Dataset::open(
            &self.storage,
            &object_partition(&self.name, ObjectKind::Seismic, name),
        )
    }

    /// Create (or open, depending on `policy`) the seismic dataset named `name`.
    ///
    /// `param` is ignored when an existing dataset is opened.
    pub fn create_seismic(
        &mut self,
        name: &str,
        param: Param,
        policy: CreationPolicy,
    ) -> Result<Dataset<S>, Error> {
        let exists = self.contains(ObjectKind::Seismic, name);
        let name = match policy {
            CreationPolicy::Open => return self.open_seismic(name),
            CreationPolicy::OpenOrCreate if exists => return self.open_seismic(name),
            CreationPolicy::Create if exists => {
                return Err(Error::ObjectExists(name.to_string()));
            }
            CreationPolicy::CreateOrOverwrite if exists => {
                self.remove(ObjectKind::Seismic, name)?;
                name.to_string()
            }
            CreationPolicy::CreateUnderNewName => {
                unique_name(&self.names(ObjectKind::Seismic), name)
            }
            _ => name.to_string(),
        };

        let partition = object_partition(&self.name, ObjectKind::Seismic, &name);
        // Leftovers of an object that never made it into the catalog
        self.clear(&partition)?;
        let dataset = Dataset::create(&self.storage, &partition, &name, param)?;
        self.objects.insert((ObjectKind::Seismic, name));
        self.commit()?;
        Ok(dataset)
    }
}
