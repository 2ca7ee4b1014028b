//! Replication data models.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    static ref RE_OBJECT_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]+(\.csv)?$").expect("invalid object id regex");
    static ref RE_LOOKUP_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]+\.csv$").expect("invalid lookup id regex");
    static ref RE_WORKER_GROUP: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid worker group regex");
}

/// The kinds of JSON configuration objects which are replicated through the object API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    Source,
    Destination,
    Pipeline,
    GlobalVariable,
}

impl ConfigKind {
    /// The REST collection path of this kind, relative to a worker group.
    pub fn collection_path(&self) -> &'static str {
        match self {
            Self::Source => "system/inputs",
            Self::Destination => "system/outputs",
            Self::Pipeline => "pipelines",
            Self::GlobalVariable => "lib/vars",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
            Self::Pipeline => f.write_str("pipeline"),
            Self::GlobalVariable => f.write_str("globalvariable"),
        }
    }
}

/// All kinds of objects which may be replicated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A JSON configuration object.
    Config(ConfigKind),
    /// A CSV lookup table.
    Lookup,
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(Self::Config(ConfigKind::Source)),
            "destination" => Ok(Self::Config(ConfigKind::Destination)),
            "pipeline" => Ok(Self::Config(ConfigKind::Pipeline)),
            "globalvariable" => Ok(Self::Config(ConfigKind::GlobalVariable)),
            "lookup" => Ok(Self::Lookup),
            _ => Err(Error::InvalidInput(format!(
                "invalid object type '{}', valid options are: Source, Destination, Pipeline, GlobalVariable or Lookup",
                s
            ))),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(kind) => kind.fmt(f),
            Self::Lookup => f.write_str("lookup"),
        }
    }
}

/// The action used when applying an object to a target worker group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    /// Create the object by posting to the collection root.
    Create,
    /// Overwrite an existing object in place.
    #[default]
    Update,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            _ => Err(Error::InvalidInput(format!("invalid action '{}', valid options are: Create or Update", s))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// The validated ID of a configuration object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate the given string as an object ID.
    pub fn parse(id: &str) -> Result<Self> {
        if !RE_OBJECT_ID.is_match(id) {
            return Err(Error::InvalidInput(format!(
                "invalid id '{}', ids must be alphanumeric with '-' and '_' allowed, and lookups must end with '.csv'",
                id
            )));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The validated ID of a lookup table, always ending in `.csv`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LookupId(String);

impl LookupId {
    /// Validate the given string as a lookup ID.
    pub fn parse(id: &str) -> Result<Self> {
        if !RE_LOOKUP_ID.is_match(id) {
            return Err(Error::InvalidInput(format!("expected lookup id '{}' to end with '.csv'", id)));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The object a replication run operates on: its kind together with its validated ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Subject {
    Config { kind: ConfigKind, id: ObjectId },
    Lookup { id: LookupId },
}

impl Subject {
    /// Parse and validate a raw object type & ID pair.
    ///
    /// This performs every input check a run needs, so a subject is always safe to replicate.
    pub fn parse(kind: &str, id: &str) -> Result<Self> {
        let kind: ObjectKind = kind.parse()?;
        let id = ObjectId::parse(id)?;
        match kind {
            ObjectKind::Config(kind) => Ok(Self::Config { kind, id }),
            ObjectKind::Lookup => Ok(Self::Lookup { id: LookupId::parse(id.as_str())? }),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Config { kind, .. } => ObjectKind::Config(*kind),
            Self::Lookup { .. } => ObjectKind::Lookup,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Config { id, .. } => id.as_str(),
            Self::Lookup { id } => id.as_str(),
        }
    }
}

/// Validate a single worker group name, returning it trimmed.
pub fn validate_worker_group(name: &str) -> Result<String> {
    let name = name.trim();
    if !RE_WORKER_GROUP.is_match(name) {
        return Err(Error::InvalidInput(format!(
            "invalid worker group '{}', names must be alphanumeric with '-' and '_' allowed",
            name
        )));
    }
    Ok(name.to_string())
}

/// An ordered set of distinct target worker group names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerGroupSet(Vec<String>);

impl WorkerGroupSet {
    /// Build a new set from the given names, dropping duplicates while keeping first occurrence order.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut groups: Vec<String> = Vec::new();
        for name in names {
            let name = validate_worker_group(name.as_ref())?;
            if !groups.contains(&name) {
                groups.push(name);
            }
        }
        if groups.is_empty() {
            return Err(Error::InvalidInput("at least one target worker group is required".into()));
        }
        Ok(Self(groups))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for WorkerGroupSet {
    type Err = Error;

    /// Parse a comma separated list of worker group names.
    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.split(','))
    }
}

impl<'a> IntoIterator for &'a WorkerGroupSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for WorkerGroupSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}
