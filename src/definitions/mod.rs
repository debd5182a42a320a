//! Timer and sequence definitions.
//!
//! The playback engines never load definitions themselves; callers fetch them
//! from a [`DefinitionSource`] and hand them to `start`/`reset`. This module
//! provides the source trait plus two implementations:
//! - [`InMemoryDefinitions`]: a mutable catalog held in memory
//! - [`DefinitionsFile`]: the same catalog loaded from and saved to JSON

pub mod error;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

pub use self::error::DefinitionError;

use crate::types::{EntityId, NotificationKind, SequenceDefinition, StepDefinition, TimerDefinition};

/// Directory under the home directory that holds the definitions file.
const DEFINITIONS_DIR: &str = ".sequence-timer";

/// File name of the definitions file.
const DEFINITIONS_FILE: &str = "definitions.json";

// ============================================================================
// DefinitionSource
// ============================================================================

/// Supplies immutable definitions by ID.
#[allow(async_fn_in_trait)]
pub trait DefinitionSource {
    /// Looks up a timer definition.
    async fn timer(&self, id: EntityId) -> Result<Option<TimerDefinition>, DefinitionError>;

    /// Looks up a sequence definition.
    async fn sequence(&self, id: EntityId) -> Result<Option<SequenceDefinition>, DefinitionError>;

    /// All timer definitions, ordered by ID.
    async fn timers(&self) -> Result<Vec<TimerDefinition>, DefinitionError>;

    /// All sequence definitions, ordered by ID.
    async fn sequences(&self) -> Result<Vec<SequenceDefinition>, DefinitionError>;
}

impl<T: DefinitionSource + ?Sized> DefinitionSource for &T {
    async fn timer(&self, id: EntityId) -> Result<Option<TimerDefinition>, DefinitionError> {
        (**self).timer(id).await
    }

    async fn sequence(&self, id: EntityId) -> Result<Option<SequenceDefinition>, DefinitionError> {
        (**self).sequence(id).await
    }

    async fn timers(&self) -> Result<Vec<TimerDefinition>, DefinitionError> {
        (**self).timers().await
    }

    async fn sequences(&self) -> Result<Vec<SequenceDefinition>, DefinitionError> {
        (**self).sequences().await
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Serialized form of a definitions catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub timers: Vec<TimerDefinition>,
    #[serde(default)]
    pub sequences: Vec<SequenceDefinition>,
}

impl Definitions {
    /// Validates every definition and rejects duplicate IDs.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut timer_ids = HashSet::new();
        for timer in &self.timers {
            timer.validate().map_err(DefinitionError::Invalid)?;
            if !timer_ids.insert(timer.id) {
                return Err(DefinitionError::Invalid(format!("duplicate timer id {}", timer.id)));
            }
        }

        let mut sequence_ids = HashSet::new();
        for sequence in &self.sequences {
            sequence.validate().map_err(DefinitionError::Invalid)?;
            if !sequence_ids.insert(sequence.id) {
                return Err(DefinitionError::Invalid(format!(
                    "duplicate sequence id {}",
                    sequence.id
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryDefinitions
// ============================================================================

#[derive(Debug, Default)]
struct Catalog {
    timers: BTreeMap<EntityId, TimerDefinition>,
    sequences: BTreeMap<EntityId, SequenceDefinition>,
}

impl Catalog {
    fn next_sequence_id(&self) -> EntityId {
        self.sequences.keys().next_back().map_or(1, |id| id + 1)
    }

    fn next_step_id(&self) -> EntityId {
        self.sequences
            .values()
            .flat_map(|sequence| sequence.steps.iter().map(|step| step.id))
            .max()
            .map_or(1, |id| id + 1)
    }
}

/// Mutable in-memory catalog of definitions.
#[derive(Debug, Default)]
pub struct InMemoryDefinitions {
    catalog: RwLock<Catalog>,
}

impl InMemoryDefinitions {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from serialized definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if any definition is invalid or an ID repeats.
    pub fn from_definitions(definitions: Definitions) -> Result<Self, DefinitionError> {
        definitions.validate()?;
        let catalog = Catalog {
            timers: definitions
                .timers
                .into_iter()
                .map(|timer| (timer.id, timer))
                .collect(),
            sequences: definitions
                .sequences
                .into_iter()
                .map(|sequence| (sequence.id, sequence))
                .collect(),
        };
        Ok(Self {
            catalog: RwLock::new(catalog),
        })
    }

    /// Copies the catalog into its serialized form.
    pub fn to_definitions(&self) -> Definitions {
        let catalog = self.read();
        Definitions {
            timers: catalog.timers.values().cloned().collect(),
            sequences: catalog.sequences.values().cloned().collect(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts or replaces a timer definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid.
    pub fn insert_timer(&self, timer: TimerDefinition) -> Result<(), DefinitionError> {
        timer.validate().map_err(DefinitionError::Invalid)?;
        self.write().timers.insert(timer.id, timer);
        Ok(())
    }

    /// Inserts or replaces a sequence definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid.
    pub fn insert_sequence(&self, sequence: SequenceDefinition) -> Result<(), DefinitionError> {
        sequence.validate().map_err(DefinitionError::Invalid)?;
        self.write().sequences.insert(sequence.id, sequence);
        Ok(())
    }

    /// Removes a timer definition.
    pub fn remove_timer(&self, id: EntityId) -> Option<TimerDefinition> {
        self.write().timers.remove(&id)
    }

    /// Removes a sequence definition.
    pub fn remove_sequence(&self, id: EntityId) -> Option<SequenceDefinition> {
        self.write().sequences.remove(&id)
    }

    /// Creates a sequence from `(label, duration_seconds)` pairs.
    ///
    /// Steps get fresh IDs and orders matching their position in `steps`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting sequence is invalid.
    pub fn create_sequence_with_steps<S>(
        &self,
        name: impl Into<String>,
        category_id: EntityId,
        steps: impl IntoIterator<Item = (S, u64)>,
    ) -> Result<SequenceDefinition, DefinitionError>
    where
        S: Into<String>,
    {
        let mut catalog = self.write();
        let first_step_id = catalog.next_step_id();

        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, (label, duration_seconds))| {
                let order = i32::try_from(index).map_err(|_| {
                    DefinitionError::Invalid("too many steps in one sequence".to_string())
                })?;
                Ok(StepDefinition {
                    id: first_step_id + index as EntityId,
                    label: label.into(),
                    duration_seconds,
                    notification_kind: NotificationKind::default(),
                    order,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        let mut sequence = SequenceDefinition::new(catalog.next_sequence_id(), name, steps);
        sequence.category_id = category_id;
        sequence.validate().map_err(DefinitionError::Invalid)?;

        catalog.sequences.insert(sequence.id, sequence.clone());
        tracing::debug!(sequence_id = sequence.id, steps = sequence.step_count(), "sequence created");
        Ok(sequence)
    }
}

impl DefinitionSource for InMemoryDefinitions {
    async fn timer(&self, id: EntityId) -> Result<Option<TimerDefinition>, DefinitionError> {
        Ok(self.read().timers.get(&id).cloned())
    }

    async fn sequence(&self, id: EntityId) -> Result<Option<SequenceDefinition>, DefinitionError> {
        Ok(self.read().sequences.get(&id).cloned())
    }

    async fn timers(&self) -> Result<Vec<TimerDefinition>, DefinitionError> {
        Ok(self.read().timers.values().cloned().collect())
    }

    async fn sequences(&self) -> Result<Vec<SequenceDefinition>, DefinitionError> {
        Ok(self.read().sequences.values().cloned().collect())
    }
}

// ============================================================================
// DefinitionsFile
// ============================================================================

/// A definitions catalog backed by a JSON file.
///
/// The file is read once on [`DefinitionsFile::open`]; changes made through
/// [`DefinitionsFile::catalog`] are written back by [`DefinitionsFile::save`].
#[derive(Debug)]
pub struct DefinitionsFile {
    path: PathBuf,
    catalog: InMemoryDefinitions,
}

impl DefinitionsFile {
    /// Returns `~/.sequence-timer/definitions.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFINITIONS_DIR).join(DEFINITIONS_FILE))
    }

    /// Loads the catalog at `path`. A missing file is an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds invalid definitions.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DefinitionError> {
        let path = path.into();
        let definitions = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).map_err(|source| DefinitionError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "definitions file not found, starting empty");
                Definitions::default()
            }
            Err(source) => return Err(DefinitionError::Io { path, source }),
        };

        let catalog = InMemoryDefinitions::from_definitions(definitions)?;
        Ok(Self { path, catalog })
    }

    /// Writes the catalog back as pretty-printed JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<(), DefinitionError> {
        let io_error = |source: std::io::Error| DefinitionError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(&self.catalog.to_definitions()).map_err(|source| {
            DefinitionError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_error)?;

        tracing::debug!(path = %self.path.display(), "definitions saved");
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded catalog.
    pub fn catalog(&self) -> &InMemoryDefinitions {
        &self.catalog
    }
}

impl DefinitionSource for DefinitionsFile {
    async fn timer(&self, id: EntityId) -> Result<Option<TimerDefinition>, DefinitionError> {
        self.catalog.timer(id).await
    }

    async fn sequence(&self, id: EntityId) -> Result<Option<SequenceDefinition>, DefinitionError> {
        self.catalog.sequence(id).await
    }

    async fn timers(&self) -> Result<Vec<TimerDefinition>, DefinitionError> {
        self.catalog.timers().await
    }

    async fn sequences(&self) -> Result<Vec<SequenceDefinition>, DefinitionError> {
        self.catalog.sequences().await
    }
}

// ============================================================================
// Tests
// ============================================================================
