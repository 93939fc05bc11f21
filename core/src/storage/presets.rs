use crate::model::{AnalysisPreset, NewPreset};
use crate::prelude::{CoreError, CoreResult};
use crate::storage::journal::JournalEntry;
use crate::storage::Database;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
pub(crate) struct PresetTable {
    by_id: BTreeMap<u64, AnalysisPreset>,
    by_name: HashMap<String, u64>,
    next_id: u64,
}

impl PresetTable {
    pub(crate) fn put(&mut self, preset: AnalysisPreset) {
        self.next_id = self.next_id.max(preset.id + 1);
        if let Some(previous) = self.by_id.get(&preset.id) {
            self.by_name.remove(&previous.name);
        }
        self.by_name.insert(preset.name.clone(), preset.id);
        self.by_id.insert(preset.id, preset);
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Analysis presets, keyed by id with unique names. Read-only to analysis.
pub struct PresetStore<'a> {
    db: &'a Database,
}

impl<'a> PresetStore<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, preset: NewPreset) -> CoreResult<AnalysisPreset> {
        let mut table = self.db.write_presets()?;
        if table.by_name.contains_key(&preset.name) {
            return Err(CoreError::DuplicateKey(format!(
                "preset `{}` already exists",
                preset.name
            )));
        }
        let stored = AnalysisPreset {
            id: table.allocate_id(),
            name: preset.name,
            description: preset.description,
            preset_config: preset.preset_config,
        };
        self.db.journal(&JournalEntry::UpsertPreset {
            preset: stored.clone(),
        })?;
        table.put(stored.clone());
        Ok(stored)
    }

    /// Replaces the preset with the same name, or inserts it.
    pub fn upsert(&self, preset: NewPreset) -> CoreResult<AnalysisPreset> {
        let mut table = self.db.write_presets()?;
        let id = match table.by_name.get(&preset.name) {
            Some(&id) => id,
            None => table.allocate_id(),
        };
        let stored = AnalysisPreset {
            id,
            name: preset.name,
            description: preset.description,
            preset_config: preset.preset_config,
        };
        self.db.journal(&JournalEntry::UpsertPreset {
            preset: stored.clone(),
        })?;
        table.put(stored.clone());
        Ok(stored)
    }

    pub fn get(&self, id: u64) -> CoreResult<AnalysisPreset> {
        self.db
            .read_presets()?
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("preset {id}")))
    }

    pub fn get_by_name(&self, name: &str) -> CoreResult<AnalysisPreset> {
        let table = self.db.read_presets()?;
        let preset = table
            .by_name
            .get(name)
            .and_then(|id| table.by_id.get(id))
            .cloned();
        preset.ok_or_else(|| CoreError::NotFound(format!("preset `{name}`")))
    }

    /// All presets ordered by id.
    pub fn list(&self) -> CoreResult<Vec<AnalysisPreset>> {
        Ok(self.db.read_presets()?.by_id.values().cloned().collect())
    }
}
