use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use anyhow::Result;

/// The named values mirrored from the live session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    TextInput,
    VerificationResult,
    Solution,
    SavedProblems,
    Drills,
}

impl Slot {
    pub const ALL: [Slot; 5] = [
        Slot::TextInput,
        Slot::VerificationResult,
        Slot::Solution,
        Slot::SavedProblems,
        Slot::Drills,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Slot::TextInput => "ai_tutor_text_input",
            Slot::VerificationResult => "ai_tutor_verification_result",
            Slot::Solution => "ai_tutor_solution",
            Slot::SavedProblems => "ai_tutor_saved_problems",
            Slot::Drills => "ai_tutor_drills",
        }
    }
}

/// Key-value persistence for session slots. An absent slot is never an error.
pub trait SlotStore {
    fn get(&self, slot: Slot) -> Option<String>;
    fn set(&mut self, slot: Slot, value: &str) -> Result<()>;
    fn remove(&mut self, slot: Slot) -> Result<()>;

    /// Store `value`, or drop the slot when it is empty.
    fn put(&mut self, slot: Slot, value: &str) -> Result<()> {
        if value.is_empty() {
            self.remove(slot)
        } else {
            self.set(slot, value)
        }
    }
}

/// One file per slot under the data directory.
pub struct FileSlotStore {
    base_dir: PathBuf,
}

impl FileSlotStore {
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ai-tutor")
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn file_path(&self, slot: Slot) -> PathBuf {
        self.base_dir.join(slot.key())
    }
}

impl SlotStore for FileSlotStore {
    fn get(&self, slot: Slot) -> Option<String> {
        fs::read_to_string(self.file_path(slot)).ok()
    }

    fn set(&mut self, slot: Slot, value: &str) -> Result<()> {
        let path = self.file_path(slot);
        let tmp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&mut self, slot: Slot) -> Result<()> {
        match fs::remove_file(self.file_path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Volatile store, used when nothing should touch the disk.
#[derive(Default, Debug)]
pub struct MemorySlotStore {
    values: HashMap<Slot, String>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.values.contains_key(&slot)
    }
}

impl SlotStore for MemorySlotStore {
    fn get(&self, slot: Slot) -> Option<String> {
        self.values.get(&slot).cloned()
    }

    fn set(&mut self, slot: Slot, value: &str) -> Result<()> {
        self.values.insert(slot, value.to_string());
        Ok(())
    }

    fn remove(&mut self, slot: Slot) -> Result<()> {
        self.values.remove(&slot);
        Ok(())
    }
}
