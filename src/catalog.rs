//! Meditation scripts the user can pick from.
//!
//! The catalog is read-only for the lifetime of the process. A JSON file can
//! replace the built-in set; see [`Catalog::from_file`].

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Audio reference understood by the playback engine as generated ambience.
pub const AMBIENT_BROWN_NOISE: &str = "ambient:brown-noise";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub title: String,
    pub duration_seconds: u64,
    pub audio_ref: String,
}

pub trait ScriptCatalog: Send + Sync {
    /// Fails with [`Error::NotFound`] for unknown ids.
    fn get_script(&self, script_id: &str) -> Result<Script>;

    fn list_scripts(&self) -> Vec<Script>;
}

#[derive(Debug, Clone)]
pub struct Catalog {
    scripts: BTreeMap<String, Script>,
}

#[derive(Deserialize)]
struct CatalogFile {
    scripts: Vec<Script>,
}

impl Catalog {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|script| (script.id.clone(), script))
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        let script = |id: &str, title: &str, minutes: u64| Script {
            id: id.to_string(),
            title: title.to_string(),
            duration_seconds: minutes * 60,
            audio_ref: AMBIENT_BROWN_NOISE.to_string(),
        };

        Self::new([
            script("breathing-3", "呼吸に集中する", 3),
            script("body-scan-10", "ボディスキャン", 10),
            script("sleep-20", "眠りのための瞑想", 20),
        ])
    }

    /// Loads `{ "scripts": [...] }` from disk. Duplicate ids keep the last entry.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&contents).map_err(|err| {
            Error::Config(format!("invalid catalog {}: {err}", path.display()))
        })?;

        if let Some(bad) = file.scripts.iter().find(|s| s.duration_seconds == 0) {
            return Err(Error::Config(format!(
                "script '{}' in {} has zero duration",
                bad.id,
                path.display()
            )));
        }

        Ok(Self::new(file.scripts))
    }
}

impl ScriptCatalog for Catalog {
    fn get_script(&self, script_id: &str) -> Result<Script> {
        self.scripts
            .get(script_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("script '{script_id}'")))
    }

    fn list_scripts(&self) -> Vec<Script> {
        self.scripts.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_script_is_not_found() {
        let catalog = Catalog::builtin();
        assert!(matches!(
            catalog.get_script("nope"),
            Err(Error::NotFound(_))
        ));
        assert_eq!(catalog.get_script("breathing-3").unwrap().duration_seconds, 180);
    }

    #[test]
    fn loads_scripts_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"scripts":[{{"id":"short","title":"Short","durationSeconds":30,"audioRef":"bell.ogg"}}]}}"#
        )
        .unwrap();

        let catalog = Catalog::from_file(file.path()).unwrap();
        let script = catalog.get_script("short").unwrap();
        assert_eq!(script.audio_ref, "bell.ogg");
        assert_eq!(catalog.list_scripts().len(), 1);
    }

    #[test]
    fn rejects_zero_duration_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"scripts":[{{"id":"empty","title":"Empty","durationSeconds":0,"audioRef":"x"}}]}}"#
        )
        .unwrap();

        assert!(matches!(
            Catalog::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
