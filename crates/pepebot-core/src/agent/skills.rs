//! Skill discovery and loading.
//!
//! Scans `{workspace}/skills/` for skill directories, each containing a
//! `SKILL.md` (markdown with optional frontmatter). Loaded skills are
//! cached in an `RwLock` for concurrent read access with infrequent
//! writes.
//!
//! Directory layout:
//! ```text
//! skills/
//! +-- research/
//! |   +-- SKILL.md
//! +-- code_review/
//!     +-- SKILL.md
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use pepebot_types::skill::SkillInfo;

/// Loads and caches skills from a workspace directory.
pub struct SkillsLoader {
    skills_dir: PathBuf,
    skills: RwLock<HashMap<String, SkillInfo>>,
}

impl SkillsLoader {
    /// Create a loader over `{workspace}/skills/`.
    pub fn new(workspace: &std::path::Path) -> Self {
        Self::with_dir(workspace.join("skills"))
    }

    /// Create a loader with an explicit skills directory.
    pub fn with_dir(skills_dir: PathBuf) -> Self {
        Self {
            skills_dir,
            skills: RwLock::new(HashMap::new()),
        }
    }

    /// The skills directory.
    pub fn skills_dir(&self) -> &PathBuf {
        &self.skills_dir
    }

    /// Scan the skills directory and refresh the cache.
    ///
    /// Unreadable entries are logged and skipped; a broken skill never
    /// hides the others.
    pub async fn load_all(&self) -> Vec<SkillInfo> {
        let mut loaded = Vec::new();

        let mut dir = match tokio::fs::read_dir(&self.skills_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                debug!(path = %self.skills_dir.display(), error = %e, "no skills directory");
                return loaded;
            }
        };

        while let Ok(Some(dirent)) = dir.next_entry().await {
            let path = dirent.path();
            if !path.is_dir() {
                continue;
            }
            let dir_name = dirent.file_name().to_string_lossy().into_owned();
            match tokio::fs::read_to_string(path.join("SKILL.md")).await {
                Ok(raw) => {
                    let skill = SkillInfo::parse(&dir_name, &raw);
                    loaded.push(skill);
                }
                Err(e) => {
                    warn!(skill = %dir_name, error = %e, "skipping skill without readable SKILL.md");
                }
            }
        }

        loaded.sort_by(|a, b| a.name.cmp(&b.name));

        let mut cache = self.skills.write().await;
        cache.clear();
        for skill in &loaded {
            cache.insert(skill.name.clone(), skill.clone());
        }

        debug!(count = loaded.len(), "loaded skills");
        loaded
    }

    /// Get a skill by name, loading from disk when not cached.
    pub async fn get(&self, name: &str) -> Option<SkillInfo> {
        {
            let cache = self.skills.read().await;
            if let Some(skill) = cache.get(name) {
                return Some(skill.clone());
            }
        }

        let raw = tokio::fs::read_to_string(self.skills_dir.join(name).join("SKILL.md"))
            .await
            .ok()?;
        let skill = SkillInfo::parse(name, &raw);

        let mut cache = self.skills.write().await;
        cache.insert(skill.name.clone(), skill.clone());
        Some(skill)
    }

    /// Name + description listing of every installed skill.
    pub async fn list(&self) -> Vec<(String, String)> {
        self.load_all()
            .await
            .into_iter()
            .map(|s| (s.name, s.description))
            .collect()
    }
}
