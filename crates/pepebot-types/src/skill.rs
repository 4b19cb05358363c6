//! Skill metadata types.
//!
//! A skill is a directory `{workspace}/skills/{name}/` containing at
//! least a `SKILL.md`: free-form markdown with optional frontmatter
//! delimited by `---` lines. Only `name:` and `description:` are read
//! from the frontmatter; everything else is opaque instruction text.

use serde::{Deserialize, Serialize};

/// Metadata and content of a loaded skill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillInfo {
    /// Skill identifier (defaults to the directory name).
    pub name: String,

    /// One-line description for the skills index.
    #[serde(default)]
    pub description: String,

    /// Full SKILL.md body (frontmatter stripped).
    #[serde(default)]
    pub content: String,
}

impl SkillInfo {
    /// Parse SKILL.md content, extracting frontmatter when present.
    ///
    /// Frontmatter is the block between a leading `---` line and the
    /// next `---` line. Unknown frontmatter keys are ignored. When no
    /// frontmatter exists, the whole file is the body and `dir_name`
    /// supplies the name.
    pub fn parse(dir_name: &str, raw: &str) -> Self {
        let mut name = dir_name.to_string();
        let mut description = String::new();
        let mut body = raw;

        let trimmed = raw.trim_start();
        if let Some(rest) = trimmed.strip_prefix("---") {
            if let Some(end) = rest.find("\n---") {
                let front = &rest[..end];
                for line in front.lines() {
                    if let Some((key, value)) = line.split_once(':') {
                        match key.trim() {
                            "name" => name = value.trim().to_string(),
                            "description" => description = value.trim().to_string(),
                            _ => {}
                        }
                    }
                }
                body = rest[end + 4..].trim_start_matches(['\r', '\n']);
            }
        }

        Self {
            name,
            description,
            content: body.trim_end().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_frontmatter() {
        let raw = "---\nname: weather-reporter\ndescription: Fetches and formats weather\n---\n\n# Weather\n\nUse the forecast tool.";
        let skill = SkillInfo::parse("weather", raw);
        assert_eq!(skill.name, "weather-reporter");
        assert_eq!(skill.description, "Fetches and formats weather");
        assert!(skill.content.starts_with("# Weather"));
        assert!(!skill.content.contains("---"));
    }

    #[test]
    fn parse_without_frontmatter() {
        let raw = "# Just instructions\n\nDo the thing.";
        let skill = SkillInfo::parse("plain", raw);
        assert_eq!(skill.name, "plain");
        assert!(skill.description.is_empty());
        assert_eq!(skill.content, raw);
    }

    #[test]
    fn unknown_frontmatter_keys_ignored() {
        let raw = "---\nname: x\nversion: 2\nallowed_tools: [a, b]\n---\nbody";
        let skill = SkillInfo::parse("dir", raw);
        assert_eq!(skill.name, "x");
        assert_eq!(skill.content, "body");
    }

    #[test]
    fn colon_in_description_preserved() {
        let raw = "---\ndescription: usage: call me\n---\nbody";
        let skill = SkillInfo::parse("dir", raw);
        assert_eq!(skill.description, "usage: call me");
    }
}
