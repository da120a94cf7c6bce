// ─── Registry Records ───
// Typed views of the Modrinth v2 JSON payloads. Only the fields the
// resolver reads are modelled; unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileHashes {
    #[serde(default)]
    pub sha512: Option<String>,
}

/// A file attached to a version. Only `primary` files are fetched.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct File {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub hashes: FileHashes,
    #[serde(default)]
    pub size: Option<u64>,
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("filename", &self.filename)
            .field("primary", &self.primary)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Required,
    Optional,
    Incompatible,
    Embedded,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Dependency {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    pub dependency_type: DependencyType,
}

impl Dependency {
    pub fn is_required(&self) -> bool {
        self.dependency_type == DependencyType::Required
    }
}

/// A single published version of a project.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Version {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub version_number: String,
    pub date_published: DateTime<Utc>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Version {
    pub fn supports_loader(&self, loader: &str) -> bool {
        self.loaders.iter().any(|l| l == loader)
    }

    /// Publication time at whole-second precision; fractions are ignored.
    pub fn published_secs(&self) -> i64 {
        self.date_published.timestamp()
    }

    pub fn primary_files(&self) -> impl Iterator<Item = &File> {
        self.files.iter().filter(|f| f.primary)
    }

    pub fn required_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.is_required())
    }
}

/// Install requirement declared by a project for one side of the game.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformRequirement {
    Required,
    Optional,
    Unsupported,
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub slug: String,
    pub client_side: PlatformRequirement,
    pub server_side: PlatformRequirement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_version_payload() {
        let json = r#"{
            "id": "IZskON6d",
            "project_id": "P7dR8mSH",
            "name": "Fabric API 0.92.2",
            "version_number": "0.92.2+1.20.1",
            "date_published": "2024-05-08T18:03:45.123456Z",
            "loaders": ["fabric"],
            "game_versions": ["1.20.1"],
            "files": [{
                "url": "https://cdn.modrinth.com/data/P7dR8mSH/versions/IZskON6d/fabric-api.jar",
                "filename": "fabric-api.jar",
                "primary": true,
                "size": 2048,
                "hashes": {"sha512": "abc", "sha1": "def"}
            }],
            "dependencies": [
                {"project_id": "abc", "version_id": null, "dependency_type": "required"},
                {"project_id": "xyz", "dependency_type": "optional"}
            ],
            "featured": false
        }"#;

        let version: Version = serde_json::from_str(json).unwrap();
        assert_eq!(version.id, "IZskON6d");
        assert!(version.supports_loader("fabric"));
        assert!(!version.supports_loader("forge"));
        assert_eq!(version.primary_files().count(), 1);
        assert_eq!(version.files[0].hashes.sha512.as_deref(), Some("abc"));

        let required: Vec<_> = version.required_dependencies().collect();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].project_id.as_deref(), Some("abc"));
    }

    #[test]
    fn publication_time_ignores_fractional_seconds() {
        let parse = |ts: &str| -> Version {
            serde_json::from_value(serde_json::json!({
                "id": "v",
                "name": "v",
                "date_published": ts,
            }))
            .unwrap()
        };

        let a = parse("2024-01-01T00:00:00.999Z");
        let b = parse("2024-01-01T00:00:00Z");
        assert_eq!(a.published_secs(), b.published_secs());
    }

    #[test]
    fn deserialize_project_payload() {
        let project: Project = serde_json::from_value(serde_json::json!({
            "id": "AANobbMI",
            "slug": "sodium",
            "client_side": "required",
            "server_side": "unsupported",
            "title": "Sodium"
        }))
        .unwrap();

        assert_eq!(project.slug, "sodium");
        assert_eq!(project.server_side, PlatformRequirement::Unsupported);
    }
}
