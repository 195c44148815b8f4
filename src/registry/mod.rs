//! Known projects and the order they are laid out on the deck.
//!
//! Loaded once from `projects.toml`. Besides image resolution nothing changes during a session;
//! picking up edits requires a restart.

use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::{read_required, ConfigError, ConfigPaths},
    render::IconRenderer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Both red and green above the midpoint. Blue is ignored. Used to pick contrasting
    /// foregrounds.
    pub fn is_light(&self) -> bool {
        u8::min(self.0, self.1) > 127
    }
}

impl FromStr for Rgb {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || ConfigError::InvalidColour(s.to_string());
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Short unique key. Shown on buttons and used to match everything else.
    pub code: String,
    /// Name of the project in the time tracking service.
    pub name: String,
    pub colour: Option<Rgb>,
    /// Icon path. Takes precedence over `colour` when present.
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectDefinition {
    Name(String),
    Full {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        colour: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDefinition {
    #[serde(default)]
    pub entries: Vec<String>,
}

/// On-disk shape of `projects.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectsDocument {
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectDefinition>,
    #[serde(default)]
    pub page: PageDefinition,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, Project>,
    entries: Vec<String>,
}

impl ProjectRegistry {
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        paths.ensure_initialized()?;
        let path = paths.projects_file();
        let raw = read_required(&path)?;
        let document = toml::from_str::<ProjectsDocument>(&raw)
            .with_context(|| format!("Failed to parse {path:?}"))?;
        let registry = Self::from_document(document)?;
        debug!(
            "Loaded {} projects, {} page entries",
            registry.projects.len(),
            registry.entries.len()
        );
        Ok(registry)
    }

    pub fn from_document(document: ProjectsDocument) -> Result<Self, ConfigError> {
        let mut projects = BTreeMap::new();
        for (code, definition) in document.projects {
            let (name, colour) = match definition {
                ProjectDefinition::Name(name) => (name, None),
                ProjectDefinition::Full { name, colour } => {
                    (name, colour.map(|c| c.parse::<Rgb>()).transpose()?)
                }
            };
            projects.insert(
                code.clone(),
                Project {
                    code,
                    name,
                    colour,
                    image: None,
                },
            );
        }

        let mut seen = HashSet::new();
        for entry in &document.page.entries {
            if !projects.contains_key(entry) {
                return Err(ConfigError::UnknownEntry(entry.clone()));
            }
            if !seen.insert(entry.as_str()) {
                return Err(ConfigError::DuplicateEntry(entry.clone()));
            }
        }

        Ok(Self {
            projects,
            entries: document.page.entries,
        })
    }

    pub fn get(&self, code: &str) -> Option<&Project> {
        self.projects.get(code)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// Codes in display order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Finds the icon of every project: `assets/<code>.png` wins, a colour swatch is rendered
    /// otherwise. Rendering failures leave the project without an image.
    pub fn resolve_images(&mut self, assets_dir: &Path, renderer: &mut dyn IconRenderer) {
        for (code, project) in self.projects.iter_mut() {
            let asset = assets_dir.join(format!("{}.png", code.to_lowercase()));
            if asset.is_file() {
                project.image = Some(asset.to_string_lossy().into_owned());
            } else if let Some(colour) = project.colour {
                match renderer.render_swatch(code, colour) {
                    Ok(icon) => project.image = Some(icon),
                    Err(e) => warn!("Couldn't render swatch for {code}: {e:?}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use mockall::predicate::eq;
    use tempfile::tempdir;

    use super::*;
    use crate::render::MockIconRenderer;

    const PROJECTS: &str = r#"
[projects]
ADM = "Administration"
RES = { name = "Research", colour = "1f77b4" }
TEA = { name = "Teaching" }

[page]
entries = ["RES", "ADM", "TEA"]
"#;

    fn write_projects(dir: &Path, content: &str) -> ConfigPaths {
        std::fs::write(dir.join("projects.toml"), content).unwrap();
        ConfigPaths::new(dir.to_path_buf())
    }

    #[test]
    fn test_colour_parsing() {
        assert_eq!("1f77b4".parse::<Rgb>().unwrap(), Rgb(0x1f, 0x77, 0xb4));
        assert_eq!("#FFFFFF".parse::<Rgb>().unwrap(), Rgb(255, 255, 255));
        assert!("12345".parse::<Rgb>().is_err());
        assert!("gg0000".parse::<Rgb>().is_err());
        assert_eq!(Rgb(1, 2, 255).to_string(), "0102ff");
    }

    #[test]
    fn test_lightness_ignores_blue() {
        assert!(Rgb(200, 180, 0).is_light());
        assert!(!Rgb(200, 100, 255).is_light());
        assert!(!Rgb(128, 127, 255).is_light());
    }

    #[test]
    fn test_load_keeps_display_order() -> Result<()> {
        let dir = tempdir()?;
        let registry = ProjectRegistry::load(&write_projects(dir.path(), PROJECTS))?;

        assert_eq!(registry.entries(), ["RES", "ADM", "TEA"]);
        assert_eq!(registry.get("ADM").unwrap().name, "Administration");
        assert_eq!(registry.get("ADM").unwrap().colour, None);
        assert_eq!(
            registry.get("RES").unwrap().colour,
            Some(Rgb(0x1f, 0x77, 0xb4))
        );
        Ok(())
    }

    #[test]
    fn test_missing_projects_is_not_initialized() {
        let dir = tempdir().unwrap();
        let err = ProjectRegistry::load(&ConfigPaths::new(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_entries_must_reference_projects() {
        let dir = tempdir().unwrap();
        let paths = write_projects(
            dir.path(),
            "[projects]\nA = \"a\"\n[page]\nentries = [\"A\", \"B\"]\n",
        );
        let err = ProjectRegistry::load(&paths).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownEntry(code)) if code == "B"
        ));

        let paths = write_projects(
            dir.path(),
            "[projects]\nA = \"a\"\n[page]\nentries = [\"A\", \"A\"]\n",
        );
        let err = ProjectRegistry::load(&paths).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::DuplicateEntry(_))
        ));
    }

    #[test]
    fn test_resolve_images_prefers_assets() -> Result<()> {
        let dir = tempdir()?;
        let paths = write_projects(dir.path(), PROJECTS);
        std::fs::create_dir_all(paths.assets_dir())?;
        std::fs::write(paths.assets_dir().join("tea.png"), b"png")?;
        let mut registry = ProjectRegistry::load(&paths)?;

        let mut renderer = MockIconRenderer::new();
        renderer
            .expect_render_swatch()
            .with(eq("RES"), eq(Rgb(0x1f, 0x77, 0xb4)))
            .times(1)
            .returning(|_, _| Ok("/icons/swatch-RES.png".into()));

        registry.resolve_images(&paths.assets_dir(), &mut renderer);

        assert_eq!(
            registry.get("RES").unwrap().image.as_deref(),
            Some("/icons/swatch-RES.png")
        );
        assert!(registry
            .get("TEA")
            .unwrap()
            .image
            .as_deref()
            .unwrap()
            .ends_with("tea.png"));
        assert_eq!(registry.get("ADM").unwrap().image, None);
        Ok(())
    }
}
