//! Read-only game templates: maps, world maps, skills, dialogs, boards.
//!
//! The catalog is loaded once at startup and shared as
//! `Arc<TemplateCatalog>`. Nothing mutates it afterwards, so handlers
//! read it without locking.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use hearthwire_dialog::DialogGraph;
use hearthwire_protocol::formats::{PortalDescriptor, PortalDestination};
use serde::Deserialize;

use crate::HearthwireError;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// A non-player character that can be clicked to start a dialog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NpcTemplate {
    pub serial: u32,
    pub name: String,
    pub x: u16,
    pub y: u16,
    /// Key of the dialog graph it opens.
    pub dialog: String,
}

/// A tile that opens a dialog when stepped on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PopupTemplate {
    pub serial: u32,
    pub x: u16,
    pub y: u16,
    pub dialog: String,
}

/// Where a warp tile leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarpTarget {
    /// Straight to a spot on another map.
    Map { map_id: u16, x: u16, y: u16 },
    /// Opens a world map screen.
    WorldMap { field: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WarpTemplate {
    pub x: u16,
    pub y: u16,
    pub target: WarpTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapTemplate {
    pub id: u16,
    pub name: String,
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub npcs: Vec<NpcTemplate>,
    #[serde(default)]
    pub popups: Vec<PopupTemplate>,
    #[serde(default)]
    pub warps: Vec<WarpTemplate>,
}

impl MapTemplate {
    pub fn contains(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    pub fn npc(&self, serial: u32) -> Option<&NpcTemplate> {
        self.npcs.iter().find(|n| n.serial == serial)
    }

    pub fn popup_at(&self, x: u16, y: u16) -> Option<&PopupTemplate> {
        self.popups.iter().find(|p| p.x == x && p.y == y)
    }

    pub fn warp_at(&self, x: u16, y: u16) -> Option<&WarpTemplate> {
        self.warps.iter().find(|w| w.x == x && w.y == y)
    }
}

/// A world map screen and its clickable destinations. Empty slots are
/// kept: the client counts them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldMapTemplate {
    pub field: u16,
    pub portals: Vec<Option<PortalTemplate>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortalTemplate {
    pub name: String,
    /// Position on the world map screen.
    pub screen_x: u16,
    pub screen_y: u16,
    pub map_id: u16,
    pub dest_x: u16,
    pub dest_y: u16,
}

impl WorldMapTemplate {
    pub fn descriptor(&self) -> PortalDescriptor {
        PortalDescriptor {
            field_number: self.field,
            destinations: self
                .portals
                .iter()
                .map(|slot| {
                    slot.as_ref().map(|p| PortalDestination {
                        x: p.screen_x,
                        y: p.screen_y,
                        name: p.name.clone(),
                        area_id: p.map_id,
                        dest_x: p.dest_x,
                        dest_y: p.dest_y,
                    })
                })
                .collect(),
        }
    }

    pub fn portal_to(&self, map_id: u16) -> Option<&PortalTemplate> {
        self.portals.iter().flatten().find(|p| p.map_id == map_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkillTemplate {
    pub key: String,
    #[serde(default)]
    pub cooldown_secs: u32,
    #[serde(default)]
    pub animation: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardTemplate {
    pub id: u16,
    pub name: String,
}

/// Where new characters appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SpawnPoint {
    pub map_id: u16,
    pub x: u16,
    pub y: u16,
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self {
            map_id: 1,
            x: 1,
            y: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateCatalog
// ---------------------------------------------------------------------------

/// The catalog as authored on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    spawn: SpawnPoint,
    maps: Vec<MapTemplate>,
    world_maps: Vec<WorldMapTemplate>,
    skills: Vec<SkillTemplate>,
    dialogs: Vec<DialogGraph>,
    boards: Vec<BoardTemplate>,
}

/// Indexed, validated templates.
#[derive(Debug, Default)]
pub struct TemplateCatalog {
    spawn: SpawnPoint,
    maps: HashMap<u16, MapTemplate>,
    world_maps: HashMap<u16, WorldMapTemplate>,
    skills: HashMap<String, SkillTemplate>,
    dialogs: HashMap<String, Arc<DialogGraph>>,
    boards: Vec<BoardTemplate>,
}

impl TemplateCatalog {
    pub fn from_json_str(text: &str) -> Result<Self, HearthwireError> {
        let file: CatalogFile = serde_json::from_str(text)
            .map_err(|e| HearthwireError::Config(format!("catalog: {e}")))?;
        Self::index(file)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HearthwireError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HearthwireError::Config(format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Validates every dialog graph and checks that NPCs, popups, warps
    /// and the spawn point only name things that exist.
    fn index(file: CatalogFile) -> Result<Self, HearthwireError> {
        let mut dialogs = HashMap::new();
        for graph in file.dialogs {
            graph.validate()?;
            dialogs.insert(graph.key.clone(), Arc::new(graph));
        }

        let maps: HashMap<u16, MapTemplate> =
            file.maps.into_iter().map(|m| (m.id, m)).collect();
        let world_maps: HashMap<u16, WorldMapTemplate> =
            file.world_maps.into_iter().map(|w| (w.field, w)).collect();

        let missing = |what: String| HearthwireError::Config(format!("catalog: {what}"));

        if !maps.is_empty() && !maps.contains_key(&file.spawn.map_id) {
            return Err(missing(format!("spawn map {} is not defined", file.spawn.map_id)));
        }
        for map in maps.values() {
            let dialog_keys = map
                .npcs
                .iter()
                .map(|n| &n.dialog)
                .chain(map.popups.iter().map(|p| &p.dialog));
            for key in dialog_keys {
                if !dialogs.contains_key(key) {
                    return Err(missing(format!("map {} uses unknown dialog {key:?}", map.id)));
                }
            }
            for warp in &map.warps {
                let known = match warp.target {
                    WarpTarget::Map { map_id, .. } => maps.contains_key(&map_id),
                    WarpTarget::WorldMap { field } => world_maps.contains_key(&field),
                };
                if !known {
                    return Err(missing(format!(
                        "map {} has a warp at ({}, {}) to nowhere",
                        map.id, warp.x, warp.y
                    )));
                }
            }
        }

        Ok(Self {
            spawn: file.spawn,
            maps,
            world_maps,
            skills: file.skills.into_iter().map(|s| (s.key.clone(), s)).collect(),
            dialogs,
            boards: file.boards,
        })
    }

    pub fn spawn(&self) -> SpawnPoint {
        self.spawn
    }

    pub fn map(&self, id: u16) -> Option<&MapTemplate> {
        self.maps.get(&id)
    }

    pub fn world_map(&self, field: u16) -> Option<&WorldMapTemplate> {
        self.world_maps.get(&field)
    }

    pub fn skill(&self, key: &str) -> Option<&SkillTemplate> {
        self.skills.get(key)
    }

    pub fn dialog(&self, key: &str) -> Option<Arc<DialogGraph>> {
        self.dialogs.get(key).cloned()
    }

    pub fn dialogs(&self) -> impl Iterator<Item = &DialogGraph> {
        self.dialogs.values().map(Arc::as_ref)
    }

    pub fn boards(&self) -> &[BoardTemplate] {
        &self.boards
    }
}
