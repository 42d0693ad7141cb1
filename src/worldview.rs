//! World-building conversion.
//!
//! Takes the untyped map recovered from model output and produces the
//! canonical world-building bundle the rest of the platform persists.
//! Models are erratic about shapes — levels arrive as strings or objects,
//! feature lists as strings or `{name: ...}` objects — so deserialization is
//! tolerant and normalizing. What it is *not* tolerant about is missing
//! required sections: that is the one place malformed output becomes a hard
//! error, because downstream storage needs a guaranteed shape.
//!
//! Pure; no I/O.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::error::{AiError, Result};

/// Core facts about the generated world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldBase {
    pub name: String,
    pub description: String,
    pub background: String,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub characteristics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapRegion {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub climate: String,
    #[serde(default, deserialize_with = "name_list")]
    pub notable_features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialLocation {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub significance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geography {
    #[serde(default)]
    pub map_regions: Vec<MapRegion>,
    #[serde(default)]
    pub special_locations: Vec<SpecialLocation>,
}

/// Canonical form of one rank in the power system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerLevel {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerSystem {
    pub name: String,
    pub description: String,
    #[serde(default, deserialize_with = "level_list")]
    pub levels: Vec<PowerLevel>,
    #[serde(default, deserialize_with = "name_list")]
    pub unique_features: Vec<String>,
    #[serde(default, deserialize_with = "name_list")]
    pub cultivation_methods: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Era {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub key_events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub significance: String,
    #[serde(default)]
    pub powers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub eras: Vec<Era>,
    #[serde(default)]
    pub significant_artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faction {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub ideology: String,
    #[serde(default, deserialize_with = "name_list")]
    pub powers_and_abilities: Vec<String>,
    #[serde(default)]
    pub structure: String,
    #[serde(default)]
    pub notable_members: Vec<String>,
}

/// The canonical world-building result.
#[derive(Debug, Clone, Serialize)]
pub struct WorldviewBundle {
    pub world_base: WorldBase,
    pub geography: Geography,
    pub power_system: PowerSystem,
    pub history: History,
    pub factions: Vec<Faction>,
}

impl WorldviewBundle {
    /// Advisory shape descriptor to embed in a structured-generation prompt.
    pub fn shape_hint() -> Value {
        json!({
            "world_base": {
                "name": "string", "description": "string", "background": "string",
                "rules": ["string"], "characteristics": ["string"]
            },
            "geography": {
                "map_regions": [{"name": "string", "description": "string", "climate": "string", "notable_features": ["string"]}],
                "special_locations": [{"name": "string", "description": "string", "significance": "string"}]
            },
            "power_system": {
                "name": "string", "description": "string",
                "levels": [{"name": "string", "description": "string"}],
                "unique_features": ["string"],
                "cultivation_methods": ["string"]
            },
            "history": {
                "eras": [{"name": "string", "description": "string", "key_events": ["string"]}],
                "significant_artifacts": [{"name": "string", "description": "string", "significance": "string", "powers": ["string"]}]
            },
            "factions": [{"name": "string", "description": "string", "ideology": "string", "powers_and_abilities": ["string"], "structure": "string", "notable_members": ["string"]}]
        })
    }
}

/// Convert parsed model output into the canonical bundle.
///
/// `world_base`, `geography`, `power_system` and `history` are required;
/// `factions` defaults to empty. A missing or mis-shaped section fails with
/// [`AiError::ConversionError`] naming it.
pub fn convert_worldview(value: &Value) -> Result<WorldviewBundle> {
    let root = value
        .as_object()
        .ok_or_else(|| AiError::conversion("root", "expected a JSON object"))?;

    Ok(WorldviewBundle {
        world_base: section(root, "world_base")?,
        geography: section(root, "geography")?,
        power_system: section(root, "power_system")?,
        history: section(root, "history")?,
        factions: optional_section(root, "factions")?,
    })
}

fn section<T: serde::de::DeserializeOwned>(
    root: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<T> {
    let value = root
        .get(field)
        .ok_or_else(|| AiError::conversion(field, "missing required section"))?;
    serde_json::from_value(value.clone()).map_err(|err| AiError::conversion(field, err.to_string()))
}

fn optional_section<T: serde::de::DeserializeOwned + Default>(
    root: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<T> {
    match root.get(field) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| AiError::conversion(field, err.to_string())),
    }
}

/// An entry that may arrive as a plain string or as an object carrying at
/// least a `name`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NameOrText {
    Text(String),
    Named { name: String },
}

impl NameOrText {
    fn into_name(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Named { name } => name,
        }
    }
}

/// A power level that may arrive as a bare name or a full object.
#[derive(Deserialize)]
#[serde(untagged)]
enum LevelSpec {
    Full {
        name: String,
        #[serde(default)]
        description: String,
    },
    Plain(String),
}

fn name_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<NameOrText>>::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(NameOrText::into_name)
        .collect())
}

fn level_list<'de, D>(deserializer: D) -> std::result::Result<Vec<PowerLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<LevelSpec>>::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(|spec| match spec {
            LevelSpec::Full { name, description } => PowerLevel { name, description },
            LevelSpec::Plain(name) => PowerLevel {
                name,
                description: String::new(),
            },
        })
        .collect())
}
