//! Declarative catalog definitions and the rule-type registry.
//!
//! Catalog files are JSON. Rules arrive as loosely-typed attribute bags
//! (`serde_json::Value`) and are resolved through a registry keyed on the
//! `type` attribute; unknown rule types, bad direction tokens, and unknown
//! style/object references are logged and skipped so a partially bad catalog
//! still loads.
//!
//! `extends_rules` on styles and objects deep-clones the rule sets of
//! previously defined entries, giving the new entry independent counters.
//! `extends` on templates copies the base template's style/object claims and
//! size overrides before this template's own additions apply.

use super::{
    KeyStyle, ObjectKind, RoomTemplate, TemplateCatalog, TileObject, TileStyle, Useable,
};
use crate::grid::{Direction, TileUsage};
use crate::rules::{parse_depth_list, DirectionSet, Rule, RuleSet, TargetMatcher};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level declarative catalog definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDef {
    #[serde(default)]
    pub styles: Vec<StyleDef>,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
    #[serde(default)]
    pub templates: Vec<TemplateDef>,
    #[serde(default)]
    pub key_styles: Vec<KeyStyle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleDef {
    pub name: String,
    pub usage: String,
    #[serde(default)]
    pub rules: Vec<Value>,
    /// Names of earlier styles whose rules are cloned in ahead of `rules`.
    #[serde(default)]
    pub extends_rules: Vec<String>,
    #[serde(default)]
    pub can_be_locked: bool,
    #[serde(default)]
    pub force_locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    #[serde(default)]
    pub kind: ObjectKindDef,
    #[serde(default)]
    pub rules: Vec<Value>,
    #[serde(default)]
    pub extends_rules: Vec<String>,
    #[serde(default)]
    pub spawn_offset: [f32; 3],
    /// Nested object spawned on the same tile whenever this one is.
    #[serde(default)]
    pub attachment: Option<Box<ObjectDef>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKindDef {
    #[default]
    Static,
    Dynamic,
    Pickup {
        item: String,
    },
    Light {
        color: [f32; 3],
        #[serde(default = "default_intensity")]
        intensity: f32,
        #[serde(default = "default_radius")]
        radius: f32,
        #[serde(default)]
        falloff: f32,
    },
    Enemy {
        kind: String,
    },
    Spawner {
        spawns: Vec<SpawnEntryDef>,
    },
}

fn default_intensity() -> f32 {
    1.0
}

fn default_radius() -> f32 {
    5.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnEntryDef {
    pub kind: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDef {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Value>,
    /// Name of an earlier template whose claims and sizes are copied first.
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub styles: Vec<ClaimDef>,
    #[serde(default)]
    pub objects: Vec<ClaimDef>,
    #[serde(default)]
    pub min_size: Option<[i32; 2]>,
    #[serde(default)]
    pub max_size: Option<[i32; 2]>,
}

/// A template's claim on a named style or object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDef {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Value>,
}

impl CatalogDef {
    /// Builds the runtime catalog. Bad entries degrade with a warning rather
    /// than failing the build.
    pub fn build(&self) -> TemplateCatalog {
        let mut catalog = TemplateCatalog::new();

        for def in &self.styles {
            let usage = TileUsage::from_name(&def.usage);
            if usage == TileUsage::None && def.usage != "none" {
                warn!("Style '{}' has unknown usage '{}'", def.name, def.usage);
            }
            let mut rules = Vec::new();
            for base in &def.extends_rules {
                match catalog.style_id(base).and_then(|id| catalog.style(id)) {
                    Some(base) => rules.extend(base.rules.rules.iter().cloned()),
                    None => warn!("Style '{}' extends unknown style '{}'", def.name, base),
                }
            }
            rules.extend(parse_rules(&def.rules));
            catalog.add_style(TileStyle {
                name: def.name.clone(),
                usage,
                rules: RuleSet::new(rules),
                can_be_locked: def.can_be_locked,
                force_locked: def.force_locked,
            });
        }

        for def in &self.objects {
            build_object(def, &mut catalog);
        }

        for def in &self.templates {
            let mut template = match def
                .extends
                .as_ref()
                .and_then(|base| catalog.template_id(base).and_then(|id| catalog.template(id)))
            {
                Some(base) => {
                    let mut copy = base.clone();
                    copy.name = def.name.clone();
                    copy
                }
                None => {
                    if let Some(base) = &def.extends {
                        warn!("Template '{}' extends unknown template '{}'", def.name, base);
                    }
                    RoomTemplate {
                        name: def.name.clone(),
                        ..Default::default()
                    }
                }
            };
            template.rules.rules.extend(parse_rules(&def.rules));
            if def.min_size.is_some() {
                template.min_size = def.min_size.map(|[w, h]| (w, h));
            }
            if def.max_size.is_some() {
                template.max_size = def.max_size.map(|[w, h]| (w, h));
            }
            for claim in &def.styles {
                match catalog.style_id(&claim.name) {
                    Some(target) => {
                        let usage = catalog.style(target).map(|s| s.usage).unwrap_or(TileUsage::None);
                        template.styles.entry(usage).or_default().push(Useable {
                            rules: RuleSet::new(parse_rules(&claim.rules)),
                            target,
                        });
                    }
                    None => warn!(
                        "Template '{}' references unknown style '{}'",
                        def.name, claim.name
                    ),
                }
            }
            for claim in &def.objects {
                match catalog.object_id(&claim.name) {
                    Some(target) => template.objects.push(Useable {
                        rules: RuleSet::new(parse_rules(&claim.rules)),
                        target,
                    }),
                    None => warn!(
                        "Template '{}' references unknown object '{}'",
                        def.name, claim.name
                    ),
                }
            }
            catalog.add_template(template);
        }

        for style in &self.key_styles {
            catalog.add_key_style(style.clone());
        }

        catalog
    }
}

/// Builds one object definition, recursing into its attachment chain first
/// so the parent can carry the attachment's arena id.
fn build_object(def: &ObjectDef, catalog: &mut TemplateCatalog) -> usize {
    let attachment = def
        .attachment
        .as_deref()
        .map(|nested| build_object(nested, catalog));

    let kind = match &def.kind {
        ObjectKindDef::Static => ObjectKind::Static,
        ObjectKindDef::Dynamic => ObjectKind::Dynamic,
        ObjectKindDef::Pickup { item } => ObjectKind::Pickup(item.clone()),
        ObjectKindDef::Light {
            color,
            intensity,
            radius,
            falloff,
        } => ObjectKind::Light {
            color: super::Color::new(color[0], color[1], color[2]),
            intensity: *intensity,
            radius: *radius,
            falloff: *falloff,
        },
        ObjectKindDef::Enemy { kind } => ObjectKind::Enemy(kind.clone()),
        ObjectKindDef::Spawner { spawns } => ObjectKind::Spawner(
            spawns
                .iter()
                .map(|entry| (entry.kind.clone(), entry.weight.max(0.0)))
                .collect(),
        ),
    };

    let mut rules = Vec::new();
    for base in &def.extends_rules {
        match catalog.object_id(base).and_then(|id| catalog.object(id)) {
            Some(base) => rules.extend(base.rules.rules.iter().cloned()),
            None => warn!("Object '{}' extends unknown object '{}'", def.name, base),
        }
    }
    rules.extend(parse_rules(&def.rules));

    catalog.add_object(TileObject {
        name: def.name.clone(),
        rules: RuleSet::new(rules),
        kind,
        spawn_offset: def.spawn_offset,
        attachment,
    })
}

fn parse_rules(values: &[Value]) -> Vec<Rule> {
    values.iter().filter_map(parse_rule).collect()
}

/// The rule-type registry. Returns `None` (with a warning) for rule types it
/// does not know.
fn parse_rule(value: &Value) -> Option<Rule> {
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        warn!("Rule entry without a 'type' attribute: {}", value);
        return None;
    };
    let rule = match kind {
        "random" => Rule::Random {
            chance: get_f32(value, "chance", 1.0),
        },
        "canSpawnOn" => Rule::CanSpawnOn {
            usages: usage_list(value, "usages"),
        },
        "canNotSpawnOn" => Rule::CanNotSpawnOn {
            usages: usage_list(value, "usages"),
        },
        "maxCount" => {
            let max = get_f32(value, "max", 1.0).max(0.0) as u32;
            Rule::MaxCount {
                max,
                remaining: max,
            }
        }
        "adjacentToUsage" => adjacency(value, true, TargetMatcher::Usage(usage_list(value, "usages"))),
        "notAdjacentToUsage" => {
            adjacency(value, false, TargetMatcher::Usage(usage_list(value, "usages")))
        }
        "adjacentToObject" => {
            adjacency(value, true, TargetMatcher::Object(string_list(value, "objects")))
        }
        "notAdjacentToObject" => {
            adjacency(value, false, TargetMatcher::Object(string_list(value, "objects")))
        }
        "adjacentToStyle" => {
            adjacency(value, true, TargetMatcher::Style(string_list(value, "styles")))
        }
        "notAdjacentToStyle" => {
            adjacency(value, false, TargetMatcher::Style(string_list(value, "styles")))
        }
        "distanceToUsage" => distance(value, TargetMatcher::Usage(usage_list(value, "usages"))),
        "distanceToObject" => distance(value, TargetMatcher::Object(string_list(value, "objects"))),
        "distanceToStyle" => distance(value, TargetMatcher::Style(string_list(value, "styles"))),
        "roomDoesHaveUsage" => contains(true, TargetMatcher::Usage(usage_list(value, "usages"))),
        "roomDoesNotHaveUsage" => contains(false, TargetMatcher::Usage(usage_list(value, "usages"))),
        "roomDoesHaveObject" => contains(true, TargetMatcher::Object(string_list(value, "objects"))),
        "roomDoesNotHaveObject" => {
            contains(false, TargetMatcher::Object(string_list(value, "objects")))
        }
        "roomDoesHaveStyle" => contains(true, TargetMatcher::Style(string_list(value, "styles"))),
        "roomDoesNotHaveStyle" => contains(false, TargetMatcher::Style(string_list(value, "styles"))),
        "validDepths" => Rule::ValidDepths {
            depths: parse_depth_list(value.get("depths").and_then(Value::as_str).unwrap_or("0")),
        },
        other => {
            warn!("Skipping unknown rule type '{}'", other);
            return None;
        }
    };
    Some(rule)
}

fn adjacency(value: &Value, sense: bool, target: TargetMatcher) -> Rule {
    Rule::Adjacency {
        sense,
        margin: get_f32(value, "margin", 0.0) as i32,
        directions: direction_set(value),
        target,
    }
}

fn distance(value: &Value, target: TargetMatcher) -> Rule {
    Rule::Distance {
        min: get_f32(value, "min", 0.0),
        max: get_f32(value, "max", 0.0),
        target,
    }
}

fn contains(sense: bool, target: TargetMatcher) -> Rule {
    Rule::RoomContains { sense, target }
}

fn get_f32(value: &Value, key: &str, default: f32) -> f32 {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .unwrap_or(default)
}

/// Reads a list attribute that may be a JSON array of strings or a single
/// comma-separated string.
fn string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn usage_list(value: &Value, key: &str) -> Vec<TileUsage> {
    string_list(value, key)
        .iter()
        .map(|name| TileUsage::from_name(name))
        .collect()
}

/// Parses the optional `directions` attribute. Absent or fully invalid means
/// the four cardinal directions; individually bad tokens are skipped with a
/// warning. Diagonal probes must be asked for explicitly.
fn direction_set(value: &Value) -> DirectionSet {
    let tokens = string_list(value, "directions");
    if tokens.is_empty() {
        return DirectionSet::cardinals();
    }
    let mut set = DirectionSet::empty();
    for token in &tokens {
        match Direction::from_token(token) {
            Some(dir) => set.insert(dir),
            None => warn!("Skipping unknown direction token '{}'", token),
        }
    }
    if set.is_empty() {
        warn!("Direction list had no valid tokens; probing the cardinals");
        return DirectionSet::cardinals();
    }
    set
}
