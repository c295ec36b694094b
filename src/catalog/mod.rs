//! # Template Catalog
//!
//! Room templates with their usage-bucketed style pools and object pools.
//!
//! Styles and objects live in arena vectors on [`TemplateCatalog`] and are
//! referred to by index everywhere else, including from tiles. Templates do
//! not own styles directly; they own [`Useable`] entries, each pairing a
//! target id with an independent rule set. Selection is two-phase to keep
//! rule counters honest: [`TemplateCatalog::find_style`] evaluates without
//! mutating, and [`TemplateCatalog::commit_style`] notifies the winning rule
//! sets once the placement is real.

pub mod loader;

pub use loader::CatalogDef;

use crate::grid::{Tile, TileUsage};
use crate::rules::{RuleContext, RuleSet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An RGB color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const GREY: Color = Color {
        r: 0.5,
        g: 0.5,
        b: 0.5,
    };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// A random saturated-ish color, used to tint sectors and their keys.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            r: rng.gen_range(0.2..1.0),
            g: rng.gen_range(0.2..1.0),
            b: rng.gen_range(0.2..1.0),
        }
    }
}

/// A named display style for keys, picked at random per spawned key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyStyle {
    pub name: String,
}

impl Default for KeyStyle {
    fn default() -> Self {
        Self {
            name: "Key".to_string(),
        }
    }
}

/// What kind of entity a tile object resolves to when spawned.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// Immobile prop.
    Static,
    /// Physics-enabled prop.
    Dynamic,
    /// Collectible; the string names the pickup type.
    Pickup(String),
    /// Point light source.
    Light {
        color: Color,
        intensity: f32,
        radius: f32,
        falloff: f32,
    },
    /// A single enemy of the named kind.
    Enemy(String),
    /// Enemy spawner drawing from a weighted list of enemy kinds.
    Spawner(Vec<(String, f32)>),
}

/// A placeable object definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TileObject {
    pub name: String,
    pub rules: RuleSet,
    pub kind: ObjectKind,
    /// Offset from the tile origin, applied by the entity system.
    pub spawn_offset: [f32; 3],
    /// Another object spawned on the same tile whenever this one is.
    pub attachment: Option<usize>,
}

/// A visual style stamped onto a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileStyle {
    pub name: String,
    pub usage: TileUsage,
    pub rules: RuleSet,
    /// Door styles only: whether this style supports a lock.
    pub can_be_locked: bool,
    /// Door styles only: always lock, even without a key assignment.
    pub force_locked: bool,
}

/// A template's claim on a style or object: the target id plus the rules
/// gating this particular use of it. Rule state here is independent of the
/// target's own rules, and of other templates' claims on the same target.
#[derive(Debug, Clone, PartialEq)]
pub struct Useable {
    pub rules: RuleSet,
    pub target: usize,
}

/// A room template: placement rules, style pools bucketed by tile role,
/// object pool, and optional size overrides.
#[derive(Debug, Clone, Default)]
pub struct RoomTemplate {
    pub name: String,
    pub rules: RuleSet,
    pub styles: BTreeMap<TileUsage, Vec<Useable>>,
    pub objects: Vec<Useable>,
    pub min_size: Option<(i32, i32)>,
    pub max_size: Option<(i32, i32)>,
}

impl RoomTemplate {
    /// Whether this template has at least one style claim for `usage`.
    pub fn has_style_for_usage(&self, usage: TileUsage) -> bool {
        self.styles.get(&usage).is_some_and(|v| !v.is_empty())
    }
}

/// A winning style claim from [`TemplateCatalog::find_style`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleChoice {
    pub bucket: TileUsage,
    pub useable_index: usize,
    /// Arena id of the chosen style.
    pub style: usize,
}

/// A winning object claim from [`TemplateCatalog::find_object`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectChoice {
    pub useable_index: usize,
    /// Arena id of the chosen object.
    pub object: usize,
}

/// Arena of templates, styles, objects, and the key-style book.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<RoomTemplate>,
    styles: Vec<TileStyle>,
    objects: Vec<TileObject>,
    key_styles: Vec<KeyStyle>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_style(&mut self, style: TileStyle) -> usize {
        self.styles.push(style);
        self.styles.len() - 1
    }

    pub fn add_object(&mut self, object: TileObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn add_template(&mut self, template: RoomTemplate) -> usize {
        self.templates.push(template);
        self.templates.len() - 1
    }

    pub fn add_key_style(&mut self, style: KeyStyle) {
        self.key_styles.push(style);
    }

    pub fn style(&self, id: usize) -> Option<&TileStyle> {
        self.styles.get(id)
    }

    pub fn object(&self, id: usize) -> Option<&TileObject> {
        self.objects.get(id)
    }

    pub fn template(&self, id: usize) -> Option<&RoomTemplate> {
        self.templates.get(id)
    }

    pub fn templates(&self) -> &[RoomTemplate] {
        &self.templates
    }

    pub fn key_styles(&self) -> &[KeyStyle] {
        &self.key_styles
    }

    pub fn style_id(&self, name: &str) -> Option<usize> {
        self.styles.iter().position(|s| s.name == name)
    }

    pub fn object_id(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.name == name)
    }

    pub fn template_id(&self, name: &str) -> Option<usize> {
        self.templates.iter().position(|t| t.name == name)
    }

    /// Finds the first style claim of `template` for `tile`'s role whose own
    /// rules and whose target style's rules both pass. Claims are tried in
    /// catalog insertion order. Never mutates rule state.
    pub fn find_style<R: Rng>(
        &self,
        template: Option<usize>,
        tile: &Tile,
        ctx: &RuleContext,
        rng: &mut R,
    ) -> Option<StyleChoice> {
        let template = self.templates.get(template?)?;
        let bucket = tile.usage();
        let useables = template.styles.get(&bucket)?;
        for (i, useable) in useables.iter().enumerate() {
            let style = self.styles.get(useable.target)?;
            if useable.rules.validate(tile, ctx, rng) && style.rules.validate(tile, ctx, rng) {
                return Some(StyleChoice {
                    bucket,
                    useable_index: i,
                    style: useable.target,
                });
            }
        }
        None
    }

    /// Commits a style claim returned by [`TemplateCatalog::find_style`],
    /// notifying both the claim's rules and the style's own rules.
    pub fn commit_style(&mut self, template: usize, choice: StyleChoice) {
        if let Some(template) = self.templates.get_mut(template) {
            if let Some(useable) = template
                .styles
                .get_mut(&choice.bucket)
                .and_then(|v| v.get_mut(choice.useable_index))
            {
                useable.rules.notify_success();
            }
        }
        if let Some(style) = self.styles.get_mut(choice.style) {
            style.rules.notify_success();
        }
    }

    /// Commits a successful placement of the template itself.
    pub fn commit_template(&mut self, template: usize) {
        if let Some(template) = self.templates.get_mut(template) {
            template.rules.notify_success();
        }
    }

    /// Object counterpart of [`TemplateCatalog::find_style`]; object claims
    /// are a flat pool rather than usage buckets.
    pub fn find_object<R: Rng>(
        &self,
        template: Option<usize>,
        tile: &Tile,
        ctx: &RuleContext,
        rng: &mut R,
    ) -> Option<ObjectChoice> {
        let template = self.templates.get(template?)?;
        for (i, useable) in template.objects.iter().enumerate() {
            let object = self.objects.get(useable.target)?;
            if useable.rules.validate(tile, ctx, rng) && object.rules.validate(tile, ctx, rng) {
                return Some(ObjectChoice {
                    useable_index: i,
                    object: useable.target,
                });
            }
        }
        None
    }

    /// Commits an object claim returned by [`TemplateCatalog::find_object`].
    pub fn commit_object(&mut self, template: usize, choice: ObjectChoice) {
        if let Some(template) = self.templates.get_mut(template) {
            if let Some(useable) = template.objects.get_mut(choice.useable_index) {
                useable.rules.notify_success();
            }
        }
        if let Some(object) = self.objects.get_mut(choice.object) {
            object.rules.notify_success();
        }
    }

    /// Resets the rule state of one template's claims, leaving the shared
    /// style/object rules alone. Claim budgets are per-room budgets, so this
    /// runs once per room before its tiles are resolved.
    pub fn reset_template_useables(&mut self, template: usize) {
        if let Some(template) = self.templates.get_mut(template) {
            for useables in template.styles.values_mut() {
                for useable in useables {
                    useable.rules.reset();
                }
            }
            for useable in &mut template.objects {
                useable.rules.reset();
            }
        }
    }

    /// Resets every rule counter in the catalog to its configured maximum.
    /// Runs once per generation pass.
    pub fn reset_all(&mut self) {
        for template in &mut self.templates {
            template.rules.reset();
            for useables in template.styles.values_mut() {
                for useable in useables {
                    useable.rules.reset();
                }
            }
            for useable in &mut template.objects {
                useable.rules.reset();
            }
        }
        for style in &mut self.styles {
            style.rules.reset();
        }
        for object in &mut self.objects {
            object.rules.reset();
        }
    }
}
