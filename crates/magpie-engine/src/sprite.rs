//! Sprite component, resource references, and the resolver seam.
//!
//! A sprite is attached from a [`SpriteSource`]: either an image path or a
//! procedural [`TextureSpec`] (the level loader's drawing-op format).
//! Turning a source into an actual texture is not this crate's job -- that
//! happens behind the [`SpriteResolver`] trait, injected into the
//! [`SpriteSystem`]. The store keeps only the resolved handle and size next
//! to the originating source.
//!
//! Headless runs and tests use the built-in [`PlaceholderResolver`], which
//! never touches the filesystem.

use std::fmt;

use glam::Vec2;
use magpie_ecs::{ComponentStore, EntityId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Colors and draw ops
// ---------------------------------------------------------------------------

/// RGBA color with 0..1 channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// One drawing operation in a procedural texture.
///
/// Coordinates are normalized to the 0..1 canvas, origin at the top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    /// Straight line segment.
    Line { from: Vec2, to: Vec2, color: Rgba },
    /// Text run anchored at `anchor`, `size` in canvas-height fractions.
    Text {
        text: String,
        anchor: Vec2,
        size: f32,
        color: Rgba,
    },
}

/// Procedural texture specification.
///
/// This is the loader-facing data model: canvas size in pixels, a clear
/// color, then draw ops in order. Rasterizing it is the resolver's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSpec {
    pub width: u32,
    pub height: u32,
    pub clear: Rgba,
    #[serde(default)]
    pub ops: Vec<DrawOp>,
}

impl TextureSpec {
    /// Blank canvas of the given pixel size.
    pub fn new(width: u32, height: u32, clear: Rgba) -> Self {
        Self {
            width,
            height,
            clear,
            ops: Vec::new(),
        }
    }

    /// Canvas size as a float vector.
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Parse a spec from the loader's JSON form.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize back to the loader's JSON form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Sprite source and resolved state
// ---------------------------------------------------------------------------

/// Where a sprite's pixels come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpriteSource {
    /// An image asset by path.
    Image { path: String },
    /// A procedural texture built from draw ops.
    Generated(TextureSpec),
}

impl SpriteSource {
    /// Convenience constructor for image sources.
    pub fn image(path: impl Into<String>) -> Self {
        Self::Image { path: path.into() }
    }
}

/// Opaque handle to a resolved texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u64);

/// What a resolver hands back for a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSprite {
    pub texture: TextureId,
    /// Display size in world units.
    pub size: Vec2,
}

/// Sprite component: the originating source plus its resolved state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    pub source: SpriteSource,
    pub texture: TextureId,
    pub size: Vec2,
}

// ---------------------------------------------------------------------------
// Resolver seam
// ---------------------------------------------------------------------------

/// Resolution failure, surfaced to the level loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The referenced asset does not exist.
    #[error("sprite asset not found: {path}")]
    NotFound { path: String },
    /// The resolver cannot handle this source.
    #[error("unsupported sprite source: {detail}")]
    Unsupported { detail: String },
}

/// External collaborator that turns a [`SpriteSource`] into a texture.
///
/// Implementations may load files, rasterize [`TextureSpec`]s, cache,
/// deduplicate -- none of that is visible here.
pub trait SpriteResolver {
    fn resolve(&mut self, source: &SpriteSource) -> Result<ResolvedSprite, ResolveError>;
}

/// Resolver for headless runs: sequential handles, no pixels.
///
/// Generated sources report their declared canvas size; image sources
/// report a unit quad (there is no file to measure).
#[derive(Debug, Default)]
pub struct PlaceholderResolver {
    next_id: u64,
}

impl SpriteResolver for PlaceholderResolver {
    fn resolve(&mut self, source: &SpriteSource) -> Result<ResolvedSprite, ResolveError> {
        self.next_id += 1;
        let size = match source {
            SpriteSource::Image { .. } => Vec2::ONE,
            SpriteSource::Generated(spec) => spec.size(),
        };
        Ok(ResolvedSprite {
            texture: TextureId(self.next_id),
            size,
        })
    }
}

// ---------------------------------------------------------------------------
// SpriteSystem
// ---------------------------------------------------------------------------

/// Owner of all [`Sprite`] components.
pub struct SpriteSystem {
    pub(crate) store: ComponentStore<Sprite>,
    resolver: Box<dyn SpriteResolver>,
}

impl SpriteSystem {
    /// System backed by the [`PlaceholderResolver`].
    pub fn new() -> Self {
        Self::with_resolver(Box::new(PlaceholderResolver::default()))
    }

    /// System backed by a caller-supplied resolver.
    pub fn with_resolver(resolver: Box<dyn SpriteResolver>) -> Self {
        Self {
            store: ComponentStore::new(),
            resolver,
        }
    }

    /// Resolve `source` and attach the sprite, replacing any existing one.
    ///
    /// On resolution failure nothing is stored: a previously attached sprite
    /// stays untouched.
    pub fn add(
        &mut self,
        entity: EntityId,
        source: SpriteSource,
    ) -> Result<&mut Sprite, ResolveError> {
        let resolved = self.resolver.resolve(&source)?;
        self.store.insert(
            entity,
            Sprite {
                source,
                texture: resolved.texture,
                size: resolved.size,
            },
        );
        Ok(self.store.get_mut(entity).expect("slot occupied by insert"))
    }

    pub fn get(&self, entity: EntityId) -> Option<&Sprite> {
        self.store.get(entity)
    }

    /// Detach and return `entity`'s sprite, if any.
    pub fn remove(&mut self, entity: EntityId) -> Option<Sprite> {
        self.store.remove(entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.store.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Iterate `(entity_index, &Sprite)` in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Sprite)> {
        self.store.iter()
    }
}

impl Default for SpriteSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpriteSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteSystem")
            .field("sprites", &self.store.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
