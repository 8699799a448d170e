//! Material descriptors
//!
//! A material is a tagged variant: a [`MaterialKind`] plus the common surface
//! properties and a kind-specific parameter bag. Which fields a kind honors is
//! a table lookup ([`MaterialKind::supports`]) rather than type inspection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::gfx::color::Color;
use crate::gfx::scene::TextureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Basic,
    Lambert,
    Phong,
    Standard,
    Physical,
    Toon,
    Matcap,
}

/// Properties whose applicability depends on the material kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialField {
    Emissive,
    Specular,
    Shininess,
    Roughness,
    Metalness,
    Clearcoat,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 7] = [
        MaterialKind::Basic,
        MaterialKind::Lambert,
        MaterialKind::Phong,
        MaterialKind::Standard,
        MaterialKind::Physical,
        MaterialKind::Toon,
        MaterialKind::Matcap,
    ];

    /// Whether materials of this kind carry `field`
    pub fn supports(self, field: MaterialField) -> bool {
        use MaterialField::*;
        use MaterialKind::*;
        match field {
            Emissive => !matches!(self, Basic | Matcap),
            Specular | Shininess => self == Phong,
            Roughness | Metalness => matches!(self, Standard | Physical),
            Clearcoat => self == Physical,
        }
    }

    pub fn is_pbr(self) -> bool {
        matches!(self, MaterialKind::Standard | MaterialKind::Physical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MaterialKind::Basic => "basic",
            MaterialKind::Lambert => "lambert",
            MaterialKind::Phong => "phong",
            MaterialKind::Standard => "standard",
            MaterialKind::Physical => "physical",
            MaterialKind::Toon => "toon",
            MaterialKind::Matcap => "matcap",
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialKind {
    type Err = String;

    /// Accepts short names (`standard`) and engine class names
    /// (`MeshStandardMaterial`), case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let short = lower
            .strip_prefix("mesh")
            .and_then(|rest| rest.strip_suffix("material"))
            .unwrap_or(lower.as_str());
        MaterialKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == short)
            .ok_or_else(|| format!("unknown material type '{s}'"))
    }
}

/// Kind-specific parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KindParams {
    None,
    Phong { specular: Color, shininess: f32 },
    Standard { roughness: f32, metalness: f32 },
    Physical { roughness: f32, metalness: f32, clearcoat: f32 },
}

impl KindParams {
    /// Defaults used when a material of `kind` is created from scratch
    pub fn defaults_for(kind: MaterialKind) -> Self {
        match kind {
            MaterialKind::Phong => KindParams::Phong {
                specular: Color::from_hex(0x111111),
                shininess: 30.0,
            },
            MaterialKind::Standard => KindParams::Standard {
                roughness: 0.5,
                metalness: 0.5,
            },
            MaterialKind::Physical => KindParams::Physical {
                roughness: 0.5,
                metalness: 0.5,
                clearcoat: 0.0,
            },
            _ => KindParams::None,
        }
    }

    pub fn roughness_metalness(&self) -> Option<(f32, f32)> {
        match *self {
            KindParams::Standard { roughness, metalness }
            | KindParams::Physical { roughness, metalness, .. } => Some((roughness, metalness)),
            _ => None,
        }
    }
}

/// Surface description shared by every mesh slot that references it
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub wireframe: bool,
    pub visible: bool,
    pub depth_write: bool,
    pub emissive: Color,
    pub emissive_intensity: f32,
    pub map: Option<TextureId>,
    pub params: KindParams,
    /// Bumped on every mutation so renderers know to re-upload
    version: u64,
}

impl Material {
    /// Creates a material with the default parameters for `kind`
    pub fn new(name: &str, kind: MaterialKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            color: Color::WHITE,
            opacity: 1.0,
            transparent: false,
            wireframe: false,
            visible: true,
            depth_write: true,
            emissive: Color::BLACK,
            emissive_intensity: 1.0,
            map: None,
            params: KindParams::defaults_for(kind),
            version: 0,
        }
    }

    /// Builder pattern: Set base color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Builder pattern: Set opacity; values below 1 also enable transparency
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.transparent = self.opacity < 1.0;
        self
    }

    /// Builder pattern: Set roughness and metalness on PBR kinds
    pub fn with_pbr(mut self, roughness: f32, metalness: f32) -> Self {
        let (roughness, metalness) = (roughness.clamp(0.0, 1.0), metalness.clamp(0.0, 1.0));
        match &mut self.params {
            KindParams::Standard { roughness: r, metalness: m }
            | KindParams::Physical { roughness: r, metalness: m, .. } => {
                *r = roughness;
                *m = metalness;
            }
            _ => {}
        }
        self
    }

    pub fn with_emissive(mut self, emissive: Color) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn with_map(mut self, map: TextureId) -> Self {
        self.map = Some(map);
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Flags the material for re-upload
    pub fn mark_dirty(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn supports(&self, field: MaterialField) -> bool {
        self.kind.supports(field)
    }

    /// Builds a material of `kind` from this one
    ///
    /// Common properties (color, opacity, transparency, wireframe, map) carry
    /// over. Roughness/metalness carry between PBR kinds, specular/shininess
    /// between Phong materials, clearcoat between Physical ones; anything
    /// else starts from the new kind's defaults. Name, visibility, depth
    /// write and emissive state are kept when the new kind has them.
    pub fn convert_to(&self, kind: MaterialKind) -> Material {
        let mut out = Material::new(&self.name, kind);
        out.color = self.color;
        out.opacity = self.opacity;
        out.transparent = self.transparent;
        out.wireframe = self.wireframe;
        out.map = self.map;
        out.visible = self.visible;
        out.depth_write = self.depth_write;

        if kind.supports(MaterialField::Emissive) && self.supports(MaterialField::Emissive) {
            out.emissive = self.emissive;
            out.emissive_intensity = self.emissive_intensity;
        }

        out.params = match (kind, self.params) {
            (MaterialKind::Phong, KindParams::Phong { specular, shininess }) => {
                KindParams::Phong { specular, shininess }
            }
            (MaterialKind::Standard, src) => match src.roughness_metalness() {
                Some((roughness, metalness)) => KindParams::Standard { roughness, metalness },
                None => KindParams::defaults_for(kind),
            },
            (MaterialKind::Physical, src) => {
                let clearcoat = match src {
                    KindParams::Physical { clearcoat, .. } => clearcoat,
                    _ => 0.0,
                };
                match src.roughness_metalness() {
                    Some((roughness, metalness)) => KindParams::Physical {
                        roughness,
                        metalness,
                        clearcoat,
                    },
                    None => KindParams::defaults_for(kind),
                }
            }
            _ => KindParams::defaults_for(kind),
        };

        out
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::new("Default", MaterialKind::Standard)
    }
}
