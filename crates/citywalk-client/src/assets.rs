use std::path::{Path, PathBuf};

use citywalk_core::animation::{ClipHandle, ClipSource};
use glam::{Mat4, Vec3};

/// Stand-in capsule when a character model fails to load.
pub const FALLBACK_CAPSULE_RADIUS: f32 = 0.4;
pub const FALLBACK_CAPSULE_HEIGHT: f32 = 1.8;

#[derive(Debug)]
pub enum AssetError {
    NotFound(PathBuf),
    Gltf(gltf::Error),
    NoGeometry(PathBuf),
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(p) => write!(f, "Model not found: {}", p.display()),
            Self::Gltf(e) => write!(f, "glTF error: {}", e),
            Self::NoGeometry(p) => write!(f, "Model has no positioned geometry: {}", p.display()),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<gltf::Error> for AssetError {
    fn from(e: gltf::Error) -> Self {
        Self::Gltf(e)
    }
}

/// What the game needs from a character or building model: its vertical
/// extent for ground placement and its named clips.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub source: String,
    pub min: Vec3,
    pub max: Vec3,
    pub clips: Vec<ClipSource>,
    /// True when this is the primitive stand-in.
    pub fallback: bool,
}

impl ModelAsset {
    /// A capsule standing on y = 0 when placed at its ground offset.
    pub fn fallback_capsule(source: &str) -> Self {
        let half = FALLBACK_CAPSULE_HEIGHT * 0.5;
        Self {
            source: source.to_string(),
            min: Vec3::new(-FALLBACK_CAPSULE_RADIUS, -half, -FALLBACK_CAPSULE_RADIUS),
            max: Vec3::new(FALLBACK_CAPSULE_RADIUS, half, FALLBACK_CAPSULE_RADIUS),
            clips: Vec::new(),
            fallback: true,
        }
    }

    /// Height to place the model root at so its lowest point touches y = 0.
    pub fn ground_offset(&self, scale: f32) -> f32 {
        -self.min.y * scale
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn clip_names(&self) -> Vec<&str> {
        self.clips.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Load a glTF/GLB model relative to the project root.
pub fn load_model(project_root: &Path, model_path: &str) -> Result<ModelAsset, AssetError> {
    let full_path = project_root.join(model_path);
    if !full_path.exists() {
        return Err(AssetError::NotFound(full_path));
    }

    let (document, buffers, _images) = gltf::import(&full_path)?;

    let mut bounds: Option<(Vec3, Vec3)> = None;
    let scene = document.default_scene().or_else(|| document.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            collect_bounds(&node, Mat4::IDENTITY, &buffers, &mut bounds);
        }
    }
    let Some((min, max)) = bounds else {
        return Err(AssetError::NoGeometry(full_path));
    };

    let clips = document
        .animations()
        .map(|animation| {
            let duration = animation
                .channels()
                .filter_map(|channel| {
                    let reader = channel.reader(|buf| Some(&buffers[buf.index()]));
                    reader.read_inputs().map(|inputs| inputs.fold(0.0_f32, f32::max))
                })
                .fold(0.0_f32, f32::max);
            ClipSource {
                name: animation
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("animation_{}", animation.index())),
                handle: ClipHandle(animation.index()),
                duration,
            }
        })
        .collect::<Vec<_>>();

    tracing::info!(
        "Model '{}': y {:.2}..{:.2}, {} clips",
        model_path,
        min.y,
        max.y,
        clips.len()
    );

    Ok(ModelAsset {
        source: model_path.to_string(),
        min,
        max,
        clips,
        fallback: false,
    })
}

/// Load a model, substituting the capsule stand-in on any failure.
pub fn load_model_or_fallback(project_root: &Path, model_path: &str) -> ModelAsset {
    match load_model(project_root, model_path) {
        Ok(model) => model,
        Err(e) => {
            tracing::warn!("{}; using fallback capsule", e);
            ModelAsset::fallback_capsule(model_path)
        }
    }
}

/// Walk a node tree accumulating world-space position bounds.
fn collect_bounds(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    bounds: &mut Option<(Vec3, Vec3)>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buf| Some(&buffers[buf.index()]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            for p in positions {
                let p = world.transform_point3(Vec3::from(p));
                *bounds = Some(match *bounds {
                    Some((min, max)) => (min.min(p), max.max(p)),
                    None => (p, p),
                });
            }
        }
    }

    for child in node.children() {
        collect_bounds(&child, world, buffers, bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One triangle spanning y -1..1 under a node lifted by 0.5, plus two
    // animations whose keyframes end at 1.25s.
    const TRIANGLE_GLTF: &str = r#"{"asset": {"version": "2.0"}, "buffers": [{"byteLength": 68, "uri": "data:application/octet-stream;base64,AAAAAAAAgL8AAAAAAACAPwAAgL8AAAAAAAAAAAAAgD8AAAAAAAAAAAAAoD8AAAAAAAAAPwAAAAAAAAAAmpkZPwAAAAA="}], "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}, {"buffer": 0, "byteOffset": 36, "byteLength": 8}, {"buffer": 0, "byteOffset": 44, "byteLength": 24}], "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, -1, 0], "max": [1, 1, 0]}, {"bufferView": 1, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0], "max": [1.25]}, {"bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3"}], "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}], "nodes": [{"mesh": 0, "translation": [0, 0.5, 0]}], "scenes": [{"nodes": [0]}], "scene": 0, "animations": [{"name": "Walk_Loop", "channels": [{"sampler": 0, "target": {"node": 0, "path": "translation"}}], "samplers": [{"input": 1, "output": 2}]}, {"name": "Wave", "channels": [{"sampler": 0, "target": {"node": 0, "path": "translation"}}], "samplers": [{"input": 1, "output": 2}]}]}"#;

    fn temp_project(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("citywalk_assets_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_bounds_and_clips() {
        let dir = temp_project("load");
        std::fs::write(dir.join("triangle.gltf"), TRIANGLE_GLTF).unwrap();

        let model = load_model(&dir, "triangle.gltf").unwrap();
        assert!(!model.fallback);
        assert!((model.min.y + 0.5).abs() < 1e-5);
        assert!((model.max.y - 1.5).abs() < 1e-5);
        assert!((model.ground_offset(2.0) - 1.0).abs() < 1e-5);

        assert_eq!(model.clip_names(), vec!["Walk_Loop", "Wave"]);
        assert!((model.clips[0].duration - 1.25).abs() < 1e-5);
        assert_eq!(model.clips[1].handle, ClipHandle(1));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_model_falls_back_to_capsule() {
        let dir = temp_project("missing");
        assert!(matches!(
            load_model(&dir, "nope.glb"),
            Err(AssetError::NotFound(_))
        ));

        let model = load_model_or_fallback(&dir, "nope.glb");
        assert!(model.fallback);
        assert!(model.clips.is_empty());
        assert!((model.ground_offset(1.0) - 0.9).abs() < 1e-6);
        assert!((model.height() - FALLBACK_CAPSULE_HEIGHT).abs() < 1e-6);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_model_falls_back() {
        let dir = temp_project("corrupt");
        std::fs::write(dir.join("bad.gltf"), "{ not gltf").unwrap();
        assert!(matches!(load_model(&dir, "bad.gltf"), Err(AssetError::Gltf(_))));
        assert!(load_model_or_fallback(&dir, "bad.gltf").fallback);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
