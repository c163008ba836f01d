// src/loader.rs
//! Model loading: fetch bytes from an [`AssetSource`], decode glTF/GLB with the `gltf` crate and
//! convert the default scene into a showroom [`SceneNode`] tree.
//!
//! Loading is blocking; the orchestrator moves it onto tokio's blocking pool.
//!
//! Primitives compressed with `KHR_draco_mesh_compression` carry no plain vertex data. They are
//! handed to a [`GeometryCodec`]. [`DracoRuntimeCodec`] runs the reference decoder from the
//! configured runtime directory; [`BoundsProxyCodec`] stands in a box sized from the accessor
//! bounds when no decoder is installed or decoding fails.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use crate::materials::{AuthoredMaterial, MaterialRef};
use crate::scene::{Aabb, Geometry, GeometrySource, Mesh, SceneNode, Transform, Vertex};

pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";
/// Reference decoder executable expected inside the Draco runtime directory.
pub const DRACO_DECODER_TOOL: &str = "draco_decoder";

static NEXT_SCRATCH: AtomicU64 = AtomicU64::new(0);

/// Raw asset bytes plus the directory relative URIs resolve against.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub base_dir: Option<PathBuf>,
}

/// Where model bytes come from.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<FetchedAsset>;
}

/// Resolves locators against a directory on disk. A leading `/` is treated as the root.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        self.root.join(locator.trim_start_matches('/'))
    }
}

impl AssetSource for FsAssetSource {
    fn fetch(&self, locator: &str) -> Result<FetchedAsset> {
        let path = self.resolve(locator);
        let bytes = std::fs::read(&path).map_err(|source| Error::Fetch {
            locator: locator.to_string(),
            source,
        })?;
        log::debug!("fetched {} ({} bytes)", path.display(), bytes.len());
        Ok(FetchedAsset {
            bytes,
            base_dir: path.parent().map(Path::to_path_buf),
        })
    }
}

/// A primitive whose geometry lives in a compression extension.
pub struct CompressedPrimitive<'a> {
    pub locator: &'a str,
    /// The extension object as authored.
    pub extension: &'a serde_json::Value,
    /// Bytes of the bufferView the extension points at, if it resolves.
    pub data: Option<&'a [u8]>,
    /// Bounds declared on the POSITION accessor.
    pub bounds: Aabb,
}

/// Decoder for compressed primitives.
pub trait GeometryCodec: Send + Sync {
    fn decode(&self, primitive: &CompressedPrimitive<'_>) -> Result<Geometry>;
}

/// Codec that replaces compressed geometry with a box spanning its declared bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsProxyCodec;

impl GeometryCodec for BoundsProxyCodec {
    fn decode(&self, primitive: &CompressedPrimitive<'_>) -> Result<Geometry> {
        if primitive.bounds.is_empty() {
            return Err(Error::invalid(
                primitive.locator,
                "compressed primitive declares no POSITION bounds",
            ));
        }
        log::debug!("{}: proxying compressed primitive", primitive.locator);
        Ok(Geometry::cuboid(primitive.bounds, GeometrySource::CompressedProxy))
    }
}

/// Decodes Draco bitstreams with the reference `draco_decoder` tool from the configured runtime
/// directory. The tool writes Wavefront OBJ, which is read back as indexed triangles.
#[derive(Debug, Clone)]
pub struct DracoRuntimeCodec {
    tool: PathBuf,
    scratch: PathBuf,
}

impl DracoRuntimeCodec {
    pub fn new(config: &DecoderConfig) -> Self {
        let tool = format!("{}{}", DRACO_DECODER_TOOL, std::env::consts::EXE_SUFFIX);
        Self {
            tool: config.draco_runtime.join(tool),
            scratch: std::env::temp_dir(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.tool.is_file()
    }

    fn run(&self, locator: &str, data: &[u8], input: &Path, output: &Path) -> Result<Geometry> {
        std::fs::write(input, data)?;
        let result = Command::new(&self.tool)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .output()
            .map_err(|e| Error::invalid(locator, format!("cannot run {}: {e}", self.tool.display())))?;
        if !result.status.success() {
            return Err(Error::invalid(
                locator,
                format!(
                    "{} failed ({}): {}",
                    self.tool.display(),
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }

        let obj = std::fs::read_to_string(output)?;
        let (positions, indices) = parse_obj(&obj).map_err(|reason| Error::invalid(locator, reason))?;
        if indices.is_empty() {
            return Err(Error::invalid(locator, "decoded Draco primitive has no faces"));
        }
        Ok(Geometry::with_computed_normals(&positions, indices))
    }
}

impl GeometryCodec for DracoRuntimeCodec {
    fn decode(&self, primitive: &CompressedPrimitive<'_>) -> Result<Geometry> {
        let data = primitive.data.ok_or_else(|| {
            Error::invalid(primitive.locator, "Draco extension references no readable bufferView")
        })?;
        let stem = self.scratch.join(format!(
            "showroom-draco-{}-{}",
            std::process::id(),
            NEXT_SCRATCH.fetch_add(1, Ordering::Relaxed)
        ));
        let input = stem.with_extension("drc");
        let output = stem.with_extension("obj");

        let result = self.run(primitive.locator, data, &input, &output);
        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
        let geometry = result?;
        log::debug!(
            "{}: decoded Draco primitive ({} triangles)",
            primitive.locator,
            geometry.triangle_count()
        );
        Ok(geometry)
    }
}

/// Tries `primary` first and falls back when it fails.
pub struct FallbackCodec {
    primary: Box<dyn GeometryCodec>,
    fallback: Box<dyn GeometryCodec>,
}

impl FallbackCodec {
    pub fn new(primary: Box<dyn GeometryCodec>, fallback: Box<dyn GeometryCodec>) -> Self {
        Self { primary, fallback }
    }
}

impl GeometryCodec for FallbackCodec {
    fn decode(&self, primitive: &CompressedPrimitive<'_>) -> Result<Geometry> {
        self.primary.decode(primitive).or_else(|e| {
            log::warn!("{}: compressed primitive not decoded ({}), using fallback", primitive.locator, e);
            self.fallback.decode(primitive)
        })
    }
}

/// The Draco runtime decoder with the bounds proxy as fallback, or the proxy alone when the
/// runtime has no decoder tool.
pub fn default_codec(config: &DecoderConfig) -> Box<dyn GeometryCodec> {
    let draco = DracoRuntimeCodec::new(config);
    if draco.is_available() {
        log::info!("Draco geometry decoded with {}", draco.tool.display());
        Box::new(FallbackCodec::new(Box::new(draco), Box::new(BoundsProxyCodec)))
    } else {
        log::warn!(
            "no Draco decoder at {}; compressed geometry is shown as bounding boxes",
            draco.tool.display()
        );
        Box::new(BoundsProxyCodec)
    }
}

/// Positions and fan-triangulated faces from Wavefront OBJ text. Only `v` and `f` records count.
fn parse_obj(text: &str) -> std::result::Result<(Vec<[f32; 3]>, Vec<u32>), String> {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("v") => {
                let mut position = [0.0f32; 3];
                for component in &mut position {
                    *component = fields
                        .next()
                        .and_then(|field| field.parse().ok())
                        .ok_or_else(|| format!("OBJ line {}: malformed vertex", line_no + 1))?;
                }
                positions.push(position);
            }
            Some("f") => {
                let corners = fields
                    .map(|corner| obj_index(corner, positions.len()))
                    .collect::<Option<Vec<u32>>>()
                    .ok_or_else(|| format!("OBJ line {}: malformed face", line_no + 1))?;
                if corners.len() < 3 {
                    return Err(format!("OBJ line {}: face with fewer than 3 corners", line_no + 1));
                }
                for i in 1..corners.len() - 1 {
                    indices.extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
                }
            }
            _ => {}
        }
    }
    Ok((positions, indices))
}

/// Position index of one face corner (`7`, `7/3`, `7//2`); 1-based, negative counts from the end.
fn obj_index(corner: &str, vertex_count: usize) -> Option<u32> {
    let raw: i64 = corner.split('/').next()?.parse().ok()?;
    let index = if raw < 0 {
        i64::try_from(vertex_count).ok()? + raw
    } else {
        raw - 1
    };
    if index < 0 || index >= i64::try_from(vertex_count).ok()? {
        return None;
    }
    u32::try_from(index).ok()
}

/// glTF 2.0 (`.gltf` / `.glb`) to scene-graph converter.
pub struct GltfDecoder {
    codec: Box<dyn GeometryCodec>,
}

impl GltfDecoder {
    pub fn new(codec: Box<dyn GeometryCodec>) -> Self {
        Self { codec }
    }

    pub fn decode(&self, locator: &str, asset: &FetchedAsset) -> Result<SceneNode> {
        let decode_err = |source: gltf::Error| Error::Decode {
            locator: locator.to_string(),
            source,
        };

        // Parsed without validation so that the compression extension may appear in
        // `extensionsRequired`; everything else is validated below.
        let gltf::Gltf { document, blob } =
            gltf::Gltf::from_slice_without_validation(&asset.bytes).map_err(decode_err)?;
        validate(&document).map_err(decode_err)?;
        let buffers =
            gltf::import_buffers(&document, asset.base_dir.as_deref(), blob).map_err(decode_err)?;

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| Error::EmptyScene {
                locator: locator.to_string(),
            })?;

        let mut ctx = ConvertContext {
            locator,
            document: &document,
            buffers: &buffers,
            codec: self.codec.as_ref(),
            materials: HashMap::new(),
        };
        let mut children = Vec::new();
        for node in scene.nodes() {
            if let Some(converted) = ctx.convert_node(&node)? {
                children.push(converted);
            }
        }

        let root = SceneNode::group(crate::catalog::identifier_from_path(locator), children);
        if root.mesh_count() == 0 {
            return Err(Error::EmptyScene {
                locator: locator.to_string(),
            });
        }
        log::debug!(
            "{}: decoded {} meshes, {} materials",
            locator,
            root.mesh_count(),
            ctx.materials.len()
        );
        Ok(root)
    }
}

/// Schema validation, minus what the compression extension legitimately leaves out: its
/// listing in `extensionsRequired` and the `bufferView` of accessors it replaces.
fn validate(document: &gltf::Document) -> std::result::Result<(), gltf::Error> {
    use gltf::json::validation::{Error as ValidationError, Validate};

    let root = document.as_json();
    let compressed_views: HashSet<String> = compressed_accessors(document)
        .into_iter()
        .map(|index| format!("accessors[{index}].bufferView"))
        .collect();
    let mut errors = Vec::new();
    root.validate(
        root,
        gltf::json::Path::new,
        &mut |path: &dyn Fn() -> gltf::json::Path, error: ValidationError| {
            let path = path();
            let ignored = path.as_str().starts_with("extensionsRequired")
                || (matches!(error, ValidationError::Missing)
                    && compressed_views.contains(path.as_str()));
            if !ignored {
                errors.push((path, error));
            }
        },
    );
    if errors.is_empty() {
        Ok(())
    } else {
        Err(gltf::Error::Validation(errors))
    }
}

/// Accessors referenced by Draco-compressed primitives. Read from the raw JSON so that invalid
/// indices cannot panic before validation has run.
fn compressed_accessors(document: &gltf::Document) -> HashSet<usize> {
    let root = document.as_json();
    let mut accessors = HashSet::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let compressed = primitive
                .extensions()
                .is_some_and(|extensions| extensions.contains_key(DRACO_EXTENSION));
            if !compressed {
                continue;
            }
            let Some(json) = root
                .meshes
                .get(mesh.index())
                .and_then(|mesh| mesh.primitives.get(primitive.index()))
            else {
                continue;
            };
            accessors.extend(json.attributes.values().map(|accessor| accessor.value()));
            accessors.extend(json.indices.as_ref().map(|accessor| accessor.value()));
        }
    }
    accessors
}

struct ConvertContext<'a> {
    locator: &'a str,
    document: &'a gltf::Document,
    buffers: &'a [gltf::buffer::Data],
    codec: &'a dyn GeometryCodec,
    materials: HashMap<Option<usize>, Arc<AuthoredMaterial>>,
}

impl<'a> ConvertContext<'a> {
    /// Nodes without meshes anywhere below them are dropped.
    fn convert_node(&mut self, node: &gltf::Node<'_>) -> Result<Option<SceneNode>> {
        let name = node
            .name()
            .or_else(|| node.mesh().and_then(|m| m.name()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let transform = node_transform(node);

        let mut parts = Vec::new();
        if let Some(mesh) = node.mesh() {
            let primitive_count = mesh.primitives().count();
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::debug!(
                        "{}: skipping {:?} primitive on '{}'",
                        self.locator,
                        primitive.mode(),
                        name
                    );
                    continue;
                }
                let part = self.convert_primitive(&primitive)?;
                let part_name = if primitive_count == 1 {
                    name.clone()
                } else {
                    format!("{}_{}", name, primitive.index())
                };
                parts.push(SceneNode::mesh(part_name, part));
            }
        }

        for child in node.children() {
            if let Some(converted) = self.convert_node(&child)? {
                parts.push(converted);
            }
        }

        let converted = match parts.len() {
            0 => return Ok(None),
            1 if node.children().next().is_none() && node.mesh().is_some() => {
                let mut only = parts.remove(0);
                only.name = name;
                only.with_transform(transform)
            }
            _ => SceneNode::group(name, parts).with_transform(transform),
        };
        Ok(Some(converted))
    }

    fn convert_primitive(&mut self, primitive: &gltf::Primitive<'_>) -> Result<Mesh> {
        let material = MaterialRef::Authored(self.material(&primitive.material()));

        let compressed = primitive
            .extensions()
            .and_then(|extensions| extensions.get(DRACO_EXTENSION));
        let geometry = match compressed {
            Some(extension) => self.codec.decode(&CompressedPrimitive {
                locator: self.locator,
                extension,
                data: self.buffer_view_bytes(extension),
                bounds: position_bounds(primitive),
            })?,
            None => self.read_geometry(primitive)?,
        };

        Ok(Mesh::new(Arc::new(geometry), material))
    }

    /// Bytes of the bufferView named by a compression extension.
    fn buffer_view_bytes(&self, extension: &serde_json::Value) -> Option<&'a [u8]> {
        let index = usize::try_from(extension.get("bufferView")?.as_u64()?).ok()?;
        let view = self.document.views().nth(index)?;
        let buffers: &'a [gltf::buffer::Data] = self.buffers;
        let buffer = buffers.get(view.buffer().index())?;
        buffer.0.get(view.offset()..view.offset().checked_add(view.length())?)
    }

    fn read_geometry(&self, primitive: &gltf::Primitive<'_>) -> Result<Geometry> {
        let reader =
            primitive.reader(|buffer| self.buffers.get(buffer.index()).map(|data| data.0.as_slice()));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| Error::invalid(self.locator, "primitive has no POSITION data"))?
            .collect();
        let vertex_count = positions.len();

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => sequential_indices(vertex_count).ok_or_else(|| {
                Error::invalid(self.locator, "too many vertices for 32-bit indices")
            })?,
        };
        if indices.iter().any(|&i| i as usize >= vertex_count) {
            return Err(Error::invalid(self.locator, "index out of range"));
        }

        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|normals| normals.collect());
        let geometry = match normals {
            Some(normals) if normals.len() == vertex_count => {
                let vertices = positions
                    .into_iter()
                    .zip(normals)
                    .map(|(position, normal)| Vertex { position, normal })
                    .collect();
                Geometry::new(vertices, indices, GeometrySource::Decoded)
            }
            _ => Geometry::with_computed_normals(&positions, indices),
        };
        Ok(geometry)
    }

    fn material(&mut self, material: &gltf::Material<'_>) -> Arc<AuthoredMaterial> {
        self.materials
            .entry(material.index())
            .or_insert_with(|| {
                let pbr = material.pbr_metallic_roughness();
                Arc::new(AuthoredMaterial {
                    name: material.name().unwrap_or_default().to_string(),
                    base_color: pbr.base_color_factor(),
                    metalness: pbr.metallic_factor(),
                    roughness: pbr.roughness_factor(),
                    blend: material.alpha_mode() == gltf::material::AlphaMode::Blend,
                })
            })
            .clone()
    }
}

/// Indices `0..vertex_count` for a non-indexed primitive; `None` past the u32 range.
fn sequential_indices(vertex_count: usize) -> Option<Vec<u32>> {
    let count = u32::try_from(vertex_count).ok()?;
    Some((0..count).collect())
}

fn node_transform(node: &gltf::Node<'_>) -> Transform {
    let (translation, rotation, scale) = node.transform().decomposed();
    Transform {
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
    }
}

/// Bounds from the POSITION accessor's declared min/max, empty when absent or malformed.
fn position_bounds(primitive: &gltf::Primitive<'_>) -> Aabb {
    let Some(accessor) = primitive.get(&gltf::Semantic::Positions) else {
        return Aabb::EMPTY;
    };
    let read = |value: Option<serde_json::Value>| {
        value.and_then(|v| serde_json::from_value::<[f32; 3]>(v).ok())
    };
    match (read(accessor.min()), read(accessor.max())) {
        (Some(min), Some(max)) => Aabb {
            min: Vec3::from(min),
            max: Vec3::from(max),
        },
        _ => Aabb::EMPTY,
    }
}

/// Blocking model loader. Implementations must be callable from any thread.
pub trait ModelLoader: Send + Sync + 'static {
    fn load(&self, locator: &str) -> Result<SceneNode>;
}

/// Filesystem + glTF loader used by the native showroom.
pub struct GltfModelLoader {
    source: Box<dyn AssetSource>,
    decoder: GltfDecoder,
}

impl GltfModelLoader {
    pub fn new(source: Box<dyn AssetSource>, decoder: GltfDecoder) -> Self {
        Self { source, decoder }
    }

    /// Loader reading from `asset_root`, decoding compressed geometry with [`default_codec`].
    pub fn from_config(asset_root: &Path, decoder: &DecoderConfig) -> Self {
        Self::new(
            Box::new(FsAssetSource::new(asset_root)),
            GltfDecoder::new(default_codec(decoder)),
        )
    }
}

impl ModelLoader for GltfModelLoader {
    fn load(&self, locator: &str) -> Result<SceneNode> {
        let asset = self.source.fetch(locator)?;
        self.decoder.decode(locator, &asset)
    }
}
