// src/scene.rs
// Showroom scene graph: an owned tree of tagged nodes (Group | Mesh | Light).
// Dependencies: glam, bytemuck

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use crate::lighting::{Environment, Light};
use crate::materials::MaterialRef;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Unique node id; stable for the lifetime of the node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Interleaved vertex uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points.into_iter().fold(Self::EMPTY, |acc, p| Aabb {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }
}

/// Whether a primitive's triangles were decoded or stood in for by a proxy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GeometrySource {
    Decoded,
    CompressedProxy,
}

/// Triangle geometry. Immutable once built and shared through `Arc`.
#[derive(Debug)]
pub struct Geometry {
    id: u64,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
    pub source: GeometrySource,
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, source: GeometrySource) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position)));
        Self {
            id: NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed),
            vertices,
            indices,
            bounds,
            source,
        }
    }

    /// Indexed triangles with smooth normals computed from face normals.
    pub fn with_computed_normals(positions: &[[f32; 3]], indices: Vec<u32>) -> Self {
        let mut normals = vec![Vec3::ZERO; positions.len()];
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= positions.len() || b >= positions.len() || c >= positions.len() {
                continue;
            }
            let pa = Vec3::from(positions[a]);
            let face = (Vec3::from(positions[b]) - pa).cross(Vec3::from(positions[c]) - pa);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        let vertices = positions
            .iter()
            .zip(normals)
            .map(|(p, n)| Vertex {
                position: *p,
                normal: n.try_normalize().unwrap_or(Vec3::Y).to_array(),
            })
            .collect();
        Self::new(vertices, indices, GeometrySource::Decoded)
    }

    /// Axis-aligned box spanning `bounds`, flat shaded.
    pub fn cuboid(bounds: Aabb, source: GeometrySource) -> Self {
        let (lo, hi) = (bounds.min, bounds.max);
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (Vec3::X, [Vec3::new(hi.x, lo.y, lo.z), Vec3::new(hi.x, hi.y, lo.z), Vec3::new(hi.x, hi.y, hi.z), Vec3::new(hi.x, lo.y, hi.z)]),
            (Vec3::NEG_X, [Vec3::new(lo.x, lo.y, hi.z), Vec3::new(lo.x, hi.y, hi.z), Vec3::new(lo.x, hi.y, lo.z), Vec3::new(lo.x, lo.y, lo.z)]),
            (Vec3::Y, [Vec3::new(lo.x, hi.y, lo.z), Vec3::new(lo.x, hi.y, hi.z), Vec3::new(hi.x, hi.y, hi.z), Vec3::new(hi.x, hi.y, lo.z)]),
            (Vec3::NEG_Y, [Vec3::new(lo.x, lo.y, hi.z), Vec3::new(lo.x, lo.y, lo.z), Vec3::new(hi.x, lo.y, lo.z), Vec3::new(hi.x, lo.y, hi.z)]),
            (Vec3::Z, [Vec3::new(hi.x, lo.y, hi.z), Vec3::new(hi.x, hi.y, hi.z), Vec3::new(lo.x, hi.y, hi.z), Vec3::new(lo.x, lo.y, hi.z)]),
            (Vec3::NEG_Z, [Vec3::new(lo.x, lo.y, lo.z), Vec3::new(lo.x, hi.y, lo.z), Vec3::new(hi.x, hi.y, lo.z), Vec3::new(hi.x, lo.y, lo.z)]),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            vertices.extend(corners.iter().map(|c| Vertex {
                position: c.to_array(),
                normal: normal.to_array(),
            }));
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(vertices, indices, source)
    }

    /// Square plane on XZ centred at the origin, facing +Y.
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let vertices = [[-h, 0.0, -h], [-h, 0.0, h], [h, 0.0, h], [h, 0.0, -h]]
            .into_iter()
            .map(|position| Vertex {
                position,
                normal: [0.0, 1.0, 0.0],
            })
            .collect();
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3], GeometrySource::Decoded)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Local TRS transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Renderable mesh payload.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: MaterialRef,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: Arc<Geometry>, material: MaterialRef) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group(Vec<SceneNode>),
    Mesh(Mesh),
    Light(Light),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    id: NodeId,
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
}

impl SceneNode {
    pub fn new<S: Into<String>>(name: S, kind: NodeKind) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            transform: Transform::IDENTITY,
            kind,
        }
    }

    pub fn group<S: Into<String>>(name: S, children: Vec<SceneNode>) -> Self {
        Self::new(name, NodeKind::Group(children))
    }

    pub fn mesh<S: Into<String>>(name: S, mesh: Mesh) -> Self {
        Self::new(name, NodeKind::Mesh(mesh))
    }

    pub fn light<S: Into<String>>(name: S, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn children(&self) -> &[SceneNode] {
        match &self.kind {
            NodeKind::Group(children) => children,
            _ => &[],
        }
    }

    /// Depth-first walk over every mesh with its node name.
    pub fn for_each_mesh_mut<F: FnMut(&str, &mut Mesh)>(&mut self, f: &mut F) {
        match &mut self.kind {
            NodeKind::Group(children) => {
                for child in children {
                    child.for_each_mesh_mut(f);
                }
            }
            NodeKind::Mesh(mesh) => f(&self.name, mesh),
            NodeKind::Light(_) => {}
        }
    }

    /// Depth-first walk with accumulated world matrices.
    pub fn visit<'a, F: FnMut(&'a SceneNode, Mat4)>(&'a self, parent: Mat4, f: &mut F) {
        let world = parent * self.transform.matrix();
        f(self, world);
        if let NodeKind::Group(children) = &self.kind {
            for child in children {
                child.visit(world, f);
            }
        }
    }

    pub fn mesh_count(&self) -> usize {
        match &self.kind {
            NodeKind::Group(children) => children.iter().map(SceneNode::mesh_count).sum(),
            NodeKind::Mesh(_) => 1,
            NodeKind::Light(_) => 0,
        }
    }
}

/// A mesh resolved to world space for drawing.
pub struct DrawItem<'a> {
    pub node: NodeId,
    pub world: Mat4,
    pub mesh: &'a Mesh,
}

/// A light resolved to world space.
#[derive(Clone, Debug)]
pub struct PlacedLight {
    pub light: Light,
    pub position: Vec3,
}

/// Root of the showroom scene.
pub struct SceneGraph {
    root: SceneNode,
    pub environment: Option<Environment>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            root: SceneNode::group("showroom", Vec::new()),
            environment: None,
        }
    }

    fn children_mut(&mut self) -> &mut Vec<SceneNode> {
        match &mut self.root.kind {
            NodeKind::Group(children) => children,
            // root is always constructed as a group
            _ => unreachable!("scene root is not a group"),
        }
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    /// Attach a subtree directly under the root.
    pub fn attach(&mut self, node: SceneNode) -> NodeId {
        let id = node.id();
        self.children_mut().push(node);
        id
    }

    /// Detach a root-level subtree, handing ownership back to the caller.
    pub fn detach(&mut self, id: NodeId) -> Option<SceneNode> {
        let children = self.children_mut();
        let index = children.iter().position(|child| child.id() == id)?;
        Some(children.remove(index))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.root.children().iter().any(|child| child.id() == id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.root.children().iter().find(|child| child.id() == id)
    }

    pub fn top_level_count(&self) -> usize {
        self.root.children().len()
    }

    pub fn mesh_count(&self) -> usize {
        self.root.mesh_count()
    }

    pub fn draw_items(&self) -> Vec<DrawItem<'_>> {
        let mut items = Vec::new();
        self.root.visit(Mat4::IDENTITY, &mut |node, world| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                items.push(DrawItem {
                    node: node.id(),
                    world,
                    mesh,
                });
            }
        });
        items
    }

    pub fn lights(&self) -> Vec<PlacedLight> {
        let mut lights = Vec::new();
        self.root.visit(Mat4::IDENTITY, &mut |node, world| {
            if let NodeKind::Light(light) = &node.kind {
                lights.push(PlacedLight {
                    light: light.clone(),
                    position: world.transform_point3(Vec3::ZERO),
                });
            }
        });
        lights
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{AuthoredMaterial, MaterialRef};

    fn unit_mesh(name: &str) -> SceneNode {
        let geometry = Arc::new(Geometry::cuboid(
            Aabb {
                min: Vec3::splat(-0.5),
                max: Vec3::splat(0.5),
            },
            GeometrySource::Decoded,
        ));
        SceneNode::mesh(
            name,
            Mesh::new(geometry, MaterialRef::Authored(Arc::new(AuthoredMaterial::default()))),
        )
    }

    #[test]
    fn attach_and_detach_round_trip_ownership() {
        let mut graph = SceneGraph::new();
        let id = graph.attach(SceneNode::group("car", vec![unit_mesh("body"), unit_mesh("door")]));
        assert!(graph.contains(id));
        assert_eq!(graph.mesh_count(), 2);

        let detached = graph.detach(id).expect("attached node");
        assert_eq!(detached.name, "car");
        assert!(!graph.contains(id));
        assert_eq!(graph.mesh_count(), 0);
        assert!(graph.detach(id).is_none());
    }

    #[test]
    fn draw_items_carry_world_transforms() {
        let mut graph = SceneGraph::new();
        let child = unit_mesh("wheel").with_transform(Transform::from_translation(Vec3::X));
        let parent = SceneNode::group("car", vec![child]).with_transform(Transform {
            scale: Vec3::splat(2.0),
            ..Transform::IDENTITY
        });
        graph.attach(parent);

        let items = graph.draw_items();
        assert_eq!(items.len(), 1);
        let origin = items[0].world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn for_each_mesh_reaches_nested_meshes() {
        let mut node = SceneNode::group(
            "root",
            vec![
                unit_mesh("a"),
                SceneNode::group("inner", vec![unit_mesh("b"), unit_mesh("c")]),
            ],
        );
        let mut seen = Vec::new();
        node.for_each_mesh_mut(&mut |name, mesh| {
            mesh.cast_shadow = true;
            seen.push(name.to_string());
        });
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(node.mesh_count(), 3);
    }

    #[test]
    fn cuboid_matches_bounds() {
        let bounds = Aabb {
            min: Vec3::new(-1.0, 0.0, -2.0),
            max: Vec3::new(1.0, 1.5, 2.0),
        };
        let geometry = Geometry::cuboid(bounds, GeometrySource::CompressedProxy);
        assert_eq!(geometry.bounds, bounds);
        assert_eq!(geometry.triangle_count(), 12);
    }

    #[test]
    fn computed_normals_face_outward() {
        let geometry = Geometry::with_computed_normals(
            &[[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
            vec![0, 1, 2],
        );
        for v in &geometry.vertices {
            assert!((Vec3::from(v.normal) - Vec3::Y).length() < 1e-5);
        }
    }
}
