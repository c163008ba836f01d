// src/renderer.rs
// wgpu backend for the showroom: directional shadow map, PBR-lite main pass, transparent
// surfaces drawn last. GPU buffers are cached per geometry / per node and evicted when the
// scene stops referencing them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::camera::{CameraUniform, Viewport};
use crate::config::LightingConfig;
use crate::lighting::LightUniforms;
use crate::materials::MaterialParams;
use crate::scene::{DrawItem, Geometry, Mesh, NodeId, Vertex};
use crate::showroom::{RenderBackend, RenderFrame};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Instance, adapter, device and queue; created before the event loop takes over.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            dx12_shader_compiler: Default::default(),
            flags: wgpu::InstanceFlags::empty(),
            gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
        });

        // No surface exists yet; the window is created in `resumed`.
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no suitable GPU adapter"))?;
        log::info!("Using adapter {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("showroom_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("failed to request device")?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }
}

/// Frame uniform; matches `Frame` in `showroom.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniforms {
    pub camera: CameraUniform,
    pub lights: LightUniforms,
    /// x = exposure, y = shadow map texel size
    pub params: [f32; 4],
}

/// Per-draw uniform; matches `Draw` in both shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub material: MaterialParams,
    /// x = receive shadow, y = cast shadow
    pub flags: [f32; 4],
}

impl DrawUniforms {
    pub fn new(world: Mat4, mesh: &Mesh) -> Self {
        let normal_matrix = if world.determinant().abs() > f32::EPSILON {
            world.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        Self {
            model: world.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            material: MaterialParams::from(mesh.material.shading()),
            flags: [flag(mesh.receive_shadow), flag(mesh.cast_shadow), 0.0, 0.0],
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct GpuDraw {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct DepthTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, label: &str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

pub struct WgpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: Option<wgpu::Surface<'static>>,
    config: wgpu::SurfaceConfiguration,

    depth: DepthTarget,
    shadow_map: DepthTarget,
    shadow_map_size: u32,

    draw_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    shadow_frame_buffer: wgpu::Buffer,
    shadow_frame_bind_group: wgpu::BindGroup,

    opaque_pipeline: wgpu::RenderPipeline,
    transparent_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,

    meshes: HashMap<u64, GpuMesh>,
    draws: HashMap<NodeId, GpuDraw>,

    clear_color: wgpu::Color,
    exposure: f32,
}

impl WgpuRenderer {
    pub fn new(gpu: &GpuContext, window: Arc<Window>, lighting: &LightingConfig) -> Result<Self> {
        let device = gpu.device.clone();
        let size = window.inner_size();

        let surface = gpu
            .instance
            .create_surface(window)
            .context("failed to create surface")?;
        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface is incompatible with the adapter"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth = DepthTarget::new(&device, "showroom_depth", config.width, config.height, DEPTH_FORMAT);
        let shadow_map_size = lighting.shadow_map_size.max(1);
        let shadow_map = DepthTarget::new(&device, "shadow_map", shadow_map_size, shadow_map_size, SHADOW_FORMAT);
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let shadow_frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_frame_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let shadow_frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadow_frame_uniforms"),
            size: std::mem::size_of::<[[f32; 4]; 4]>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_frame_bind_group"),
            layout: &shadow_frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: shadow_frame_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("showroom_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/showroom.wgsl").into()),
        });
        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
        });

        let main_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("showroom_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &draw_layout],
            push_constant_ranges: &[],
        });
        let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&shadow_frame_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let opaque_pipeline = main_pipeline(&device, &main_layout, &shader, format, false);
        let transparent_pipeline = main_pipeline(&device, &main_layout, &shader, format, true);
        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow_pipeline"),
            layout: Some(&shadow_layout),
            vertex: wgpu::VertexState {
                module: &shadow_shader,
                entry_point: "vs_shadow",
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
            },
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: SHADOW_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: None,
            multiview: None,
            cache: None,
        });

        let [r, g, b] = lighting.clear_color;
        log::info!(
            "Renderer ready: {}x{} {:?}, shadow map {}",
            config.width,
            config.height,
            format,
            shadow_map_size
        );

        Ok(Self {
            device,
            queue: gpu.queue.clone(),
            surface: Some(surface),
            config,
            depth,
            shadow_map,
            shadow_map_size,
            draw_layout,
            frame_buffer,
            frame_bind_group,
            shadow_frame_buffer,
            shadow_frame_bind_group,
            opaque_pipeline,
            transparent_pipeline,
            shadow_pipeline,
            meshes: HashMap::new(),
            draws: HashMap::new(),
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
            exposure: lighting.exposure,
        })
    }

    fn upload_mesh(&mut self, geometry: &Geometry) {
        if self.meshes.contains_key(&geometry.id()) {
            return;
        }
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes.insert(
            geometry.id(),
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: geometry.indices.len() as u32,
            },
        );
    }

    fn write_draw(&mut self, node: NodeId, uniforms: &DrawUniforms) {
        if let Some(draw) = self.draws.get(&node) {
            self.queue.write_buffer(&draw.buffer, 0, bytemuck::bytes_of(uniforms));
            return;
        }
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("draw_uniforms"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_bind_group"),
            layout: &self.draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        self.draws.insert(node, GpuDraw { buffer, bind_group });
    }

    /// Upload what this frame needs and drop buffers for nodes and geometry no longer drawn.
    fn sync(&mut self, items: &[DrawItem<'_>]) {
        let mut live_meshes = HashSet::with_capacity(items.len());
        let mut live_nodes = HashSet::with_capacity(items.len());
        for item in items {
            self.upload_mesh(&item.mesh.geometry);
            self.write_draw(item.node, &DrawUniforms::new(item.world, item.mesh));
            live_meshes.insert(item.mesh.geometry.id());
            live_nodes.insert(item.node);
        }
        let (meshes_before, draws_before) = (self.meshes.len(), self.draws.len());
        self.meshes.retain(|id, _| live_meshes.contains(id));
        self.draws.retain(|id, _| live_nodes.contains(id));
        let evicted = meshes_before - self.meshes.len() + draws_before - self.draws.len();
        if evicted > 0 {
            log::debug!("evicted {} GPU buffers", evicted);
        }
    }

    fn acquire(&self) -> Result<Option<wgpu::SurfaceTexture>> {
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| anyhow!("renderer disposed"))?;
        match surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Timeout) => Ok(None),
            Err(err) => {
                log::warn!("Failed to acquire surface texture: {:?}. Reconfiguring surface.", err);
                surface.configure(&self.device, &self.config);
                surface
                    .get_current_texture()
                    .map(Some)
                    .context("failed to acquire frame after reconfigure")
            }
        }
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn main_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    transparent: bool,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(if transparent {
            "showroom_transparent_pipeline"
        } else {
            "showroom_opaque_pipeline"
        }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(if transparent {
                    wgpu::BlendState::ALPHA_BLENDING
                } else {
                    wgpu::BlendState::REPLACE
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        // Vehicle assets are not reliably closed or consistently wound.
        primitive: wgpu::PrimitiveState {
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: !transparent,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Opaque items first, then transparent ones back to front from `eye`.
pub fn draw_order(items: &[DrawItem<'_>], eye: glam::Vec3) -> (Vec<usize>, Vec<usize>) {
    let (mut transparent, opaque): (Vec<usize>, Vec<usize>) =
        (0..items.len()).partition(|&i| items[i].mesh.material.shading().is_transparent());
    let distance = |i: usize| items[i].world.transform_point3(glam::Vec3::ZERO).distance_squared(eye);
    transparent.sort_by(|&a, &b| distance(b).total_cmp(&distance(a)));
    (opaque, transparent)
}

impl RenderBackend for WgpuRenderer {
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<()> {
        let items = frame.graph.draw_items();
        self.sync(&items);

        let lights = LightUniforms::pack(&frame.graph.lights(), frame.graph.environment.as_ref());
        let uniforms = FrameUniforms {
            camera: CameraUniform::from_camera(frame.camera),
            lights,
            params: [self.exposure, 1.0 / self.shadow_map_size as f32, 0.0, 0.0],
        };
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.queue.write_buffer(
            &self.shadow_frame_buffer,
            0,
            bytemuck::bytes_of(&lights.light_view_proj),
        );

        let Some(output) = self.acquire()? else {
            return Ok(());
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (opaque, transparent) = draw_order(&items, frame.camera.position);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("showroom_encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if lights.casts_shadows() {
                pass.set_pipeline(&self.shadow_pipeline);
                pass.set_bind_group(0, &self.shadow_frame_bind_group, &[]);
                for item in items.iter().filter(|item| item.mesh.cast_shadow) {
                    self.draw_item(&mut pass, item);
                }
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("showroom_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_pipeline(&self.opaque_pipeline);
            for &i in &opaque {
                self.draw_item(&mut pass, &items[i]);
            }
            pass.set_pipeline(&self.transparent_pipeline);
            for &i in &transparent {
                self.draw_item(&mut pass, &items[i]);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }
        self.config.width = viewport.width;
        self.config.height = viewport.height;
        if let Some(surface) = self.surface.as_ref() {
            surface.configure(&self.device, &self.config);
        }
        self.depth = DepthTarget::new(
            &self.device,
            "showroom_depth",
            viewport.width,
            viewport.height,
            DEPTH_FORMAT,
        );
        log::debug!("Renderer resized to {}x{}", viewport.width, viewport.height);
    }

    fn dispose(&mut self) {
        let buffers = self.meshes.len() + self.draws.len();
        self.meshes.clear();
        self.draws.clear();
        self.depth.texture.destroy();
        self.shadow_map.texture.destroy();
        self.surface = None;
        log::info!("Renderer disposed ({} cached buffers released)", buffers);
    }
}

impl WgpuRenderer {
    fn draw_item(&self, pass: &mut wgpu::RenderPass<'_>, item: &DrawItem<'_>) {
        let (Some(mesh), Some(draw)) = (
            self.meshes.get(&item.mesh.geometry.id()),
            self.draws.get(&item.node),
        ) else {
            return;
        };
        pass.set_bind_group(1, &draw.bind_group, &[]);
        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{MaterialRef, MaterialSet};
    use crate::scene::{Aabb, GeometrySource, SceneGraph, SceneNode, Transform};
    use glam::Vec3;

    fn boxed(name: &str, material: MaterialRef, x: f32) -> SceneNode {
        let geometry = Arc::new(Geometry::cuboid(
            Aabb {
                min: Vec3::splat(-0.5),
                max: Vec3::splat(0.5),
            },
            GeometrySource::Decoded,
        ));
        SceneNode::mesh(name, Mesh::new(geometry, material))
            .with_transform(Transform::from_translation(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
        assert_eq!(std::mem::size_of::<LightUniforms>(), 240);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 80 + 240 + 16);
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 192);
    }

    #[test]
    fn draw_uniforms_carry_shadow_flags_and_normal_matrix() {
        let set = MaterialSet::new();
        let mut mesh = Mesh::new(
            Arc::new(Geometry::plane(1.0)),
            MaterialRef::Surface(set.trim.clone()),
        );
        mesh.receive_shadow = true;
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let uniforms = DrawUniforms::new(world, &mesh);
        assert_eq!(uniforms.flags[..2], [1.0, 0.0]);
        assert!((uniforms.normal_matrix[0][0] - 0.5).abs() < 1e-6);

        let flat = DrawUniforms::new(Mat4::from_scale(Vec3::ZERO), &mesh);
        assert_eq!(flat.normal_matrix, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn transparent_items_sorted_back_to_front_after_opaque() {
        let set = MaterialSet::new();
        let mut graph = SceneGraph::new();
        graph.attach(boxed("near_glass", MaterialRef::Surface(set.glass.clone()), 1.0));
        graph.attach(boxed("body", MaterialRef::Surface(set.body_primary.clone()), 0.0));
        graph.attach(boxed("far_glass", MaterialRef::Surface(set.glass.clone()), -5.0));

        let items = graph.draw_items();
        let (opaque, transparent) = draw_order(&items, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(opaque, vec![1]);
        assert_eq!(transparent, vec![2, 0]);
    }
}
