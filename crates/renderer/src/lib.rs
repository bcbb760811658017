//! Renderer: wgpu backend for the two-object viewer.
//! Uploads interleaved `[pos, uv]` buffers once, then draws meshes, the axis
//! gizmo and bounding-box wireframes each frame with transforms read from
//! [`SceneState`]. wgpu = 26.x, winit = 0.30.x

use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, DepthBiasState, DepthStencilState, Device, DeviceDescriptor,
    Extent3d, Features, FragmentState, Instance, InstanceDescriptor, Limits, LoadOp, Operations,
    PipelineLayoutDescriptor, PowerPreference, PresentMode, PrimitiveTopology, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    ShaderModule, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, Surface,
    SurfaceConfiguration, SurfaceError, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureView, TextureViewDescriptor, VertexBufferLayout, VertexState,
    VertexStepMode, util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

use asset::mesh::{MeshData, MeshVertex};
use asset::texture::TextureData;
use corelib::gizmo::{AXIS_COLORS, AXIS_LENGTH, axis_lines};
use corelib::scene::{ObjectId, SceneState};
use corelib::VERTEX_STRIDE;

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Wireframe color for bounding boxes.
const BOX_COLOR: [f32; 3] = [0.0, 1.0, 1.0];

/// Uniform slots per frame: 2 meshes + 3 axes + 2 wireframes, rounded up.
const MAX_DRAWS: u64 = 8;

/// OpenGL clip-space depth [-1,1] -> wgpu [0,1]. Applied after the shared
/// projection so picking and rendering keep using the same matrices.
#[rustfmt::skip]
const OPENGL_TO_WGPU: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

const VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
};

/// Per-draw uniform (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawUniform {
    mvp: [[f32; 4]; 4],
    /// rgb = color, a = 1.0 when the texture should be sampled.
    color: [f32; 4],
}

/// How an object's surface is shaded.
#[derive(Clone, Copy, Debug)]
enum Appearance<'a> {
    Flat([f32; 3]),
    Textured(&'a TextureData),
}

/// Textured when the image is present and within `max_dimension`;
/// otherwise the flat material color.
fn resolve_appearance<'a>(
    id: ObjectId,
    color: [f32; 3],
    texture: Option<&'a TextureData>,
    max_dimension: u32,
) -> Appearance<'a> {
    match texture {
        Some(t) if t.fits_within(max_dimension) => Appearance::Textured(t),
        Some(t) => {
            log::warn!(
                "{:?}: texture {}x{} exceeds device limit {} or is malformed; using flat color",
                id,
                t.width,
                t.height,
                max_dimension
            );
            Appearance::Flat(color)
        }
        None => Appearance::Flat(color),
    }
}

/// CPU-side geometry handed over for one object.
pub struct ObjectGeometry<'a> {
    pub id: ObjectId,
    pub mesh: &'a MeshData,
    /// Material color; used whenever the texture is absent or unusable.
    pub color: [f32; 3],
    pub texture: Option<&'a TextureData>,
    pub wireframe: &'a [[f32; VERTEX_STRIDE]],
}

struct GpuMesh {
    vertex_buf: Buffer,
    index_buf: Option<Buffer>,
    count: u32,
}

struct GpuObject {
    mesh: GpuMesh,
    wireframe: GpuMesh,
    color: [f32; 3],
    textured: bool,
    texture_bg: BindGroup,
}

#[derive(Clone, Copy)]
enum Topology {
    Triangles,
    Lines,
}

struct DrawCmd<'a> {
    topology: Topology,
    mesh: &'a GpuMesh,
    range: std::ops::Range<u32>,
    texture_bg: &'a BindGroup,
    uniform: DrawUniform,
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Pipelines share one shader and vertex layout
    triangle_pipeline: RenderPipeline,
    line_pipeline: RenderPipeline,

    // Per-draw uniforms (dynamic offsets)
    draw_bg: BindGroup,
    draw_buf: Buffer,
    draw_stride: u64,

    // Textures
    texture_bgl: BindGroupLayout,
    white_bg: BindGroup,

    // Geometry
    axes: GpuMesh,
    objects: [Option<GpuObject>; 2],

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: wgpu::Backends) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("create_surface failed")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("Adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("PickView Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("request_device failed")?;

        // Colors are authored for a linear (non-sRGB) framebuffer.
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no formats")?;

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);

        // ==== Shader ====
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Scene WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        // ==== Draw uniforms BGL/BG ====
        let uniform_size = std::mem::size_of::<DrawUniform>() as u64;
        let align = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let draw_stride = uniform_size.div_ceil(align) * align;

        let draw_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Draw BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(uniform_size),
                },
                count: None,
            }],
        });
        let draw_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw UBO"),
            size: draw_stride * MAX_DRAWS,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let draw_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw BG"),
            layout: &draw_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &draw_buf,
                    offset: 0,
                    size: NonZeroU64::new(uniform_size),
                }),
            }],
        });

        // ==== Texture BGL ====
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Texture BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // ==== Pipelines ====
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Scene PipelineLayout"),
            bind_group_layouts: &[&draw_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let triangle_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            PrimitiveTopology::TriangleList,
        );
        let line_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            PrimitiveTopology::LineList,
        );

        let white_bg = create_texture_bind_group(
            &device,
            &queue,
            &texture_bgl,
            &TextureData::solid([255, 255, 255, 255]),
        );

        let axes = upload_lines(&device, "Axis VB", &axis_lines(AXIS_LENGTH));
        log::info!("GPU ready: {}x{}, format {:?}", width, height, surface_format);

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            triangle_pipeline,
            line_pipeline,
            draw_bg,
            draw_buf,
            draw_stride,
            texture_bgl,
            white_bg,
            axes,
            objects: [None, None],
            depth_view,
            width,
            height,
        })
    }

    /// Upload (or replace) an object's mesh, appearance and wireframe.
    /// A texture the device cannot hold degrades to the flat color.
    pub fn upload_object(&mut self, geometry: &ObjectGeometry<'_>) {
        let mesh = &geometry.mesh;
        let vertex_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Object VB"),
                contents: bytemuck::cast_slice::<MeshVertex, u8>(&mesh.vertices),
                usage: BufferUsages::VERTEX,
            });
        let index_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Object IB"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: BufferUsages::INDEX,
            });

        let max_dimension = self.device.limits().max_texture_dimension_2d;
        let appearance =
            resolve_appearance(geometry.id, geometry.color, geometry.texture, max_dimension);
        let (color, textured, texture_bg) = match appearance {
            Appearance::Flat(color) => (color, false, self.white_bg.clone()),
            Appearance::Textured(texture) => (
                [1.0, 1.0, 1.0],
                true,
                create_texture_bind_group(&self.device, &self.queue, &self.texture_bgl, texture),
            ),
        };

        log::info!(
            "Uploaded {:?}: {} vertices, {} indices, textured={}",
            geometry.id,
            mesh.vertices.len(),
            mesh.indices.len(),
            textured
        );

        self.objects[geometry.id.index()] = Some(GpuObject {
            mesh: GpuMesh {
                vertex_buf,
                index_buf: Some(index_buf),
                count: mesh.indices.len() as u32,
            },
            wireframe: upload_lines(&self.device, "Wireframe VB", geometry.wireframe),
            color,
            textured,
            texture_bg,
        });
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    /// Render one frame from the current scene state.
    pub fn render(&mut self, scene: &SceneState) -> Result<(), SurfaceError> {
        let proj_view = OPENGL_TO_WGPU * scene.proj_view();
        let draws = self.collect_draws(scene, proj_view);

        let mut staging = vec![0u8; (self.draw_stride * MAX_DRAWS) as usize];
        for (slot, cmd) in draws.iter().enumerate() {
            let offset = slot * self.draw_stride as usize;
            let bytes = bytemuck::bytes_of(&cmd.uniform);
            staging[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        self.queue.write_buffer(&self.draw_buf, 0, &staging);

        // --- frame & pass
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color::WHITE),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (slot, cmd) in draws.iter().enumerate() {
                let pipeline = match cmd.topology {
                    Topology::Triangles => &self.triangle_pipeline,
                    Topology::Lines => &self.line_pipeline,
                };
                rpass.set_pipeline(pipeline);
                let offset = (slot as u64 * self.draw_stride) as u32;
                rpass.set_bind_group(0, &self.draw_bg, &[offset]);
                rpass.set_bind_group(1, cmd.texture_bg, &[]);
                rpass.set_vertex_buffer(0, cmd.mesh.vertex_buf.slice(..));
                match &cmd.mesh.index_buf {
                    Some(index_buf) => {
                        rpass.set_index_buffer(index_buf.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(cmd.range.clone(), 0, 0..1);
                    }
                    None => rpass.draw(cmd.range.clone(), 0..1),
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Draw order: meshes, axes, then wireframes. Objects whose mesh failed
    /// to load are simply absent.
    fn collect_draws(&self, scene: &SceneState, proj_view: Mat4) -> Vec<DrawCmd<'_>> {
        let mut draws = Vec::with_capacity(MAX_DRAWS as usize);

        for id in ObjectId::ALL {
            let Some(obj) = &self.objects[id.index()] else {
                continue;
            };
            if obj.mesh.count == 0 {
                continue;
            }
            draws.push(DrawCmd {
                topology: Topology::Triangles,
                mesh: &obj.mesh,
                range: 0..obj.mesh.count,
                texture_bg: &obj.texture_bg,
                uniform: draw_uniform(proj_view * scene.model_matrix(id), obj.color, obj.textured),
            });
        }

        for (axis, color) in AXIS_COLORS.iter().enumerate() {
            let start = axis as u32 * 2;
            draws.push(DrawCmd {
                topology: Topology::Lines,
                mesh: &self.axes,
                range: start..start + 2,
                texture_bg: &self.white_bg,
                uniform: draw_uniform(proj_view, *color, false),
            });
        }

        for id in ObjectId::ALL {
            let Some(obj) = &self.objects[id.index()] else {
                continue;
            };
            if obj.wireframe.count == 0 {
                continue;
            }
            draws.push(DrawCmd {
                topology: Topology::Lines,
                mesh: &obj.wireframe,
                range: 0..obj.wireframe.count,
                texture_bg: &self.white_bg,
                uniform: draw_uniform(proj_view * scene.model_matrix(id), BOX_COLOR, false),
            });
        }

        debug_assert!(draws.len() as u64 <= MAX_DRAWS);
        draws
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

fn draw_uniform(mvp: Mat4, color: [f32; 3], textured: bool) -> DrawUniform {
    DrawUniform {
        mvp: mvp.to_cols_array_2d(),
        color: [color[0], color[1], color[2], if textured { 1.0 } else { 0.0 }],
    }
}

fn create_pipeline(
    device: &Device,
    layout: &wgpu::PipelineLayout,
    shader: &ShaderModule,
    format: TextureFormat,
    topology: PrimitiveTopology,
) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(match topology {
            PrimitiveTopology::LineList => "Line Pipeline",
            _ => "Triangle Pipeline",
        }),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[VERTEX_LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format,
                blend: Some(BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        // OBJ winding is not guaranteed; draw both faces.
        primitive: wgpu::PrimitiveState {
            topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Non-indexed line list in the shared vertex layout.
fn upload_lines(device: &Device, label: &str, records: &[[f32; VERTEX_STRIDE]]) -> GpuMesh {
    let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(records),
        usage: BufferUsages::VERTEX,
    });
    GpuMesh {
        vertex_buf,
        index_buf: None,
        count: records.len() as u32,
    }
}

fn create_texture_bind_group(
    device: &Device,
    queue: &Queue,
    layout: &BindGroupLayout,
    texture: &TextureData,
) -> BindGroup {
    let gpu_texture = device.create_texture_with_data(
        queue,
        &TextureDescriptor {
            label: Some("Diffuse Texture"),
            size: Extent3d {
                width: texture.width,
                height: texture.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &texture.data,
    );
    let view = gpu_texture.create_view(&TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Diffuse Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture BG"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    })
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn depth_conversion_maps_gl_range_to_unit_range() {
        let near = OPENGL_TO_WGPU.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far = OPENGL_TO_WGPU.project_point3(Vec3::new(0.0, 0.0, 1.0));
        assert!((near.z - 0.0).abs() < 1e-6);
        assert!((far.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn draw_uniform_packs_texture_flag() {
        let u = draw_uniform(Mat4::IDENTITY, [0.2, 0.4, 0.6], true);
        assert_eq!(u.color, [0.2, 0.4, 0.6, 1.0]);
        let u = draw_uniform(Mat4::IDENTITY, [0.2, 0.4, 0.6], false);
        assert_eq!(u.color[3], 0.0);
        assert_eq!(std::mem::size_of::<DrawUniform>() % 16, 0);
    }

    #[test]
    fn oversized_texture_degrades_to_flat_color() {
        let big = TextureData::new_rgba8(4, 2, vec![0; 4 * 2 * 4]);
        let red = [1.0, 0.0, 0.0];

        match resolve_appearance(ObjectId::PiggyBank, red, Some(&big), 4) {
            Appearance::Textured(t) => assert_eq!(t.width, 4),
            other => panic!("expected texture, got {other:?}"),
        }
        match resolve_appearance(ObjectId::PiggyBank, red, Some(&big), 2) {
            Appearance::Flat(c) => assert_eq!(c, red),
            other => panic!("expected flat color, got {other:?}"),
        }
        assert!(matches!(
            resolve_appearance(ObjectId::Cube, red, None, 8192),
            Appearance::Flat(_)
        ));
    }

    #[test]
    fn vertex_layout_matches_mesh_vertex() {
        assert_eq!(
            VERTEX_LAYOUT.array_stride as usize,
            std::mem::size_of::<MeshVertex>()
        );
    }
}
