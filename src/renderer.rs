// renderer.rs - draws a SphereMesh textured with an external video frame
//
// Lifecycle is Uninitialized -> Ready -> Destroyed. All GPU work happens on the
// thread that called `initialize`.

use crate::error::RenderError;
use crate::gpu::{checked, compile_shader};
use crate::mesh::{SphereMesh, Vertex, LEFT_EYE_ATTRIBUTES, RIGHT_EYE_ATTRIBUTES};
use std::thread::{self, ThreadId};
use wgpu::util::DeviceExt;

const VERTEX_SHADER: &str = r#"
struct Uniforms {
    mvp: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) tex_coords: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.mvp * vec4<f32>(position, 1.0);
    out.tex_coords = tex_coords;
    return out;
}
"#;

const FRAGMENT_SHADER: &str = r#"
@group(0) @binding(1)
var video_texture: texture_2d<f32>;
@group(0) @binding(2)
var video_sampler: sampler;

@fragment
fn fs_main(@location(0) tex_coords: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(video_texture, video_sampler, tex_coords);
}
"#;

const MVP_SIZE: wgpu::BufferAddress = std::mem::size_of::<[f32; 16]>() as wgpu::BufferAddress;

/// Which eye a draw is for. Monoscopic viewers draw with [`Eye::Monoscopic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eye {
    Left,
    Right,
    #[default]
    Monoscopic,
}

impl Eye {
    /// Byte offset of this eye's texture coordinates inside a [`Vertex`].
    /// Only the right eye reads the second pair.
    pub fn tex_coord_offset(self) -> wgpu::BufferAddress {
        self.slot().attributes[1].offset
    }

    fn slot(self) -> &'static EyeSlot {
        match self {
            Eye::Right => &EYE_SLOTS[1],
            Eye::Left | Eye::Monoscopic => &EYE_SLOTS[0],
        }
    }
}

/// Per-eye GPU resources: pipeline label, vertex attributes and the index of
/// the eye's pipeline, uniform buffer and bind group.
struct EyeSlot {
    index: usize,
    label: &'static str,
    attributes: &'static [wgpu::VertexAttribute; 2],
}

static EYE_SLOTS: [EyeSlot; 2] = [
    EyeSlot {
        index: 0,
        label: "sphere_pipeline_left",
        attributes: &LEFT_EYE_ATTRIBUTES,
    },
    EyeSlot {
        index: 1,
        label: "sphere_pipeline_right",
        attributes: &RIGHT_EYE_ATTRIBUTES,
    },
];

/// Sub-rectangle of the render target, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    Destroyed,
}

impl Lifecycle {
    fn name(self) -> &'static str {
        match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Ready => "ready",
            Lifecycle::Destroyed => "destroyed",
        }
    }
}

struct EyeBinding {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct GpuBinding {
    eyes: [EyeBinding; 2],
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    owner: ThreadId,
}

enum State {
    Uninitialized,
    Ready(Box<GpuBinding>),
    Destroyed,
}

impl State {
    fn lifecycle(&self) -> Lifecycle {
        match self {
            State::Uninitialized => Lifecycle::Uninitialized,
            State::Ready(_) => Lifecycle::Ready,
            State::Destroyed => Lifecycle::Destroyed,
        }
    }
}

/// Owns the pipelines and buffers needed to draw one [`SphereMesh`].
///
/// The external texture is only referenced; its owner must keep it alive
/// until [`MeshRenderer::shutdown`] has run.
pub struct MeshRenderer {
    state: State,
}

impl Default for MeshRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshRenderer {
    pub fn new() -> Self {
        Self {
            state: State::Uninitialized,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state.lifecycle()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == Lifecycle::Ready
    }

    /// Compiles the shaders and uploads `mesh`. Valid only once, from Uninitialized.
    ///
    /// Any failure is fatal for this instance, which moves to Destroyed.
    pub fn initialize(
        &mut self,
        device: &wgpu::Device,
        mesh: &SphereMesh,
        texture: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
    ) -> Result<(), RenderError> {
        if !matches!(self.state, State::Uninitialized) {
            return Err(self.invalid_state("initialize"));
        }

        match GpuBinding::new(device, mesh, texture, target_format) {
            Ok(binding) => {
                log::info!(
                    "sphere renderer ready: {} vertices, {:?}",
                    binding.vertex_count,
                    mesh.format()
                );
                self.state = State::Ready(Box::new(binding));
                Ok(())
            }
            Err(err) => {
                log::error!("sphere renderer initialization failed: {err}");
                self.state = State::Destroyed;
                Err(err)
            }
        }
    }

    /// Records one triangle-strip draw of the whole sphere for `eye` into `target`.
    ///
    /// `mvp` is column-major. The target is loaded, not cleared, so both eyes can
    /// share it through different viewports. The MVP upload is recorded into
    /// `encoder` ahead of the pass, so each draw sees its own matrix even when
    /// several draws share an eye within one submission.
    pub fn draw(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        viewport: Option<Viewport>,
        mvp: &[f32; 16],
        eye: Eye,
    ) -> Result<(), RenderError> {
        let binding = self.ready("draw")?;
        let slot = &binding.eyes[eye.slot().index];

        let staging = checked(device, "Device::create_buffer_init", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sphere_mvp_staging"),
                contents: bytemuck::bytes_of(mvp),
                usage: wgpu::BufferUsages::COPY_SRC,
            })
        })?;
        checked(device, "CommandEncoder::copy_buffer_to_buffer", || {
            encoder.copy_buffer_to_buffer(&staging, 0, &slot.uniform_buffer, 0, MVP_SIZE)
        })?;

        checked(device, "RenderPass::draw", || {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sphere pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            if let Some(vp) = viewport {
                pass.set_viewport(vp.x, vp.y, vp.width, vp.height, 0.0, 1.0);
            }
            pass.set_pipeline(&slot.pipeline);
            pass.set_bind_group(0, &slot.bind_group, &[]);
            pass.set_vertex_buffer(0, binding.vertex_buffer.slice(..));
            pass.draw(0..binding.vertex_count, 0..1);
        })
    }

    /// Releases GPU resources if initialize succeeded. Further calls are no-ops.
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        match &self.state {
            State::Ready(binding) if binding.owner != thread::current().id() => {
                return Err(RenderError::WrongThread { op: "shutdown" });
            }
            State::Ready(_) => {}
            State::Uninitialized | State::Destroyed => {
                log::debug!("shutdown: nothing to release ({})", self.state().name());
                return Ok(());
            }
        }

        if let State::Ready(binding) = std::mem::replace(&mut self.state, State::Destroyed) {
            binding.release();
            log::info!("sphere renderer released");
        }
        Ok(())
    }

    /// Playback suspension belongs to the media collaborator; nothing to do here.
    pub fn on_resume(&self) {
        log::debug!("renderer resume ({})", self.state().name());
    }

    pub fn on_pause(&self) {
        log::debug!("renderer pause ({})", self.state().name());
    }

    fn ready(&self, op: &'static str) -> Result<&GpuBinding, RenderError> {
        match &self.state {
            State::Ready(binding) if binding.owner != thread::current().id() => {
                Err(RenderError::WrongThread { op })
            }
            State::Ready(binding) => Ok(binding),
            State::Uninitialized | State::Destroyed => Err(self.invalid_state(op)),
        }
    }

    fn invalid_state(&self, op: &'static str) -> RenderError {
        RenderError::InvalidState {
            op,
            state: self.state().name(),
        }
    }
}

impl Drop for MeshRenderer {
    fn drop(&mut self) {
        if self.is_ready() {
            log::warn!("sphere renderer dropped without shutdown");
        }
    }
}

impl GpuBinding {
    fn new(
        device: &wgpu::Device,
        mesh: &SphereMesh,
        texture: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let vertex_module = compile_shader(device, "vertex", VERTEX_SHADER)?;
        let fragment_module = compile_shader(device, "fragment", FRAGMENT_SHADER)?;

        let bind_group_layout = checked(device, "Device::create_bind_group_layout", || {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("sphere_bind_group_layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(MVP_SIZE),
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            })
        })?;

        let pipeline_layout = checked(device, "Device::create_pipeline_layout", || {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sphere_pipeline_layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            })
        })?;

        // Stereo halves sit side by side in one texture; repeating would bleed across the split.
        let sampler = checked(device, "Device::create_sampler", || {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("video_sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        })?;

        let vertex_buffer = checked(device, "Device::create_buffer_init", || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sphere_vertices"),
                contents: mesh.as_bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            })
        })?;

        let eye_binding = |eye: &EyeSlot| -> Result<EyeBinding, RenderError> {
            let pipeline = link_pipeline(
                device,
                &pipeline_layout,
                &vertex_module,
                &fragment_module,
                target_format,
                eye,
            )?;

            let uniform_buffer = checked(device, "Device::create_buffer", || {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("sphere_mvp"),
                    size: MVP_SIZE,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })?;

            let bind_group = checked(device, "Device::create_bind_group", || {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("sphere_bind_group"),
                    layout: &bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform_buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(texture),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&sampler),
                        },
                    ],
                })
            })?;

            Ok(EyeBinding {
                pipeline,
                uniform_buffer,
                bind_group,
            })
        };

        let [left, right] = &EYE_SLOTS;
        let eyes = [eye_binding(left)?, eye_binding(right)?];

        Ok(Self {
            eyes,
            vertex_buffer,
            vertex_count: mesh.vertex_count(),
            owner: thread::current().id(),
        })
    }

    fn release(self) {
        self.vertex_buffer.destroy();
        for eye in &self.eyes {
            eye.uniform_buffer.destroy();
        }
    }
}

/// Builds the pipeline that feeds `eye`'s texture coordinates to the fragment stage.
/// Pipeline validation failures are reported as link errors.
fn link_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    target_format: wgpu::TextureFormat,
    eye: &EyeSlot,
) -> Result<wgpu::RenderPipeline, RenderError> {
    let (pipeline, err) = crate::gpu::capture(device, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(eye.label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: vertex_module,
                entry_point: "vs_main",
                buffers: &[Vertex::layout(eye.attributes)],
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment_module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Seen from inside, and degenerate stitches flip winding anyway.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    });

    match err {
        None => Ok(pipeline),
        Some(err) => Err(RenderError::ShaderCompile {
            stage: "link",
            log: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_uv_sphere, MediaFormat};

    fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("renderer unit tests"),
                features: wgpu::Features::empty(),
                limits: adapter.limits(),
            },
            None,
        ))
        .ok()
    }

    #[test]
    fn eye_offsets() {
        assert_eq!(Eye::Left.tex_coord_offset(), 12);
        assert_eq!(Eye::Monoscopic.tex_coord_offset(), 12);
        assert_eq!(Eye::Right.tex_coord_offset(), 20);
        assert_eq!(Eye::Left.slot().index, Eye::Monoscopic.slot().index);
        assert_ne!(Eye::Left.slot().index, Eye::Right.slot().index);
        for (i, slot) in EYE_SLOTS.iter().enumerate() {
            assert_eq!(slot.index, i);
        }
        assert_eq!(Eye::default(), Eye::Monoscopic);
    }

    #[test]
    fn draw_requires_initialize() {
        let renderer = MeshRenderer::new();
        assert_eq!(renderer.state(), Lifecycle::Uninitialized);
        assert_eq!(
            renderer.ready("draw").err(),
            Some(RenderError::InvalidState {
                op: "draw",
                state: "uninitialized"
            })
        );
    }

    #[test]
    fn shutdown_before_initialize_is_noop() {
        let mut renderer = MeshRenderer::new();
        assert!(renderer.shutdown().is_ok());
        assert!(renderer.shutdown().is_ok());
        assert_eq!(renderer.state(), Lifecycle::Uninitialized);
    }

    #[test]
    fn viewport_aspect() {
        assert_eq!(Viewport::new(0.0, 0.0, 200.0, 100.0).aspect(), 2.0);
        assert_eq!(Viewport::new(0.0, 0.0, 200.0, 0.0).aspect(), 1.0);
    }

    #[test]
    fn broken_shader_reports_compiler_log() {
        let Some((device, _queue)) = test_device() else {
            eprintln!("no adapter available, skipping");
            return;
        };
        let err = compile_shader(&device, "vertex", "fn vs_main( {").unwrap_err();
        match err {
            RenderError::ShaderCompile { stage, log } => {
                assert_eq!(stage, "vertex");
                assert!(!log.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bundled_shaders_compile() {
        let Some((device, _queue)) = test_device() else {
            eprintln!("no adapter available, skipping");
            return;
        };
        assert!(compile_shader(&device, "vertex", VERTEX_SHADER).is_ok());
        assert!(compile_shader(&device, "fragment", FRAGMENT_SHADER).is_ok());
    }

    #[test]
    fn failed_initialize_is_terminal() {
        let Some((device, _queue)) = test_device() else {
            eprintln!("no adapter available, skipping");
            return;
        };
        let mesh = build_uv_sphere(1.0, 4, 4, 180.0, 360.0, MediaFormat::Monoscopic).unwrap();
        // Depth textures cannot be sampled as filterable float, so bind group creation fails.
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("not a color texture"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let mut renderer = MeshRenderer::new();
        let err = renderer
            .initialize(&device, &mesh, &view, wgpu::TextureFormat::Rgba8UnormSrgb)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::GraphicsState {
                call: "Device::create_bind_group",
                ..
            }
        ));
        assert_eq!(renderer.state(), Lifecycle::Destroyed);
        assert!(renderer.shutdown().is_ok());
    }
}
