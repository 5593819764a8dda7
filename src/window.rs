// window.rs - surface, sphere renderer and egui overlay for the demo viewer

use image::RgbaImage;
use std::sync::Arc;
use video360::camera::PanoramaCamera;
use video360::{Eye, MeshRenderer, RenderError, SphereMesh, VideoTexture, Viewport};
use winit::window::Window;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

pub struct Viewer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,

    mesh: SphereMesh,
    mesh_renderer: MeshRenderer,
    // Declared after the renderer: it must outlive the renderer's bindings.
    frame: Option<VideoTexture>,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Viewer {
    pub async fn new(window: Arc<Window>, mesh: SphereMesh, vsync: bool) -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .context("failed to create surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default().using_resolution(adapter.limits())
                    },
                    label: None,
                },
                None,
            )
            .await
            .context("failed to open device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: present_mode(vsync),
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let egui_ctx = egui::Context::default();
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            mesh,
            mesh_renderer: MeshRenderer::new(),
            frame: None,
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.config.present_mode = present_mode(vsync);
        self.surface.configure(&self.device, &self.config);
    }

    /// Shows a new decoded frame. Same-sized frames are written in place;
    /// anything else replaces the texture, so the renderer is rebuilt around it.
    pub fn load_frame(&mut self, img: RgbaImage) -> Result<(), RenderError> {
        if let Some(frame) = &self.frame {
            if frame.size() == img.dimensions() && self.mesh_renderer.is_ready() {
                return frame.write_frame(&self.device, &self.queue, &img);
            }
        }

        self.mesh_renderer.shutdown()?;
        let frame = VideoTexture::from_image(&self.device, &self.queue, &img)?;
        log::info!("frame texture {}x{}", frame.size().0, frame.size().1);
        self.frame = Some(frame);
        self.rebuild_renderer()
    }

    /// Swaps in a newly built sphere, e.g. after the media format changed.
    pub fn set_mesh(&mut self, mesh: SphereMesh) -> Result<(), RenderError> {
        self.mesh_renderer.shutdown()?;
        self.mesh = mesh;
        self.rebuild_renderer()
    }

    fn rebuild_renderer(&mut self) -> Result<(), RenderError> {
        self.mesh_renderer = MeshRenderer::new();
        let Some(frame) = &self.frame else {
            return Ok(());
        };
        self.mesh_renderer
            .initialize(&self.device, &self.mesh, frame.view(), self.config.format)
    }

    pub fn on_resume(&self) {
        self.mesh_renderer.on_resume();
    }

    pub fn on_pause(&self) {
        self.mesh_renderer.on_pause();
    }

    pub fn shutdown(&mut self) {
        if let Err(err) = self.mesh_renderer.shutdown() {
            log::error!("renderer shutdown failed: {err}");
        }
    }

    pub fn render_with_ui(
        &mut self,
        window: &Window,
        camera: &PanoramaCamera,
        stereo_preview: bool,
        run_ui: impl FnOnce(&egui::Context),
    ) -> Result<(), FrameError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // 1. Clear
        {
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.1,
                            g: 0.1,
                            b: 0.1,
                            a: 1.0,
                        }),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
        }

        // 2. Sphere, once per eye
        if self.mesh_renderer.is_ready() {
            let width = self.config.width as f32;
            let height = self.config.height as f32;
            let eyes: Vec<(Eye, Viewport)> = if stereo_preview {
                let half = width / 2.0;
                vec![
                    (Eye::Left, Viewport::new(0.0, 0.0, half, height)),
                    (Eye::Right, Viewport::new(half, 0.0, half, height)),
                ]
            } else {
                vec![(Eye::Monoscopic, Viewport::new(0.0, 0.0, width, height))]
            };

            for (eye, viewport) in eyes {
                let mvp = camera.mvp_columns(viewport.aspect());
                self.mesh_renderer.draw(
                    &self.device,
                    &mut encoder,
                    &view,
                    Some(viewport),
                    &mvp,
                    eye,
                )?;
            }
        }

        // 3. UI
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);

        self.egui_state
            .handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::Fifo
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}
