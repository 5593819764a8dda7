// main.rs - demo viewer: shows a panoramic frame on the sphere, mono or per-eye

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod window;

use video360::camera::PanoramaCamera;
use video360::config::ViewerConfig;
use video360::mesh::MediaFormat;
use video360::source::MediaSource;
use window::{FrameError, Viewer};

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, WindowBuilder},
};

use image::io::Reader as ImageReader;
use image::GenericImageView;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// UI-side state that isn't owned by the camera or the GPU.
struct UiState {
    format: MediaFormat,
    stereo_preview: bool,
    show_fps: bool,
    vsync: bool,
    is_fullscreen: bool,
    is_loading: bool,
    fps: f32,
    last_error: Option<String>,
}

/// Requests the UI makes of the event loop for the next frame.
#[derive(Default)]
struct UiActions {
    open: Option<PathBuf>,
    format: Option<MediaFormat>,
    vsync: Option<bool>,
    sensitivity: Option<f32>,
    reset_camera: bool,
    toggle_fullscreen: bool,
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = ViewerConfig::load(&args)?;
    video360::logging::init_logging(config.log_filter.as_deref());

    // Geometry needs no GPU; build it before the window exists.
    let mesh = config.sphere.build()?;
    log::info!(
        "sphere: {} vertices, {:?}",
        mesh.vertex_count(),
        mesh.format()
    );

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("video360")
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)?,
    );

    let mut viewer = pollster::block_on(Viewer::new(window.clone(), mesh, config.vsync))?;
    let mut camera = PanoramaCamera::new();
    let mut ui = UiState {
        format: config.sphere.format,
        stereo_preview: config.stereo_preview,
        show_fps: false,
        vsync: config.vsync,
        is_fullscreen: false,
        is_loading: false,
        fps: 0.0,
        last_error: None,
    };
    let sphere_config = config.sphere.clone();

    let mut mouse_pressed = false;
    let mut last_mouse_pos: Option<PhysicalPosition<f64>> = None;

    let mut last_frame_time = Instant::now();
    let mut frame_count = 0;

    // Frames arrive from the loader thread, standing in for a decoder.
    let (tx, rx): (Sender<image::RgbaImage>, Receiver<image::RgbaImage>) = channel();

    if let Some(source) = &config.source {
        match resolve_source(source) {
            Ok(path) => {
                ui.is_loading = true;
                start_load_image(path, tx.clone());
            }
            Err(err) => {
                log::error!("{err}");
                ui.last_error = Some(err);
            }
        }
    }

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        if let Ok(rgba) = rx.try_recv() {
            ui.is_loading = false;
            match viewer.load_frame(rgba) {
                Ok(()) => ui.last_error = None,
                Err(err) => {
                    log::error!("failed to show frame: {err}");
                    ui.last_error = Some(err.to_string());
                }
            }
        }

        match event {
            Event::WindowEvent { event, .. } => {
                let response = viewer.egui_state.on_event(&viewer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        viewer.shutdown();
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        viewer.resize(new_size);
                    }

                    WindowEvent::Focused(focused) => {
                        if focused {
                            viewer.on_resume();
                        } else {
                            viewer.on_pause();
                        }
                    }

                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            match input.virtual_keycode {
                                Some(VirtualKeyCode::O) => {
                                    if let Some(path) = pick_image() {
                                        ui.is_loading = true;
                                        start_load_image(path, tx.clone());
                                    }
                                }
                                Some(VirtualKeyCode::F11) => {
                                    toggle_fullscreen(&window, &mut ui);
                                }
                                Some(VirtualKeyCode::S) => {
                                    ui.stereo_preview = !ui.stereo_preview;
                                }
                                _ => {}
                            }
                        }
                    }

                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left {
                            mouse_pressed = state == ElementState::Pressed;
                            if !mouse_pressed {
                                last_mouse_pos = None;
                            }
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        if mouse_pressed {
                            if let Some(last_pos) = last_mouse_pos {
                                let dx = (position.x - last_pos.x) as f32;
                                let dy = (position.y - last_pos.y) as f32;
                                let mut width = viewer.size.width as f32;
                                if ui.stereo_preview {
                                    width /= 2.0;
                                }
                                camera.drag(dx, dy, width, viewer.size.height as f32);
                            }
                            last_mouse_pos = Some(position);
                        }
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let scroll = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
                        };
                        camera.zoom(scroll);
                    }

                    WindowEvent::DroppedFile(path) => {
                        ui.is_loading = true;
                        start_load_image(path, tx.clone());
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                frame_count += 1;
                let now = Instant::now();
                let elapsed = now.duration_since(last_frame_time).as_secs_f32();
                if elapsed >= 1.0 {
                    ui.fps = frame_count as f32 / elapsed;
                    frame_count = 0;
                    last_frame_time = now;
                }

                let mut actions = UiActions::default();
                let stereo_preview = ui.stereo_preview;
                let render_result = viewer.render_with_ui(&window, &camera, stereo_preview, |ctx| {
                    draw_ui(ctx, &camera, &mut ui, &mut actions);
                });

                if let Some(path) = actions.open.take() {
                    ui.is_loading = true;
                    start_load_image(path, tx.clone());
                }
                if let Some(format) = actions.format.take() {
                    let mut sphere = sphere_config.clone();
                    sphere.format = format;
                    let rebuilt = sphere
                        .build()
                        .map_err(|e| e.to_string())
                        .and_then(|mesh| viewer.set_mesh(mesh).map_err(|e| e.to_string()));
                    if let Err(err) = rebuilt {
                        log::error!("failed to switch format: {err}");
                        ui.last_error = Some(err);
                    }
                }
                if let Some(vsync) = actions.vsync.take() {
                    viewer.set_vsync(vsync);
                }
                if actions.toggle_fullscreen {
                    toggle_fullscreen(&window, &mut ui);
                }
                if actions.reset_camera {
                    camera.reset();
                }
                if let Some(scale) = actions.sensitivity {
                    camera.sensitivity_scale = scale;
                }

                match render_result {
                    Ok(()) => {}
                    Err(FrameError::Surface(wgpu::SurfaceError::Lost)) => {
                        viewer.resize(viewer.size)
                    }
                    Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                        viewer.shutdown();
                        *control_flow = ControlFlow::Exit;
                    }
                    Err(FrameError::Surface(e)) => log::warn!("surface error: {e:?}"),
                    Err(FrameError::Render(e)) => {
                        // Device state is unrecoverable; stop rather than draw garbage.
                        log::error!("render error: {e}");
                        viewer.shutdown();
                        *control_flow = ControlFlow::Exit;
                    }
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            _ => {}
        }
    });
}

fn resolve_source(source: &str) -> Result<PathBuf, String> {
    let source = MediaSource::parse(source).map_err(|e| e.to_string())?;
    match source.local_path() {
        Ok(Some(path)) => Ok(path),
        Ok(None) => Err(format!("{source:?}: network sources are not supported by the demo")),
        Err(err) => Err(err.to_string()),
    }
}

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}

fn toggle_fullscreen(window: &winit::window::Window, ui: &mut UiState) {
    ui.is_fullscreen = !ui.is_fullscreen;
    if ui.is_fullscreen {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    } else {
        window.set_fullscreen(None);
    }
}

fn start_load_image(path: PathBuf, tx: Sender<image::RgbaImage>) {
    thread::spawn(move || {
        log::info!("loading {path:?} in background");

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                log::error!("failed to open {path:?}: {e}");
                return;
            }
        };
        let reader = BufReader::new(file);

        let img_result = ImageReader::new(reader)
            .with_guessed_format()
            .map_err(image::ImageError::IoError)
            .and_then(|mut r| {
                r.no_limits();
                r.decode()
            });

        match img_result {
            Ok(img) => {
                let (w, h) = img.dimensions();
                log::info!("decoded {w}x{h} frame");
                if tx.send(img.to_rgba8()).is_err() {
                    log::error!("render thread is gone, dropping frame");
                }
            }
            Err(e) => log::error!("failed to decode {path:?}: {e}"),
        }
    });
}

fn draw_ui(
    ctx: &egui::Context,
    camera: &PanoramaCamera,
    ui_state: &mut UiState,
    actions: &mut UiActions,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open image...").clicked() {
                    ui.close_menu();
                    actions.open = pick_image();
                }
                if ui.button("Exit").clicked() {
                    std::process::exit(0);
                }
            });

            ui.menu_button("View", |ui| {
                if ui.button("Reset view").clicked() {
                    actions.reset_camera = true;
                    ui.close_menu();
                }

                let fullscreen_label = if ui_state.is_fullscreen {
                    "Exit fullscreen"
                } else {
                    "Fullscreen"
                };
                if ui.button(fullscreen_label).clicked() {
                    actions.toggle_fullscreen = true;
                    ui.close_menu();
                }

                ui.separator();
                if ui
                    .checkbox(&mut ui_state.stereo_preview, "Stereo preview (per eye)")
                    .clicked()
                {
                    ui.close_menu();
                }

                ui.separator();
                ui.menu_button("Input sensitivity", |ui| {
                    let mut scale = camera.sensitivity_scale;
                    if ui
                        .add(egui::Slider::new(&mut scale, 0.1..=5.0).text("x"))
                        .changed()
                    {
                        actions.sensitivity = Some(scale);
                    }
                    if ui.button("Reset to 1.0").clicked() {
                        actions.sensitivity = Some(1.0);
                    }
                });

                ui.separator();
                if ui.checkbox(&mut ui_state.show_fps, "Show FPS").clicked() {
                    ui.close_menu();
                }
                if ui.checkbox(&mut ui_state.vsync, "VSync").clicked() {
                    actions.vsync = Some(ui_state.vsync);
                }
            });

            ui.menu_button("Format", |ui| {
                let formats = [
                    (MediaFormat::Monoscopic, "Monoscopic"),
                    (MediaFormat::StereoLeftRight, "Stereo left/right"),
                    (MediaFormat::StereoTopBottom, "Stereo top/bottom"),
                ];
                for (format, label) in formats {
                    if ui.radio_value(&mut ui_state.format, format, label).clicked() {
                        actions.format = Some(format);
                        ui.close_menu();
                    }
                }
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui_state.is_loading {
                ui.label(egui::RichText::new("Loading...").color(egui::Color32::YELLOW));
                ui.label("|");
            }
            if let Some(err) = &ui_state.last_error {
                ui.label(egui::RichText::new(err).color(egui::Color32::RED));
                ui.label("|");
            }

            ui.label(format!("Format: {:?}", ui_state.format));
            ui.label("|");
            ui.label(if ui_state.stereo_preview {
                "Eyes: left | right"
            } else {
                "Eyes: mono"
            });
            ui.label("|");
            ui.label(format!("FOV: {:.1}°", camera.fov));
            ui.label("|");
            ui.label(format!("Yaw: {:.1}°", camera.yaw));
            ui.label("|");
            ui.label(format!("Pitch: {:.1}°", camera.pitch));

            if ui_state.show_fps {
                ui.label("|");
                ui.label(
                    egui::RichText::new(format!("FPS: {:.1}", ui_state.fps))
                        .color(egui::Color32::GREEN),
                );
            }
        });
    });
}
