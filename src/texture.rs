// texture.rs - GPU texture that decoded frames are written into
//
// Owned by whoever produces frames; the sphere renderer only samples its view.

use crate::error::RenderError;
use crate::gpu::checked;
use image::RgbaImage;

pub struct VideoTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

impl VideoTexture {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        label: &str,
    ) -> Result<Self, RenderError> {
        let texture = checked(device, "Device::create_texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                size: extent(width, height),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                label: Some(label),
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            size: (width, height),
        })
    }

    /// Creates a texture sized for `frame` and uploads it.
    ///
    /// Frames larger than the device allows are scaled down to fit first.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &RgbaImage,
    ) -> Result<Self, RenderError> {
        let max = device.limits().max_texture_dimension_2d;
        let scaled;
        let frame = match fit_to_limit(frame.dimensions(), max) {
            Some((w, h)) => {
                log::warn!(
                    "frame {}x{} exceeds max texture size {max}, scaling to {w}x{h}",
                    frame.width(),
                    frame.height()
                );
                scaled =
                    image::imageops::resize(frame, w, h, image::imageops::FilterType::Lanczos3);
                &scaled
            }
            None => frame,
        };

        let (width, height) = frame.dimensions();
        let texture = Self::new(device, width, height, "video_frame")?;
        texture.write_frame(device, queue, frame)?;
        Ok(texture)
    }

    /// Uploads a frame with the same dimensions as the texture.
    pub fn write_frame(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &RgbaImage,
    ) -> Result<(), RenderError> {
        if frame.dimensions() != self.size {
            return Err(RenderError::FrameSize {
                expected: self.size,
                actual: frame.dimensions(),
            });
        }

        let (width, height) = self.size;
        checked(device, "Queue::write_texture", || {
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                frame.as_raw(),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                extent(width, height),
            )
        })
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Target size keeping aspect ratio when either side exceeds `max`, else `None`.
fn fit_to_limit((width, height): (u32, u32), max: u32) -> Option<(u32, u32)> {
    if width <= max && height <= max {
        return None;
    }
    let scale = max as f32 / width.max(height) as f32;
    let w = ((width as f32 * scale).round() as u32).clamp(1, max);
    let h = ((height as f32 * scale).round() as u32).clamp(1, max);
    Some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_within_limit_are_untouched() {
        assert_eq!(fit_to_limit((4096, 2048), 8192), None);
        assert_eq!(fit_to_limit((8192, 8192), 8192), None);
    }

    #[test]
    fn oversized_frames_keep_aspect() {
        assert_eq!(fit_to_limit((16384, 8192), 8192), Some((8192, 4096)));
        assert_eq!(fit_to_limit((3000, 9000), 3000), Some((1000, 3000)));
    }

    #[test]
    fn extreme_aspect_never_collapses_to_zero() {
        let (w, h) = fit_to_limit((100_000, 1), 2048).unwrap();
        assert_eq!(w, 2048);
        assert_eq!(h, 1);
    }
}
