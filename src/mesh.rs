// mesh.rs - UV sphere generator for mono and stereo panoramic media
//
// One triangle strip per latitude band, bands joined by degenerate vertices so
// the whole sphere is a single strip draw.

use crate::error::MeshError;
use serde::Deserialize;
use std::f32::consts::PI;

/// Position followed by left-eye and right-eye texture coordinates.
///
/// Layout is `[x, y, z, u_left, v_left, u_right, v_right]`, tightly packed.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv_left: [f32; 2],
    pub uv_right: [f32; 2],
}

pub const FLOATS_PER_VERTEX: usize = 7;
pub const VERTEX_STRIDE: wgpu::BufferAddress =
    std::mem::size_of::<Vertex>() as wgpu::BufferAddress;
pub const LEFT_UV_OFFSET: wgpu::BufferAddress =
    std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress;
pub const RIGHT_UV_OFFSET: wgpu::BufferAddress =
    std::mem::size_of::<[f32; 5]>() as wgpu::BufferAddress;

impl Vertex {
    /// Vertex buffer layout reading the position plus one eye's texture coordinates.
    ///
    /// Both attributes come from the same buffer; pass [`LEFT_EYE_ATTRIBUTES`] or
    /// [`RIGHT_EYE_ATTRIBUTES`] to pick which coordinate pair lands in `@location(1)`.
    pub fn layout(
        attributes: &'static [wgpu::VertexAttribute],
    ) -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: VERTEX_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }
}

pub const LEFT_EYE_ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x3,
    },
    wgpu::VertexAttribute {
        offset: LEFT_UV_OFFSET,
        shader_location: 1,
        format: wgpu::VertexFormat::Float32x2,
    },
];

pub const RIGHT_EYE_ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x3,
    },
    wgpu::VertexAttribute {
        offset: RIGHT_UV_OFFSET,
        shader_location: 1,
        format: wgpu::VertexFormat::Float32x2,
    },
];

/// How the eyes are packed into one source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    /// One camera frame covers the whole texture.
    #[default]
    Monoscopic,
    /// Left half for the left eye, right half for the right eye.
    StereoLeftRight,
    /// Top half for the left eye, bottom half for the right eye.
    StereoTopBottom,
}

impl MediaFormat {
    /// Parses CLI spellings: `mono`, `lr`, `tb` or the full snake_case names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mono" | "monoscopic" => Some(Self::Monoscopic),
            "lr" | "sbs" | "stereo_left_right" => Some(Self::StereoLeftRight),
            "tb" | "ou" | "stereo_top_bottom" => Some(Self::StereoTopBottom),
            _ => None,
        }
    }

    pub fn is_stereo(self) -> bool {
        self != Self::Monoscopic
    }
}

/// Immutable sphere mesh plus the parameters it was built from.
#[derive(Debug, Clone)]
pub struct SphereMesh {
    vertices: Vec<Vertex>,
    radius: f32,
    latitudes: u32,
    longitudes: u32,
    vertical_fov_degrees: f32,
    horizontal_fov_degrees: f32,
    format: MediaFormat,
}

impl SphereMesh {
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Raw vertex data for buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn latitudes(&self) -> u32 {
        self.latitudes
    }

    pub fn longitudes(&self) -> u32 {
        self.longitudes
    }

    pub fn vertical_fov_degrees(&self) -> f32 {
        self.vertical_fov_degrees
    }

    pub fn horizontal_fov_degrees(&self) -> f32 {
        self.horizontal_fov_degrees
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// Vertices in one latitude band, stitching duplicates included.
    pub fn vertices_per_band(&self) -> usize {
        vertices_per_band(self.longitudes)
    }
}

fn vertices_per_band(longitudes: u32) -> usize {
    2 * (longitudes as usize + 1) + 2
}

fn validate(
    radius: f32,
    latitudes: u32,
    longitudes: u32,
    vertical_fov_degrees: f32,
    horizontal_fov_degrees: f32,
) -> Result<(), MeshError> {
    if !(radius > 0.0 && radius.is_finite()) {
        return Err(MeshError::InvalidGeometry(format!(
            "radius must be > 0, got {radius}"
        )));
    }
    if latitudes < 1 {
        return Err(MeshError::InvalidGeometry("latitudes must be >= 1".into()));
    }
    if longitudes < 1 {
        return Err(MeshError::InvalidGeometry("longitudes must be >= 1".into()));
    }
    // Written so NaN fails too.
    if !(vertical_fov_degrees > 0.0 && vertical_fov_degrees <= 180.0) {
        return Err(MeshError::InvalidGeometry(format!(
            "vertical fov must be in (0, 180], got {vertical_fov_degrees}"
        )));
    }
    if !(horizontal_fov_degrees > 0.0 && horizontal_fov_degrees <= 360.0) {
        return Err(MeshError::InvalidGeometry(format!(
            "horizontal fov must be in (0, 360], got {horizontal_fov_degrees}"
        )));
    }
    Ok(())
}

/// Builds a UV sphere covering the given field of view, centered on -Z.
///
/// The horizontal sweep is centered on θ = π so the texture seam sits behind
/// the default forward direction; the vertical sweep is symmetric about the
/// equator. Pure geometry, safe to call from any thread.
pub fn build_uv_sphere(
    radius: f32,
    latitudes: u32,
    longitudes: u32,
    vertical_fov_degrees: f32,
    horizontal_fov_degrees: f32,
    format: MediaFormat,
) -> Result<SphereMesh, MeshError> {
    validate(
        radius,
        latitudes,
        longitudes,
        vertical_fov_degrees,
        horizontal_fov_degrees,
    )?;

    let vertical_fov = vertical_fov_degrees.to_radians();
    let horizontal_fov = horizontal_fov_degrees.to_radians();
    let quad_height = vertical_fov / latitudes as f32;
    let quad_width = horizontal_fov / longitudes as f32;

    let mut vertices = Vec::with_capacity(vertices_per_band(longitudes) * latitudes as usize);

    for j in 0..latitudes {
        let phi_low = quad_height * j as f32 - vertical_fov / 2.0;
        let phi_high = quad_height * (j + 1) as f32 - vertical_fov / 2.0;

        for i in 0..=longitudes {
            let theta = quad_width * i as f32 + PI - horizontal_fov / 2.0;
            let fu = i as f32 / longitudes as f32;

            for k in 0..2u32 {
                let phi = if k == 0 { phi_low } else { phi_high };
                let fv = (j + k) as f32 / latitudes as f32;

                let position = [
                    -radius * theta.sin() * phi.cos(),
                    radius * phi.sin(),
                    radius * theta.cos() * phi.cos(),
                ];

                let (u_left, u_right) = match format {
                    MediaFormat::StereoLeftRight => (fu / 2.0, fu / 2.0 + 0.5),
                    _ => (fu, fu),
                };

                // Image rows run top-down, so v is flipped against latitude.
                let (v_left, v_right) = match format {
                    MediaFormat::StereoTopBottom => (1.0 - (fv / 2.0 + 0.5), 1.0 - fv / 2.0),
                    _ => (1.0 - fv, 1.0 - fv),
                };

                let vertex = Vertex {
                    position,
                    uv_left: [u_left, v_left],
                    uv_right: [u_right, v_right],
                };
                vertices.push(vertex);

                // Degenerate copy at both ends of the band stitches strips together.
                if (i == 0 && k == 0) || (i == longitudes && k == 1) {
                    vertices.push(vertex);
                }
            }
        }
    }

    log::info!(
        "built uv sphere: r={radius} {latitudes}x{longitudes} \
         fov={vertical_fov_degrees}x{horizontal_fov_degrees} {format:?}, {} vertices",
        vertices.len()
    );

    Ok(SphereMesh {
        vertices,
        radius,
        latitudes,
        longitudes,
        vertical_fov_degrees,
        horizontal_fov_degrees,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn sphere(format: MediaFormat) -> SphereMesh {
        build_uv_sphere(1.0, 12, 16, 180.0, 360.0, format).unwrap()
    }

    #[test]
    fn vertex_is_seven_tightly_packed_floats() {
        assert_eq!(
            std::mem::size_of::<Vertex>(),
            FLOATS_PER_VERTEX * std::mem::size_of::<f32>()
        );
        assert_eq!(VERTEX_STRIDE, 28);
        assert_eq!(LEFT_UV_OFFSET, 12);
        assert_eq!(RIGHT_UV_OFFSET, 20);
    }

    #[test]
    fn vertex_count_matches_band_formula() {
        for &(lat, lon, vfov, hfov) in &[
            (1, 1, 180.0, 360.0),
            (3, 7, 90.0, 120.0),
            (50, 50, 180.0, 360.0),
            (2, 64, 0.5, 0.5),
        ] {
            let mesh = build_uv_sphere(5.0, lat, lon, vfov, hfov, MediaFormat::Monoscopic).unwrap();
            let expected = (2 * (lon as usize + 1) + 2) * lat as usize;
            assert_eq!(mesh.vertices().len(), expected, "lat={lat} lon={lon}");
            assert_eq!(mesh.as_bytes().len(), expected * 28);
        }
    }

    #[test]
    fn monoscopic_eyes_share_coordinates_bitwise() {
        let mesh = sphere(MediaFormat::Monoscopic);
        for v in mesh.vertices() {
            assert_eq!(v.uv_left[0].to_bits(), v.uv_right[0].to_bits());
            assert_eq!(v.uv_left[1].to_bits(), v.uv_right[1].to_bits());
        }
    }

    #[test]
    fn left_right_splits_u_at_half() {
        let mesh = sphere(MediaFormat::StereoLeftRight);
        for v in mesh.vertices() {
            assert!((0.0..=0.5 + EPS).contains(&v.uv_left[0]), "{v:?}");
            assert!((0.5 - EPS..=1.0 + EPS).contains(&v.uv_right[0]), "{v:?}");
            assert_eq!(v.uv_left[1], v.uv_right[1]);
        }
        let last = mesh.vertices().last().unwrap();
        assert_eq!(last.uv_left[0], 0.5);
        assert_eq!(last.uv_right[0], 1.0);
    }

    #[test]
    fn top_bottom_halves_never_overlap() {
        let mesh = sphere(MediaFormat::StereoTopBottom);
        for v in mesh.vertices() {
            assert!((0.0..=0.5 + EPS).contains(&v.uv_left[1]), "{v:?}");
            assert!((0.5 - EPS..=1.0 + EPS).contains(&v.uv_right[1]), "{v:?}");
            assert_eq!(v.uv_left[0], v.uv_right[0]);
        }
    }

    #[test]
    fn full_width_u_for_mono_and_top_bottom() {
        for format in [MediaFormat::Monoscopic, MediaFormat::StereoTopBottom] {
            let mesh = sphere(format);
            let max_u = mesh
                .vertices()
                .iter()
                .map(|v| v.uv_left[0])
                .fold(f32::MIN, f32::max);
            let min_u = mesh
                .vertices()
                .iter()
                .map(|v| v.uv_left[0])
                .fold(f32::MAX, f32::min);
            assert_eq!(min_u, 0.0);
            assert_eq!(max_u, 1.0);
        }
    }

    #[test]
    fn rejects_invalid_parameters() {
        let mono = MediaFormat::Monoscopic;
        assert!(build_uv_sphere(0.0, 24, 24, 180.0, 360.0, mono).is_err());
        assert!(build_uv_sphere(-1.0, 24, 24, 180.0, 360.0, mono).is_err());
        assert!(build_uv_sphere(f32::NAN, 24, 24, 180.0, 360.0, mono).is_err());
        assert!(build_uv_sphere(1.0, 0, 24, 180.0, 360.0, mono).is_err());
        assert!(build_uv_sphere(1.0, 24, 0, 180.0, 360.0, mono).is_err());
        assert!(build_uv_sphere(1.0, 24, 24, 181.0, 360.0, mono).is_err());
        assert!(build_uv_sphere(1.0, 24, 24, 0.0, 360.0, mono).is_err());
        assert!(build_uv_sphere(1.0, 24, 24, 180.0, 360.5, mono).is_err());
        assert!(build_uv_sphere(1.0, 24, 24, 180.0, 0.0, mono).is_err());
        assert!(build_uv_sphere(1.0, 24, 24, f32::NAN, 360.0, mono).is_err());

        match build_uv_sphere(1.0, 24, 24, 181.0, 360.0, mono) {
            Err(MeshError::InvalidGeometry(msg)) => assert!(msg.contains("vertical")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn band_ends_are_degenerate_duplicates() {
        let mesh = build_uv_sphere(2.0, 6, 9, 150.0, 270.0, MediaFormat::StereoLeftRight).unwrap();
        let per_band = mesh.vertices_per_band();
        for band in mesh.vertices().chunks(per_band) {
            assert_eq!(band.len(), per_band);
            assert_eq!(band[1], band[0]);
            assert_eq!(band[per_band - 1], band[per_band - 2]);
            // Interior vertices are distinct from their predecessor.
            assert_ne!(band[2].position, band[1].position);
        }
    }

    #[test]
    fn full_sphere_24x24_lies_on_unit_sphere() {
        let mesh = build_uv_sphere(1.0, 24, 24, 180.0, 360.0, MediaFormat::Monoscopic).unwrap();
        assert_eq!(mesh.vertex_count(), 1248);
        for v in mesh.vertices() {
            assert_eq!(v.uv_left, v.uv_right);
            let [x, y, z] = v.position;
            let len = (x * x + y * y + z * z).sqrt();
            assert!((len - 1.0).abs() < 1e-5, "|p| = {len}");
        }
    }

    #[test]
    fn partial_fov_stays_inside_its_cap() {
        let mesh = build_uv_sphere(10.0, 8, 8, 90.0, 90.0, MediaFormat::Monoscopic).unwrap();
        let max_y = 10.0 * 45f32.to_radians().sin() + 1e-4;
        for v in mesh.vertices() {
            assert!(v.position[1].abs() <= max_y);
            // 90° horizontally around -Z keeps every point in front of the viewer.
            assert!(v.position[2] < 0.0);
        }
    }

    #[test]
    fn image_center_faces_forward() {
        // Middle edge of the middle band of an even grid sits at θ = π, φ = 0.
        let mesh = build_uv_sphere(1.0, 2, 4, 180.0, 360.0, MediaFormat::Monoscopic).unwrap();
        let band = &mesh.vertices()[mesh.vertices_per_band()..];
        // Band 1 starts at the equator: index 0 is low of edge 0, then its duplicate.
        let equator_mid = band[1 + 2 * 2];
        assert!((equator_mid.position[0]).abs() < EPS);
        assert!((equator_mid.position[1]).abs() < EPS);
        assert!((equator_mid.position[2] + 1.0).abs() < EPS);
        assert_eq!(equator_mid.uv_left, [0.5, 0.5]);
    }

    #[test]
    fn parses_format_spellings() {
        assert_eq!(MediaFormat::parse("mono"), Some(MediaFormat::Monoscopic));
        assert_eq!(MediaFormat::parse("LR"), Some(MediaFormat::StereoLeftRight));
        assert_eq!(
            MediaFormat::parse("stereo_top_bottom"),
            Some(MediaFormat::StereoTopBottom)
        );
        assert_eq!(MediaFormat::parse("cubemap"), None);
        assert!(!MediaFormat::Monoscopic.is_stereo());
    }
}
