// gpu.rs - error-scope checks around individual wgpu calls

use crate::error::RenderError;

/// Runs `f` inside validation and out-of-memory error scopes and returns
/// whatever error the device reported while it ran.
pub(crate) fn capture<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    // Scopes pop innermost first; both must be popped even if the first reports.
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    (value, validation.or(out_of_memory))
}

/// Like [`capture`], turning a reported error into [`RenderError::GraphicsState`] for `call`.
pub(crate) fn checked<T>(
    device: &wgpu::Device,
    call: &'static str,
    f: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    match capture(device, f) {
        (value, None) => Ok(value),
        (_, Some(err)) => {
            log::error!("{call} failed: {err}");
            Err(RenderError::GraphicsState {
                call,
                message: err.to_string(),
            })
        }
    }
}

/// Compiles one WGSL module. Parse and validation failures become
/// [`RenderError::ShaderCompile`] carrying the compiler log.
pub(crate) fn compile_shader(
    device: &wgpu::Device,
    stage: &'static str,
    source: &str,
) -> Result<wgpu::ShaderModule, RenderError> {
    let (module, err) = capture(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    });
    match err {
        None => Ok(module),
        Some(err) => {
            log::error!("{stage} shader rejected: {err}");
            Err(RenderError::ShaderCompile {
                stage,
                log: err.to_string(),
            })
        }
    }
}
