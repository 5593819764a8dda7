// logging.rs - env_logger setup for the viewer

use once_cell::sync::OnceCell;

static INIT: OnceCell<()> = OnceCell::new();

/// Initializes the global logger once; later calls are ignored.
///
/// `filter` uses env_logger syntax. Without one, `RUST_LOG` applies, then `info`.
pub fn init_logging(filter: Option<&str>) {
    INIT.get_or_init(|| {
        let mut builder = env_logger::Builder::new();

        match filter {
            Some(filter) => {
                builder.parse_filters(filter);
            }
            None => match std::env::var("RUST_LOG") {
                Ok(filter) => {
                    builder.parse_filters(&filter);
                }
                Err(_) => {
                    builder
                        .filter_level(log::LevelFilter::Info)
                        // wgpu is chatty at info.
                        .filter_module("wgpu_core", log::LevelFilter::Warn)
                        .filter_module("wgpu_hal", log::LevelFilter::Warn);
                }
            },
        }

        if builder.try_init().is_err() {
            log::debug!("logger already installed elsewhere");
        }
        log::debug!("logging initialized");
    });
}
