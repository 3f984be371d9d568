use candle_core::Device;
use tracing::info;

/// Metal when built with the `metal` feature and a GPU is present, CPU otherwise.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!(device = "metal", "embedding device selected");
                return dev;
            }
            Err(e) => tracing::warn!(error = %e, "Metal unavailable, falling back to CPU"),
        }
    }
    info!(device = "cpu", "embedding device selected");
    Device::Cpu
}
