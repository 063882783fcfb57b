//! wgpu Context
//!
//! The [`WgpuContext`] holds the core GPU handles: instance, adapter, device
//! and queue. The orchestrator renders off-screen and hands its final image to
//! the device's presentation hook, so no window surface is owned here.

use crate::errors::{RenderError, Result};
use crate::renderer::core::device::Capabilities;

/// Adapter and device selection options.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    /// GPU adapter selection preference.
    pub power_preference: wgpu::PowerPreference,
    /// Required wgpu limits (max buffer sizes, binding counts, etc.).
    pub required_limits: wgpu::Limits,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_limits: wgpu::Limits::default(),
        }
    }
}

/// Core wgpu context holding GPU handles.
pub struct WgpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Renderer capabilities derived from the adapter features.
    pub capabilities: Capabilities,
}

impl WgpuContext {
    /// wgpu features backing [`Capabilities::BINDLESS_TEXTURES`].
    #[must_use]
    pub fn bindless_features() -> wgpu::Features {
        wgpu::Features::TEXTURE_BINDING_ARRAY
            | wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING
    }

    /// wgpu features backing [`Capabilities::MULTI_DRAW_INDIRECT`].
    #[must_use]
    pub fn indirect_features() -> wgpu::Features {
        wgpu::Features::INDIRECT_FIRST_INSTANCE
    }

    pub async fn new(settings: &DeviceSettings) -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::AdapterRequestFailed(e.to_string()))?;

        let adapter_features = adapter.features();
        let capabilities = Self::capabilities_from_features(adapter_features);

        let missing = capabilities.missing_required();
        if !missing.is_empty() {
            return Err(RenderError::MissingCapability {
                missing: format!("{missing:?}"),
            });
        }

        let required_features =
            adapter_features & (Self::bindless_features() | Self::indirect_features());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Hybrid Renderer Device"),
                required_features,
                required_limits: settings.required_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let info = adapter.get_info();
        log::info!(
            "Using adapter '{}' ({:?}), capabilities {:?}",
            info.name,
            info.backend,
            capabilities
        );

        Ok(Self {
            adapter,
            device,
            queue,
            capabilities,
        })
    }

    /// Maps adapter features onto renderer capabilities.
    ///
    /// Storage images are core in wgpu. Image-based VRS and the upscaler are
    /// never derived from features: the former has no wgpu equivalent, the
    /// latter is granted by registering an upscale program.
    #[must_use]
    pub fn capabilities_from_features(features: wgpu::Features) -> Capabilities {
        let mut caps = Capabilities::STORAGE_IMAGES;
        if features.contains(Self::bindless_features()) {
            caps |= Capabilities::BINDLESS_TEXTURES;
        }
        if features.contains(Self::indirect_features()) {
            caps |= Capabilities::MULTI_DRAW_INDIRECT;
        }
        caps
    }
}
