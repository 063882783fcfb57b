//! Post-processing stack
//!
//! Runs at presentation resolution after either render mode:
//!
//! ```text
//!  HDR frame ──┬──────────────────────────► Tone Map ──► RGBA8 (presented)
//!              └──► Bloom chain (optional) ───┘
//! ```
//!
//! The bloom chain is allocated the first time bloom is enabled and kept when
//! it is switched off again.

use glam::UVec2;

use crate::renderer::core::device::{RenderDevice, TextureId};
use crate::renderer::passes::bloom::BloomPass;
use crate::renderer::passes::tone_mapping::ToneMapPass;
use crate::renderer::settings::PostSettings;

pub struct PostStack {
    settings: PostSettings,
    size: UVec2,
    bloom: Option<BloomPass>,
    tone_map: ToneMapPass,
}

impl PostStack {
    pub fn new(device: &mut dyn RenderDevice, size: UVec2, settings: &PostSettings) -> Self {
        let mut stack = Self {
            settings: settings.clone(),
            size,
            bloom: None,
            tone_map: ToneMapPass::new(device, size, &settings.tone_mapping),
        };
        stack.apply(device);
        stack
    }

    /// Stages new parameters for [`apply`](Self::apply).
    pub fn set_settings(&mut self, settings: &PostSettings) {
        if let Some(bloom) = &mut self.bloom {
            bloom.set_settings(&settings.bloom);
        }
        self.tone_map.set_settings(&settings.tone_mapping);
        self.settings = settings.clone();
    }

    pub fn apply(&mut self, device: &mut dyn RenderDevice) {
        if self.settings.bloom.enabled && self.bloom.is_none() {
            self.bloom = Some(BloomPass::new(device, self.size, &self.settings.bloom));
            log::debug!("Bloom chain allocated at {}x{}", self.size.x, self.size.y);
        }
        if let Some(bloom) = &mut self.bloom {
            bloom.apply(device);
        }
        self.tone_map.apply(device);
    }

    pub fn resize(&mut self, device: &mut dyn RenderDevice, size: UVec2) -> bool {
        if size == self.size {
            return false;
        }
        if let Some(bloom) = &mut self.bloom {
            bloom.resize(device, size);
        }
        self.tone_map.resize(device, size);
        self.size = size;
        true
    }

    /// Post-processes `input` and returns the image to present.
    pub fn run(&mut self, device: &mut dyn RenderDevice, input: TextureId) -> TextureId {
        let bloom = match &self.bloom {
            Some(bloom) if self.settings.bloom.enabled => {
                bloom.compute(device, input);
                Some(bloom.result())
            }
            _ => None,
        };
        self.tone_map.compute(device, input, bloom);
        self.tone_map.output()
    }

    #[inline]
    #[must_use]
    pub fn output(&self) -> TextureId {
        self.tone_map.output()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[must_use]
    pub fn bloom(&self) -> Option<&BloomPass> {
        self.bloom.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &PostSettings {
        &self.settings
    }

    pub fn release(mut self, device: &mut dyn RenderDevice) {
        if let Some(bloom) = self.bloom.take() {
            bloom.release(device);
        }
        self.tone_map.release(device);
    }
}
