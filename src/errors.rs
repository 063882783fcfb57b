//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! [`RenderError`] separates the failure classes the frame orchestrator can
//! produce:
//! - Fatal capability errors raised while bringing the renderer up
//! - Rejected runtime requests (the previous state is kept)
//! - Configuration loading errors
//!
//! Numeric edge cases (zero-length sweeps, degenerate triangles) are not
//! errors and never surface here.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hybrid::errors::{RenderError, Result};
//!
//! fn bring_up() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // Fatal start-up errors
    // ========================================================================
    /// A capability the renderer cannot run without is not supported by the
    /// device. Not recoverable.
    #[error("Required device capability missing: {missing}")]
    MissingCapability {
        /// Debug rendering of the missing capability flags
        missing: String,
    },

    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    // ========================================================================
    // Rejected requests
    // ========================================================================
    /// A runtime request was refused; the previous state is unchanged.
    #[error("Request rejected ({request}): {reason}")]
    Rejected {
        /// What was asked for
        request: String,
        /// Why it cannot be honoured
        reason: String,
    },

    // ========================================================================
    // Configuration
    // ========================================================================
    /// File I/O error while reading settings.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Settings JSON could not be parsed.
    #[error("Settings parse error: {0}")]
    ConfigError(#[from] serde_json::Error),
}

impl RenderError {
    pub(crate) fn rejected(request: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            request: request.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors after which the process cannot continue.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCapability { .. } | Self::AdapterRequestFailed(_) | Self::DeviceCreateFailed(_)
        )
    }
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
