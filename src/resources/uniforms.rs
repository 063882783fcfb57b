//! GPU-visible data blocks.
//!
//! Every struct here is `#[repr(C)]` + [`bytemuck::Pod`] and laid out without
//! implicit padding, so it can be uploaded with `bytemuck::bytes_of`.

use glam::{Mat4, Vec2, Vec3};

/// Declares a `Pod` GPU data struct with per-field defaults.
///
/// ```rust,ignore
/// define_gpu_data_struct!(
///     struct ExampleData {
///         pub strength: f32 = 1.0,
///         pub(crate) __pad: [u32; 3],
///     }
/// );
/// ```
#[macro_export]
macro_rules! define_gpu_data_struct {
    (
        $(#[$meta:meta])* struct $name:ident {
            $(
                $(#[$fmeta:meta])* $vis:vis $field:ident : $ty:ty $(= $default:expr)?
            ),* $(,)?
        }
    ) => {
        #[repr(C)]
        #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
        $(#[$meta])*
        pub struct $name {
            $( $(#[$fmeta])* $vis $field: $ty, )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field: $crate::define_gpu_data_struct!(@val $ty $(, $default)?), )*
                }
            }
        }

        impl $name {
            /// Raw bytes for a buffer upload.
            #[inline]
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                bytemuck::bytes_of(self)
            }
        }
    };
    (@val $ty:ty, $val:expr) => { $val };
    (@val $ty:ty) => { <$ty as Default>::default() };
}

define_gpu_data_struct!(
    /// Per-frame camera and timing block, bound to every pass.
    ///
    /// `projection` and `inv_projection` carry the temporal jitter used for
    /// rasterization. The `*proj_view` matrices are unjittered: they feed
    /// motion vectors and the accumulation reset check.
    struct GpuBasicData {
        pub prev_proj_view: Mat4 = Mat4::IDENTITY,
        pub proj_view: Mat4 = Mat4::IDENTITY,
        pub inv_proj_view: Mat4 = Mat4::IDENTITY,
        pub prev_view: Mat4 = Mat4::IDENTITY,
        pub view: Mat4 = Mat4::IDENTITY,
        pub inv_view: Mat4 = Mat4::IDENTITY,
        pub projection: Mat4 = Mat4::IDENTITY,
        pub inv_projection: Mat4 = Mat4::IDENTITY,
        pub camera_pos: Vec3,
        pub near_plane: f32,
        pub far_plane: f32,
        pub time: f32,
        pub delta_time: f32,
        pub frame_count: u32,
    }
);

define_gpu_data_struct!(
    /// One entry of the per-frame instance buffer.
    struct GpuMeshInstance {
        pub model: Mat4 = Mat4::IDENTITY,
        pub inverse_model: Mat4 = Mat4::IDENTITY,
        pub previous_model: Mat4 = Mat4::IDENTITY,
    }
);

define_gpu_data_struct!(
    /// Bindless handles of the geometry buffer, read by the lighting resolve.
    struct GpuGBufferData {
        pub albedo_alpha: u64,
        pub normal_specular: u64,
        pub emissive_roughness: u64,
        pub velocity: u64,
        pub depth: u64,
    }
);

define_gpu_data_struct!(
    /// Jitter and temporal-mode block, refreshed every frame.
    struct GpuTemporalData {
        pub jitter: Vec2,
        pub sample_count: u32 = 1,
        pub temporal_mode: u32,
        pub mip_bias: f32,
        pub(crate) __pad: [u32; 3],
    }
);

define_gpu_data_struct!(
    /// Point light as seen by the lighting resolve.
    struct GpuLight {
        pub position: Vec3,
        pub radius: f32 = 0.3,
        pub color: Vec3 = Vec3::ONE,
        pub(crate) __pad: u32,
    }
);

impl GpuLight {
    #[must_use]
    pub fn new(position: Vec3, color: Vec3, radius: f32) -> Self {
        Self {
            position,
            radius,
            color,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_have_no_hidden_padding() {
        assert_eq!(std::mem::size_of::<GpuBasicData>(), 8 * 64 + 32);
        assert_eq!(std::mem::size_of::<GpuMeshInstance>(), 3 * 64);
        assert_eq!(std::mem::size_of::<GpuGBufferData>(), 40);
        assert_eq!(std::mem::size_of::<GpuTemporalData>(), 32);
        assert_eq!(std::mem::size_of::<GpuLight>(), 32);
    }
}
