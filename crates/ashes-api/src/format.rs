//! Pixel and vertex formats.
//!
//! The set below covers the formats the GL backend translates; requesting
//! anything outside it fails resource creation with a format error rather
//! than silently aliasing.

use crate::flags::ImageAspectFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Undefined,
    R8Unorm,
    R8Uint,
    R8G8Unorm,
    R8G8B8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8Srgb,
    B8G8R8A8Unorm,
    B8G8R8A8Srgb,
    R16Sfloat,
    R16G16Sfloat,
    R16G16B16A16Sfloat,
    R32Uint,
    R32Sint,
    R32Sfloat,
    R32G32Sfloat,
    R32G32B32Sfloat,
    R32G32B32A32Sfloat,
    D16Unorm,
    D24UnormS8Uint,
    D32Sfloat,
    D32SfloatS8Uint,
    S8Uint,
}

impl Format {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Format::D16Unorm | Format::D24UnormS8Uint | Format::D32Sfloat | Format::D32SfloatS8Uint
        )
    }

    pub fn is_stencil(self) -> bool {
        matches!(
            self,
            Format::D24UnormS8Uint | Format::D32SfloatS8Uint | Format::S8Uint
        )
    }

    pub fn is_depth_or_stencil(self) -> bool {
        self.is_depth() || self.is_stencil()
    }

    /// Aspects an image of this format carries.
    pub fn aspects(self) -> ImageAspectFlags {
        let mut aspects = ImageAspectFlags::empty();
        if self.is_depth() {
            aspects |= ImageAspectFlags::DEPTH;
        }
        if self.is_stencil() {
            aspects |= ImageAspectFlags::STENCIL;
        }
        if aspects.is_empty() {
            aspects = ImageAspectFlags::COLOR;
        }
        aspects
    }

    /// Bytes per texel, as tightly packed in transfer buffers.
    pub fn texel_size(self) -> u64 {
        match self {
            Format::Undefined => 0,
            Format::R8Unorm | Format::R8Uint | Format::S8Uint => 1,
            Format::R8G8Unorm | Format::R16Sfloat | Format::D16Unorm => 2,
            Format::R8G8B8Unorm => 3,
            Format::R8G8B8A8Unorm
            | Format::R8G8B8A8Srgb
            | Format::B8G8R8A8Unorm
            | Format::B8G8R8A8Srgb
            | Format::R16G16Sfloat
            | Format::R32Uint
            | Format::R32Sint
            | Format::R32Sfloat
            | Format::D24UnormS8Uint
            | Format::D32Sfloat => 4,
            Format::R16G16B16A16Sfloat | Format::R32G32Sfloat | Format::D32SfloatS8Uint => 8,
            Format::R32G32B32Sfloat => 12,
            Format::R32G32B32A32Sfloat => 16,
        }
    }
}
