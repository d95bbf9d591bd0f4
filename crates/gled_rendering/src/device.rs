//! # Graphics Device
//!
//! The slice of the graphics API that render commands drive.
//!
//! Object names are plain `u32`s, zero meaning "no object", as in the
//! underlying API. A device is bound to the thread that owns the graphics
//! context, so the trait carries no `Send` bound.

use bytemuck::{Pod, Zeroable};
use std::fmt;

use crate::error::GraphicsResult;

/// Name of a GPU buffer object.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct BufferId(pub u32);

/// Name of a GPU texture object.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct TextureId(pub u32);

macro_rules! object_name {
    ($name:ident) => {
        impl $name {
            /// The reserved "no object" name.
            pub const NONE: Self = Self(0);

            /// Raw name.
            #[inline]
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0
            }

            /// Whether this is the reserved "no object" name.
            #[inline]
            #[must_use]
            pub const fn is_none(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

object_name!(BufferId);
object_name!(TextureId);

/// Which polygon faces a raster mode applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolygonFace {
    /// Front-facing polygons.
    Front,
    /// Back-facing polygons.
    Back,
    /// Both.
    FrontAndBack,
}

/// How polygons are rasterized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    /// Vertices only.
    Point,
    /// Edges only (wireframe).
    Line,
    /// Filled.
    #[default]
    Fill,
}

/// Graphics-object lifecycle calls, legal only on the context's thread.
pub trait GraphicsDevice {
    /// Sets the raster mode for `face`.
    ///
    /// # Errors
    ///
    /// Returns the device's error.
    fn set_polygon_mode(&mut self, face: PolygonFace, mode: PolygonMode) -> GraphicsResult<()>;

    /// Fills `out` with freshly created buffer names.
    ///
    /// # Errors
    ///
    /// Returns the device's error; `out` is unspecified in that case.
    fn gen_buffers(&mut self, out: &mut [BufferId]) -> GraphicsResult<()>;

    /// Deletes buffers. Zero names are ignored.
    ///
    /// # Errors
    ///
    /// Returns the device's error.
    fn delete_buffers(&mut self, ids: &[BufferId]) -> GraphicsResult<()>;

    /// Fills `out` with freshly created texture names.
    ///
    /// # Errors
    ///
    /// Returns the device's error; `out` is unspecified in that case.
    fn gen_textures(&mut self, out: &mut [TextureId]) -> GraphicsResult<()>;

    /// Deletes textures. Zero names are ignored.
    ///
    /// # Errors
    ///
    /// Returns the device's error.
    fn delete_textures(&mut self, ids: &[TextureId]) -> GraphicsResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_none() {
        assert!(BufferId::NONE.is_none());
        assert!(BufferId::default().is_none());
        assert!(!TextureId(3).is_none());
        assert_eq!(TextureId(3).to_string(), "3");
    }

    #[test]
    fn test_ids_are_pod() {
        let ids = [BufferId(1), BufferId(2)];
        let raw: &[u32] = bytemuck::cast_slice(&ids);
        assert_eq!(raw, &[1, 2]);
    }
}
