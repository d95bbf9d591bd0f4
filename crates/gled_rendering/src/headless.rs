//! # Headless Device
//!
//! A [`GraphicsDevice`] with no GPU behind it. Hands out sequential
//! non-zero names, tracks which objects are alive, and records every call.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::device::{BufferId, GraphicsDevice, PolygonFace, PolygonMode, TextureId};
use crate::error::{GraphicsError, GraphicsResult};

/// One call made against a [`HeadlessDevice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceCall {
    /// `set_polygon_mode`.
    SetPolygonMode(PolygonFace, PolygonMode),
    /// `gen_buffers` with the names produced.
    GenBuffers(Vec<BufferId>),
    /// `delete_buffers`.
    DeleteBuffers(Vec<BufferId>),
    /// `gen_textures` with the names produced.
    GenTextures(Vec<TextureId>),
    /// `delete_textures`.
    DeleteTextures(Vec<TextureId>),
}

/// An in-memory graphics device.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_buffer: u32,
    next_texture: u32,
    buffers: BTreeSet<BufferId>,
    textures: BTreeSet<TextureId>,
    front_mode: PolygonMode,
    back_mode: PolygonMode,
    calls: Vec<DeviceCall>,
    fail_next: Option<GraphicsError>,
}

impl HeadlessDevice {
    /// Creates a device with no live objects and both faces filled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call fail with `error` without touching any state.
    pub fn fail_next(&mut self, error: GraphicsError) {
        self.fail_next = Some(error);
    }

    /// Live buffer names, ascending.
    #[must_use]
    pub fn live_buffers(&self) -> Vec<BufferId> {
        self.buffers.iter().copied().collect()
    }

    /// Live texture names, ascending.
    #[must_use]
    pub fn live_textures(&self) -> Vec<TextureId> {
        self.textures.iter().copied().collect()
    }

    /// Current raster mode of `face`. For `FrontAndBack`, the front mode.
    #[must_use]
    pub fn polygon_mode(&self, face: PolygonFace) -> PolygonMode {
        match face {
            PolygonFace::Front | PolygonFace::FrontAndBack => self.front_mode,
            PolygonFace::Back => self.back_mode,
        }
    }

    /// Every successful call so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    fn check_injected_failure(&mut self) -> GraphicsResult<()> {
        match self.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Claims `count` consecutive names, all or nothing. Returns the
    /// inclusive range of names claimed.
    fn allocate_names(counter: &mut u32, count: usize) -> GraphicsResult<RangeInclusive<u32>> {
        let last = u32::try_from(count)
            .ok()
            .and_then(|count| counter.checked_add(count))
            .ok_or_else(|| GraphicsError::Device {
                code: 0x0505,
                message: "object names exhausted".into(),
            })?;
        let first = counter.wrapping_add(1);
        *counter = last;
        Ok(first..=last)
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn set_polygon_mode(&mut self, face: PolygonFace, mode: PolygonMode) -> GraphicsResult<()> {
        self.check_injected_failure()?;
        match face {
            PolygonFace::Front => self.front_mode = mode,
            PolygonFace::Back => self.back_mode = mode,
            PolygonFace::FrontAndBack => {
                self.front_mode = mode;
                self.back_mode = mode;
            }
        }
        self.calls.push(DeviceCall::SetPolygonMode(face, mode));
        Ok(())
    }

    fn gen_buffers(&mut self, out: &mut [BufferId]) -> GraphicsResult<()> {
        self.check_injected_failure()?;
        let names = Self::allocate_names(&mut self.next_buffer, out.len())?;
        for (slot, name) in out.iter_mut().zip(names) {
            *slot = BufferId(name);
            self.buffers.insert(*slot);
        }
        self.calls.push(DeviceCall::GenBuffers(out.to_vec()));
        Ok(())
    }

    fn delete_buffers(&mut self, ids: &[BufferId]) -> GraphicsResult<()> {
        self.check_injected_failure()?;
        if let Some(unknown) = ids
            .iter()
            .find(|id| !id.is_none() && !self.buffers.contains(*id))
        {
            return Err(GraphicsError::UnknownObject {
                kind: "buffer",
                id: unknown.get(),
            });
        }
        for id in ids {
            self.buffers.remove(id);
        }
        self.calls.push(DeviceCall::DeleteBuffers(ids.to_vec()));
        Ok(())
    }

    fn gen_textures(&mut self, out: &mut [TextureId]) -> GraphicsResult<()> {
        self.check_injected_failure()?;
        let names = Self::allocate_names(&mut self.next_texture, out.len())?;
        for (slot, name) in out.iter_mut().zip(names) {
            *slot = TextureId(name);
            self.textures.insert(*slot);
        }
        self.calls.push(DeviceCall::GenTextures(out.to_vec()));
        Ok(())
    }

    fn delete_textures(&mut self, ids: &[TextureId]) -> GraphicsResult<()> {
        self.check_injected_failure()?;
        if let Some(unknown) = ids
            .iter()
            .find(|id| !id.is_none() && !self.textures.contains(*id))
        {
            return Err(GraphicsError::UnknownObject {
                kind: "texture",
                id: unknown.get(),
            });
        }
        for id in ids {
            self.textures.remove(id);
        }
        self.calls.push(DeviceCall::DeleteTextures(ids.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_nonzero_names() {
        let mut device = HeadlessDevice::new();
        let mut ids = [BufferId::NONE; 3];
        device.gen_buffers(&mut ids).unwrap();
        assert_eq!(ids, [BufferId(1), BufferId(2), BufferId(3)]);

        let mut tex = [TextureId::NONE; 1];
        device.gen_textures(&mut tex).unwrap();
        assert_eq!(tex, [TextureId(1)]);
    }

    #[test]
    fn test_delete_tracks_liveness() {
        let mut device = HeadlessDevice::new();
        let mut ids = [BufferId::NONE; 2];
        device.gen_buffers(&mut ids).unwrap();

        device.delete_buffers(&[ids[0], BufferId::NONE]).unwrap();
        assert_eq!(device.live_buffers(), vec![ids[1]]);

        assert_eq!(
            device.delete_buffers(&[ids[0]]),
            Err(GraphicsError::UnknownObject { kind: "buffer", id: 1 })
        );
        assert_eq!(device.live_buffers(), vec![ids[1]]);
    }

    #[test]
    fn test_polygon_mode_state() {
        let mut device = HeadlessDevice::new();
        assert_eq!(device.polygon_mode(PolygonFace::Front), PolygonMode::Fill);

        device
            .set_polygon_mode(PolygonFace::FrontAndBack, PolygonMode::Line)
            .unwrap();
        assert_eq!(device.polygon_mode(PolygonFace::Back), PolygonMode::Line);

        device.set_polygon_mode(PolygonFace::Back, PolygonMode::Point).unwrap();
        assert_eq!(device.polygon_mode(PolygonFace::Front), PolygonMode::Line);
        assert_eq!(device.polygon_mode(PolygonFace::Back), PolygonMode::Point);
        assert_eq!(device.calls().len(), 2);
    }

    #[test]
    fn test_name_exhaustion_issues_nothing() {
        let mut device = HeadlessDevice::new();
        device.next_buffer = u32::MAX - 2;

        let mut ids = [BufferId::NONE; 3];
        assert!(matches!(device.gen_buffers(&mut ids), Err(GraphicsError::Device { .. })));
        assert_eq!(ids, [BufferId::NONE; 3]);
        assert!(device.live_buffers().is_empty());
        assert!(device.calls().is_empty());

        let mut ids = [BufferId::NONE; 2];
        device.gen_buffers(&mut ids).unwrap();
        assert_eq!(ids, [BufferId(u32::MAX - 1), BufferId(u32::MAX)]);
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let mut device = HeadlessDevice::new();
        let error = GraphicsError::Device {
            code: 0x0505,
            message: "out of memory".into(),
        };
        device.fail_next(error.clone());

        let mut ids = [BufferId::NONE; 1];
        assert_eq!(device.gen_buffers(&mut ids), Err(error));
        assert!(device.live_buffers().is_empty());
        assert!(device.calls().is_empty());

        device.gen_buffers(&mut ids).unwrap();
        assert_eq!(ids, [BufferId(1)]);
    }
}
