use crate::{
    bbox::BoundingBox,
    metadata::Metadata,
};
use anyhow::{
    bail,
    Result,
};
use std::hash::{
    DefaultHasher,
    Hash,
    Hasher,
};

/// Upper bound of load requests issued while waiting for a source to deliver a frame.
pub const MAX_FRAME_REQUESTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeExtents {
    pub bounding_box: BoundingBox,
    pub clip_box: BoundingBox,
    pub frame_count: u32,
}

/// View of the frame a source currently holds.
#[derive(Debug, Clone, Copy)]
pub struct VolumeFrame<'a> {
    pub frame_id: u32,
    pub data_hash: u64,
    pub metadata: &'a Metadata,
    pub data: &'a [u8],
}

/// Request/response contract of a volume data provider.
pub trait VolumeSource {
    fn extents(&mut self, frame_id: u32) -> Result<VolumeExtents>;

    /// Asks for `frame_id` and returns the id of the frame that is available afterwards, which
    /// may differ from the requested one while the source is still catching up.
    fn load_frame(&mut self, frame_id: u32, force: bool) -> Result<u32>;

    fn frame(&self) -> Result<VolumeFrame<'_>>;
}

/// Issues load requests until the source delivers `frame_id`.
pub fn request_frame(source: &mut dyn VolumeSource, frame_id: u32) -> Result<VolumeFrame<'_>> {
    let mut delivered = None;
    for attempt in 0..MAX_FRAME_REQUESTS {
        let id = source.load_frame(frame_id, true)?;
        if id == frame_id {
            delivered = Some(id);
            break;
        }
        log::debug!(
            "Frame request {}: got frame {} while waiting for {}",
            attempt,
            id,
            frame_id
        );
    }
    if delivered.is_none() {
        bail!(
            "volume source did not deliver frame {} after {} requests",
            frame_id,
            MAX_FRAME_REQUESTS
        );
    }
    source.frame()
}

pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

/// Frame storage shared by the in-process sources.
#[derive(Debug, Clone)]
pub(crate) struct LoadedFrame {
    pub frame_id: u32,
    pub data_hash: u64,
    pub metadata: Metadata,
    pub data: Vec<u8>,
}

impl LoadedFrame {
    pub fn new(frame_id: u32, metadata: Metadata, data: Vec<u8>) -> Self {
        Self {
            frame_id,
            data_hash: hash_bytes(&data),
            metadata,
            data,
        }
    }

    pub fn as_frame(&self) -> VolumeFrame<'_> {
        VolumeFrame {
            frame_id: self.frame_id,
            data_hash: self.data_hash,
            metadata: &self.metadata,
            data: &self.data,
        }
    }
}

pub(crate) fn loaded_frame(frame: &Option<LoadedFrame>) -> Result<VolumeFrame<'_>> {
    match frame {
        Some(frame) => Ok(frame.as_frame()),
        None => bail!("no volume frame has been loaded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_metadata;

    /// Delivers the previously requested frame first, like an asynchronous loader.
    struct LaggingSource {
        pending: Option<u32>,
        current: Option<LoadedFrame>,
        requests: usize,
    }

    impl LaggingSource {
        fn new() -> Self {
            Self {
                pending: None,
                current: None,
                requests: 0,
            }
        }
    }

    impl VolumeSource for LaggingSource {
        fn extents(&mut self, _frame_id: u32) -> Result<VolumeExtents> {
            let bounding_box = test_metadata([2, 2, 2]).bounding_box();
            Ok(VolumeExtents {
                bounding_box,
                clip_box: bounding_box,
                frame_count: 4,
            })
        }

        fn load_frame(&mut self, frame_id: u32, _force: bool) -> Result<u32> {
            self.requests += 1;
            let delivered = self.pending.replace(frame_id).unwrap_or(0);
            self.current = Some(LoadedFrame::new(
                delivered,
                test_metadata([2, 2, 2]),
                vec![delivered as u8; 32],
            ));
            Ok(delivered)
        }

        fn frame(&self) -> Result<VolumeFrame<'_>> {
            loaded_frame(&self.current)
        }
    }

    /// Never gets past frame 0.
    struct StuckSource(Option<LoadedFrame>);

    impl VolumeSource for StuckSource {
        fn extents(&mut self, _frame_id: u32) -> Result<VolumeExtents> {
            unreachable!()
        }

        fn load_frame(&mut self, _frame_id: u32, _force: bool) -> Result<u32> {
            self.0 = Some(LoadedFrame::new(0, test_metadata([1, 1, 1]), vec![0; 4]));
            Ok(0)
        }

        fn frame(&self) -> Result<VolumeFrame<'_>> {
            loaded_frame(&self.0)
        }
    }

    #[test]
    fn test_request_frame_waits_for_requested_frame() {
        let mut source = LaggingSource::new();
        let frame = request_frame(&mut source, 3).unwrap();
        assert_eq!(frame.frame_id, 3);
        assert_eq!(frame.data[0], 3);
        assert_eq!(source.requests, 2);
    }

    #[test]
    fn test_request_frame_is_bounded() {
        let mut source = StuckSource(None);
        let error = request_frame(&mut source, 2).unwrap_err();
        assert!(error.to_string().contains("did not deliver frame 2"));
    }

    #[test]
    fn test_frame_before_load_fails() {
        assert!(StuckSource(None).frame().is_err());
    }

    #[test]
    fn test_hash_follows_content() {
        assert_eq!(hash_bytes(&[1, 2, 3]), hash_bytes(&[1, 2, 3]));
        assert_ne!(hash_bytes(&[1, 2, 3]), hash_bytes(&[1, 2, 4]));
    }
}
