//! # Environment Map
//!
//! The six-faced sky texture and the cube it is drawn on.
//!
//! Loading is all-or-nothing: the six faces are decoded concurrently, checked
//! for matching square sizes, and only then is a cube texture created and
//! published. A failed load leaves the map without a texture for the rest of
//! the session, which turns background compositing and reflections off.

pub mod image_source;

pub use image_source::{DecodedImage, FileImageSource, ImageSource};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::gfx::device::{
    BufferId, BufferKind, CubeFace, GpuDevice, TextureId, TextureSampling,
};
use crate::gfx::geometry::primitives;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssetLoadError {
    #[error("failed to decode environment face '{source_id}': {reason}")]
    Decode { source_id: String, reason: String },
    #[error(
        "environment face '{source_id}' is {width}x{height}, expected a {expected}x{expected} square"
    )]
    FaceMismatch {
        source_id: String,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error("environment faces are {face_size}x{face_size}, the device allows at most {limit}")]
    TooLarge { face_size: u32, limit: u32 },
    #[error("environment loading is disabled after an earlier failure")]
    Disabled,
}

/// Identifiers of the six faces, in the order +X, -X, +Y, -Y, +Z, -Z
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeSources {
    pub positive_x: String,
    pub negative_x: String,
    pub positive_y: String,
    pub negative_y: String,
    pub positive_z: String,
    pub negative_z: String,
}

impl CubeSources {
    pub fn new(faces: [&str; 6]) -> Self {
        let [positive_x, negative_x, positive_y, negative_y, positive_z, negative_z] =
            faces.map(str::to_owned);
        Self {
            positive_x,
            negative_x,
            positive_y,
            negative_y,
            positive_z,
            negative_z,
        }
    }

    pub fn face(&self, face: CubeFace) -> &str {
        match face {
            CubeFace::PositiveX => &self.positive_x,
            CubeFace::NegativeX => &self.negative_x,
            CubeFace::PositiveY => &self.positive_y,
            CubeFace::NegativeY => &self.negative_y,
            CubeFace::PositiveZ => &self.positive_z,
            CubeFace::NegativeZ => &self.negative_z,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CubeFace, &str)> + '_ {
        CubeFace::ALL.into_iter().map(|face| (face, self.face(face)))
    }
}

impl Default for CubeSources {
    fn default() -> Self {
        Self::new([
            "posx.jpg", "negx.jpg", "posy.jpg", "negy.jpg", "posz.jpg", "negz.jpg",
        ])
    }
}

/// A fully populated cube texture
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentTexture {
    pub texture: TextureId,
    pub face_size: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EnvironmentState {
    Pending,
    Ready(EnvironmentTexture),
    Failed,
}

pub struct EnvironmentMap {
    state: EnvironmentState,
    cube_positions: BufferId,
    cube_indices: BufferId,
    index_count: u32,
}

impl EnvironmentMap {
    /// Uploads the background cube; the texture starts out absent
    pub fn new(device: &mut dyn GpuDevice) -> Self {
        let cube = primitives::sky_cube();

        let cube_positions = device.create_buffer(BufferKind::Vertex, "sky cube positions");
        device.upload_buffer(cube_positions, bytemuck::cast_slice(&cube.positions));
        let cube_indices = device.create_buffer(BufferKind::Index, "sky cube indices");
        device.upload_buffer(cube_indices, bytemuck::cast_slice(&cube.indices));

        Self {
            state: EnvironmentState::Pending,
            cube_positions,
            cube_indices,
            index_count: cube.indices.len() as u32,
        }
    }

    /// Decodes and checks all six faces without touching the GPU
    ///
    /// Resolves to the faces in upload order, or to the first failure.
    pub async fn load_faces(
        source: &dyn ImageSource,
        sources: &CubeSources,
    ) -> Result<Vec<DecodedImage>, AssetLoadError> {
        let decodes = sources.iter().map(move |(_, id)| async move {
            source
                .decode(id)
                .await
                .map_err(|reason| AssetLoadError::Decode {
                    source_id: id.to_owned(),
                    reason,
                })
        });
        let faces = try_join_all(decodes).await?;

        let expected = faces.first().map_or(0, |face| face.width);
        for ((_, id), face) in sources.iter().zip(&faces) {
            let square = face.width == face.height && face.width == expected && expected > 0;
            if !square {
                return Err(AssetLoadError::FaceMismatch {
                    source_id: id.to_owned(),
                    width: face.width,
                    height: face.height,
                    expected,
                });
            }
            let expected_len = (face.width as usize)
                .checked_mul(face.height as usize)
                .and_then(|pixels| pixels.checked_mul(4));
            if expected_len != Some(face.rgba.len()) {
                return Err(AssetLoadError::Decode {
                    source_id: id.to_owned(),
                    reason: format!("expected RGBA8 data, got {} bytes", face.rgba.len()),
                });
            }
        }
        Ok(faces)
    }

    /// Publishes the result of [`EnvironmentMap::load_faces`]
    ///
    /// Success creates and fills the cube texture; failure, including faces
    /// larger than the device supports, disables the map for the rest of the
    /// session.
    pub fn complete_load(
        &mut self,
        device: &mut dyn GpuDevice,
        faces: Result<Vec<DecodedImage>, AssetLoadError>,
    ) -> Result<EnvironmentTexture, AssetLoadError> {
        if self.state == EnvironmentState::Failed {
            return Err(AssetLoadError::Disabled);
        }
        let limit = device.max_texture_size();
        let faces = faces.and_then(|faces| {
            let face_size = faces.first().map_or(0, |face| face.width);
            if face_size > limit {
                return Err(AssetLoadError::TooLarge { face_size, limit });
            }
            Ok(faces)
        });
        match faces {
            Ok(faces) => Ok(self.publish(device, &faces)),
            Err(err) => {
                log::warn!("Environment map disabled: {}", err);
                self.state = EnvironmentState::Failed;
                Err(err)
            }
        }
    }

    /// Loads six faces and publishes them as one cube texture
    pub async fn load_async(
        &mut self,
        device: &mut dyn GpuDevice,
        source: &dyn ImageSource,
        sources: &CubeSources,
    ) -> Result<EnvironmentTexture, AssetLoadError> {
        if self.state == EnvironmentState::Failed {
            return Err(AssetLoadError::Disabled);
        }
        let faces = Self::load_faces(source, sources).await;
        self.complete_load(device, faces)
    }

    /// Turns reflections off without attempting a load
    pub fn disable(&mut self) {
        self.state = EnvironmentState::Failed;
    }

    fn publish(&mut self, device: &mut dyn GpuDevice, faces: &[DecodedImage]) -> EnvironmentTexture {
        let face_size = faces.first().map_or(1, |face| face.width);
        let texture =
            device.create_cube_texture(face_size, TextureSampling::LINEAR_CLAMPED, "environment");
        for (face, image) in CubeFace::ALL.into_iter().zip(faces) {
            device.upload_texture_face(texture, face, &image.rgba);
        }

        let environment = EnvironmentTexture { texture, face_size };
        self.state = EnvironmentState::Ready(environment);
        log::info!("Environment map ready ({0}x{0} faces)", face_size);
        environment
    }

    /// The published texture, if every face loaded
    pub fn texture(&self) -> Option<EnvironmentTexture> {
        match self.state {
            EnvironmentState::Ready(texture) => Some(texture),
            EnvironmentState::Pending | EnvironmentState::Failed => None,
        }
    }

    /// Whether loading has finished, successfully or not
    pub fn is_settled(&self) -> bool {
        self.state != EnvironmentState::Pending
    }

    pub fn cube_positions(&self) -> BufferId {
        self.cube_positions
    }

    pub fn cube_indices(&self) -> BufferId {
        self.cube_indices
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::testing::{DeviceCall, RecordingDevice};
    use futures::future::BoxFuture;
    use std::collections::HashMap;

    /// Serves solid faces, failing or resizing the ones it is told to
    #[derive(Default)]
    struct FakeImages {
        failing: Option<String>,
        sizes: HashMap<String, (u32, u32)>,
    }

    impl ImageSource for FakeImages {
        fn decode<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<DecodedImage, String>> {
            Box::pin(async move {
                if self.failing.as_deref() == Some(source) {
                    return Err("corrupt data".to_owned());
                }
                let (width, height) = self.sizes.get(source).copied().unwrap_or((2, 2));
                Ok(DecodedImage {
                    width,
                    height,
                    rgba: vec![128; width as usize * height as usize * 4],
                })
            })
        }
    }

    fn setup() -> (RecordingDevice, EnvironmentMap) {
        let mut device = RecordingDevice::new();
        let map = EnvironmentMap::new(&mut device);
        device.clear_calls();
        (device, map)
    }

    #[test]
    fn background_cube_is_uploaded() {
        let mut device = RecordingDevice::new();
        let map = EnvironmentMap::new(&mut device);
        assert_eq!(map.index_count(), 36);
        assert_eq!(device.buffer_contents(map.cube_positions()).len(), 8 * 12);
        assert!(map.texture().is_none());
        assert!(!map.is_settled());
    }

    #[test]
    fn successful_load_publishes_all_faces() {
        let (mut device, mut map) = setup();
        let texture = pollster::block_on(map.load_async(
            &mut device,
            &FakeImages::default(),
            &CubeSources::default(),
        ))
        .unwrap();

        assert_eq!(map.texture(), Some(texture));
        assert_eq!(texture.face_size, 2);
        assert_eq!(
            device.calls[0],
            DeviceCall::CreateCubeTexture(texture.texture, 2, TextureSampling::LINEAR_CLAMPED)
        );
        let faces: Vec<_> = device
            .calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::UploadTextureFace(_, face) => Some(*face),
                _ => None,
            })
            .collect();
        assert_eq!(faces, CubeFace::ALL.to_vec());
    }

    #[test]
    fn any_single_failure_publishes_nothing() {
        let sources = CubeSources::default();
        for (_, failing) in sources.iter() {
            let (mut device, mut map) = setup();
            let images = FakeImages {
                failing: Some(failing.to_owned()),
                ..Default::default()
            };

            let err = pollster::block_on(map.load_async(&mut device, &images, &sources)).unwrap_err();

            assert_eq!(
                err,
                AssetLoadError::Decode {
                    source_id: failing.to_owned(),
                    reason: "corrupt data".to_owned()
                }
            );
            assert!(map.texture().is_none());
            assert!(map.is_settled());
            assert!(device.calls.is_empty(), "no texture may be created");
        }
    }

    #[test]
    fn mismatched_faces_are_rejected() {
        let (mut device, mut map) = setup();
        let mut images = FakeImages::default();
        images.sizes.insert("negy.jpg".to_owned(), (4, 4));

        let err = pollster::block_on(map.load_async(&mut device, &images, &CubeSources::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            AssetLoadError::FaceMismatch { ref source_id, expected: 2, .. } if source_id == "negy.jpg"
        ));
        assert!(map.texture().is_none());
    }

    #[test]
    fn non_square_first_face_is_rejected() {
        let mut images = FakeImages::default();
        images.sizes.insert("posx.jpg".to_owned(), (4, 2));
        let err = pollster::block_on(EnvironmentMap::load_faces(&images, &CubeSources::default()))
            .unwrap_err();
        assert!(matches!(err, AssetLoadError::FaceMismatch { .. }));
    }

    struct OversizedFaces;

    impl ImageSource for OversizedFaces {
        fn decode<'a>(&'a self, _source: &'a str) -> BoxFuture<'a, Result<DecodedImage, String>> {
            Box::pin(async move {
                Ok(DecodedImage {
                    width: 32768,
                    height: 32768,
                    rgba: vec![0; 16],
                })
            })
        }
    }

    #[test]
    fn short_pixel_data_on_huge_faces_is_a_decode_error() {
        let (mut device, mut map) = setup();
        let err = pollster::block_on(map.load_async(
            &mut device,
            &OversizedFaces,
            &CubeSources::default(),
        ))
        .unwrap_err();

        assert!(matches!(
            err,
            AssetLoadError::Decode { ref source_id, .. } if source_id == "posx.jpg"
        ));
        assert!(map.texture().is_none());
        assert!(device.calls.is_empty());
    }

    #[test]
    fn faces_beyond_the_device_limit_disable_the_map() {
        let (mut device, mut map) = setup();
        device.max_texture_size = 1;
        let sources = CubeSources::default();

        let err = pollster::block_on(map.load_async(&mut device, &FakeImages::default(), &sources))
            .unwrap_err();
        assert_eq!(err, AssetLoadError::TooLarge { face_size: 2, limit: 1 });
        assert!(map.texture().is_none());
        assert!(map.is_settled());
        assert!(device.calls.is_empty(), "no texture may be created");

        device.max_texture_size = 4096;
        let retry = pollster::block_on(map.load_async(&mut device, &FakeImages::default(), &sources));
        assert_eq!(retry.unwrap_err(), AssetLoadError::Disabled);
    }

    #[test]
    fn failure_disables_later_loads() {
        let (mut device, mut map) = setup();
        let sources = CubeSources::default();
        let broken = FakeImages {
            failing: Some("posz.jpg".to_owned()),
            ..Default::default()
        };
        assert!(pollster::block_on(map.load_async(&mut device, &broken, &sources)).is_err());

        let retry = pollster::block_on(map.load_async(&mut device, &FakeImages::default(), &sources));
        assert_eq!(retry.unwrap_err(), AssetLoadError::Disabled);
        assert!(map.texture().is_none());
    }
}
