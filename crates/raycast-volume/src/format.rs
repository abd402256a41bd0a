use crate::metadata::{
    Metadata,
    ScalarType,
};
use anyhow::{
    bail,
    Result,
};

/// Texel format of the uploaded 3D texture. Integer data is uploaded as normalized formats so
/// it can be filtered linearly; [`VolumeFormat::value_scale`] converts the fetched value back
/// into data units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    R32Float,
    R8Unorm,
    R16Unorm,
    R16Snorm,
}

impl VolumeFormat {
    pub fn from_metadata(metadata: &Metadata) -> Result<Self> {
        let length = metadata.scalar_length;
        match metadata.scalar_type {
            ScalarType::FloatingPoint => {
                if length == 4 {
                    Ok(Self::R32Float)
                } else {
                    bail!("floating point values with a length != 4 byte are invalid (got {length})")
                }
            }
            ScalarType::UnsignedInteger => match length {
                1 => Ok(Self::R8Unorm),
                2 => Ok(Self::R16Unorm),
                _ => bail!("unsigned integers with a length greater than 2 are invalid (got {length})"),
            },
            ScalarType::SignedInteger => {
                if length == 2 {
                    Ok(Self::R16Snorm)
                } else {
                    bail!("integers with a length != 2 are invalid (got {length})")
                }
            }
            ScalarType::Bits => bail!("invalid datatype: bit volumes cannot be ray cast"),
        }
    }

    pub fn bytes_per_voxel(&self) -> usize {
        match self {
            Self::R32Float => 4,
            Self::R8Unorm => 1,
            Self::R16Unorm | Self::R16Snorm => 2,
        }
    }

    /// Factor from the normalized texture fetch to data units.
    pub fn value_scale(&self) -> f32 {
        match self {
            Self::R32Float => 1.0,
            Self::R8Unorm => u8::MAX as f32,
            Self::R16Unorm => u16::MAX as f32,
            Self::R16Snorm => i16::MAX as f32,
        }
    }

    /// Decodes voxel `index` of little-endian `data` into data units.
    pub fn decode(&self, data: &[u8], index: usize) -> f32 {
        let offset = index * self.bytes_per_voxel();
        match self {
            Self::R32Float => {
                f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
            }
            Self::R8Unorm => data[offset] as f32,
            Self::R16Unorm => u16::from_le_bytes([data[offset], data[offset + 1]]) as f32,
            // SNORM sampling clamps i16::MIN to -1
            Self::R16Snorm => {
                (i16::from_le_bytes([data[offset], data[offset + 1]]) as f32).max(-(i16::MAX as f32))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_metadata;

    fn metadata_with(scalar_type: ScalarType, scalar_length: usize) -> Metadata {
        let mut metadata = test_metadata([2, 2, 2]);
        metadata.scalar_type = scalar_type;
        metadata.scalar_length = scalar_length;
        metadata
    }

    #[test]
    fn test_supported_formats() {
        let cases = [
            (ScalarType::FloatingPoint, 4, VolumeFormat::R32Float),
            (ScalarType::UnsignedInteger, 1, VolumeFormat::R8Unorm),
            (ScalarType::UnsignedInteger, 2, VolumeFormat::R16Unorm),
            (ScalarType::SignedInteger, 2, VolumeFormat::R16Snorm),
        ];
        for (scalar_type, length, expected) in cases {
            let format = VolumeFormat::from_metadata(&metadata_with(scalar_type, length)).unwrap();
            assert_eq!(format, expected);
            assert_eq!(format.bytes_per_voxel(), length);
        }
    }

    #[test]
    fn test_rejected_formats() {
        let cases = [
            (ScalarType::FloatingPoint, 8, "floating point"),
            (ScalarType::UnsignedInteger, 4, "unsigned integers"),
            (ScalarType::SignedInteger, 1, "integers with a length"),
            (ScalarType::Bits, 1, "invalid datatype"),
        ];
        for (scalar_type, length, message) in cases {
            let error = VolumeFormat::from_metadata(&metadata_with(scalar_type, length)).unwrap_err();
            assert!(error.to_string().contains(message), "{}", error);
        }
    }

    #[test]
    fn test_decode() {
        let data = [0x34, 0x12, 0xff, 0xff];
        assert_eq!(VolumeFormat::R16Unorm.decode(&data, 0), 0x1234 as f32);
        assert_eq!(VolumeFormat::R16Snorm.decode(&data, 1), -1.0);
        assert_eq!(VolumeFormat::R8Unorm.decode(&data, 2), 255.0);
        let min = i16::MIN.to_le_bytes();
        assert_eq!(VolumeFormat::R16Snorm.decode(&min, 0), -(i16::MAX as f32));
        let float_data = 1.5f32.to_le_bytes();
        assert_eq!(VolumeFormat::R32Float.decode(&float_data, 0), 1.5);
    }
}
