use bytemuck::{
    Pod,
    Zeroable,
};

/// Interval in data units that is mapped to [0, 1] before the transfer function lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ValueRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f32 {
        self.max - self.min
    }

    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0)
    }

    /// Maps `value` into [0, 1]. A degenerate range maps everything to 0.
    pub fn normalize(&self, value: f32) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        ((value - self.min) / self.width()).clamp(0.0, 1.0)
    }

    pub fn denormalize(&self, t: f32) -> f32 {
        self.min + t * self.width()
    }

    pub fn include(&mut self, value: f32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Min/max over `samples`, ignoring NaNs. `None` for an empty input.
    pub fn from_samples<I: IntoIterator<Item = f32>>(samples: I) -> Option<Self> {
        let mut range: Option<ValueRange> = None;
        for value in samples.into_iter().filter(|v| !v.is_nan()) {
            match range.as_mut() {
                Some(range) => range.include(value),
                None => range = Some(ValueRange::new(value, value)),
            }
        }
        range
    }
}

/// Maps an `f32` to a `u32` whose unsigned order matches the float order, so the GPU can
/// reduce floats with `atomicMin`/`atomicMax`.
pub fn encode_orderable(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

pub fn decode_orderable(encoded: u32) -> f32 {
    let bits = if encoded & 0x8000_0000 != 0 {
        encoded & 0x7fff_ffff
    } else {
        !encoded
    };
    f32::from_bits(bits)
}

/// Layout of the aggregate range feedback storage buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RangeFeedback {
    pub min: u32,
    pub max: u32,
}

impl Default for RangeFeedback {
    fn default() -> Self {
        Self::RESET
    }
}

impl RangeFeedback {
    /// Identity values for the atomic min/max reduction.
    pub const RESET: RangeFeedback = RangeFeedback {
        min: u32::MAX,
        max: 0,
    };

    pub fn fold(&mut self, value: f32) {
        let encoded = encode_orderable(value);
        self.min = self.min.min(encoded);
        self.max = self.max.max(encoded);
    }

    /// `None` when no value was folded in, i.e. no ray hit the volume.
    pub fn decode(&self) -> Option<ValueRange> {
        if self.min > self.max {
            return None;
        }
        Some(ValueRange::new(
            decode_orderable(self.min),
            decode_orderable(self.max),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let range = ValueRange::new(-1.0, 3.0);
        assert_eq!(range.normalize(-1.0), 0.0);
        assert_eq!(range.normalize(1.0), 0.5);
        assert_eq!(range.normalize(10.0), 1.0);
        assert_eq!(ValueRange::new(2.0, 2.0).normalize(2.0), 0.0);
    }

    #[test]
    fn test_orderable_encoding_preserves_order() {
        let values = [-1.0e9, -3.5, -0.0, 0.0, 1.0e-7, 0.25, 1.0, 255.0, 6.5e4];
        for pair in values.windows(2) {
            assert!(encode_orderable(pair[0]) <= encode_orderable(pair[1]));
        }
        for value in values {
            assert_eq!(decode_orderable(encode_orderable(value)), value);
        }
    }

    #[test]
    fn test_feedback_without_hits_is_none() {
        assert_eq!(RangeFeedback::RESET.decode(), None);
    }

    #[test]
    fn test_feedback_fold() {
        let mut feedback = RangeFeedback::RESET;
        for value in [0.3, -2.0, 7.5, 1.0] {
            feedback.fold(value);
        }
        assert_eq!(feedback.decode(), Some(ValueRange::new(-2.0, 7.5)));
    }

    #[test]
    fn test_from_samples_skips_nan() {
        let range = ValueRange::from_samples([f32::NAN, 2.0, -1.0]).unwrap();
        assert_eq!(range, ValueRange::new(-1.0, 2.0));
        assert!(ValueRange::from_samples(std::iter::empty()).is_none());
    }
}
