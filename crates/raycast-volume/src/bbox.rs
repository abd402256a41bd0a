use nalgebra_glm::Vec3;

/// Axis aligned box in object space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Vec3::zeros(),
            max: Vec3::zeros(),
        }
    }
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_origin_extents(origin: [f32; 3], extents: [f32; 3]) -> Self {
        let min = Vec3::from_row_slice(&origin);
        let max = min + Vec3::from_row_slice(&extents);
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: nalgebra_glm::min2(&self.min, &other.min),
            max: nalgebra_glm::max2(&self.max, &other.max),
        }
    }

    pub fn expanded(&self, padding: f32) -> BoundingBox {
        let pad = Vec3::new(padding, padding, padding);
        BoundingBox {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn diagonal(&self) -> f32 {
        self.size().norm()
    }

    pub fn contains(&self, point: &Vec3) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    /// Slab test. Returns the ray parameters where the ray enters and leaves the box, with the
    /// entry clamped to the ray origin.
    pub fn intersect_ray(&self, origin: &Vec3, direction: &Vec3) -> Option<(f32, f32)> {
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;
        for axis in 0..3 {
            if direction[axis].abs() < f32::EPSILON {
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction[axis];
            let t0 = (self.min[axis] - origin[axis]) * inv;
            let t1 = (self.max[axis] - origin[axis]) * inv;
            t_near = t_near.max(t0.min(t1));
            t_far = t_far.min(t0.max(t1));
        }
        if t_far < t_near || t_far < 0.0 {
            return None;
        }
        Some((t_near.max(0.0), t_far))
    }

    /// The 12 edges as a line list.
    pub fn edges(&self) -> [[f32; 3]; 24] {
        let (a, b) = (self.min, self.max);
        let corner = |x: bool, y: bool, z: bool| {
            [
                if x { b.x } else { a.x },
                if y { b.y } else { a.y },
                if z { b.z } else { a.z },
            ]
        };
        [
            // bottom
            corner(false, false, false),
            corner(true, false, false),
            corner(true, false, false),
            corner(true, false, true),
            corner(true, false, true),
            corner(false, false, true),
            corner(false, false, true),
            corner(false, false, false),
            // top
            corner(false, true, false),
            corner(true, true, false),
            corner(true, true, false),
            corner(true, true, true),
            corner(true, true, true),
            corner(false, true, true),
            corner(false, true, true),
            corner(false, true, false),
            // verticals
            corner(false, false, false),
            corner(false, true, false),
            corner(true, false, false),
            corner(true, true, false),
            corner(true, false, true),
            corner(true, true, true),
            corner(false, false, true),
            corner(false, true, true),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox {
        BoundingBox::from_origin_extents([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])
    }

    #[test]
    fn test_union() {
        let a = unit_box();
        let b = BoundingBox::from_origin_extents([-1.0, 0.5, 0.5], [1.0, 2.0, 0.1]);
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(u.max, Vec3::new(1.0, 2.5, 1.0));
        assert!(u.is_valid());
    }

    #[test]
    fn test_inverted_box_is_invalid() {
        let inverted = BoundingBox {
            min: Vec3::new(1.0, 0.0, 0.0),
            max: Vec3::new(0.0, 1.0, 1.0),
        };
        assert!(!inverted.is_valid());
    }

    #[test]
    fn test_intersect_ray_hits_through_center() {
        let (t_near, t_far) = unit_box()
            .intersect_ray(&Vec3::new(0.5, 0.5, -1.0), &Vec3::new(0.0, 0.0, 1.0))
            .unwrap();
        assert!((t_near - 1.0).abs() < 1e-6);
        assert!((t_far - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_intersect_ray_misses() {
        assert!(unit_box()
            .intersect_ray(&Vec3::new(2.0, 0.5, -1.0), &Vec3::new(0.0, 0.0, 1.0))
            .is_none());
        // box behind the origin
        assert!(unit_box()
            .intersect_ray(&Vec3::new(0.5, 0.5, 3.0), &Vec3::new(0.0, 0.0, 1.0))
            .is_none());
    }

    #[test]
    fn test_intersect_ray_from_inside() {
        let (t_near, t_far) = unit_box()
            .intersect_ray(&Vec3::new(0.5, 0.5, 0.5), &Vec3::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(t_near, 0.0);
        assert!((t_far - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_edges_lie_on_box() {
        let bbox = unit_box().expanded(0.5);
        for corner in bbox.edges() {
            assert!(bbox.contains(&Vec3::from_row_slice(&corner)));
        }
    }
}
