use glam::{Affine3A, Vec3};

/// Axis-aligned bounding box stored as center and half-extents.
///
/// This is the layout the culling buffer consumes directly; `min`/`max`
/// are derived on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    pub extents: Vec3,
}

impl Default for Bounds {
    /// Unit cube at the origin.
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            extents: Vec3::splat(0.5),
        }
    }
}

impl Bounds {
    #[must_use]
    pub fn new(center: Vec3, extents: Vec3) -> Self {
        Self { center, extents }
    }

    #[must_use]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            extents: (max - min) * 0.5,
        }
    }

    /// Degenerate box, culled as a point.
    #[must_use]
    pub fn point(position: Vec3) -> Self {
        Self {
            center: position,
            extents: Vec3::ZERO,
        }
    }

    #[inline]
    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    #[inline]
    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// Transforms local bounds into world space.
    ///
    /// The center is transformed as a point; world extents are `|M| * extents`
    /// where `|M|` is the component-wise absolute value of the linear part.
    /// The result is the tightest AABB around the transformed box.
    #[must_use]
    pub fn to_world(&self, matrix: &Affine3A) -> Self {
        let center = matrix.transform_point3(self.center);
        let m = matrix.matrix3;
        let extents = m.x_axis.abs() * self.extents.x
            + m.y_axis.abs() * self.extents.y
            + m.z_axis.abs() * self.extents.z;
        Self {
            center,
            extents: extents.into(),
        }
    }
}
