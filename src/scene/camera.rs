use std::borrow::Cow;

use glam::{Affine3A, Mat4, Vec3, Vec4};

/// Camera providing the view-projection matrix consumed by culling.
///
/// Matrices are cached and recomputed by
/// [`update_projection_matrix`](Self::update_projection_matrix) and
/// [`update_view_projection`](Self::update_view_projection); both also
/// refresh the cached [`Frustum`].
#[derive(Debug, Clone)]
pub struct Camera {
    pub name: Cow<'static, str>,

    // === Projection ===
    pub projection_type: ProjectionType,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Half height of the orthographic volume.
    pub ortho_size: f32,

    // Cached matrices, read-only outside of this module
    world_matrix: Affine3A,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

impl Camera {
    /// `fov` is given in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::empty(ProjectionType::Perspective, aspect, near, far);
        cam.fov = fov.to_radians();
        cam.update_projection_matrix();
        cam
    }

    #[must_use]
    pub fn new_orthographic(ortho_size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::empty(ProjectionType::Orthographic, aspect, near, far);
        cam.ortho_size = ortho_size;
        cam.update_projection_matrix();
        cam
    }

    fn empty(projection_type: ProjectionType, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            name: Cow::Borrowed("Camera"),
            projection_type,
            fov: 60.0_f32.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,
            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            // Depth range [0, 1]
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };

        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    /// Places the camera. The view matrix is the inverse of `world_transform`.
    pub fn update_view_projection(&mut self, world_transform: &Affine3A) {
        self.world_matrix = *world_transform;
        self.view_matrix = Mat4::from(*world_transform).inverse();
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.world_matrix.translation.into()
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}

/// Six world-space clip planes: Left, Right, Bottom, Top, Near, Far.
///
/// Each plane is `(normal.xyz, d)` with a unit normal pointing **into** the
/// frustum, so a point `p` is inside a plane when `dot(normal, p) + d >= 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const TOP: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    /// Gribb-Hartmann extraction from a column-major view-projection matrix
    /// with a `[0, 1]` clip depth range.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0], // Left
            rows[3] - rows[0], // Right
            rows[3] + rows[1], // Bottom
            rows[3] - rows[1], // Top
            rows[2],           // Near
            rows[3] - rows[2], // Far
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// Builds a frustum from already-normalized planes.
    #[must_use]
    pub fn from_planes(planes: [Vec4; 6]) -> Self {
        Self { planes }
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Scalar box test: the box is rejected as soon as one plane has it
    /// entirely on its outer side (`s < -r`).
    #[must_use]
    pub fn intersects_box(&self, center: Vec3, extents: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let r = extents.dot(normal.abs());
            let s = normal.dot(center) + plane.w;
            s >= -r
        })
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }
}
