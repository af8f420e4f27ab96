//! Culling Tests
//!
//! Tests for:
//! - Box-vs-frustum classification of the SoA cull loop
//! - Submit / cull ordering (visibility is only computed by a cull)
//! - Slot reuse and accessor invalidation after release
//! - Culling through the camera-driven `CullingSystem`

use glam::{Affine3A, Mat4, Vec3, Vec4};

use lumen::culling::{CullStats, CullingBuffer, CullingBufferAccessor, CullingSystem};
use lumen::scene::bounds::Bounds;
use lumen::scene::camera::{Camera, Frustum};

/// Axis-aligned unit box `[-1, 1]^3` expressed as six inward planes.
fn unit_box_planes() -> [Vec4; 6] {
    [
        Vec4::new(1.0, 0.0, 0.0, 1.0),  // x >= -1
        Vec4::new(-1.0, 0.0, 0.0, 1.0), // x <= 1
        Vec4::new(0.0, 1.0, 0.0, 1.0),  // y >= -1
        Vec4::new(0.0, -1.0, 0.0, 1.0), // y <= 1
        Vec4::new(0.0, 0.0, 1.0, 1.0),  // z >= -1
        Vec4::new(0.0, 0.0, -1.0, 1.0), // z <= 1
    ]
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn camera_at_origin() -> Camera {
    // Looks down -Z
    Camera::new_perspective(60.0, 1.0, 0.1, 100.0)
}

// ============================================================================
// Frustum Test Correctness
// ============================================================================

#[test]
fn box_inside_all_planes_is_visible() {
    let mut buffer = CullingBuffer::new();
    let a = buffer.alloc();
    a.submit(&Bounds::new(Vec3::ZERO, Vec3::splat(0.5)));

    let stats = buffer.cull(&unit_box_planes());

    assert!(a.visible());
    assert_eq!(stats, CullStats { live: 1, visible: 1 });
}

#[test]
fn any_single_separating_plane_culls() {
    let planes = unit_box_planes();
    let mut buffer = CullingBuffer::new();

    // One object just beyond each face of the box
    let offsets = [
        Vec3::new(-1.6, 0.0, 0.0),
        Vec3::new(1.6, 0.0, 0.0),
        Vec3::new(0.0, -1.6, 0.0),
        Vec3::new(0.0, 1.6, 0.0),
        Vec3::new(0.0, 0.0, -1.6),
        Vec3::new(0.0, 0.0, 1.6),
    ];
    let accessors: Vec<CullingBufferAccessor> = offsets
        .iter()
        .map(|&center| {
            let acc = buffer.alloc();
            acc.submit(&Bounds::new(center, Vec3::splat(0.5)));
            acc
        })
        .collect();

    let stats = buffer.cull(&planes);

    assert_eq!(stats.live, 6);
    assert_eq!(stats.visible, 0);
    for acc in &accessors {
        assert!(!acc.visible(), "slot {} should be culled", acc.index());
    }
}

#[test]
fn box_straddling_a_plane_is_visible() {
    let mut buffer = CullingBuffer::new();
    let a = buffer.alloc();
    // Reaches from x = 0.5 to x = 1.5, crossing x = 1
    a.submit(&Bounds::new(Vec3::new(1.0, 0.0, 0.0), Vec3::splat(0.5)));

    buffer.cull(&unit_box_planes());
    assert!(a.visible());
}

#[test]
fn box_touching_a_plane_counts_as_inside() {
    let mut buffer = CullingBuffer::new();
    let a = buffer.alloc();
    // s == -r exactly on the +X plane
    a.submit(&Bounds::new(Vec3::new(1.5, 0.0, 0.0), Vec3::splat(0.5)));

    buffer.cull(&unit_box_planes());
    assert!(a.visible());
}

#[test]
fn zero_extents_behave_as_point_test() {
    let mut buffer = CullingBuffer::new();
    let inside = buffer.alloc();
    let outside = buffer.alloc();
    inside.submit(&Bounds::point(Vec3::new(0.99, 0.0, 0.0)));
    outside.submit(&Bounds::point(Vec3::new(1.01, 0.0, 0.0)));

    buffer.cull(&unit_box_planes());

    assert!(inside.visible());
    assert!(!outside.visible());
}

#[test]
fn soa_cull_agrees_with_scalar_frustum_test() {
    let camera = camera_at_origin();
    let frustum = camera.frustum();
    let mut buffer = CullingBuffer::new();

    let mut cases = Vec::new();
    for x in -6..=6 {
        for z in -12..=4 {
            let center = Vec3::new(x as f32 * 1.5, 0.25, z as f32 * 2.0);
            let extents = Vec3::new(0.5, 0.75, 1.0);
            let acc = buffer.alloc();
            acc.submit(&Bounds::new(center, extents));
            cases.push((acc, frustum.intersects_box(center, extents)));
        }
    }

    buffer.cull(frustum.planes());

    for (acc, expected) in &cases {
        assert_eq!(acc.visible(), *expected, "slot {}", acc.index());
    }
    assert!(cases.iter().any(|(_, v)| *v));
    assert!(cases.iter().any(|(_, v)| !*v));
}

// ============================================================================
// Submit / Cull Ordering
// ============================================================================

#[test]
fn submit_does_not_compute_visibility() {
    let mut buffer = CullingBuffer::new();
    let a = buffer.alloc();
    a.submit(&Bounds::new(Vec3::ZERO, Vec3::splat(0.1)));
    buffer.cull(&unit_box_planes());
    assert!(a.visible());

    // Move it far outside; the old bit stays until the next cull
    a.submit(&Bounds::new(Vec3::splat(50.0), Vec3::splat(0.1)));
    assert!(a.visible());

    buffer.cull(&unit_box_planes());
    assert!(!a.visible());
}

#[test]
fn set_bounds_by_index_matches_submit() {
    let mut buffer = CullingBuffer::new();
    let a = buffer.alloc();
    buffer.set_bounds(a.index(), &Bounds::new(Vec3::splat(50.0), Vec3::splat(0.1)));
    buffer.cull(&unit_box_planes());
    assert!(!a.visible());
    assert!(!buffer.visible(a.index()));
}

// ============================================================================
// Slot Reuse and Accessor Invalidation
// ============================================================================

#[test]
fn released_slot_is_reused_and_old_accessor_stays_disabled() {
    let mut buffer = CullingBuffer::new();
    let mut a = buffer.alloc();
    let index = a.index();

    buffer.release(&mut a);
    assert!(!a.is_enabled());

    let b = buffer.alloc();
    assert_eq!(b.index(), index, "released slot should be reused");
    b.submit(&Bounds::new(Vec3::ZERO, Vec3::splat(0.1)));

    // Writes through the stale accessor must not reach the new owner
    a.submit(&Bounds::new(Vec3::splat(50.0), Vec3::splat(0.1)));
    buffer.cull(&unit_box_planes());

    assert!(b.visible());
    assert!(!a.visible());
}

#[test]
fn double_release_is_a_no_op() {
    init_logging();
    let mut buffer = CullingBuffer::new();
    let mut a = buffer.alloc();
    let _b = buffer.alloc();

    buffer.release(&mut a);
    buffer.release(&mut a);

    assert_eq!(buffer.live_count(), 1);
    assert_eq!(buffer.slot_count(), 2);
}

#[test]
fn default_accessor_is_inert() {
    let acc = CullingBufferAccessor::default();
    acc.submit(&Bounds::default());
    assert!(!acc.visible());
    assert!(!acc.is_enabled());
}

#[test]
fn accessor_outliving_its_buffer_is_inert() {
    let mut buffer = CullingBuffer::new();
    let a = buffer.alloc();
    drop(buffer);
    a.submit(&Bounds::default());
    assert!(!a.visible());
}

#[test]
fn release_from_foreign_buffer_is_ignored() {
    init_logging();
    let mut first = CullingBuffer::new();
    let mut second = CullingBuffer::new();
    let mut a = first.alloc();

    second.release(&mut a);

    assert!(a.is_enabled());
    assert_eq!(first.live_count(), 1);
}

#[test]
fn empty_slots_are_skipped_without_touching_neighbours() {
    let mut buffer = CullingBuffer::new();
    let left = buffer.alloc();
    let mut middle = buffer.alloc();
    let right = buffer.alloc();

    left.submit(&Bounds::new(Vec3::ZERO, Vec3::splat(0.1)));
    right.submit(&Bounds::new(Vec3::splat(50.0), Vec3::splat(0.1)));
    buffer.release(&mut middle);

    let stats = buffer.cull(&unit_box_planes());

    assert_eq!(stats.live, 2);
    assert_eq!(stats.visible, 1);
    assert!(left.visible());
    assert!(!right.visible());
    assert!(!buffer.visible(middle.index()));
}

#[test]
fn free_list_is_lifo() {
    let mut buffer = CullingBuffer::new();
    let mut a = buffer.alloc();
    let mut b = buffer.alloc();
    let (ia, ib) = (a.index(), b.index());

    buffer.release(&mut a);
    buffer.release(&mut b);

    assert_eq!(buffer.alloc().index(), ib);
    assert_eq!(buffer.alloc().index(), ia);
    assert_eq!(buffer.slot_count(), 2);
}

// ============================================================================
// CullingSystem
// ============================================================================

#[test]
fn system_culls_with_camera_planes() {
    let mut system = CullingSystem::new(16);
    let front = system.buffer_mut().alloc();
    let behind = system.buffer_mut().alloc();
    front.submit(&Bounds::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE));
    behind.submit(&Bounds::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE));

    let stats = system.cull(&camera_at_origin());

    assert_eq!(stats, CullStats { live: 2, visible: 1 });
    assert_eq!(system.last_stats(), stats);
    assert!(front.visible());
    assert!(!behind.visible());
}

#[test]
fn system_follows_camera_movement() {
    let mut system = CullingSystem::new(4);
    let obj = system.buffer_mut().alloc();
    obj.submit(&Bounds::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE));

    let mut camera = camera_at_origin();
    system.cull(&camera);
    assert!(!obj.visible());

    camera.update_view_projection(&Affine3A::from_rotation_y(std::f32::consts::PI));
    system.cull(&camera);
    assert!(obj.visible());
}

#[test]
fn view_projection_and_frustum_entry_points_agree() {
    let vp = Mat4::perspective_rh(45.0_f32.to_radians(), 1.5, 0.5, 50.0)
        * Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);

    let mut system = CullingSystem::new(4);
    let obj = system.buffer_mut().alloc();
    obj.submit(&Bounds::new(Vec3::ZERO, Vec3::splat(0.5)));

    let a = system.cull_view_projection(vp);
    let b = system.cull_frustum(Frustum::from_matrix(vp));
    assert_eq!(a, b);
    assert!(obj.visible());
}
