//! Render State Cache Tests
//!
//! Tests for:
//! - Redundant bind elision and `set_all_dirty`
//! - Vertex array → element-array dirtiness
//! - Generic / indexed buffer bindings
//! - Deletion semantics
//! - Mirror verification against the driver
//! - Frame-end validation on the render context

use std::rc::Rc;

use lumen::errors::LumenError;
use lumen::renderer::driver::{
    BufferId, BufferTarget, FramebufferId, GpuDriver, HeadlessDriver,
};
use lumen::renderer::state::RenderState;
use lumen::renderer::{CoreSettings, RenderContext};

fn setup() -> (Rc<HeadlessDriver>, RenderState) {
    let _ = env_logger::builder().is_test(true).try_init();
    let gpu = Rc::new(HeadlessDriver::new());
    let state = RenderState::new(gpu.clone(), 12);
    (gpu, state)
}

// ============================================================================
// Redundant Bind Elision
// ============================================================================

#[test]
fn second_bind_of_same_shader_is_elided() {
    let (gpu, mut state) = setup();
    let shader = gpu.create_shader();

    let first = state.bind_shader(shader);
    let second = state.bind_shader(shader);

    assert_eq!((first, second), (true, false));
    assert_eq!(gpu.counters().program_binds, 1);
}

#[test]
fn set_all_dirty_forces_rebind() {
    let (gpu, mut state) = setup();
    let shader = gpu.create_shader();
    state.bind_shader(shader);

    state.set_all_dirty();

    assert!(state.bind_shader(shader));
    assert_eq!(gpu.counters().program_binds, 2);
}

#[test]
fn binding_a_different_handle_is_issued() {
    let (gpu, mut state) = setup();
    let a = gpu.create_shader();
    let b = gpu.create_shader();
    assert!(state.bind_shader(a));
    assert!(state.bind_shader(b));
    assert!(state.bind_shader(a));
    assert_eq!(gpu.current_program(), a);
}

#[test]
fn framebuffer_binds_are_elided() {
    let (gpu, mut state) = setup();
    let fb = gpu.create_framebuffer();
    assert!(state.bind_framebuffer(fb));
    assert!(!state.bind_framebuffer(fb));
    assert!(state.bind_framebuffer(FramebufferId::NONE));
    assert_eq!(gpu.counters().framebuffer_binds, 2);
}

// ============================================================================
// Vertex Arrays and Element Arrays
// ============================================================================

#[test]
fn binding_vertex_array_dirties_element_array() {
    let (gpu, mut state) = setup();
    let vao_a = gpu.create_vertex_array();
    let vao_b = gpu.create_vertex_array();
    let ibo = gpu.create_buffer();

    state.bind_vertex_array(vao_a);
    assert!(state.bind_buffer(BufferTarget::ElementArray, ibo));
    assert!(!state.bind_buffer(BufferTarget::ElementArray, ibo));

    state.bind_vertex_array(vao_b);
    assert_eq!(state.buffer(BufferTarget::ElementArray), None);
    assert!(state.bind_buffer(BufferTarget::ElementArray, ibo));
    assert!(state.check_state_machine().is_ok());
}

#[test]
fn redundant_vertex_array_bind_keeps_element_array_clean() {
    let (gpu, mut state) = setup();
    let vao = gpu.create_vertex_array();
    let ibo = gpu.create_buffer();

    state.bind_vertex_array(vao);
    state.bind_buffer(BufferTarget::ElementArray, ibo);
    assert!(!state.bind_vertex_array(vao));
    assert_eq!(state.buffer(BufferTarget::ElementArray), Some(ibo));
}

// ============================================================================
// Generic and Indexed Buffer Bindings
// ============================================================================

#[test]
fn buffer_base_also_updates_generic_binding() {
    let (gpu, mut state) = setup();
    let ubo = gpu.create_buffer();

    assert!(state.bind_buffer_base(BufferTarget::Uniform, 2, ubo).unwrap());
    assert!(!state.bind_buffer_base(BufferTarget::Uniform, 2, ubo).unwrap());

    // The generic record already mirrors the side effect
    assert!(!state.bind_buffer(BufferTarget::Uniform, ubo));
    assert_eq!(gpu.counters().buffer_base_binds, 1);
    assert_eq!(gpu.counters().buffer_binds, 0);
    assert!(state.check_state_machine().is_ok());
}

#[test]
fn indexed_slots_are_independent() {
    let (gpu, mut state) = setup();
    let a = gpu.create_buffer();
    let b = gpu.create_buffer();

    assert!(state.bind_buffer_base(BufferTarget::ShaderStorage, 0, a).unwrap());
    assert!(state.bind_buffer_base(BufferTarget::ShaderStorage, 1, b).unwrap());
    assert!(!state.bind_buffer_base(BufferTarget::ShaderStorage, 0, a).unwrap());

    assert_eq!(state.buffer_base(BufferTarget::ShaderStorage, 0), Some(a));
    assert_eq!(state.buffer_base(BufferTarget::ShaderStorage, 1), Some(b));
    assert_eq!(state.buffer(BufferTarget::ShaderStorage), Some(b));
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn delete_buffer_clears_matching_record() {
    let (gpu, mut state) = setup();
    let vbo = gpu.create_buffer();
    state.bind_buffer(BufferTarget::Array, vbo);

    state.delete_buffer(BufferTarget::Array, vbo);

    assert_eq!(state.buffer(BufferTarget::Array), None);
    assert!(state.bind_buffer(BufferTarget::Array, BufferId::NONE));
    assert!(gpu.current_buffer(BufferTarget::Array).is_none());
}

#[test]
fn delete_buffer_marks_target_dirty_even_when_unrelated() {
    let (gpu, mut state) = setup();
    let bound = gpu.create_buffer();
    let other = gpu.create_buffer();
    state.bind_buffer(BufferTarget::Array, bound);

    state.delete_buffer(BufferTarget::Array, other);

    // Still the same value, but the next bind is re-issued
    assert!(state.bind_buffer(BufferTarget::Array, bound));
    assert!(state.check_state_machine().is_ok());
}

#[test]
fn delete_buffer_clears_indexed_slots() {
    let (gpu, mut state) = setup();
    let ubo = gpu.create_buffer();
    state.bind_buffer_base(BufferTarget::Uniform, 4, ubo).unwrap();

    state.delete_buffer(BufferTarget::Uniform, ubo);

    assert_eq!(state.buffer_base(BufferTarget::Uniform, 4), None);
    assert!(state.check_state_machine().is_ok());
}

#[test]
fn delete_shader_and_vertex_array() {
    let (gpu, mut state) = setup();
    let shader = gpu.create_shader();
    let vao = gpu.create_vertex_array();
    state.bind_shader(shader);
    state.bind_vertex_array(vao);

    state.delete_shader(shader);
    state.delete_vertex_array(vao);

    assert_eq!(state.shader(), None);
    assert_eq!(state.vertex_array(), None);
    assert!(gpu.current_program().is_none());
    assert!(gpu.current_vertex_array().is_none());
}

// ============================================================================
// State Machine Verification
// ============================================================================

#[test]
fn check_passes_when_everything_went_through_the_cache() {
    let (gpu, mut state) = setup();
    state.bind_shader(gpu.create_shader());
    state.bind_vertex_array(gpu.create_vertex_array());
    state.bind_buffer(BufferTarget::Array, gpu.create_buffer());
    state.bind_buffer_base(BufferTarget::Uniform, 0, gpu.create_buffer()).unwrap();
    state.bind_framebuffer(gpu.create_framebuffer());

    assert!(state.check_state_machine().is_ok());
}

#[test]
fn check_detects_out_of_band_driver_mutation() {
    let (gpu, mut state) = setup();
    let ours = gpu.create_shader();
    let theirs = gpu.create_shader();
    state.bind_shader(ours);

    // Someone talks to the driver directly
    gpu.use_program(theirs);

    match state.check_state_machine() {
        Err(LumenError::StateMismatch {
            category,
            mirrored,
            actual,
        }) => {
            assert_eq!(category, "shader");
            assert_eq!(mirrored, ours.raw());
            assert_eq!(actual, theirs.raw());
        }
        other => panic!("expected StateMismatch, got {other:?}"),
    }

    // Dirty records are not checked
    state.set_all_dirty();
    assert!(state.check_state_machine().is_ok());
}

#[test]
fn check_detects_indexed_mismatch() {
    let (gpu, mut state) = setup();
    let a = gpu.create_buffer();
    let b = gpu.create_buffer();
    state.bind_buffer_base(BufferTarget::Uniform, 3, a).unwrap();

    gpu.bind_buffer_base(BufferTarget::Uniform, 3, b);

    let err = state.check_state_machine().unwrap_err();
    assert!(matches!(err, LumenError::StateMismatch { .. }));
}

// ============================================================================
// Frame-End Validation
// ============================================================================

#[test]
fn end_frame_validates_when_enabled() {
    let _ = env_logger::builder().is_test(true).try_init();
    let gpu = Rc::new(HeadlessDriver::new());
    let settings = CoreSettings {
        validate_state_machine: true,
        ..CoreSettings::default()
    };
    let mut ctx = RenderContext::new(gpu.clone(), settings).unwrap();

    ctx.begin_frame();
    let shader = gpu.create_shader();
    ctx.state_mut().bind_shader(shader);
    assert!(ctx.end_frame().is_ok());

    ctx.begin_frame();
    ctx.state_mut().bind_shader(shader);
    gpu.use_program(gpu.create_shader());
    assert!(matches!(ctx.end_frame(), Err(LumenError::StateMismatch { .. })));

    // The mirror was reset regardless, so the next frame starts clean
    ctx.begin_frame();
    assert!(ctx.state_mut().bind_shader(shader));
    assert!(ctx.end_frame().is_ok());
}

#[test]
fn end_frame_without_validation_ignores_drift() {
    let gpu = Rc::new(HeadlessDriver::new());
    let mut ctx = RenderContext::new(gpu.clone(), CoreSettings::default()).unwrap();

    ctx.begin_frame();
    ctx.state_mut().bind_shader(gpu.create_shader());
    gpu.use_program(gpu.create_shader());
    assert!(ctx.end_frame().is_ok());
    assert_eq!(ctx.state().shader(), None);
}
