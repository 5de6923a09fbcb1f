//! Program Cache & Lifecycle Tests
//!
//! Tests for:
//! - One link per distinct fingerprint, also across threads
//! - Link and compile failures leave the variant unusable without relinking
//! - Driver errors after program creation release the program object
//! - Inactive uniforms are filtered out of the location cache
//! - Sentinel programs are skipped
//! - Invalidation after context loss relinks on next use

mod common;

use std::sync::Arc;
use std::thread;

use common::MockDriver;
use shadegraph::{
    ApplyOutcome, CompilerSettings, DriverError, Fingerprint, LightConfig, LightKind,
    ProgramStatus, RenderStateConfig, ShaderGraphError, ShaderManager, SkinningConfig,
    UniformValue, VertexStreams,
};

fn manager() -> ShaderManager {
    common::init_logger();
    ShaderManager::new(CompilerSettings::default()).unwrap()
}

fn lit() -> RenderStateConfig {
    RenderStateConfig {
        lights: vec![LightConfig { kind: LightKind::Point, casts_shadow: false }],
        ..Default::default()
    }
}

fn skinned(bone_count: u32) -> RenderStateConfig {
    RenderStateConfig {
        skinning: Some(SkinningConfig { bone_count }),
        ..Default::default()
    }
}

// ============================================================================
// Link accounting
// ============================================================================

#[test]
fn each_fingerprint_links_once() {
    let mut manager = manager();
    let mut driver = MockDriver::new();

    for _ in 0..3 {
        for config in [RenderStateConfig::default(), lit(), skinned(16)] {
            let id = manager.program_for(&config).unwrap();
            assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Bound);
        }
    }

    assert_eq!(driver.link_calls, 3);
    assert_eq!(driver.compile_calls, 6);
    assert_eq!(manager.cache().program_count(), 3);
}

#[test]
fn bone_counts_are_distinct_variants() {
    let mut manager = manager();
    let a = manager.program_for(&skinned(16)).unwrap();
    let b = manager.program_for(&skinned(32)).unwrap();
    assert_ne!(a, b);
    assert!(manager.program(b).unwrap().vertex_source().contains("uBones[96]"));
}

#[test]
fn shared_manager_builds_once_across_threads() {
    let shared = manager().into_shared();
    let config = lit();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = Arc::clone(&shared);
            let config = config.clone();
            thread::spawn(move || shared.lock().program_for(&config).unwrap())
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let mut manager = shared.lock();
    assert_eq!(manager.cache().program_count(), 1);

    let mut driver = MockDriver::new();
    for id in ids {
        assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Bound);
    }
    assert_eq!(driver.link_calls, 1);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn link_failure_is_unusable_and_not_retried() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    driver.fail_link = true;

    let id = manager.program_for(&lit()).unwrap();
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Unusable);
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Unusable);

    assert_eq!(driver.link_calls, 1);
    assert_eq!(driver.deleted_programs, 1);
    assert_eq!(driver.current, None);
    assert_eq!(manager.program(id).unwrap().status(), ProgramStatus::Failed);

    // Other variants are unaffected.
    driver.fail_link = false;
    let other = manager.program_for(&RenderStateConfig::default()).unwrap();
    assert_eq!(manager.apply(other, &mut driver).unwrap(), ApplyOutcome::Bound);
}

#[test]
fn compile_failure_is_unusable() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    driver.failing_sources.push("computePointLight".into());

    let id = manager.program_for(&lit()).unwrap();
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Unusable);
    assert_eq!(driver.link_calls, 0);
    assert_eq!(manager.program(id).unwrap().status(), ProgramStatus::Failed);
}

#[test]
fn link_failure_keeps_previous_program_bound_and_reports_sources() {
    let mut manager = manager();
    let mut driver = MockDriver::new();

    let base = manager.program_for(&RenderStateConfig::default()).unwrap();
    assert_eq!(manager.apply(base, &mut driver).unwrap(), ApplyOutcome::Bound);
    let bound = driver.current;
    assert!(bound.is_some());

    driver.fail_link = true;
    let id = manager.program_for(&lit()).unwrap();
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Unusable);
    assert_eq!(driver.current, bound);

    let program = manager.program(id).unwrap();
    let report = program.failure_log().unwrap();
    assert!(report.contains("failed to link"));
    assert!(report.contains(program.vertex_source()));
    assert!(report.contains(program.fragment_source()));
    assert!(manager.program(base).unwrap().failure_log().is_none());
}

#[test]
fn driver_error_after_create_deletes_program() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    driver.fail_attach = true;

    let id = manager.program_for(&lit()).unwrap();
    let err = manager.apply(id, &mut driver).unwrap_err();
    assert!(matches!(err, ShaderGraphError::Driver(DriverError::OutOfMemory)));
    assert_eq!(driver.created_programs, 1);
    assert_eq!(driver.deleted_programs, 1);
    assert!(manager.program(id).unwrap().handle().is_none());

    // The error is not a link failure: the next apply retries.
    driver.fail_attach = false;
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Bound);
    assert_eq!(driver.created_programs, 2);
    assert_eq!(driver.deleted_programs, 1);
}

#[test]
fn context_loss_during_link_propagates() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    driver.context_lost = true;

    let id = manager.program_for(&lit()).unwrap();
    let err = manager.apply(id, &mut driver).unwrap_err();
    assert!(matches!(err, ShaderGraphError::Driver(DriverError::ContextLost)));
}

// ============================================================================
// Introspection
// ============================================================================

#[test]
fn inactive_uniforms_are_filtered() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    driver.inactive.insert("uLight0_color".into());

    let id = manager.program_for(&lit()).unwrap();
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Bound);

    let program = manager.program(id).unwrap();
    assert!(driver.queried_uniforms.iter().any(|n| n == "uLight0_color"));
    assert!(program.uniform_location("uLight0_color").is_none());
    assert!(program.uniform_location("uLight0_position").is_some());
    assert!(program.uniform_location("uProjectionMatrix").is_some());
    assert!(program.attribute_location("Normal").is_some());

    let uploaded = program
        .set_uniform(&mut driver, "uLight0_color", &UniformValue::Vec3([1.0; 3]))
        .unwrap();
    assert!(!uploaded);
    let uploaded = program
        .set_uniform(&mut driver, "uLight0_position", &UniformValue::Vec3([0.0; 3]))
        .unwrap();
    assert!(uploaded);
    assert_eq!(driver.uploads.len(), 1);
}

#[test]
fn uniform_names_are_unique() {
    let mut manager = manager();
    let mut driver = MockDriver::new();

    let id = manager.program_for(&lit()).unwrap();
    let _ = manager.apply(id, &mut driver).unwrap();

    let names: Vec<&str> = manager.program(id).unwrap().uniform_names().collect();
    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(names.len(), unique.len());
}

// ============================================================================
// Sentinel and lifecycle
// ============================================================================

#[test]
fn sentinel_is_skipped() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    let config = RenderStateConfig {
        vertex_streams: VertexStreams::empty(),
        ..Default::default()
    };

    let id = manager.program_for(&config).unwrap();
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Skipped);
    assert_eq!(driver.link_calls, 0);
    assert_eq!(manager.cache().fingerprint_count(), 1);
    assert_eq!(manager.cache().program_count(), 0);
}

#[test]
fn invalidate_relinks_on_next_apply() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    let id = manager.program_for(&lit()).unwrap();

    let _ = manager.apply(id, &mut driver).unwrap();
    manager.invalidate_all();
    assert!(manager.program(id).unwrap().is_dirty());
    assert!(manager.program(id).unwrap().uniform_location("uLight0_color").is_none());

    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Bound);
    assert_eq!(driver.link_calls, 2);
    assert_eq!(manager.program(id).unwrap().status(), ProgramStatus::Linked);
    assert!(manager.program(id).unwrap().uniform_location("uLight0_color").is_some());
}

#[test]
fn invalidate_gives_failed_programs_another_try() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    driver.fail_link = true;
    let id = manager.program_for(&lit()).unwrap();
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Unusable);

    driver.fail_link = false;
    manager.invalidate_all();
    assert_eq!(manager.apply(id, &mut driver).unwrap(), ApplyOutcome::Bound);
}

#[test]
fn release_deletes_driver_objects() {
    let mut manager = manager();
    let mut driver = MockDriver::new();
    let id = manager.program_for(&lit()).unwrap();
    let _ = manager.apply(id, &mut driver).unwrap();

    manager.release_all(&mut driver).unwrap();
    assert_eq!(driver.deleted_programs, 1);
    assert!(manager.program(id).unwrap().handle().is_none());
}

#[test]
fn uniform_blocks_are_shared_between_programs() {
    let mut manager = manager();
    let a = manager.uniform_blocks(&skinned(8));
    let b = manager.uniform_blocks(&RenderStateConfig {
        lights: lit().lights,
        ..skinned(8)
    });
    assert!(Arc::ptr_eq(&a[0], &b[0]));
    assert_eq!(b.len(), 2);
}

#[test]
fn sources_are_memoized_per_fingerprint() {
    let mut manager = manager();
    let config = lit();
    manager.program_for(&config).unwrap();
    let a = manager.sources(&Fingerprint::of(&config)).unwrap();
    let b = manager.sources(&Fingerprint::of(&config)).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}
