//! Snippet Resolution Tests
//!
//! Tests for:
//! - Generated source does not depend on the host's working directory

mod common;

use std::fs;

use shadegraph::{
    CompilerSettings, Fingerprint, LightConfig, LightKind, RenderStateConfig, ShaderManager,
};

fn fragment_text(config: &RenderStateConfig) -> String {
    let mut manager = ShaderManager::new(CompilerSettings::default()).unwrap();
    manager.program_for(config).unwrap();
    manager.sources(&Fingerprint::of(config)).unwrap().fragment.text.clone()
}

// ============================================================================
// Working directory independence
// ============================================================================

// Only test in this binary: it changes the process working directory.
#[test]
fn host_shader_files_are_not_picked_up() {
    common::init_logger();
    let config = RenderStateConfig {
        lights: vec![LightConfig { kind: LightKind::Point, casts_shadow: false }],
        ..Default::default()
    };
    let before = fragment_text(&config);

    let host = std::env::temp_dir().join(format!("shadegraph_host_{}", std::process::id()));
    let shaders = host.join("src").join("shaders");
    fs::create_dir_all(&shaders).unwrap();
    fs::write(shaders.join("lighting.glsl"), "HOST_PROJECT_LIGHTING").unwrap();

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(&host).unwrap();
    let after = fragment_text(&config);
    std::env::set_current_dir(original).unwrap();
    let _ = fs::remove_dir_all(&host);

    assert!(!after.contains("HOST_PROJECT_LIGHTING"));
    assert_eq!(before, after);
}
