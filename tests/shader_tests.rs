// SPDX-License-Identifier: GPL-3.0-only

//! Device-free validation tests for the preview shader sources

use std::io::Write;

use viewfinder::{ShaderError, ShaderSources, ShaderStageKind};

#[test]
fn test_builtin_sources_validate() {
    ShaderSources::builtin()
        .validate()
        .expect("shipped shader sources must validate");
}

#[test]
fn test_sources_load_from_files() {
    let dir = std::env::temp_dir().join("viewfinder-shader-tests");
    std::fs::create_dir_all(&dir).unwrap();

    let vertex_path = dir.join("vertex.wgsl");
    let fragment_path = dir.join("fragment.wgsl");
    let builtin = ShaderSources::builtin();
    std::fs::File::create(&vertex_path)
        .and_then(|mut f| f.write_all(builtin.vertex.as_bytes()))
        .unwrap();
    std::fs::File::create(&fragment_path)
        .and_then(|mut f| f.write_all(builtin.fragment.as_bytes()))
        .unwrap();

    let loaded = ShaderSources::load(&vertex_path, &fragment_path).expect("assets readable");
    loaded.validate().expect("loaded sources must validate");
}

#[test]
fn test_missing_asset_is_fatal() {
    let missing = std::path::Path::new("/nonexistent/viewfinder/vertex.wgsl");
    let err = ShaderSources::load(missing, missing).unwrap_err();
    match err {
        ShaderError::AssetRead { name, .. } => assert!(name.contains("vertex.wgsl")),
        other => panic!("expected an asset read error, got {:?}", other),
    }
}

#[test]
fn test_broken_fragment_reports_its_own_stage() {
    let sources = ShaderSources {
        vertex: ShaderSources::builtin().vertex,
        fragment: "@fragment fn fs_main() -> { broken }".to_string(),
    };
    match sources.validate() {
        Err(ShaderError::Compile { stage, log }) => {
            assert_eq!(stage, ShaderStageKind::Fragment);
            assert!(!log.is_empty());
        }
        other => panic!("expected a fragment compile error, got {:?}", other),
    }
}

#[test]
fn test_type_error_surfaces_in_diagnostic() {
    // Parses but fails validation: the entry point returns the wrong type.
    let vertex = r#"
        @vertex
        fn vs_main(@location(0) position: vec3<f32>,
                   @location(1) tex_coord: vec2<f32>) -> @builtin(position) vec4<f32> {
            return position;
        }
    "#;
    let sources = ShaderSources {
        vertex: vertex.to_string(),
        fragment: ShaderSources::builtin().fragment,
    };
    assert!(matches!(
        sources.validate(),
        Err(ShaderError::Compile {
            stage: ShaderStageKind::Vertex,
            ..
        })
    ));
}
