// SPDX-License-Identifier: GPL-3.0-only

//! Shader program compilation, validation, and pipeline linking
//!
//! The two WGSL stages are compiled and validated independently so that a
//! broken stage reports its own diagnostic, then linked into one render
//! pipeline. All of this happens once at startup; a failure here is fatal
//! and the render loop never starts.

use crate::constants::shader_interface as iface;
use crate::errors::{ShaderError, ShaderStageKind};
use crate::render::geometry::QuadVertex;
use std::path::Path;
use tracing::{debug, info};

/// Uniform block shared with the fragment stage
///
/// `show_effect` is a float flag (1.0 or 0.0) so the block stays a plain
/// 16-byte bag of floats.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EffectParams {
    pub time: f32,
    pub show_effect: f32,
    pub _pad: [f32; 2],
}

impl EffectParams {
    /// Uniform values for one draw: accumulated time plus the effect flag
    /// mapped to the float the fragment stage tests against
    pub fn new(time: f32, effect_enabled: bool) -> Self {
        Self {
            time,
            show_effect: if effect_enabled { 1.0 } else { 0.0 },
            _pad: [0.0; 2],
        }
    }
}

/// The two WGSL stage sources, loaded as UTF-8 text
#[derive(Debug)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    /// The sources shipped with the crate
    pub fn builtin() -> Self {
        Self {
            vertex: include_str!("preview_vertex.wgsl").to_string(),
            fragment: include_str!("preview_fragment.wgsl").to_string(),
        }
    }

    /// Load both stage assets from files; a missing or unreadable asset is
    /// a fatal startup error
    pub fn load(vertex_path: &Path, fragment_path: &Path) -> Result<Self, ShaderError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|e| ShaderError::AssetRead {
                name: path.display().to_string(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            vertex: read(vertex_path)?,
            fragment: read(fragment_path)?,
        })
    }

    /// Compile-check both stages and their required interface without
    /// touching the GPU
    pub fn validate(&self) -> Result<(), ShaderError> {
        let vertex = validate_stage(&self.vertex, ShaderStageKind::Vertex)?;
        let fragment = validate_stage(&self.fragment, ShaderStageKind::Fragment)?;
        check_vertex_interface(&vertex)?;
        check_fragment_interface(&fragment)?;
        Ok(())
    }
}

/// A linked preview pipeline plus the bind group layout its resources use
pub struct ShaderProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
}

impl ShaderProgram {
    /// Compile both stages, resolve the required interface, and link them
    /// into a render pipeline targeting `surface_format`
    pub fn compile(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        sources: &ShaderSources,
    ) -> Result<Self, ShaderError> {
        let vertex_ir = validate_stage(&sources.vertex, ShaderStageKind::Vertex)?;
        let fragment_ir = validate_stage(&sources.fragment, ShaderStageKind::Fragment)?;
        check_vertex_interface(&vertex_ir)?;
        check_fragment_interface(&fragment_ir)?;
        debug!("Shader stages validated");

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewfinder vertex shader"),
            source: wgpu::ShaderSource::Wgsl(sources.vertex.as_str().into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewfinder fragment shader"),
            source: wgpu::ShaderSource::Wgsl(sources.fragment.as_str().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("viewfinder preview bind group layout"),
            entries: &[
                // frame texture
                wgpu::BindGroupLayoutEntry {
                    binding: iface::FRAME_TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // sampler
                wgpu::BindGroupLayoutEntry {
                    binding: iface::FRAME_SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // time / effect uniform
                wgpu::BindGroupLayoutEntry {
                    binding: iface::EFFECT_PARAMS_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewfinder preview pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Pipeline creation is the link step: stage interface mismatches
        // surface here as validation errors, captured via an error scope.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("viewfinder preview pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: iface::VERTEX_ENTRY_POINT,
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: iface::FRAGMENT_ENTRY_POINT,
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::Link {
                log: err.to_string(),
            });
        }

        info!(format = ?surface_format, "Shader program linked");

        Ok(Self {
            pipeline,
            bind_group_layout,
        })
    }
}

/// Parse and validate one WGSL stage, rendering diagnostics against the
/// source on failure
fn validate_stage(source: &str, stage: ShaderStageKind) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        stage,
        log: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Compile {
        stage,
        log: e.emit_to_string(source),
    })?;

    Ok(module)
}

/// The vertex stage must expose `vs_main` taking the quad attributes at
/// their fixed locations
fn check_vertex_interface(module: &naga::Module) -> Result<(), ShaderError> {
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex && ep.name == iface::VERTEX_ENTRY_POINT)
        .ok_or(ShaderError::MissingEntryPoint {
            stage: ShaderStageKind::Vertex,
            name: iface::VERTEX_ENTRY_POINT,
        })?;

    let locations = input_locations(module, entry);
    for (name, location) in [
        ("position", iface::POSITION_LOCATION),
        ("tex_coord", iface::TEX_COORD_LOCATION),
    ] {
        if !locations.contains(&location) {
            return Err(ShaderError::MissingAttribute { name, location });
        }
    }
    Ok(())
}

/// The fragment stage must expose `fs_main` plus the texture, sampler, and
/// uniform bindings the renderer feeds
fn check_fragment_interface(module: &naga::Module) -> Result<(), ShaderError> {
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.stage == naga::ShaderStage::Fragment && ep.name == iface::FRAGMENT_ENTRY_POINT)
    {
        return Err(ShaderError::MissingEntryPoint {
            stage: ShaderStageKind::Fragment,
            name: iface::FRAGMENT_ENTRY_POINT,
        });
    }

    let bound: Vec<(u32, u32)> = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| var.binding.as_ref().map(|b| (b.group, b.binding)))
        .collect();

    for (name, binding) in [
        ("frame_texture", iface::FRAME_TEXTURE_BINDING),
        ("frame_sampler", iface::FRAME_SAMPLER_BINDING),
        ("effect_params", iface::EFFECT_PARAMS_BINDING),
    ] {
        if !bound.contains(&(iface::PREVIEW_BIND_GROUP, binding)) {
            return Err(ShaderError::MissingBinding {
                name,
                group: iface::PREVIEW_BIND_GROUP,
                binding,
            });
        }
    }
    Ok(())
}

/// Collect the input attribute locations of an entry point, walking through
/// struct arguments
fn input_locations(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<u32> {
    let mut locations = Vec::new();
    for arg in &entry.function.arguments {
        match &arg.binding {
            Some(naga::Binding::Location { location, .. }) => locations.push(*location),
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                if let naga::TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
                    for member in members {
                        if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                            locations.push(*location);
                        }
                    }
                }
            }
        }
    }
    locations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sources_validate() {
        ShaderSources::builtin()
            .validate()
            .expect("shipped shaders must validate");
    }

    #[test]
    fn test_uniform_block_is_16_bytes() {
        assert_eq!(std::mem::size_of::<EffectParams>(), 16);
    }

    #[test]
    fn test_invalid_vertex_source_reports_stage() {
        let sources = ShaderSources {
            vertex: "this is not wgsl".to_string(),
            fragment: ShaderSources::builtin().fragment,
        };
        match sources.validate() {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStageKind::Vertex);
                assert!(!log.is_empty(), "diagnostic log must not be empty");
            }
            other => panic!("expected a vertex compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_entry_point_detected() {
        let sources = ShaderSources {
            vertex: "@vertex fn other_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }"
                .to_string(),
            fragment: ShaderSources::builtin().fragment,
        };
        assert!(matches!(
            sources.validate(),
            Err(ShaderError::MissingEntryPoint {
                stage: ShaderStageKind::Vertex,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_binding_detected() {
        let fragment = r#"
            struct FragmentInput {
                @location(0) tex_coord: vec2<f32>,
            };
            @group(0) @binding(0) var frame_texture: texture_2d<f32>;
            @group(0) @binding(1) var frame_sampler: sampler;
            @fragment
            fn fs_main(frag: FragmentInput) -> @location(0) vec4<f32> {
                return textureSample(frame_texture, frame_sampler, frag.tex_coord);
            }
        "#;
        let sources = ShaderSources {
            vertex: ShaderSources::builtin().vertex,
            fragment: fragment.to_string(),
        };
        assert!(matches!(
            sources.validate(),
            Err(ShaderError::MissingBinding { binding: 2, .. })
        ));
    }

    #[test]
    fn test_missing_attribute_detected() {
        let vertex = r#"
            @vertex
            fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position, 1.0);
            }
        "#;
        let sources = ShaderSources {
            vertex: vertex.to_string(),
            fragment: ShaderSources::builtin().fragment,
        };
        assert!(matches!(
            sources.validate(),
            Err(ShaderError::MissingAttribute { location: 1, .. })
        ));
    }
}
