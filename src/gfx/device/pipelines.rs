//! Lazily created render pipelines
//!
//! A linked program owns its shader modules and layouts; the concrete
//! pipelines depend on how it is drawn (topology, depth writes) and are only
//! built the first time a draw needs them.

use std::collections::HashMap;

use wgpu::*;

use super::{reflect::ProgramLayout, ProgramId, Topology};
use crate::wgpu_utils::binding_types;

/// Everything that selects a distinct pipeline
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramId,
    pub topology: Topology,
    pub depth_write: bool,
}

/// GPU-side objects of one linked program
pub struct ProgramModules {
    pub label: String,
    pub vertex: ShaderModule,
    pub fragment: ShaderModule,
    pub bind_group_layout: BindGroupLayout,
    pub pipeline_layout: PipelineLayout,
}

impl ProgramModules {
    pub fn new(
        device: &Device,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
        layout: &ProgramLayout,
    ) -> Self {
        let vertex = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(&format!("{} vertex", label)),
            source: ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(&format!("{} fragment", label)),
            source: ShaderSource::Wgsl(fragment_source.into()),
        });

        let mut entries = Vec::new();
        if let Some(binding) = layout.uniform_binding {
            entries.push(binding_types::entry(
                binding,
                binding_types::uniform_dynamic(layout.uniform_size),
            ));
        }
        for (_, binding) in layout.texture_slots() {
            entries.push(binding_types::entry(binding, binding_types::texture_cube()));
        }
        for &binding in &layout.sampler_bindings {
            entries.push(binding_types::entry(
                binding,
                binding_types::sampler(SamplerBindingType::Filtering),
            ));
        }
        entries.sort_by_key(|entry| entry.binding);

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(&format!("{} Bind Group Layout", label)),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{} Layout", label)),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            label: label.to_owned(),
            vertex,
            fragment,
            bind_group_layout,
            pipeline_layout,
        }
    }
}

pub fn primitive_topology(topology: Topology) -> PrimitiveTopology {
    match topology {
        Topology::Triangles => PrimitiveTopology::TriangleList,
        Topology::Points => PrimitiveTopology::PointList,
    }
}

/// Caches pipelines per [`PipelineKey`]
pub struct PipelineCache {
    color_format: TextureFormat,
    depth_format: TextureFormat,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
}

impl PipelineCache {
    pub fn new(color_format: TextureFormat, depth_format: TextureFormat) -> Self {
        Self {
            color_format,
            depth_format,
            pipelines: HashMap::new(),
        }
    }

    /// Builds the pipeline for `key` unless it already exists
    pub fn prepare(
        &mut self,
        device: &Device,
        key: PipelineKey,
        modules: &ProgramModules,
        layout: &ProgramLayout,
    ) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        log::debug!(
            "Creating pipeline for '{}' ({:?}, depth write {})",
            modules.label,
            key.topology,
            key.depth_write
        );
        let pipeline = self.create_pipeline(device, key, modules, layout);
        self.pipelines.insert(key, pipeline);
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&RenderPipeline> {
        self.pipelines.get(key)
    }

    fn create_pipeline(
        &self,
        device: &Device,
        key: PipelineKey,
        modules: &ProgramModules,
        layout: &ProgramLayout,
    ) -> RenderPipeline {
        // One tightly packed buffer per attribute, slot order = attribute order
        let attributes: Vec<[VertexAttribute; 1]> = layout
            .attributes
            .iter()
            .map(|attribute| {
                [VertexAttribute {
                    format: binding_types::float_vertex_format(attribute.components),
                    offset: 0,
                    shader_location: attribute.location,
                }]
            })
            .collect();
        let vertex_buffers: Vec<VertexBufferLayout> = attributes
            .iter()
            .map(|attribute| VertexBufferLayout {
                array_stride: attribute[0].format.size(),
                step_mode: VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let color_targets = [Some(ColorTargetState {
            format: self.color_format,
            blend: Some(BlendState::REPLACE),
            write_mask: ColorWrites::ALL,
        })];

        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&modules.label),
            layout: Some(&modules.pipeline_layout),
            vertex: VertexState {
                module: &modules.vertex,
                entry_point: Some(super::reflect::VERTEX_ENTRY),
                buffers: &vertex_buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &modules.fragment,
                entry_point: Some(super::reflect::FRAGMENT_ENTRY),
                targets: &color_targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology: primitive_topology(key.topology),
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                // Meshes are viewed from inside and out (the sky cube from inside)
                cull_mode: None,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: key.depth_write,
                depth_compare: CompareFunction::LessEqual,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}
