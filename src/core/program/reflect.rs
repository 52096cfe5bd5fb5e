use naga::{ScalarKind, TypeInner, VectorSize};

use super::stage::CompiledStage;
use super::{ProgramError, UNIFORM_GROUP};
use crate::core::uniforms::{UniformBuffer, UniformKind, UniformLayout, UniformSlot};

/// Resource interface shared by all stages of a program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReflectedBindings {
    pub uniforms: UniformLayout,
    /// Highest bind group index any entry point touches
    pub max_group: Option<u32>,
}

/// Collect the uniform blocks and bind group usage of the given entry points.
///
/// Only globals an entry point actually uses are reflected, the same set the
/// derived pipeline layout contains. Group 0 may hold uniform buffers only.
pub fn reflect_bindings(stages: &[CompiledStage]) -> Result<ReflectedBindings, ProgramError> {
    let mut reflected = ReflectedBindings::default();

    for stage in stages {
        let usage = stage.entry_info();
        for (handle, var) in stage.module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            if usage[handle].is_empty() {
                continue;
            }

            reflected.max_group = Some(
                reflected
                    .max_group
                    .map_or(binding.group, |g| g.max(binding.group)),
            );
            if binding.group != UNIFORM_GROUP {
                continue;
            }
            if var.space != naga::AddressSpace::Uniform {
                return Err(ProgramError::Link(format!(
                    "{}: binding {} of group {} is not a uniform buffer",
                    stage.path.display(),
                    binding.binding,
                    UNIFORM_GROUP
                )));
            }

            let (size, fields) = describe_uniform(&stage.module, var);
            let layout = &mut reflected.uniforms;
            if let Some(existing) = layout.buffers.iter().find(|b| b.binding == binding.binding) {
                if existing.size != size {
                    return Err(ProgramError::Link(format!(
                        "uniform binding {} declared with {} bytes and {} bytes",
                        binding.binding, existing.size, size
                    )));
                }
                continue;
            }

            layout.buffers.push(UniformBuffer {
                binding: binding.binding,
                size,
            });
            for (name, offset, kind) in fields {
                layout.slots.insert(
                    name,
                    UniformSlot {
                        binding: binding.binding,
                        offset,
                        kind,
                    },
                );
            }
        }
    }

    reflected.uniforms.buffers.sort_by_key(|b| b.binding);
    Ok(reflected)
}

/// Buffer size and addressable fields of one `var<uniform>`
fn describe_uniform(
    module: &naga::Module,
    var: &naga::GlobalVariable,
) -> (u32, Vec<(String, u32, UniformKind)>) {
    let inner = &module.types[var.ty].inner;
    let (size, fields) = match inner {
        TypeInner::Struct { members, span } => {
            let fields = members
                .iter()
                .filter_map(|member| {
                    let kind = uniform_kind(&module.types[member.ty].inner)?;
                    Some((member.name.clone()?, member.offset, kind))
                })
                .collect();
            (*span, fields)
        }
        other => match (uniform_kind(other), &var.name) {
            (Some(kind), Some(name)) => (kind.size(), vec![(name.clone(), 0, kind)]),
            _ => (other.size(module.to_ctx()), Vec::new()),
        },
    };
    (size.max(16).next_multiple_of(16), fields)
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    let f32_scalar = |scalar: &naga::Scalar| scalar.kind == ScalarKind::Float && scalar.width == 4;

    match inner {
        TypeInner::Scalar(scalar) if f32_scalar(scalar) => Some(UniformKind::Float),
        TypeInner::Scalar(scalar) if scalar.kind == ScalarKind::Sint && scalar.width == 4 => {
            Some(UniformKind::Int)
        }
        TypeInner::Vector {
            size: VectorSize::Tri,
            scalar,
        } if f32_scalar(scalar) => Some(UniformKind::Vec3),
        TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            scalar,
        } if f32_scalar(scalar) => Some(UniformKind::Mat3),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if f32_scalar(scalar) => Some(UniformKind::Mat4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::program::stage::StageKind;
    use std::path::Path;

    fn compute(source: &str) -> CompiledStage {
        CompiledStage::from_source(StageKind::Compute, Path::new("test.wgsl"), source.into())
            .unwrap()
    }

    #[test]
    fn test_struct_members_become_slots() {
        let stage = compute(
            r#"
struct Params { exposure: f32, frame: i32, tint: vec3<f32>, basis: mat3x3<f32>, view: mat4x4<f32> };
@group(0) @binding(0) var<uniform> params: Params;
@compute @workgroup_size(1)
fn main() {
    let e = params.exposure;
}
"#,
        );
        let reflected = reflect_bindings(&[stage]).unwrap();
        let layout = &reflected.uniforms;

        assert_eq!(layout.slot("exposure").unwrap().offset, 0);
        assert_eq!(layout.slot("frame").unwrap().offset, 4);
        assert_eq!(layout.slot("tint").unwrap().offset, 16);
        assert_eq!(layout.slot("basis").unwrap().offset, 32);
        assert_eq!(layout.slot("view").unwrap().offset, 80);
        assert_eq!(layout.slot("view").unwrap().kind, UniformKind::Mat4);
        assert_eq!(layout.buffers, vec![UniformBuffer { binding: 0, size: 144 }]);
        assert_eq!(reflected.max_group, Some(0));
    }

    #[test]
    fn test_plain_uniform_addressed_by_variable_name() {
        let stage = compute(
            r#"
@group(0) @binding(2) var<uniform> gain: f32;
@compute @workgroup_size(1)
fn main() {
    let g = gain;
}
"#,
        );
        let layout = reflect_bindings(&[stage]).unwrap().uniforms;
        assert_eq!(
            layout.slot("gain"),
            Some(UniformSlot {
                binding: 2,
                offset: 0,
                kind: UniformKind::Float
            })
        );
        assert_eq!(layout.buffers, vec![UniformBuffer { binding: 2, size: 16 }]);
    }

    #[test]
    fn test_unused_uniform_is_optimized_out() {
        let stage = compute(
            r#"
@group(0) @binding(0) var<uniform> unused: vec3<f32>;
@compute @workgroup_size(1)
fn main() {
}
"#,
        );
        let reflected = reflect_bindings(&[stage]).unwrap();
        assert!(reflected.uniforms.slot("unused").is_none());
        assert!(reflected.uniforms.is_empty());
        assert_eq!(reflected.max_group, None);
    }

    #[test]
    fn test_resources_outside_group_zero_counted() {
        let stage = compute(
            r#"
@group(1) @binding(0) var output_image: texture_storage_2d<rgba8unorm, write>;
@compute @workgroup_size(1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    textureStore(output_image, vec2<i32>(id.xy), vec4<f32>(1.0));
}
"#,
        );
        let reflected = reflect_bindings(&[stage]).unwrap();
        assert!(reflected.uniforms.is_empty());
        assert_eq!(reflected.max_group, Some(1));
    }

    #[test]
    fn test_texture_in_group_zero_rejected() {
        let stage = compute(
            r#"
@group(0) @binding(0) var output_image: texture_storage_2d<rgba8unorm, write>;
@compute @workgroup_size(1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    textureStore(output_image, vec2<i32>(id.xy), vec4<f32>(1.0));
}
"#,
        );
        assert!(matches!(
            reflect_bindings(&[stage]),
            Err(ProgramError::Link(_))
        ));
    }
}
