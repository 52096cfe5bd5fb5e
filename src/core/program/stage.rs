use std::fmt;
use std::path::{Path, PathBuf};

use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};

use super::ProgramError;

/// Pipeline stage a shader source file provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
    Compute,
}

impl StageKind {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
            Self::Compute => naga::ShaderStage::Compute,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// One (stage, WGSL source path) entry of a program description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramStage {
    pub kind: StageKind,
    pub path: PathBuf,
}

impl ProgramStage {
    pub fn new(kind: StageKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn vertex(path: impl Into<PathBuf>) -> Self {
        Self::new(StageKind::Vertex, path)
    }

    pub fn fragment(path: impl Into<PathBuf>) -> Self {
        Self::new(StageKind::Fragment, path)
    }

    pub fn compute(path: impl Into<PathBuf>) -> Self {
        Self::new(StageKind::Compute, path)
    }
}

/// A stage whose source has been read, parsed and validated
pub struct CompiledStage {
    pub kind: StageKind,
    pub path: PathBuf,
    pub source: String,
    pub module: naga::Module,
    pub info: ModuleInfo,
    entry_index: usize,
}

impl CompiledStage {
    /// Compile every stage in order, stopping at the first failure
    pub fn compile_all(stages: &[ProgramStage]) -> Result<Vec<Self>, ProgramError> {
        stages.iter().map(Self::compile).collect()
    }

    pub fn compile(stage: &ProgramStage) -> Result<Self, ProgramError> {
        let source = std::fs::read_to_string(&stage.path).map_err(|source| ProgramError::Read {
            path: stage.path.clone(),
            source,
        })?;
        Self::from_source(stage.kind, &stage.path, source)
    }

    pub fn from_source(kind: StageKind, path: &Path, source: String) -> Result<Self, ProgramError> {
        let module = naga::front::wgsl::parse_str(&source).map_err(|e| ProgramError::Compile {
            path: path.to_path_buf(),
            log: e.emit_to_string(&source),
        })?;

        let info = Validator::new(ValidationFlags::all(), Capabilities::default())
            .validate(&module)
            .map_err(|e| ProgramError::Compile {
                path: path.to_path_buf(),
                log: e.emit_to_string(&source),
            })?;

        let entry_index = module
            .entry_points
            .iter()
            .position(|ep| ep.stage == kind.naga_stage())
            .ok_or_else(|| ProgramError::MissingEntryPoint {
                path: path.to_path_buf(),
                stage: kind,
            })?;

        Ok(Self {
            kind,
            path: path.to_path_buf(),
            source,
            module,
            info,
            entry_index,
        })
    }

    pub fn entry_point(&self) -> &naga::EntryPoint {
        &self.module.entry_points[self.entry_index]
    }

    pub fn entry_point_name(&self) -> &str {
        &self.entry_point().name
    }

    /// Per-global usage of this stage's entry point
    pub fn entry_info(&self) -> &naga::valid::FunctionInfo {
        self.info.get_entry_point(self.entry_index)
    }

    pub fn workgroup_size(&self) -> Option<[u32; 3]> {
        (self.kind == StageKind::Compute).then(|| self.entry_point().workgroup_size)
    }
}

impl fmt::Debug for CompiledStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledStage")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("entry_point", &self.entry_point_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPUTE: &str = r#"
@compute @workgroup_size(8, 4, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
}
"#;

    #[test]
    fn test_compute_entry_point_found() {
        let stage =
            CompiledStage::from_source(StageKind::Compute, Path::new("k.wgsl"), COMPUTE.into())
                .unwrap();
        assert_eq!(stage.entry_point_name(), "main");
        assert_eq!(stage.workgroup_size(), Some([8, 4, 1]));
    }

    #[test]
    fn test_wrong_stage_kind_rejected() {
        let err =
            CompiledStage::from_source(StageKind::Vertex, Path::new("k.wgsl"), COMPUTE.into())
                .unwrap_err();
        assert!(matches!(
            err,
            ProgramError::MissingEntryPoint {
                stage: StageKind::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn test_syntax_error_reports_path() {
        let err = CompiledStage::from_source(
            StageKind::Compute,
            Path::new("broken.wgsl"),
            "fn main( {".into(),
        )
        .unwrap_err();
        assert!(matches!(err, ProgramError::Compile { .. }));
        assert!(err.to_string().contains("broken.wgsl"));
    }

    #[test]
    fn test_validation_error_is_compile_error() {
        let source = r#"
@compute @workgroup_size(1)
fn main() {
    let x: f32 = 1u;
}
"#;
        let err =
            CompiledStage::from_source(StageKind::Compute, Path::new("typed.wgsl"), source.into())
                .unwrap_err();
        assert!(matches!(err, ProgramError::Compile { .. }));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(StageKind::Compute.to_string(), "compute");
        assert_eq!(StageKind::Fragment.to_string(), "fragment");
    }
}
