use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec3};

/// Value types a program uniform can be set to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Float(_) => UniformKind::Float,
            Self::Int(_) => UniformKind::Int,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Mat3(_) => UniformKind::Mat3,
            Self::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Bytes in WGSL uniform address-space layout
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float(v) => v.to_ne_bytes().to_vec(),
            Self::Int(v) => v.to_ne_bytes().to_vec(),
            Self::Vec3(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            Self::Mat3(m) => {
                // mat3x3<f32> columns are vec3 padded out to 16 bytes
                let mut bytes = Vec::with_capacity(48);
                for column in m.to_cols_array_2d() {
                    bytes.extend_from_slice(bytemuck::cast_slice(&column));
                    bytes.extend_from_slice(&[0u8; 4]);
                }
                bytes
            }
            Self::Mat4(m) => bytemuck::cast_slice(&m.to_cols_array()).to_vec(),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(m: Mat3) -> Self {
        Self::Mat3(m)
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        Self::Mat4(m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    Vec3,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// Size in the uniform address space, padding included
    pub const fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Int => 4,
            Self::Vec3 => 12,
            Self::Mat3 => 48,
            Self::Mat4 => 64,
        }
    }
}

/// Resolved location of one named uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    /// Binding index inside the uniform bind group
    pub binding: u32,
    /// Byte offset inside that binding's buffer
    pub offset: u32,
    pub kind: UniformKind,
}

/// Uniform buffer declared by a program: binding index and byte size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBuffer {
    pub binding: u32,
    pub size: u32,
}

/// Reflected uniform interface of a program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformLayout {
    pub buffers: Vec<UniformBuffer>,
    pub slots: HashMap<String, UniformSlot>,
}

impl UniformLayout {
    pub fn slot(&self, name: &str) -> Option<UniformSlot> {
        self.slots.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniformMiss {
    /// No uniform of that name, or it was optimized out of the entry point
    NotFound,
    KindMismatch {
        expected: UniformKind,
        found: UniformKind,
    },
}

/// CPU shadow of every uniform buffer a program owns
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    shadows: HashMap<u32, Vec<u8>>,
}

/// Byte range of one binding that a write touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformWrite {
    pub binding: u32,
    pub offset: u32,
    pub len: u32,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let shadows = layout
            .buffers
            .iter()
            .map(|buffer| (buffer.binding, vec![0u8; buffer.size as usize]))
            .collect();
        Self { layout, shadows }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn bytes(&self, binding: u32) -> Option<&[u8]> {
        self.shadows.get(&binding).map(Vec::as_slice)
    }

    /// Write `value` into the slot named `name`; nothing else in the shadow changes
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<UniformWrite, UniformMiss> {
        let slot = self.layout.slot(name).ok_or(UniformMiss::NotFound)?;
        if slot.kind != value.kind() {
            return Err(UniformMiss::KindMismatch {
                expected: slot.kind,
                found: value.kind(),
            });
        }

        let bytes = value.to_bytes();
        let shadow = self
            .shadows
            .get_mut(&slot.binding)
            .ok_or(UniformMiss::NotFound)?;
        let start = slot.offset as usize;
        let end = start + bytes.len();
        if end > shadow.len() {
            return Err(UniformMiss::NotFound);
        }
        shadow[start..end].copy_from_slice(&bytes);

        Ok(UniformWrite {
            binding: slot.binding,
            offset: slot.offset,
            len: bytes.len() as u32,
        })
    }

    /// Shadow bytes covered by a previous write
    pub fn written(&self, write: &UniformWrite) -> &[u8] {
        let start = write.offset as usize;
        &self.shadows[&write.binding][start..start + write.len as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn camera_layout() -> UniformLayout {
        let mut slots = HashMap::new();
        slots.insert(
            "cameraPosition".to_string(),
            UniformSlot {
                binding: 0,
                offset: 0,
                kind: UniformKind::Vec3,
            },
        );
        slots.insert(
            "cameraOrientation".to_string(),
            UniformSlot {
                binding: 0,
                offset: 16,
                kind: UniformKind::Mat3,
            },
        );
        UniformLayout {
            buffers: vec![UniformBuffer { binding: 0, size: 64 }],
            slots,
        }
    }

    #[test]
    fn test_mat3_padded_columns() {
        let bytes = UniformValue::Mat3(Mat3::IDENTITY).to_bytes();
        assert_eq!(bytes.len(), 48);
        assert_eq!(
            floats(&bytes),
            vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_value_sizes_match_kinds() {
        let values = [
            UniformValue::Float(1.0),
            UniformValue::Int(-3),
            UniformValue::Vec3(Vec3::ONE),
            UniformValue::Mat3(Mat3::IDENTITY),
            UniformValue::Mat4(Mat4::IDENTITY),
        ];
        for value in values {
            assert_eq!(value.to_bytes().len() as u32, value.kind().size());
        }
    }

    #[test]
    fn test_set_writes_slot() {
        let mut block = UniformBlock::new(camera_layout());
        let write = block
            .set("cameraPosition", Vec3::new(1.0, 2.0, 3.0).into())
            .unwrap();
        assert_eq!(write, UniformWrite { binding: 0, offset: 0, len: 12 });

        assert_eq!(floats(block.written(&write)), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_name_leaves_shadow_untouched() {
        let mut block = UniformBlock::new(camera_layout());
        block.set("cameraPosition", Vec3::splat(4.0).into()).unwrap();
        let before = block.bytes(0).unwrap().to_vec();

        assert_eq!(
            block.set("cameraFov", UniformValue::Float(1.0)),
            Err(UniformMiss::NotFound)
        );
        assert_eq!(block.bytes(0).unwrap(), before.as_slice());
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut block = UniformBlock::new(camera_layout());
        let result = block.set("cameraOrientation", UniformValue::Mat4(Mat4::IDENTITY));
        assert_eq!(
            result,
            Err(UniformMiss::KindMismatch {
                expected: UniformKind::Mat3,
                found: UniformKind::Mat4,
            })
        );
        assert!(block.bytes(0).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_orientation_does_not_clobber_position() {
        let mut block = UniformBlock::new(camera_layout());
        block.set("cameraPosition", Vec3::new(7.0, 8.0, 9.0).into()).unwrap();
        block.set("cameraOrientation", Mat3::IDENTITY.into()).unwrap();

        let values = floats(block.bytes(0).unwrap());
        assert_eq!(&values[0..3], &[7.0, 8.0, 9.0]);
        assert_eq!(values[4], 1.0);
    }
}
