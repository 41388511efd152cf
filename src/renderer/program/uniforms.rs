use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    Int,
    UInt,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformType {
    pub fn size(self) -> u32 {
        match self {
            UniformType::Int | UniformType::UInt | UniformType::Float => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat4 => 64,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniformField {
    pub name: String,
    pub ty: UniformType,
    pub offset: u32,
}

/// Member layout of a program's uniform struct.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: u32,
}

impl UniformLayout {
    pub fn new(fields: Vec<UniformField>, size: u32) -> Self {
        let covered = fields
            .iter()
            .map(|field| field.offset + field.ty.size())
            .max()
            .unwrap_or(0);
        Self {
            fields,
            size: size.max(covered),
        }
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Fold in the layout another stage declared for the same binding.
    pub fn merge(&mut self, other: &UniformLayout) {
        for field in &other.fields {
            match self.field(&field.name) {
                Some(existing) if existing != field => log::warn!(
                    "Uniform '{}' is declared differently across stages ({:?} vs {:?})",
                    field.name,
                    existing,
                    field
                ),
                Some(_) => {}
                None => self.fields.push(field.clone()),
            }
        }
        self.size = self.size.max(other.size);
    }
}

/// CPU staging copy of a program's uniform struct.
///
/// Setters look the member up by name on every call. Writing a name the program
/// does not declare leaves the block untouched.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    layout: UniformLayout,
    data: Vec<u8>,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let data = vec![0; layout.size() as usize];
        Self { layout, data }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.write(name, &[UniformType::Int, UniformType::UInt], bytemuck::bytes_of(&value));
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        let value = u32::from(value);
        self.write(name, &[UniformType::Int, UniformType::UInt], bytemuck::bytes_of(&value));
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.write(name, &[UniformType::Float], bytemuck::bytes_of(&value));
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.write(name, &[UniformType::Vec3], bytemuck::cast_slice(&value.to_array()));
    }

    pub fn set_mat4(&mut self, name: &str, value: &Mat4) {
        self.write(name, &[UniformType::Mat4], bytemuck::cast_slice(&value.to_cols_array()));
    }

    /// Raw bytes currently staged for `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        let field = self.layout.field(name)?;
        let start = field.offset as usize;
        self.data.get(start..start + field.ty.size() as usize)
    }

    fn write(&mut self, name: &str, accepted: &[UniformType], bytes: &[u8]) {
        let Some(field) = self.layout.field(name) else {
            return;
        };
        if !accepted.contains(&field.ty) {
            log::debug!(
                "Ignoring upload to uniform '{}': declared as {:?}",
                name,
                field.ty
            );
            return;
        }
        let start = field.offset as usize;
        if let Some(slot) = self.data.get_mut(start..start + bytes.len()) {
            slot.copy_from_slice(bytes);
        }
    }
}
