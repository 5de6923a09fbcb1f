//! Variable Table
//!
//! Per-compilation arena of shader variables. Attributes, uniforms and
//! varyings are looked up by name and created at most once; repeated requests
//! return the same [`VariableKey`], which is what lets identical nodes be
//! coalesced downstream. Locals are always fresh.

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use super::types::{GlslType, StorageClass, Variable};
use crate::errors::{Result, ShaderGraphError};

new_key_type! {
    /// Stable handle to a variable inside one compilation.
    pub struct VariableKey;
}

#[derive(Debug, Default)]
pub struct VariableTable {
    variables: SlotMap<VariableKey, Variable>,
    by_name: FxHashMap<String, VariableKey>,
    anonymous_counter: u32,
}

impl VariableTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_attribute(&mut self, ty: GlslType, name: &str) -> Result<VariableKey> {
        self.get_or_create(ty, name, StorageClass::Attribute, None)
    }

    pub fn get_or_create_uniform(&mut self, ty: GlslType, name: &str) -> Result<VariableKey> {
        self.get_or_create(ty, name, StorageClass::Uniform, None)
    }

    pub fn get_or_create_uniform_array(
        &mut self,
        ty: GlslType,
        name: &str,
        len: u32,
    ) -> Result<VariableKey> {
        self.get_or_create(ty, name, StorageClass::Uniform, Some(len))
    }

    pub fn get_or_create_varying(&mut self, ty: GlslType, name: &str) -> Result<VariableKey> {
        self.get_or_create(ty, name, StorageClass::Varying, None)
    }

    /// Registers a language built-in such as `gl_Position`.
    pub fn get_or_create_builtin(&mut self, ty: GlslType, name: &str) -> Result<VariableKey> {
        self.get_or_create(ty, name, StorageClass::BuiltIn, None)
    }

    /// Creates a fresh local temporary.
    ///
    /// Without a name, one is generated (`tmp_<n>`). A requested name that is
    /// already taken gets a numeric suffix so the local stays unique.
    pub fn create_variable(&mut self, ty: GlslType, name: Option<&str>) -> VariableKey {
        let name = match name {
            Some(base) if !self.by_name.contains_key(base) => base.to_string(),
            Some(base) => self.next_free_name(base),
            None => self.next_free_name("tmp"),
        };

        let key = self.variables.insert(Variable {
            name: name.clone(),
            ty,
            storage: StorageClass::Local,
            array_len: None,
        });
        self.by_name.insert(name, key);
        key
    }

    /// Looks up any variable by name.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<VariableKey> {
        self.by_name.get(name).copied()
    }

    /// Returns the variable behind a key. **Panics** if the key belongs to another table.
    #[inline]
    #[must_use]
    pub fn get(&self, key: VariableKey) -> &Variable {
        &self.variables[key]
    }

    #[inline]
    #[must_use]
    pub fn name(&self, key: VariableKey) -> &str {
        &self.variables[key].name
    }

    #[inline]
    #[must_use]
    pub fn ty(&self, key: VariableKey) -> GlslType {
        self.variables[key].ty
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterates all variables of one storage class, in arbitrary order.
    pub fn iter_storage(&self, storage: StorageClass) -> impl Iterator<Item = (VariableKey, &Variable)> {
        self.variables
            .iter()
            .filter(move |(_, var)| var.storage == storage)
    }

    fn get_or_create(
        &mut self,
        ty: GlslType,
        name: &str,
        storage: StorageClass,
        array_len: Option<u32>,
    ) -> Result<VariableKey> {
        if let Some(&key) = self.by_name.get(name) {
            let existing = &self.variables[key];
            if existing.ty != ty || existing.storage != storage || existing.array_len != array_len {
                return Err(ShaderGraphError::VariableTypeConflict {
                    name: name.to_string(),
                    existing: existing.ty,
                    existing_storage: existing.storage,
                    requested: ty,
                    requested_storage: storage,
                });
            }
            return Ok(key);
        }

        let key = self.variables.insert(Variable {
            name: name.to_string(),
            ty,
            storage,
            array_len,
        });
        self.by_name.insert(name.to_string(), key);
        Ok(key)
    }

    fn next_free_name(&mut self, base: &str) -> String {
        loop {
            let candidate = format!("{base}_{}", self.anonymous_counter);
            self.anonymous_counter += 1;
            if !self.by_name.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_reuse() {
        let mut table = VariableTable::new();
        let a = table.get_or_create_attribute(GlslType::Vec3, "Vertex").unwrap();
        let b = table.get_or_create_attribute(GlslType::Vec3, "Vertex").unwrap();
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_conflicting_type_fails() {
        let mut table = VariableTable::new();
        table.get_or_create_uniform(GlslType::Mat4, "uModelViewMatrix").unwrap();

        let err = table
            .get_or_create_uniform(GlslType::Mat3, "uModelViewMatrix")
            .unwrap_err();
        assert!(matches!(
            err,
            ShaderGraphError::VariableTypeConflict { ref name, .. } if name == "uModelViewMatrix"
        ));
    }

    #[test]
    fn test_conflicting_storage_fails() {
        let mut table = VariableTable::new();
        table.get_or_create_varying(GlslType::Vec3, "vViewNormal").unwrap();
        assert!(table.get_or_create_uniform(GlslType::Vec3, "vViewNormal").is_err());
    }

    #[test]
    fn test_anonymous_locals_are_unique() {
        let mut table = VariableTable::new();
        let a = table.create_variable(GlslType::Vec3, None);
        let b = table.create_variable(GlslType::Vec3, None);
        assert_ne!(a, b);
        assert_ne!(table.name(a), table.name(b));
    }

    #[test]
    fn test_named_local_collision_gets_suffix() {
        let mut table = VariableTable::new();
        let a = table.create_variable(GlslType::Vec3, Some("skinVertex"));
        let b = table.create_variable(GlslType::Vec3, Some("skinVertex"));
        assert_eq!(table.name(a), "skinVertex");
        assert_ne!(table.name(b), "skinVertex");
        assert_eq!(table.get_variable("skinVertex"), Some(a));
    }
}
