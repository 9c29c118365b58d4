use crate::{
    error::InternalError,
    model::EntityModel,
    store::Patch,
    value::{IdentityValue, Value},
};

///
/// RecordIdentity
///
/// Globally unique registry key: entity name plus the values of the fields
/// marked `id`, in declaration order. Two records are the same object iff
/// their identities match; the registry enforces at most one live record
/// per identity.
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct RecordIdentity {
    pub entity: &'static str,
    pub key: Vec<IdentityValue>,
}

impl RecordIdentity {
    /// Resolve the identity a patch would create for `entity`, if the patch
    /// supplies every identity component. Entities without id fields have no
    /// registry identity and always create fresh records.
    pub fn from_patch(entity: &EntityModel, patch: &Patch) -> Result<Option<Self>, InternalError> {
        if !entity.has_identity() {
            return Ok(None);
        }

        let mut key = Vec::new();
        for field in entity.id_fields() {
            let Some(value) = patch.set_value(field.name) else {
                return Err(InternalError::store_invariant(format!(
                    "{} insert is missing identity field {}",
                    entity.name, field.name
                )));
            };
            let id_value = IdentityValue::try_from(value).map_err(|()| {
                InternalError::store_invariant(format!(
                    "identity field {}.{} must be an integer or text, got {value:?}",
                    entity.name, field.name
                ))
            })?;
            key.push(id_value);
        }

        Ok(Some(Self {
            entity: entity.name,
            key,
        }))
    }

    /// Rebuild the identity of a live record from its current values.
    pub fn from_values<'a>(
        entity: &EntityModel,
        mut value_of: impl FnMut(&'static str) -> &'a Value,
    ) -> Result<Option<Self>, InternalError> {
        if !entity.has_identity() {
            return Ok(None);
        }

        let mut key = Vec::new();
        for field in entity.id_fields() {
            let value = value_of(field.name);
            let id_value = IdentityValue::try_from(value).map_err(|()| {
                InternalError::store_invariant(format!(
                    "identity field {}.{} holds a non-key value {value:?}",
                    entity.name, field.name
                ))
            })?;
            key.push(id_value);
        }

        Ok(Some(Self {
            entity: entity.name,
            key,
        }))
    }
}
