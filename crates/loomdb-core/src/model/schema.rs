use crate::{
    error::InternalError,
    model::{
        entity::EntityModel,
        field::{DepPath, FieldKind, FieldModel, FieldOrigin},
    },
};
use std::collections::BTreeMap;

///
/// Schema
///
/// The full set of entity models, validated at construction. Validation is
/// fail-fast: a broken declaration (dangling relation target, asymmetric
/// inverse, dependency path naming an unknown field) is a programmer error,
/// not a recoverable runtime condition.
///

pub struct Schema {
    entities: BTreeMap<&'static str, EntityModel>,
}

impl Schema {
    pub fn new(entities: Vec<EntityModel>) -> Result<Self, InternalError> {
        let mut map = BTreeMap::new();
        for entity in entities {
            let name = entity.name;
            if map.insert(name, entity).is_some() {
                return Err(InternalError::model_invariant(format!(
                    "duplicate entity model: {name}"
                )));
            }
        }

        let schema = Self { entities: map };
        schema.validate()?;

        Ok(schema)
    }

    pub fn entity(&self, name: &str) -> Result<&EntityModel, InternalError> {
        self.entities
            .get(name)
            .ok_or_else(|| InternalError::model_unsupported(format!("unknown entity: {name}")))
    }

    fn validate(&self) -> Result<(), InternalError> {
        for entity in self.entities.values() {
            let mut seen = Vec::new();
            for field in &entity.fields {
                if seen.contains(&field.name) {
                    return Err(InternalError::model_invariant(format!(
                        "duplicate field {}.{}",
                        entity.name, field.name
                    )));
                }
                seen.push(field.name);

                self.validate_field(entity, field)?;
            }

            for trigger in &entity.triggers {
                for dep in &trigger.deps {
                    let DepPath::Local(name) = dep else {
                        return Err(InternalError::model_invariant(format!(
                            "trigger {}::{} declares a non-local dependency; observe remote \
                             state through a related or computed local field",
                            entity.name, trigger.name
                        )));
                    };
                    if entity.field(name).is_none() {
                        return Err(InternalError::model_invariant(format!(
                            "trigger {}::{} depends on unknown field {name}",
                            entity.name, trigger.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_field(&self, entity: &EntityModel, field: &FieldModel) -> Result<(), InternalError> {
        if field.id && (field.is_relation() || field.is_engine_written()) {
            return Err(InternalError::model_invariant(format!(
                "identity field {}.{} must be a written attribute",
                entity.name, field.name
            )));
        }

        if let FieldKind::Relation {
            kind,
            target,
            inverse,
            ..
        } = &field.kind
        {
            let target_entity = self.entities.get(target).ok_or_else(|| {
                InternalError::model_invariant(format!(
                    "relation {}.{} targets unknown entity {target}",
                    entity.name, field.name
                ))
            })?;
            let inverse_field = target_entity.field(inverse).ok_or_else(|| {
                InternalError::model_invariant(format!(
                    "relation {}.{} names missing inverse {target}.{inverse}",
                    entity.name, field.name
                ))
            })?;
            let FieldKind::Relation {
                kind: inv_kind,
                target: inv_target,
                inverse: inv_inverse,
                ..
            } = &inverse_field.kind
            else {
                return Err(InternalError::model_invariant(format!(
                    "inverse {target}.{inverse} of {}.{} is not a relation",
                    entity.name, field.name
                )));
            };
            if *inv_kind != kind.inverse_kind()
                || *inv_target != entity.name
                || *inv_inverse != field.name
            {
                return Err(InternalError::model_invariant(format!(
                    "relation {}.{} and inverse {target}.{inverse} are not symmetric",
                    entity.name, field.name
                )));
            }
        }

        match &field.origin {
            FieldOrigin::Written => {}
            FieldOrigin::Computed { deps, .. } => {
                for dep in deps {
                    self.validate_dep(entity, field.name, dep)?;
                }
            }
            FieldOrigin::Related { relation, field: related_field } => {
                let (_, target) = self.relation_target(entity, field.name, relation)?;
                if target.field(related_field).is_none() {
                    return Err(InternalError::model_invariant(format!(
                        "related field {}.{} names unknown field {}.{related_field}",
                        entity.name, field.name, target.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_dep(
        &self,
        entity: &EntityModel,
        field_name: &str,
        dep: &DepPath,
    ) -> Result<(), InternalError> {
        match dep {
            DepPath::Local(name) => {
                if entity.field(name).is_none() {
                    return Err(InternalError::model_invariant(format!(
                        "computed field {}.{field_name} depends on unknown field {name}",
                        entity.name
                    )));
                }
            }
            DepPath::Via(relation, name) => {
                let (_, target) = self.relation_target(entity, field_name, relation)?;
                if target.field(name).is_none() {
                    return Err(InternalError::model_invariant(format!(
                        "computed field {}.{field_name} depends on unknown field {}.{name}",
                        entity.name, target.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn relation_target<'a>(
        &'a self,
        entity: &'a EntityModel,
        field_name: &str,
        relation: &str,
    ) -> Result<(&'a FieldModel, &'a EntityModel), InternalError> {
        let rel_field = entity.field(relation).ok_or_else(|| {
            InternalError::model_invariant(format!(
                "field {}.{field_name} traverses unknown relation {relation}",
                entity.name
            ))
        })?;
        let FieldKind::Relation { target, .. } = &rel_field.kind else {
            return Err(InternalError::model_invariant(format!(
                "field {}.{field_name} traverses non-relation field {relation}",
                entity.name
            )));
        };
        let target_entity = self.entity(target)?;

        Ok((rel_field, target_entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{attr, many2one, one2many};

    #[test]
    fn asymmetric_inverses_are_rejected() {
        let author = EntityModel::new(
            "author",
            vec![attr("id").id(), one2many("books", "book", "author")],
        );
        // inverse points back at the wrong field name
        let book = EntityModel::new(
            "book",
            vec![attr("id").id(), many2one("author", "author", "id")],
        );

        let Err(err) = Schema::new(vec![author, book]) else {
            panic!("asymmetric inverse must not validate");
        };
        assert!(err.message.contains("books"));
    }

    #[test]
    fn dangling_relation_targets_are_rejected() {
        let author = EntityModel::new(
            "author",
            vec![attr("id").id(), one2many("books", "book", "author")],
        );

        assert!(Schema::new(vec![author]).is_err());
    }

    #[test]
    fn identity_must_be_a_written_attribute() {
        let entity = EntityModel::new("thing", vec![attr("label").related("x", "y").id()]);

        assert!(Schema::new(vec![entity]).is_err());
    }
}
