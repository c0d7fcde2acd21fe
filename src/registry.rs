//! Schema Registry
//!
//! Holds entity declarations and resolves them into merged descriptors.
//! The registry is populated once, then only read: every lookup takes `&self`
//! and the type is `Send + Sync`, so a finished registry can be shared freely.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::descriptor::EntityDescriptor;
use crate::error::{Result, SchemaError};
use crate::graph::InheritanceGraph;
use crate::schema::{EntityDef, FieldDef, RelationDef};
use crate::validate::{self, RecordViolation, ValidationOptions, Violation};

/// A fuzzy search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub extends: Option<String>,
    pub score: i64,
}

/// The entity schema registry
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Declarations by entity name
    entities: HashMap<String, EntityDef>,
    /// Registration order
    order: Vec<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one entity type.
    ///
    /// Fails with `DuplicateDefinition` if the name is taken; the registry is
    /// unchanged on any error.
    pub fn register_entity(&mut self, def: EntityDef) -> Result<()> {
        if self.entities.contains_key(&def.name) {
            warn!(entity = %def.name, "rejected duplicate entity definition");
            return Err(SchemaError::DuplicateDefinition { entity: def.name });
        }
        check_definition(&def)?;

        debug!(
            entity = %def.name,
            extends = def.extends.as_deref().unwrap_or("-"),
            fields = def.fields.len(),
            relations = def.relations.len(),
            "registered entity"
        );
        self.order.push(def.name.clone());
        self.entities.insert(def.name.clone(), def);
        Ok(())
    }

    /// Register a batch: all definitions are added, or none are
    pub fn register_all(&mut self, defs: impl IntoIterator<Item = EntityDef>) -> Result<()> {
        let defs: Vec<EntityDef> = defs.into_iter().collect();

        let mut batch = HashSet::new();
        for def in &defs {
            if self.entities.contains_key(&def.name) || !batch.insert(def.name.as_str()) {
                warn!(entity = %def.name, "rejected duplicate entity definition in batch");
                return Err(SchemaError::DuplicateDefinition { entity: def.name.clone() });
            }
            check_definition(def)?;
        }

        for def in defs {
            self.register_entity(def)?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Entity names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The raw declaration, without inherited members
    pub fn definition(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Declarations in registration order
    pub fn definitions(&self) -> impl Iterator<Item = &EntityDef> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    /// Direct subtypes of `name`, in registration order
    pub fn subtypes(&self, name: &str) -> Vec<&str> {
        self.definitions()
            .filter(|d| d.extends.as_deref() == Some(name))
            .map(|d| d.name.as_str())
            .collect()
    }

    /// The extends chain of `name`: the entity itself, then each ancestor.
    ///
    /// Detects cycles by tracking visited names, so it always terminates.
    pub fn lineage(&self, name: &str) -> Result<Vec<String>> {
        let mut chain: Vec<String> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = name;

        loop {
            let def = self.entities.get(current).ok_or_else(|| SchemaError::UnknownEntity {
                entity: current.to_string(),
                referenced_by: chain.last().cloned(),
            })?;

            if !visited.insert(def.name.as_str()) {
                chain.push(def.name.clone());
                return Err(SchemaError::CyclicInheritance {
                    entity: name.to_string(),
                    chain,
                });
            }
            chain.push(def.name.clone());

            match def.extends.as_deref() {
                Some(parent) => current = parent,
                None => return Ok(chain),
            }
        }
    }

    /// Merged field and relation set of `name`, following its extends chain.
    ///
    /// Ancestor members come first; a redeclared member replaces the
    /// ancestor's definition in place.
    pub fn resolve_entity(&self, name: &str) -> Result<EntityDescriptor> {
        let lineage = self.lineage(name)?;

        let mut fields: Vec<FieldDef> = Vec::new();
        let mut relations: Vec<RelationDef> = Vec::new();
        let mut description = None;

        for ancestor in lineage.iter().rev() {
            let def = self
                .entities
                .get(ancestor)
                .ok_or_else(|| SchemaError::unknown(ancestor.as_str()))?;

            for field in &def.fields {
                match fields.iter_mut().find(|f| f.name == field.name) {
                    Some(slot) => *slot = field.clone(),
                    None => fields.push(field.clone()),
                }
            }
            for relation in &def.relations {
                match relations.iter_mut().find(|r| r.name == relation.name) {
                    Some(slot) => *slot = relation.clone(),
                    None => relations.push(relation.clone()),
                }
            }
            if def.description.is_some() {
                description = def.description.clone();
            }
        }

        for relation in &relations {
            if !self.contains(&relation.target) {
                return Err(SchemaError::UnknownEntity {
                    entity: relation.target.clone(),
                    referenced_by: Some(name.to_string()),
                });
            }
        }
        check_merged(name, &fields, &relations)?;

        debug!(entity = name, depth = lineage.len(), fields = fields.len(), "resolved entity");

        Ok(EntityDescriptor {
            name: name.to_string(),
            lineage,
            description,
            fields,
            relations,
        })
    }

    /// Resolve every entity, parents before children
    pub fn resolve_all(&self) -> Result<Vec<EntityDescriptor>> {
        InheritanceGraph::build(self)
            .resolution_order()?
            .iter()
            .map(|name| self.resolve_entity(name))
            .collect()
    }

    /// Check the registry as a whole: every extends and relation target is
    /// registered, no extends chain is cyclic, and every entity resolves.
    pub fn verify(&self) -> Result<()> {
        for def in self.definitions() {
            let targets = def
                .extends
                .iter()
                .chain(def.relations.iter().map(|r| &r.target));
            for target in targets {
                if !self.contains(target) {
                    return Err(SchemaError::UnknownEntity {
                        entity: target.clone(),
                        referenced_by: Some(def.name.clone()),
                    });
                }
            }
        }

        for group in InheritanceGraph::build(self).extends_cycles() {
            if let Some(member) = group.first() {
                self.lineage(member)?;
            }
        }

        for name in self.names() {
            self.resolve_entity(name)?;
        }
        Ok(())
    }

    /// Validate a record with default options
    pub fn validate_record(&self, entity: &str, record: &Value) -> Result<Vec<Violation>> {
        self.validate_record_with(entity, record, &ValidationOptions::default())
    }

    /// Validate a record; returns every violation, empty when valid
    pub fn validate_record_with(
        &self,
        entity: &str,
        record: &Value,
        options: &ValidationOptions,
    ) -> Result<Vec<Violation>> {
        let descriptor = self.resolve_entity(entity)?;
        let violations = validate::validate(&descriptor, record, options);
        debug!(entity, violations = violations.len(), "validated record");
        Ok(violations)
    }

    /// Validate each record of a collection and flag repeated unique values
    pub fn validate_collection(
        &self,
        entity: &str,
        records: &[Value],
        options: &ValidationOptions,
    ) -> Result<Vec<RecordViolation>> {
        let descriptor = self.resolve_entity(entity)?;

        let mut violations: Vec<RecordViolation> = records
            .iter()
            .enumerate()
            .flat_map(|(record, value)| {
                validate::validate(&descriptor, value, options)
                    .into_iter()
                    .map(move |violation| RecordViolation { record, violation })
            })
            .collect();
        violations.extend(validate::duplicate_values(&descriptor, records));
        violations.sort_by_key(|v| v.record);
        Ok(violations)
    }

    /// Fill declared defaults into `record`; returns how many were applied
    pub fn apply_defaults(&self, entity: &str, record: &mut Value) -> Result<usize> {
        let descriptor = self.resolve_entity(entity)?;
        Ok(validate::apply_defaults(&descriptor, record))
    }

    /// Search entity names (fuzzy)
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default().ignore_case();
        let mut results: Vec<(i64, &EntityDef)> = self
            .definitions()
            .filter_map(|def| matcher.fuzzy_match(&def.name, query).map(|score| (score, def)))
            .collect();

        // Sort by score descending, then name for stable output
        results.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));

        results
            .into_iter()
            .take(limit)
            .map(|(score, def)| SearchResult {
                name: def.name.clone(),
                extends: def.extends.clone(),
                score,
            })
            .collect()
    }
}

fn identifier() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
}

/// Structural checks on a single declaration
fn check_definition(def: &EntityDef) -> Result<()> {
    let name = &def.name;
    if !identifier().is_match(name) {
        return Err(SchemaError::invalid(name, "entity name is not an identifier"));
    }
    if let Some(parent) = &def.extends {
        if !identifier().is_match(parent) {
            return Err(SchemaError::invalid(name, format!("extends target {:?} is not an identifier", parent)));
        }
    }

    let mut members = HashSet::new();
    for field in &def.fields {
        if !identifier().is_match(&field.name) {
            return Err(SchemaError::invalid(name, format!("field name {:?} is not an identifier", field.name)));
        }
        if !members.insert(field.name.as_str()) {
            return Err(SchemaError::invalid(name, format!("field {} declared twice", field.name)));
        }
        if let Some(default) = &field.default {
            if validate::check_type(&field.field_type, default).is_err() {
                return Err(SchemaError::invalid(
                    name,
                    format!("default of {} does not match type {}", field.name, field.field_type),
                ));
            }
        }
    }
    for relation in &def.relations {
        if !identifier().is_match(&relation.name) {
            return Err(SchemaError::invalid(name, format!("relation name {:?} is not an identifier", relation.name)));
        }
        if !identifier().is_match(&relation.target) {
            return Err(SchemaError::invalid(name, format!("relation target {:?} is not an identifier", relation.target)));
        }
        if !members.insert(relation.name.as_str()) {
            return Err(SchemaError::invalid(name, format!("member {} declared twice", relation.name)));
        }
    }

    let keys = def.fields.iter().filter(|f| f.is_key).count();
    if keys > 1 {
        return Err(SchemaError::invalid(name, "more than one key field"));
    }
    if def.extends.is_none() && keys == 0 {
        return Err(SchemaError::invalid(name, "root entity declares no key field"));
    }
    Ok(())
}

/// Invariants of a merged member set: one key, no name shared by a field
/// and a relation
fn check_merged(name: &str, fields: &[FieldDef], relations: &[RelationDef]) -> Result<()> {
    match fields.iter().filter(|f| f.is_key).count() {
        1 => {}
        0 => return Err(SchemaError::invalid(name, "resolved entity has no key field")),
        n => return Err(SchemaError::invalid(name, format!("resolved entity has {} key fields", n))),
    }
    if let Some(clash) = relations.iter().find(|r| fields.iter().any(|f| f.name == r.name)) {
        return Err(SchemaError::invalid(
            name,
            format!("{} is both a field and a relation", clash.name),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn interaction() -> EntityDef {
        EntityDef::new("Interaction").field(FieldDef::new("delay", FieldType::Number))
    }

    fn question() -> EntityDef {
        EntityDef::new("Question")
            .field(FieldDef::new("type", FieldType::String).required())
            .field(FieldDef::new("label", FieldType::String).required())
            .field(FieldDef::new("required", FieldType::Boolean).default_value(false))
    }

    fn quizz() -> EntityDef {
        EntityDef::extending("Quizz", "Interaction")
            .field(FieldDef::new("delay", FieldType::Number))
            .relation(RelationDef::many("question", "Question"))
    }

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register_all([interaction(), question(), quizz()]).unwrap();
        registry
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchemaRegistry>();
    }

    #[test]
    fn test_resolve_root_entity_is_its_declaration() {
        let registry = registry();
        let descriptor = registry.resolve_entity("Question").unwrap();
        let def = registry.definition("Question").unwrap();
        assert_eq!(descriptor.fields, def.fields);
        assert_eq!(descriptor.relations, def.relations);
        assert_eq!(descriptor.lineage, vec!["Question"]);
    }

    #[test]
    fn test_resolve_merges_inheritance() {
        let descriptor = registry().resolve_entity("Quizz").unwrap();
        assert_eq!(descriptor.field_names(), vec!["id", "delay"]);
        assert_eq!(descriptor.relation_names(), vec!["question"]);
        assert_eq!(descriptor.lineage, vec!["Quizz", "Interaction"]);
        assert!(descriptor.field("id").unwrap().is_key);
    }

    #[test]
    fn test_child_overrides_parent() {
        let mut registry = registry();
        registry
            .register_entity(
                EntityDef::extending("TimedQuizz", "Quizz")
                    .field(FieldDef::new("delay", FieldType::Number).required())
                    .field(FieldDef::new("limit", FieldType::Number)),
            )
            .unwrap();

        let descriptor = registry.resolve_entity("TimedQuizz").unwrap();
        assert_eq!(descriptor.field_names(), vec!["id", "delay", "limit"]);
        assert!(descriptor.field("delay").unwrap().required);
        assert_eq!(descriptor.relation_names(), vec!["question"]);
    }

    #[test]
    fn test_unknown_entity() {
        let err = registry().resolve_entity("Referee").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownEntity { ref entity, referenced_by: None } if entity == "Referee"));
    }

    #[test]
    fn test_unknown_ancestor() {
        let mut registry = SchemaRegistry::new();
        registry.register_entity(EntityDef::extending("Activity", "Interaction")).unwrap();
        let err = registry.resolve_entity("Activity").unwrap_err();
        match err {
            SchemaError::UnknownEntity { entity, referenced_by } => {
                assert_eq!(entity, "Interaction");
                assert_eq!(referenced_by.as_deref(), Some("Activity"));
            }
            other => panic!("Expected UnknownEntity, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_leaves_state_untouched() {
        let mut registry = registry();
        let before: Vec<String> = registry.names().map(String::from).collect();

        let err = registry
            .register_entity(EntityDef::new("Question").field(FieldDef::new("text", FieldType::String)))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateDefinition { ref entity } if entity == "Question"));

        let after: Vec<String> = registry.names().map(String::from).collect();
        assert_eq!(before, after);
        assert_eq!(registry.definition("Question"), Some(&question()));
    }

    #[test]
    fn test_register_all_is_atomic() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register_all([interaction(), question(), interaction()])
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateDefinition { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_self_cycle() {
        let mut registry = SchemaRegistry::new();
        let mut def = EntityDef::extending("Ouroboros", "Ouroboros");
        def.fields.push(FieldDef::new("tail", FieldType::String));
        registry.register_entity(def).unwrap();

        let err = registry.resolve_entity("Ouroboros").unwrap_err();
        match err {
            SchemaError::CyclicInheritance { entity, chain } => {
                assert_eq!(entity, "Ouroboros");
                assert_eq!(chain, vec!["Ouroboros", "Ouroboros"]);
            }
            other => panic!("Expected CyclicInheritance, got {:?}", other),
        }
    }

    #[test]
    fn test_mutual_cycle() {
        let mut registry = SchemaRegistry::new();
        registry.register_entity(EntityDef::extending("A", "B")).unwrap();
        registry.register_entity(EntityDef::extending("B", "A")).unwrap();

        for name in ["A", "B"] {
            assert!(matches!(
                registry.resolve_entity(name),
                Err(SchemaError::CyclicInheritance { .. })
            ));
        }
        assert!(matches!(registry.verify(), Err(SchemaError::CyclicInheritance { .. })));
        assert!(matches!(registry.resolve_all(), Err(SchemaError::CyclicInheritance { .. })));
    }

    #[test]
    fn test_verify_dangling_relation() {
        let mut registry = registry();
        registry
            .register_entity(EntityDef::new("Step").relation(RelationDef::one("Test", "Interactoin")))
            .unwrap();
        match registry.verify().unwrap_err() {
            SchemaError::UnknownEntity { entity, referenced_by } => {
                assert_eq!(entity, "Interactoin");
                assert_eq!(referenced_by.as_deref(), Some("Step"));
            }
            other => panic!("Expected UnknownEntity, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_relation_fails_resolution() {
        let mut registry = registry();
        registry
            .register_entity(EntityDef::new("Step").relation(RelationDef::one("Test", "Interactoin")))
            .unwrap();

        match registry.resolve_entity("Step").unwrap_err() {
            SchemaError::UnknownEntity { entity, referenced_by } => {
                assert_eq!(entity, "Interactoin");
                assert_eq!(referenced_by.as_deref(), Some("Step"));
            }
            other => panic!("Expected UnknownEntity, got {:?}", other),
        }
        assert!(matches!(
            registry.validate_record("Step", &json!({"id": "s1", "Test": "i1"})),
            Err(SchemaError::UnknownEntity { .. })
        ));
        // Entities that do not point at the missing target are unaffected
        assert!(registry.resolve_entity("Quizz").is_ok());
    }

    #[test]
    fn test_inherited_dangling_relation() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_all([
                EntityDef::new("Motivation").relation(RelationDef::one("player", "Player")),
                EntityDef::extending("ConcussionProtocol", "Motivation"),
            ])
            .unwrap();
        assert!(matches!(
            registry.resolve_entity("ConcussionProtocol"),
            Err(SchemaError::UnknownEntity { ref entity, .. }) if entity == "Player"
        ));
    }

    #[test]
    fn test_subtype_cannot_drop_key() {
        let mut registry = registry();
        registry
            .register_entity(
                EntityDef::extending("NumberedQuizz", "Quizz").field(FieldDef::new("id", FieldType::Number)),
            )
            .unwrap();

        match registry.resolve_entity("NumberedQuizz").unwrap_err() {
            SchemaError::InvalidDefinition { entity, .. } => assert_eq!(entity, "NumberedQuizz"),
            other => panic!("Expected InvalidDefinition, got {:?}", other),
        }
        assert!(matches!(registry.verify(), Err(SchemaError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_subtype_cannot_add_second_key() {
        let mut registry = registry();
        registry
            .register_entity(
                EntityDef::extending("KeyedQuizz", "Quizz").field(FieldDef::new("code", FieldType::String).primary()),
            )
            .unwrap();

        assert!(matches!(
            registry.resolve_entity("KeyedQuizz"),
            Err(SchemaError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_subtype_relation_shadowing_inherited_field() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_all([
                EntityDef::new("Coach"),
                EntityDef::new("Team").field(FieldDef::new("coach", FieldType::String)),
                EntityDef::extending("HockeyTeam", "Team").relation(RelationDef::one("coach", "Coach")),
            ])
            .unwrap();

        match registry.resolve_entity("HockeyTeam").unwrap_err() {
            SchemaError::InvalidDefinition { entity, reason } => {
                assert_eq!(entity, "HockeyTeam");
                assert!(reason.contains("coach"));
            }
            other => panic!("Expected InvalidDefinition, got {:?}", other),
        }
        assert!(matches!(registry.verify(), Err(SchemaError::InvalidDefinition { .. })));
        assert!(registry.resolve_entity("Team").is_ok());
    }

    #[test]
    fn test_invalid_definitions() {
        let mut registry = SchemaRegistry::new();

        let no_key = EntityDef {
            name: "Coach".to_string(),
            extends: None,
            description: None,
            fields: vec![],
            relations: vec![],
        };
        assert!(matches!(registry.register_entity(no_key), Err(SchemaError::InvalidDefinition { .. })));

        let twice = EntityDef::new("Team").field(FieldDef::new("id", FieldType::String));
        assert!(matches!(registry.register_entity(twice), Err(SchemaError::InvalidDefinition { .. })));

        let clash = EntityDef::new("Team")
            .field(FieldDef::new("coach", FieldType::String))
            .relation(RelationDef::one("coach", "Coach"));
        assert!(matches!(registry.register_entity(clash), Err(SchemaError::InvalidDefinition { .. })));

        let bad_default = EntityDef::new("Question")
            .field(FieldDef::new("required", FieldType::Boolean).default_value("false"));
        assert!(matches!(registry.register_entity(bad_default), Err(SchemaError::InvalidDefinition { .. })));

        assert!(matches!(
            registry.register_entity(EntityDef::new("Care Plan")),
            Err(SchemaError::InvalidDefinition { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_validate_record_question() {
        let violations = registry()
            .validate_record("Question", &json!({"id": "q1", "type": "mcq"}))
            .unwrap();
        assert_eq!(violations, vec![Violation::missing("label")]);
    }

    #[test]
    fn test_validate_unknown_entity() {
        assert!(matches!(
            registry().validate_record("Referee", &json!({"id": "r1"})),
            Err(SchemaError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn test_validate_collection() {
        let records = vec![
            json!({"id": "q1", "type": "mcq", "label": "Headache?"}),
            json!({"id": "q1", "type": "scale"}),
        ];
        let violations = registry()
            .validate_collection("Question", &records, &ValidationOptions::default())
            .unwrap();
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.record == 1));
        assert!(violations.iter().any(|v| v.violation == Violation::missing("label")));
    }

    #[test]
    fn test_subtypes_and_search() {
        let registry = registry();
        assert_eq!(registry.subtypes("Interaction"), vec!["Quizz"]);
        assert!(registry.subtypes("Quizz").is_empty());

        let hits = registry.search("quiz", 5);
        assert_eq!(hits.first().map(|h| h.name.as_str()), Some("Quizz"));
        assert!(registry.search("zzzz", 5).is_empty());
    }
}
