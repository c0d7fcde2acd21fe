//! Resolved entity descriptors and the export manifest
//!
//! An [`EntityDescriptor`] is what the registry hands to consumers: the merged
//! field and relation set of an entity after its `extends` chain has been
//! folded in. [`CatalogManifest`] bundles every descriptor of a catalog with
//! checksums so an external persistence layer can detect drift.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::Checksum;
use crate::error::Result;
use crate::schema::{Cardinality, FieldDef, FieldType, RelationDef};
use crate::version::CatalogVersion;

/// Merged view of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    /// The entity itself first, then each ancestor up to the root
    pub lineage: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ancestor fields first; overrides keep the ancestor's position
    pub fields: Vec<FieldDef>,
    pub relations: Vec<RelationDef>,
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn relation_names(&self) -> Vec<&str> {
        self.relations.iter().map(|r| r.name.as_str()).collect()
    }

    /// The primary key field, if any
    pub fn key_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.is_key)
    }

    /// Direct parent, if the entity extends another
    pub fn parent(&self) -> Option<&str> {
        self.lineage.get(1).map(String::as_str)
    }

    pub fn is_subtype_of(&self, ancestor: &str) -> bool {
        self.lineage.iter().skip(1).any(|a| a == ancestor)
    }

    /// field name -> {type, required, unique, isKey, default}
    pub fn field_table(&self) -> BTreeMap<String, FieldDescriptor> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), FieldDescriptor::from(f)))
            .collect()
    }

    /// relation name -> {targetEntity, cardinality, required}
    pub fn relation_table(&self) -> BTreeMap<String, RelationDescriptor> {
        self.relations
            .iter()
            .map(|r| (r.name.clone(), RelationDescriptor::from(r)))
            .collect()
    }

    /// Structural descriptor in the shape external loaders consume
    pub fn to_export(&self) -> ExportedEntity {
        ExportedEntity {
            name: self.name.clone(),
            extends: self.parent().map(String::from),
            description: self.description.clone(),
            fields: self.field_table(),
            relations: self.relation_table(),
        }
    }
}

/// Per-field structural descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    #[serde(flatten)]
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub is_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&FieldDef> for FieldDescriptor {
    fn from(f: &FieldDef) -> Self {
        Self {
            field_type: f.field_type,
            required: f.required,
            unique: f.unique,
            is_key: f.is_key,
            default: f.default.clone(),
            description: f.description.clone(),
        }
    }
}

/// Per-relation descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDescriptor {
    pub target_entity: String,
    pub cardinality: Cardinality,
    pub required: bool,
}

impl From<&RelationDef> for RelationDescriptor {
    fn from(r: &RelationDef) -> Self {
        Self {
            target_entity: r.target.clone(),
            cardinality: r.cardinality,
            required: r.required,
        }
    }
}

/// Exported form of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedEntity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: BTreeMap<String, FieldDescriptor>,
    pub relations: BTreeMap<String, RelationDescriptor>,
}

/// One checksummed entry of a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub entity: ExportedEntity,
    pub checksum: Checksum,
}

/// Statistics about a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestStats {
    pub total_entities: usize,
    pub root_entities: usize,
    pub subtypes: usize,
    pub total_fields: usize,
    pub total_relations: usize,
}

/// Every descriptor of a catalog version, with checksums
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogManifest {
    pub version: CatalogVersion,
    pub generated_at: DateTime<Utc>,
    pub entities: Vec<ManifestEntry>,
    pub manifest_checksum: Checksum,
    pub stats: ManifestStats,
}

impl CatalogManifest {
    pub fn new(version: CatalogVersion, descriptors: &[EntityDescriptor]) -> Result<Self> {
        let entities = descriptors
            .iter()
            .map(|d| -> Result<ManifestEntry> {
                let entity = d.to_export();
                let checksum = Checksum::of_json(&entity)?;
                Ok(ManifestEntry { entity, checksum })
            })
            .collect::<Result<Vec<_>>>()?;

        let stats = ManifestStats {
            total_entities: entities.len(),
            root_entities: entities.iter().filter(|e| e.entity.extends.is_none()).count(),
            subtypes: entities.iter().filter(|e| e.entity.extends.is_some()).count(),
            total_fields: entities.iter().map(|e| e.entity.fields.len()).sum(),
            total_relations: entities.iter().map(|e| e.entity.relations.len()).sum(),
        };

        let manifest_checksum = Checksum::combine(entities.iter().map(|e| &e.checksum));

        Ok(Self {
            version,
            generated_at: Utc::now(),
            entities,
            manifest_checksum,
            stats,
        })
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entities.iter().find(|e| e.entity.name == name)
    }

    /// Recompute every checksum and compare
    pub fn verify_all(&self) -> bool {
        let entries_ok = self.entities.iter().all(|e| {
            Checksum::of_json(&e.entity)
                .map(|c| c == e.checksum)
                .unwrap_or(false)
        });
        entries_ok && Checksum::combine(self.entities.iter().map(|e| &e.checksum)) == self.manifest_checksum
    }
}
