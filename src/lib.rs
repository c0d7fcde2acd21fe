//! Care-Plan Schema Registry
//!
//! Declarative entity schemas for the sports care-plan domain: games, players,
//! teams, quizzes, exams, follow-ups, care plans and concussion-protocol
//! tracking. The registry only declares shape; persistence, business rules
//! and workflow execution belong to the consuming framework.
//!
//! ## Features
//!
//! - **Explicit declarations**: entities are built with [`EntityDef`] builders
//! - **Inheritance**: `extends` chains are merged into one [`EntityDescriptor`]
//! - **Cycle detection**: cyclic chains fail with `CyclicInheritance` before merging
//! - **Record validation**: required members and semantic types, all violations reported
//! - **Export**: field and relation descriptors plus a checksummed manifest
//!
//! ## Example
//!
//! ```
//! let catalog = careplan_schemas::catalog::shared()?;
//! let quizz = catalog.resolve_entity("Quizz")?;
//! assert_eq!(quizz.field_names(), vec!["id", "delay"]);
//!
//! let violations = catalog.validate_record("Question", &serde_json::json!({"id": "q1", "type": "mcq"}))?;
//! assert_eq!(violations.len(), 1);
//! # Ok::<(), careplan_schemas::SchemaError>(())
//! ```

pub mod catalog;
pub mod checksum;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod registry;
pub mod schema;
pub mod validate;
pub mod version;

pub use checksum::Checksum;
pub use config::CatalogConfig;
pub use descriptor::{CatalogManifest, EntityDescriptor, FieldDescriptor, RelationDescriptor};
pub use error::{Result, SchemaError};
pub use graph::InheritanceGraph;
pub use registry::SchemaRegistry;
pub use schema::{Cardinality, EntityDef, FieldDef, FieldType, RelationDef, ScalarType};
pub use validate::{RecordViolation, ValidationOptions, Violation, ViolationKind};
pub use version::CatalogVersion;
