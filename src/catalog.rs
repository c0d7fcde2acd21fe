//! Care-plan catalog
//!
//! Entity declarations for the sports / concussion-protocol care-plan domain.
//! The catalog is built once per process through [`shared`] and read
//! concurrently afterwards.

use std::sync::OnceLock;

use semver::Version;
use tracing::info;

use crate::error::Result;
use crate::registry::SchemaRegistry;
use crate::schema::{EntityDef, FieldDef, FieldType, RelationDef, ScalarType};
use crate::version::CatalogVersion;

/// Version of the catalog snapshot declared below
pub const CATALOG_VERSION: CatalogVersion = CatalogVersion::new(Version::new(0, 2, 0));

static CATALOG: OnceLock<SchemaRegistry> = OnceLock::new();

fn string(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::String)
}

fn number(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::Number)
}

fn boolean(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::Boolean)
}

fn date(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::DateIso8601)
}

/// Every entity of the catalog, in declaration order
pub fn definitions() -> Vec<EntityDef> {
    vec![
        // Sport, teams and players
        EntityDef::new("Sport").field(string("label").required().unique()),
        EntityDef::new("Season")
            .field(date("startDate").required())
            .field(date("endDate").required())
            .field(string("sportId").required())
            .relation(RelationDef::many("games", "Game")),
        EntityDef::new("Game")
            .field(date("date").required())
            .field(string("location").required())
            .field(number("homeScore").required())
            .field(number("awayScore").required())
            .field(boolean("completed").required())
            .field(string("homeTeamId").required())
            .field(string("awayTeamId").required()),
        EntityDef::new("Coach"),
        EntityDef::new("Team")
            .field(string("sportId").required())
            .relation(RelationDef::many("players", "Player"))
            .relation(RelationDef::one("coach", "Coach")),
        EntityDef::new("User")
            .field(string("firstName").required())
            .field(string("lastName").required())
            .field(date("birthday").required())
            .field(string("gender").required())
            .field(string("location")),
        EntityDef::new("Player")
            .describe("A user playing a given sport for a given team")
            .field(string("sportId").required())
            .field(string("teamId").required())
            .field(string("userId").required())
            .field(number("number").required().describe("Jersey number of the player"))
            .relation(RelationDef::many("hasPlayed", "Game"))
            .relation(RelationDef::many("followUps", "FollowUp")),
        // Interactions
        EntityDef::new("Interaction").field(number("delay")),
        EntityDef::new("Question")
            .field(string("type").required())
            .field(string("label").required())
            .field(boolean("required").default_value(false)),
        EntityDef::extending("Quizz", "Interaction")
            .field(number("delay"))
            .relation(RelationDef::many("question", "Question")),
        EntityDef::new("Action").field(string("label").required()),
        EntityDef::extending("Question2", "Action")
            .field(string("type").required())
            .field(string("label").required())
            .field(boolean("required").default_value(false)),
        EntityDef::extending("Quizz2", "Interaction").relation(RelationDef::many("actions", "Question2")),
        EntityDef::extending("Activity", "Interaction")
            .field(string("type").required())
            .field(string("label").required()),
        EntityDef::extending("Instructions", "Interaction")
            .field(string("type").required())
            .field(string("text").required()),
        // CarePlan
        EntityDef::new("Step")
            .describe("A single step of a care plan, following a pre-established plan or schedule")
            .relation(RelationDef::one("Test", "Interaction")),
        EntityDef::new("PlannedTask").relation(RelationDef::many("step", "Step")),
        EntityDef::new("CarePlan").relation(RelationDef::one("planner", "PlannedTask")),
        // Exam
        EntityDef::new("Answer")
            .field(
                string("quizzId")
                    .required()
                    .describe("Identifier of the question this answer is given for"),
            )
            .field(FieldDef::new("value", FieldType::Any).required()),
        EntityDef::new("Exam")
            .field(date("startDate").required())
            .field(date("endDate").required())
            .field(number("score").required())
            .field(boolean("completed").required())
            .relation(RelationDef::one("test", "Interaction"))
            .relation(RelationDef::many("answers", "Answer")),
        // Follow-up
        EntityDef::new("Motivation").field(string("description").required()),
        EntityDef::extending("ConcussionProtocol", "Motivation")
            .field(string("playerId").required())
            .field(FieldDef::new("voters", FieldType::ArrayOf(ScalarType::String)).required())
            .relation(RelationDef::one("game", "Game")),
        EntityDef::new("FollowUp")
            .field(date("startDate").required())
            .relation(RelationDef::many("examens", "Exam"))
            .relation(RelationDef::one("carePlan", "CarePlan"))
            .relation(RelationDef::one("motivation", "Motivation").optional()),
    ]
}

/// A fresh, verified registry holding the catalog
pub fn build() -> Result<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry.register_all(definitions())?;
    registry.verify()?;
    info!(entities = registry.len(), version = %CATALOG_VERSION, "care-plan catalog ready");
    Ok(registry)
}

/// The process-wide catalog, built on first use.
///
/// After the first successful call every caller reads the same immutable
/// registry with no locking.
pub fn shared() -> Result<&'static SchemaRegistry> {
    if let Some(registry) = CATALOG.get() {
        return Ok(registry);
    }
    let registry = build()?;
    Ok(CATALOG.get_or_init(|| registry))
}
