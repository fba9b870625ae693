//! Database seeding from the bundled datasets.
//!
//! Seeding clears the projects, thoughts and skills collections and inserts
//! one record per dataset entry. Each collection is replaced inside its own
//! transaction and every write is awaited, so a failure leaves that
//! collection as it was and is reported with the offending entry index.
//!
//! The contacts collection is never seeded.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::Config;
use crate::models::{Model, Project, Skill, Thought};
use crate::store::DocumentStore;
use crate::{db, migrate};

const PROJECTS_JSON: &str = include_str!("../data/projects.json");
const THOUGHTS_JSON: &str = include_str!("../data/thoughts.json");
const SKILLS_JSON: &str = include_str!("../data/skills.json");

/// The records written by a seed run.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub projects: Vec<Project>,
    pub thoughts: Vec<Thought>,
    pub skills: Vec<Skill>,
}

impl Datasets {
    /// Datasets compiled into the binary from `data/*.json`.
    pub fn bundled() -> Result<Self> {
        Ok(Self {
            projects: parse_dataset(PROJECTS_JSON, "projects.json")?,
            thoughts: parse_dataset(THOUGHTS_JSON, "thoughts.json")?,
            skills: parse_dataset(SKILLS_JSON, "skills.json")?,
        })
    }
}

fn parse_dataset<T: DeserializeOwned>(json: &str, name: &str) -> Result<Vec<T>> {
    serde_json::from_str(json).with_context(|| format!("Failed to parse bundled {}", name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: &'static str,
    pub removed: u64,
    pub inserted: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub collections: Vec<CollectionReport>,
}

impl SeedReport {
    pub fn inserted(&self, collection: &str) -> Option<u64> {
        self.collections
            .iter()
            .find(|c| c.collection == collection)
            .map(|c| c.inserted)
    }
}

/// Replace the content collections with `datasets`.
pub async fn seed_database(store: &DocumentStore, datasets: &Datasets) -> Result<SeedReport> {
    let collections = vec![
        replace_collection(store, &datasets.projects).await?,
        replace_collection(store, &datasets.thoughts).await?,
        replace_collection(store, &datasets.skills).await?,
    ];
    Ok(SeedReport { collections })
}

async fn replace_collection<M: Model>(
    store: &DocumentStore,
    records: &[M],
) -> Result<CollectionReport> {
    let outcome = store
        .replace_all(records)
        .await
        .map_err(|(index, e)| {
            anyhow::Error::new(e).context(format!(
                "Seeding {} failed at entry {}; collection left unchanged",
                M::COLLECTION,
                index
            ))
        })?;

    info!(
        collection = M::COLLECTION,
        removed = outcome.removed,
        inserted = outcome.inserted,
        "collection seeded"
    );

    Ok(CollectionReport {
        collection: M::COLLECTION,
        removed: outcome.removed,
        inserted: outcome.inserted,
    })
}

/// CLI entry point for `portfolio-api seed`.
pub async fn run_seed(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;
    let store = DocumentStore::new(pool);

    let report = seed_database(&store, &Datasets::bundled()?).await?;

    println!("seed");
    for c in &report.collections {
        println!(
            "  {}: removed {}, inserted {}",
            c.collection, c.removed, c.inserted
        );
    }
    println!("ok");

    store.pool().close().await;
    Ok(())
}
