//! Document store handle.
//!
//! [`DocumentStore`] owns the connection pool and is constructed once at
//! startup, then shared with every request handler through router state.
//! Records of each [`Model`] live in the `documents` table tagged with the
//! model's collection name and serialized as JSON.

use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::filter::{Filter, FilterError, SqlValue};
use crate::models::{Model, Record};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed document {id} in {collection}: {source}")]
    Document {
        collection: &'static str,
        id: String,
        source: serde_json::Error,
    },

    #[error("cannot serialize record for {collection}: {source}")]
    Serialize {
        collection: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All records of `M` matching `filter`, in insertion order.
    pub async fn find<M: Model>(&self, filter: &Filter) -> Result<Vec<Record<M>>, StoreError> {
        let (predicate, binds) = filter.to_sql();
        let sql = format!(
            "SELECT id, body FROM documents WHERE collection = ? AND ({}) ORDER BY rowid ASC",
            predicate
        );

        let mut query = sqlx::query(&sql).bind(M::COLLECTION);
        for value in binds {
            query = match value {
                SqlValue::Text(s) => query.bind(s),
                SqlValue::Int(i) => query.bind(i),
                SqlValue::Real(f) => query.bind(f),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<Record<M>, StoreError> {
                let id: String = row.get("id");
                let body: String = row.get("body");
                let data: M = serde_json::from_str(&body).map_err(|source| StoreError::Document {
                    collection: M::COLLECTION,
                    id: id.clone(),
                    source,
                })?;
                Ok(Record { id, data })
            })
            .collect()
    }

    pub async fn count<M: Model>(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(M::COLLECTION)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Insert one record and return its new identifier.
    pub async fn insert<M: Model>(&self, record: &M) -> Result<String, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = insert_in::<M>(&mut tx, record).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Replace the whole collection of `M` with `records` in one transaction.
    ///
    /// On error nothing is changed; the error reports the index of the
    /// record that failed.
    pub async fn replace_all<M: Model>(
        &self,
        records: &[M],
    ) -> Result<ReplaceOutcome, (usize, StoreError)> {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err((0, e.into())),
        };

        let removed = match delete_in::<M>(&mut tx).await {
            Ok(removed) => removed,
            Err(e) => return Err((0, e)),
        };

        for (index, record) in records.iter().enumerate() {
            // Dropping `tx` on the error path rolls back.
            if let Err(e) = insert_in::<M>(&mut tx, record).await {
                return Err((index, e));
            }
        }

        if let Err(e) = tx.commit().await {
            return Err((records.len(), e.into()));
        }

        Ok(ReplaceOutcome {
            removed,
            inserted: records.len() as u64,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub removed: u64,
    pub inserted: u64,
}

async fn delete_in<M: Model>(tx: &mut Transaction<'_, Sqlite>) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM documents WHERE collection = ?")
        .bind(M::COLLECTION)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

async fn insert_in<M: Model>(
    tx: &mut Transaction<'_, Sqlite>,
    record: &M,
) -> Result<String, StoreError> {
    let body = serde_json::to_string(record).map_err(|source| StoreError::Serialize {
        collection: M::COLLECTION,
        source,
    })?;
    let id = Uuid::new_v4().simple().to_string();

    sqlx::query("INSERT INTO documents (id, collection, body) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(M::COLLECTION)
        .bind(&body)
        .execute(&mut **tx)
        .await?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Contact, Project, Skill};
    use crate::{db, migrate};
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_store(tmp: &TempDir) -> DocumentStore {
        let mut cfg = Config::default();
        cfg.db.url = format!("sqlite:{}", tmp.path().join("store.sqlite").display());
        let pool = db::connect(&cfg).await.unwrap();
        migrate::create_schema(&pool).await.unwrap();
        DocumentStore::new(pool)
    }

    fn query(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn project(title: &str, featured: Option<bool>, tech: &[&str]) -> Project {
        Project {
            title: Some(title.to_string()),
            is_featured: featured,
            tech: tech.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    async fn titles(store: &DocumentStore, q: &[(&str, &str)]) -> Vec<String> {
        let filter = Filter::parse::<Project>(&query(q)).unwrap();
        store
            .find::<Project>(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.data.title.unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_find_all_in_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        for title in ["c", "a", "b"] {
            store.insert(&project(title, None, &[])).await.unwrap();
        }

        assert_eq!(titles(&store, &[]).await, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        store.insert(&project("Portfolio", None, &[])).await.unwrap();
        store
            .insert(&Skill {
                title: Some("Portfolio".into()),
                skill_items: vec![],
            })
            .await
            .unwrap();

        assert_eq!(store.count::<Project>().await.unwrap(), 1);
        assert_eq!(store.count::<Skill>().await.unwrap(), 1);
        assert_eq!(store.count::<Contact>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bool_filter_does_not_match_missing_field() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        store
            .insert(&project("Portfolio", Some(true), &["HTML", "CSS"]))
            .await
            .unwrap();
        store.insert(&project("Weather", None, &["React"])).await.unwrap();

        assert_eq!(
            titles(&store, &[("isFeatured", "true")]).await,
            vec!["Portfolio"]
        );
        assert!(titles(&store, &[("isFeatured", "false")]).await.is_empty());
    }

    #[tokio::test]
    async fn test_string_and_list_filters() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        store
            .insert(&project("Portfolio", Some(true), &["HTML", "CSS"]))
            .await
            .unwrap();
        store
            .insert(&project("Weather", Some(false), &["React", "CSS"]))
            .await
            .unwrap();

        assert_eq!(titles(&store, &[("title", "Weather")]).await, vec!["Weather"]);
        assert!(titles(&store, &[("title", "weather")]).await.is_empty());
        assert!(titles(&store, &[("title", "Weath")]).await.is_empty());
        assert_eq!(
            titles(&store, &[("tech", "CSS")]).await,
            vec!["Portfolio", "Weather"]
        );
        assert_eq!(
            titles(&store, &[("tech", "HTML"), ("tech", "CSS")]).await,
            vec!["Portfolio"]
        );
        assert!(titles(&store, &[("tech", "CSS"), ("tech", "HTML")])
            .await
            .is_empty());
        assert_eq!(
            titles(&store, &[("tech", "CSS"), ("isFeatured", "false")]).await,
            vec!["Weather"]
        );
        assert!(titles(&store, &[("colour", "red")]).await.is_empty());
    }

    #[tokio::test]
    async fn test_filter_by_id() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        let id = store.insert(&project("Portfolio", None, &[])).await.unwrap();
        store.insert(&project("Other", None, &[])).await.unwrap();

        let filter = Filter::parse::<Project>(&query(&[("_id", id.as_str())])).unwrap();
        let found = store.find::<Project>(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }

    #[tokio::test]
    async fn test_number_filter() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        store
            .insert(&Contact {
                name: Some("Ada".into()),
                telephone: Some(701234567.0),
                ..Default::default()
            })
            .await
            .unwrap();

        let filter = Filter::parse::<Contact>(&query(&[("telephone", "701234567")])).unwrap();
        let found = store.find::<Contact>(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].data.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_skill_items_of_any_shape() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        store
            .insert(&Skill {
                title: Some("Tools".into()),
                skill_items: vec![json!("Git"), json!({ "name": "Figma" }), json!(3)],
            })
            .await
            .unwrap();

        let filter = Filter::parse::<Skill>(&query(&[("skillItems", "Git")])).unwrap();
        let found = store.find::<Skill>(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].data.skill_items[1], json!({ "name": "Figma" }));
    }

    #[tokio::test]
    async fn test_replace_all_swaps_collection() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        store.insert(&project("old", None, &[])).await.unwrap();

        let outcome = store
            .replace_all(&[project("a", None, &[]), project("b", None, &[])])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReplaceOutcome {
                removed: 1,
                inserted: 2
            }
        );
        assert_eq!(titles(&store, &[]).await, vec!["a", "b"]);

        let outcome = store.replace_all::<Project>(&[]).await.unwrap();
        assert_eq!(outcome.removed, 2);
        assert_eq!(store.count::<Project>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_scalar_key_matches_any_value() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        store.insert(&project("a", Some(true), &[])).await.unwrap();
        store.insert(&project("b", Some(false), &[])).await.unwrap();
        store.insert(&project("c", None, &[])).await.unwrap();

        assert_eq!(
            titles(&store, &[("title", "a"), ("title", "b")]).await,
            vec!["a", "b"]
        );
        assert_eq!(
            titles(&store, &[("isFeatured", "true"), ("isFeatured", "false")]).await,
            vec!["a", "b"]
        );
        assert_eq!(
            titles(&store, &[("title", "a"), ("title", "zzz")]).await,
            vec!["a"]
        );
    }

    #[tokio::test]
    async fn test_list_contains_ignores_object_elements() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp).await;

        store
            .insert(&Skill {
                title: Some("Tools".into()),
                skill_items: vec![json!({ "name": "Figma" })],
            })
            .await
            .unwrap();

        let filter =
            Filter::parse::<Skill>(&query(&[("skillItems", r#"{"name":"Figma"}"#)])).unwrap();
        assert!(store.find::<Skill>(&filter).await.unwrap().is_empty());
    }
}
