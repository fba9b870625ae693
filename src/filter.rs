//! Equality filters built from query strings.
//!
//! `GET /projects?isFeatured=true&tech=CSS` becomes a [`Filter`] with one
//! [`Condition`] per distinct key. Values are cast using the collection's
//! field schema before they reach SQL, so `true` compares against a stored
//! JSON boolean rather than the string `"true"`.
//!
//! | Field kind | One value | Repeated key |
//! |------------|-----------|--------------|
//! | string / unknown | exact match | match any value |
//! | bool | cast `true/false/1/0/yes/no` | match any value |
//! | number | cast to float | match any value |
//! | list | list contains value | list equals given values |
//! | `_id` | identifier match | match any identifier |

use thiserror::Error;

use crate::models::{FieldKind, Model};

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("invalid filter field: '{0}'")]
    InvalidField(String),

    #[error("cannot cast '{value}' to {expected} for field '{field}'")]
    Cast {
        field: String,
        expected: &'static str,
        value: String,
    },
}

/// A value bound into the generated SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Real(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Identifier is one of the values.
    Id(Vec<String>),
    /// Scalar at `path` equals one of the values.
    Eq { path: String, values: Vec<SqlValue> },
    /// List at `path` has an element equal to `value`.
    Contains { path: String, value: String },
    /// List at `path` equals `json` exactly.
    ListEq { path: String, json: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// A filter that matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter for `M` from raw query pairs.
    pub fn parse<M: Model>(pairs: &[(String, String)]) -> Result<Self, FilterError> {
        let mut conditions = Vec::new();
        for (key, values) in group_pairs(pairs) {
            conditions.push(condition_for::<M>(key, values)?);
        }
        Ok(Self { conditions })
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Render the conditions as SQL predicates joined with `AND`, with the
    /// values to bind in order. An empty filter renders as `1 = 1`.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        if self.conditions.is_empty() {
            return ("1 = 1".to_string(), Vec::new());
        }

        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut binds = Vec::new();

        for condition in &self.conditions {
            match condition {
                Condition::Id(ids) => {
                    clauses.push(format!("id {}", in_or_eq(ids.len())));
                    binds.extend(ids.iter().cloned().map(SqlValue::Text));
                }
                Condition::Eq { path, values } => {
                    clauses.push(format!("json_extract(body, ?) {}", in_or_eq(values.len())));
                    binds.push(SqlValue::Text(path.clone()));
                    binds.extend(values.iter().cloned());
                }
                Condition::Contains { path, value } => {
                    clauses.push(
                        "EXISTS (SELECT 1 FROM json_each(documents.body, ?) WHERE json_each.type = 'text' AND json_each.value = ?)"
                            .to_string(),
                    );
                    binds.push(SqlValue::Text(path.clone()));
                    binds.push(SqlValue::Text(value.clone()));
                }
                Condition::ListEq { path, json } => {
                    clauses.push("json_extract(body, ?) = ?".to_string());
                    binds.push(SqlValue::Text(path.clone()));
                    binds.push(SqlValue::Text(json.clone()));
                }
            }
        }

        (clauses.join(" AND "), binds)
    }
}

/// Group values by key, keeping keys in first-seen order.
fn group_pairs(pairs: &[(String, String)]) -> Vec<(&str, Vec<&str>)> {
    let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
    for (key, value) in pairs {
        match grouped.iter_mut().find(|(k, _)| *k == key.as_str()) {
            Some((_, values)) => values.push(value.as_str()),
            None => grouped.push((key.as_str(), vec![value.as_str()])),
        }
    }
    grouped
}

fn condition_for<M: Model>(key: &str, values: Vec<&str>) -> Result<Condition, FilterError> {
    if key.is_empty() || key.contains('"') {
        return Err(FilterError::InvalidField(key.to_string()));
    }

    if key == "_id" {
        return Ok(Condition::Id(values.into_iter().map(String::from).collect()));
    }

    let path = json_path(key);
    let kind = M::field(key).map(|f| f.kind).unwrap_or(FieldKind::String);

    let condition = match kind {
        FieldKind::List if values.len() == 1 => Condition::Contains {
            path,
            value: values[0].to_string(),
        },
        FieldKind::List => Condition::ListEq {
            path,
            json: serde_json::Value::from(values).to_string(),
        },
        FieldKind::String => Condition::Eq {
            path,
            values: values
                .into_iter()
                .map(|v| SqlValue::Text(v.to_string()))
                .collect(),
        },
        FieldKind::Bool => Condition::Eq {
            path,
            values: values
                .into_iter()
                .map(|v| cast_bool(key, v).map(|b| SqlValue::Int(b as i64)))
                .collect::<Result<_, _>>()?,
        },
        FieldKind::Number => Condition::Eq {
            path,
            values: values
                .into_iter()
                .map(|v| cast_number(key, v).map(SqlValue::Real))
                .collect::<Result<_, _>>()?,
        },
    };

    Ok(condition)
}

fn json_path(key: &str) -> String {
    format!("$.\"{}\"", key)
}

fn in_or_eq(n: usize) -> String {
    if n == 1 {
        "= ?".to_string()
    } else {
        format!("IN ({})", vec!["?"; n].join(", "))
    }
}

fn cast_bool(field: &str, value: &str) -> Result<bool, FilterError> {
    match value {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(FilterError::Cast {
            field: field.to_string(),
            expected: "boolean",
            value: value.to_string(),
        }),
    }
}

fn cast_number(field: &str, value: &str) -> Result<f64, FilterError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| FilterError::Cast {
            field: field.to_string(),
            expected: "number",
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, Project, Skill};

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_query_matches_all() {
        let filter = Filter::parse::<Project>(&[]).unwrap();
        assert!(filter.is_empty());
        assert_eq!(filter.to_sql(), ("1 = 1".to_string(), vec![]));
    }

    #[test]
    fn test_bool_field_is_cast() {
        let filter = Filter::parse::<Project>(&pairs(&[("isFeatured", "true")])).unwrap();
        assert_eq!(
            filter.conditions(),
            &[Condition::Eq {
                path: "$.\"isFeatured\"".to_string(),
                values: vec![SqlValue::Int(1)],
            }]
        );

        let filter = Filter::parse::<Project>(&pairs(&[("isFeatured", "no")])).unwrap();
        let (_, binds) = filter.to_sql();
        assert_eq!(binds[1], SqlValue::Int(0));
    }

    #[test]
    fn test_bool_cast_error() {
        let err = Filter::parse::<Project>(&pairs(&[("isFeatured", "maybe")])).unwrap_err();
        assert_eq!(
            err,
            FilterError::Cast {
                field: "isFeatured".to_string(),
                expected: "boolean",
                value: "maybe".to_string(),
            }
        );
    }

    #[test]
    fn test_number_field() {
        let filter = Filter::parse::<Contact>(&pairs(&[("telephone", " 12345 ")])).unwrap();
        let (_, binds) = filter.to_sql();
        assert_eq!(binds[1], SqlValue::Real(12345.0));

        assert!(Filter::parse::<Contact>(&pairs(&[("telephone", "call me")])).is_err());
        assert!(Filter::parse::<Contact>(&pairs(&[("telephone", "NaN")])).is_err());
    }

    #[test]
    fn test_list_contains_single_value() {
        let filter = Filter::parse::<Project>(&pairs(&[("tech", "CSS")])).unwrap();
        let (sql, binds) = filter.to_sql();
        assert!(sql.starts_with("EXISTS (SELECT 1 FROM json_each"));
        assert_eq!(
            binds,
            vec![
                SqlValue::Text("$.\"tech\"".to_string()),
                SqlValue::Text("CSS".to_string())
            ]
        );
    }

    #[test]
    fn test_list_repeated_key_is_exact_match() {
        let filter =
            Filter::parse::<Project>(&pairs(&[("tech", "HTML"), ("tech", "CSS")])).unwrap();
        assert_eq!(
            filter.conditions(),
            &[Condition::ListEq {
                path: "$.\"tech\"".to_string(),
                json: r#"["HTML","CSS"]"#.to_string(),
            }]
        );
    }

    #[test]
    fn test_scalar_repeated_key_is_in() {
        let filter =
            Filter::parse::<Skill>(&pairs(&[("title", "Backend"), ("title", "Frontend")]))
                .unwrap();
        let (sql, binds) = filter.to_sql();
        assert_eq!(sql, "json_extract(body, ?) IN (?, ?)");
        assert_eq!(binds.len(), 3);
    }

    #[test]
    fn test_multiple_keys_joined_with_and() {
        let filter = Filter::parse::<Project>(&pairs(&[
            ("title", "Portfolio"),
            ("isFeatured", "true"),
            ("title", "Other"),
        ]))
        .unwrap();
        let (sql, binds) = filter.to_sql();
        assert_eq!(
            sql,
            "json_extract(body, ?) IN (?, ?) AND json_extract(body, ?) = ?"
        );
        assert_eq!(binds.len(), 5);
    }

    #[test]
    fn test_unknown_field_compared_as_string() {
        let filter = Filter::parse::<Project>(&pairs(&[("colour", "red")])).unwrap();
        assert_eq!(
            filter.conditions(),
            &[Condition::Eq {
                path: "$.\"colour\"".to_string(),
                values: vec![SqlValue::Text("red".to_string())],
            }]
        );
    }

    #[test]
    fn test_id_condition() {
        let filter = Filter::parse::<Skill>(&pairs(&[("_id", "abc")])).unwrap();
        assert_eq!(filter.to_sql().0, "id = ?");
    }

    #[test]
    fn test_invalid_field_names() {
        assert_eq!(
            Filter::parse::<Skill>(&pairs(&[("", "x")])).unwrap_err(),
            FilterError::InvalidField(String::new())
        );
        assert!(Filter::parse::<Skill>(&pairs(&[("a\"b", "x")])).is_err());
    }
}
