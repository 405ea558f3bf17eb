use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The three collections the store is allowed to address. Each one names its
/// owner/subject field differently — `people_facts` uses the Telegram-flavoured
/// `telegram_id`/`telegram_name`, the other two use the generic `owner_id`/`name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    People,
    Community,
    Bot,
}

impl Collection {
    pub fn qdrant_name(&self) -> &'static str {
        match self {
            Collection::People => "people_facts",
            Collection::Community => "community_facts",
            Collection::Bot => "bot_facts",
        }
    }

    /// The field name that carries the owner/subject identifier in this
    /// collection's payload.
    pub fn owner_field(&self) -> &'static str {
        match self {
            Collection::People => "telegram_id",
            Collection::Community => "owner_id",
            Collection::Bot => "owner_id",
        }
    }

    /// The field name that carries the display name in this collection's payload.
    pub fn name_field(&self) -> &'static str {
        match self {
            Collection::People => "telegram_name",
            Collection::Community => "name",
            Collection::Bot => "name",
        }
    }

    pub const ALL: [Collection; 3] = [Collection::People, Collection::Community, Collection::Bot];
}

/// A sparse vector: strictly-increasing non-negative indices paired with values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// `true` iff indices are strictly increasing and non-negative (the
    /// latter is structural for `u32`) and lengths line up.
    pub fn is_well_formed(&self) -> bool {
        if self.indices.len() != self.values.len() {
            return false;
        }
        self.indices.windows(2).all(|w| w[0] < w[1])
    }
}

/// A single remembered fact, as persisted in one of the three collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub text: String,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Equality/prefix filter over a collection's owner and name fields.
/// Values are string-quoted in the wire grammar; embedded quotes are
/// rejected rather than silently escaped (see `FilterExpr::push_equals`).
#[derive(Debug, Clone, Default)]
pub struct FilterExpr {
    pub equals: Vec<(String, String)>,
    pub prefix: Vec<(String, String)>,
}

impl FilterExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Result<Self, String> {
        self.push_equals(field, value)?;
        Ok(self)
    }

    pub fn prefix(mut self, field: impl Into<String>, value: impl Into<String>) -> Result<Self, String> {
        self.push_prefix(field, value)?;
        Ok(self)
    }

    pub fn push_equals(&mut self, field: impl Into<String>, value: impl Into<String>) -> Result<(), String> {
        let value = value.into();
        reject_embedded_quote(&value)?;
        self.equals.push((field.into(), value));
        Ok(())
    }

    pub fn push_prefix(&mut self, field: impl Into<String>, value: impl Into<String>) -> Result<(), String> {
        let value = value.into();
        reject_embedded_quote(&value)?;
        self.prefix.push((field.into(), value));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.prefix.is_empty()
    }
}

fn reject_embedded_quote(value: &str) -> Result<(), String> {
    if value.contains('"') {
        return Err(format!("filter value contains an embedded quote: {value:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_name_fields_differ_by_collection() {
        assert_eq!(Collection::People.owner_field(), "telegram_id");
        assert_eq!(Collection::People.name_field(), "telegram_name");
        assert_eq!(Collection::Community.owner_field(), "owner_id");
        assert_eq!(Collection::Bot.owner_field(), "owner_id");
        assert_eq!(Collection::Community.name_field(), "name");
    }

    #[test]
    fn sparse_vector_strictly_increasing() {
        let v = SparseVector {
            indices: vec![1, 3, 5],
            values: vec![0.1, 0.2, 0.3],
        };
        assert!(v.is_well_formed());
        let bad = SparseVector {
            indices: vec![1, 1, 5],
            values: vec![0.1, 0.2, 0.3],
        };
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn filter_rejects_embedded_quote() {
        let f = FilterExpr::new().equals("telegram_id", "42\"oops");
        assert!(f.is_err());
    }
}
