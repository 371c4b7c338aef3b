// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collection and field vocabulary known to the catalog.

use std::collections::BTreeSet;

use corebrain_query::SchemaDescriptor;

/// Lowercase terms naming collections and fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    terms: BTreeSet<String>,
}

impl Vocabulary {
    /// Collection names, their singular forms, and every field-name segment
    /// (`unit_price` and `address.city` contribute each part).
    pub fn from_schema(schema: &SchemaDescriptor) -> Self {
        let mut vocabulary = Self::default();
        for (name, collection) in &schema.collections {
            vocabulary.insert(name);
            for field in collection.schema.keys() {
                if field == "_id" {
                    continue;
                }
                vocabulary.insert(field);
            }
        }
        vocabulary
    }

    pub fn insert(&mut self, term: &str) {
        for part in term.split(['_', '.', '-', ' ']) {
            let part = part.to_lowercase();
            if part.len() < 3 {
                continue;
            }
            if let Some(singular) = singular(&part) {
                self.terms.insert(singular);
            }
            self.terms.insert(part);
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.terms.contains(word)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Distinct vocabulary terms appearing as words of `text`.
    pub fn hits(&self, text: &str) -> usize {
        let words: BTreeSet<String> = words(text).collect();
        words.iter().filter(|w| self.matches(w)).count()
    }

    fn matches(&self, word: &str) -> bool {
        self.contains(word) || singular(word).is_some_and(|s| self.contains(&s))
    }
}

/// Lowercase alphanumeric words of `text`.
pub(crate) fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn singular(word: &str) -> Option<String> {
    if let Some(stem) = word.strip_suffix("ies") {
        return Some(format!("{stem}y"));
    }
    word.strip_suffix('s')
        .filter(|stem| stem.len() >= 3 && !stem.ends_with('s'))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebrain_query::{CollectionSchema, FieldInfo};

    fn schema() -> SchemaDescriptor {
        let mut products = CollectionSchema::default();
        for f in ["_id", "unit_price", "sales", "address.city"] {
            products.schema.insert(
                f.into(),
                FieldInfo {
                    field_type: "string".into(),
                    example: String::new(),
                },
            );
        }
        let mut schema = SchemaDescriptor::default();
        schema.collections.insert("products".into(), products);
        schema.collections.insert("categories".into(), CollectionSchema::default());
        schema
    }

    #[test]
    fn collects_collections_fields_and_singulars() {
        let v = Vocabulary::from_schema(&schema());
        for term in ["products", "product", "categories", "category", "price", "unit", "city", "sales"] {
            assert!(v.contains(term), "missing {term}");
        }
        assert!(!v.contains("_id"));
    }

    #[test]
    fn hits_count_distinct_words() {
        let v = Vocabulary::from_schema(&schema());
        assert_eq!(v.hits("Which product has the best price? price!"), 2);
        assert_eq!(v.hits("hello there"), 0);
    }
}
