// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema descriptors used to ground and check model-suggested queries.

use std::collections::BTreeMap;

use corebrain_core::PermissionContext;
use serde::{Deserialize, Serialize};

/// Inferred type and a representative example for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    #[serde(rename = "type")]
    pub field_type: String,
    pub example: String,
}

/// One collection's document count and field map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub document_count: u64,
    pub schema: BTreeMap<String, FieldInfo>,
}

impl CollectionSchema {
    pub fn has_field(&self, name: &str) -> bool {
        self.schema.contains_key(name)
    }
}

/// Schema of every collection visible to a caller.
///
/// Serializes as the introspection shape `{collections: {<name>: {...}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub collections: BTreeMap<String, CollectionSchema>,
}

impl SchemaDescriptor {
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// The subset visible to `ctx`: inaccessible collections and hidden
    /// fields are removed.
    pub fn visible_to(&self, ctx: &PermissionContext) -> SchemaDescriptor {
        let collections = self
            .collections
            .iter()
            .filter(|(name, _)| ctx.can_access(name))
            .map(|(name, coll)| {
                let schema = coll
                    .schema
                    .iter()
                    .filter(|(field, _)| ctx.field_visible(name, field))
                    .map(|(field, info)| (field.clone(), info.clone()))
                    .collect();
                (
                    name.clone(),
                    CollectionSchema {
                        document_count: coll.document_count,
                        schema,
                    },
                )
            })
            .collect();
        SchemaDescriptor { collections }
    }
}
