// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound shapes of the direct query endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub natural_query: String,
    /// The approved query, or null when none ran.
    pub mongo_query: Option<Value>,
    pub result: QueryResult,
    pub explanation: String,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Value>,
    pub count: usize,
    pub query_time_ms: f64,
    pub has_more: bool,
    pub metadata: ResultMetadata,
}

impl QueryResult {
    /// The result of a request where no query ran.
    pub fn empty(collection: Option<&str>) -> Self {
        Self {
            data: Vec::new(),
            count: 0,
            query_time_ms: 0.0,
            has_more: false,
            metadata: ResultMetadata {
                total_count: 0,
                skip: 0,
                limit: 0,
                collection: collection.map(str::to_string),
                pipeline_stages: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub total_count: u64,
    pub skip: u64,
    pub limit: u32,
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_stages: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Wall-clock seconds spent on the request.
    pub processing_time: f64,
    pub model: String,
}
