//! On-disk ledger format
//!
//! ```json
//! { "version": 1, "saved_at": "...", "nodes": [ {record}, ... ], "history": [ [ {record}, ... ], ... ] }
//! ```
//!
//! A bare JSON array of node records (the legacy save format) is accepted on
//! load and treated as a document without history.

use serde::{Deserialize, Serialize};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{History, Snapshot};

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    pub nodes: Snapshot,
    #[serde(default, skip_serializing_if = "History::is_empty")]
    pub history: History,
}

impl LedgerDocument {
    pub fn new(nodes: Snapshot, history: History) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            saved_at: Some(chrono::Local::now().to_rfc3339()),
            nodes,
            history,
        }
    }

    pub fn from_json(text: &str) -> ApplicationResult<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| persistence("parse JSON", e))?;

        if value.is_array() {
            let nodes: Snapshot =
                serde_json::from_value(value).map_err(|e| persistence("decode node records", e))?;
            return Ok(Self {
                version: DOCUMENT_VERSION,
                saved_at: None,
                nodes,
                history: History::new(),
            });
        }

        let document: Self =
            serde_json::from_value(value).map_err(|e| persistence("decode ledger document", e))?;
        if document.version > DOCUMENT_VERSION {
            return Err(ApplicationError::UnsupportedVersion {
                found: document.version,
                supported: DOCUMENT_VERSION,
            });
        }
        Ok(document)
    }

    pub fn to_json(&self) -> ApplicationResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| persistence("encode ledger document", e))
    }
}

fn persistence(context: &str, source: serde_json::Error) -> ApplicationError {
    ApplicationError::Persistence {
        context: context.to_string(),
        source,
    }
}
