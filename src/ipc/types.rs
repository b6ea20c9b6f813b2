use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::tree::CourseDraft;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// The builder's open course draft. Lives here between requests and only
    /// reaches the database through an explicit `builder.save`.
    pub draft: Option<CourseDraft>,
}
