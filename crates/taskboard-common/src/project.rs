use serde::{Deserialize, Serialize};

use crate::id::ProjectId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id", alias = "id")]
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Body of `POST /projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: String,
}
