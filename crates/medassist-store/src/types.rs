//! Index records and the Azure AI Search index schema.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Name of the HNSW algorithm configuration referenced by the `embedding` field.
pub const VECTOR_CONFIG_NAME: &str = "my-vector-config";

/// One record in a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

impl IndexDocument {
    /// Record for the chunk at `ordinal`; the id is the ordinal as a string.
    pub fn for_chunk(ordinal: usize, content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: ordinal.to_string(),
            content: content.into(),
            embedding,
        }
    }
}

/// Index definition: string key, lucene-analyzed content, HNSW cosine vectors.
pub fn index_definition(name: &str, dimensions: usize) -> Value {
    json!({
        "name": name,
        "fields": [
            {
                "name": "id",
                "type": "Edm.String",
                "key": true,
                "searchable": false
            },
            {
                "name": "content",
                "type": "Edm.String",
                "searchable": true,
                "analyzer": "standard.lucene"
            },
            {
                "name": "embedding",
                "type": "Collection(Edm.Single)",
                "dimensions": dimensions,
                "vectorSearchConfiguration": VECTOR_CONFIG_NAME
            }
        ],
        "vectorSearch": {
            "algorithmConfigurations": [
                {
                    "name": VECTOR_CONFIG_NAME,
                    "kind": "hnsw",
                    "hnswParameters": {
                        "m": 4,
                        "efConstruction": 400,
                        "efSearch": 500,
                        "metric": "cosine"
                    }
                }
            ]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_ordinal() {
        let doc = IndexDocument::for_chunk(7, "texte", vec![0.0]);
        assert_eq!(doc.id, "7");
        let wire = serde_json::to_value(&doc).unwrap();
        assert_eq!(wire["id"], "7");
        assert_eq!(wire["content"], "texte");
    }

    #[test]
    fn test_index_definition_shape() {
        let def = index_definition("docs", 1536);
        assert_eq!(def["name"], "docs");
        assert_eq!(def["fields"][0]["key"], true);
        assert_eq!(def["fields"][1]["analyzer"], "standard.lucene");
        assert_eq!(def["fields"][2]["dimensions"], 1536);
        let hnsw = &def["vectorSearch"]["algorithmConfigurations"][0]["hnswParameters"];
        assert_eq!(hnsw["m"], 4);
        assert_eq!(hnsw["efConstruction"], 400);
        assert_eq!(hnsw["efSearch"], 500);
        assert_eq!(hnsw["metric"], "cosine");
    }
}
