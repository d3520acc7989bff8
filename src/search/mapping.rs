//! Standard index mapping for catalog documents.
//!
//! Labels and definitions are multi-language objects (`{"fi": .., "en": ..}`),
//! indexed as analysed text with a lower-cased keyword sub-field for sorting
//! and exact matching in every language.

use serde_json::{json, Value};

/// Normalizer name referenced by keyword sub-fields.
const KEYWORD_NORMALIZER: &str = "keyword_normalizer";

/// Mapping shared by every catalog alias.
pub fn standard_mapping() -> Value {
    let localized = json!({
        "type": "text",
        "analyzer": "standard",
        "fields": {
            "keyword": {
                "type": "keyword",
                "normalizer": KEYWORD_NORMALIZER
            }
        }
    });

    json!({
        "dynamic_templates": [
            {
                "prefLabel": {
                    "path_match": "prefLabel.*",
                    "mapping": localized.clone()
                }
            },
            {
                "definition": {
                    "path_match": "definition.*",
                    "mapping": localized.clone()
                }
            },
            {
                "description": {
                    "path_match": "description.*",
                    "mapping": localized
                }
            }
        ],
        "properties": {
            "id": { "type": "keyword" },
            "entityType": { "type": "keyword" },
            "codeValue": {
                "type": "text",
                "analyzer": "standard",
                "fields": {
                    "raw": { "type": "keyword", "normalizer": KEYWORD_NORMALIZER }
                }
            },
            "uri": { "type": "keyword" },
            "status": { "type": "keyword" },
            "created": { "type": "date" },
            "modified": { "type": "date" },
            "prefLabel": { "type": "object" },
            "definition": { "type": "object" },
            "description": { "type": "object" }
        }
    })
}

/// Full create-index body: settings with the result window and the
/// normalizer, plus the given mapping.
pub fn index_body(mapping: &Value, max_result_window: u32) -> Value {
    json!({
        "settings": {
            "index": {
                "max_result_window": max_result_window
            },
            "analysis": {
                "normalizer": {
                    KEYWORD_NORMALIZER: {
                        "type": "custom",
                        "filter": ["lowercase"]
                    }
                }
            }
        },
        "mappings": mapping
    })
}
