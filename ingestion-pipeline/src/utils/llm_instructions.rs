use serde_json::json;

pub static GRAPH_EXTRACTION_SYSTEM_MESSAGE: &str = "\
You extract entities and facts from a single conversational turn for a personal \
knowledge graph. Identify the people, places, projects, preferences, and other \
named things mentioned, and the facts relating them.

Rules:
- Reuse a name from the \"Known entities\" list whenever the episode refers to \
the same thing, even if worded slightly differently. Only mint a new entity when \
nothing in the known list plausibly matches.
- Each entity needs a short local `key` (e.g. \"e1\") used to reference it in facts; \
the key has no meaning outside this response.
- A fact's predicate is a short upper-case relation name (e.g. LIKES, WORKS_ON, \
LIVES_IN). `fact_text` is one sentence stating the fact in plain language.
- Skip facts you are not reasonably confident about. An empty `entities`/`edges` \
list is a valid response for small talk with nothing worth remembering.";

pub static SUMMARIZE_SYSTEM_MESSAGE: &str = "\
You write a dense summary of a window of conversational turns for long-term \
memory storage. The summary is read back much later, without the original \
turns, so it must stand on its own.

Rules:
- Preserve emotional moments and relationship dynamics, technical decisions \
and their outcomes, and concrete project progress or discoveries.
- Write in plain prose, a few sentences, not a bullet list.
- Classify the window with one `summary_type`: \"work\" (tasks, projects, \
code), \"social\" (relationship, small talk, feelings), \"technical\" \
(architecture, tooling, debugging detail), or \"mixed\" when no single type \
dominates.";

pub fn get_summary_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "summary_text": { "type": "string" },
            "summary_type": {
                "type": "string",
                "enum": ["work", "social", "technical", "mixed"]
            }
        },
        "required": ["summary_text", "summary_type"],
        "additionalProperties": false
    })
}

pub fn get_graph_extraction_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "key": { "type": "string" },
                        "name": { "type": "string" },
                        "labels": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["key", "name", "labels"],
                    "additionalProperties": false
                }
            },
            "edges": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "subject_key": { "type": "string" },
                        "object_key": { "type": "string" },
                        "predicate": { "type": "string" },
                        "fact_text": { "type": "string" }
                    },
                    "required": ["subject_key", "object_key", "predicate", "fact_text"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["entities", "edges"],
        "additionalProperties": false
    })
}
