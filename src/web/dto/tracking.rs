use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingCreateBody {
    #[validate(length(min = 1, max = 255))]
    pub verb: String,
    #[validate(length(min = 1))]
    pub object_id: String,
    pub content_id: Option<Uuid>,
    /// xAPI statement; must carry `actor`, `verb` and `object`.
    pub statement: Value,
    pub result: Option<Value>,
    pub context: Option<Value>,
}

impl TrackingCreateBody {
    pub fn statement_is_complete(&self) -> bool {
        self.statement
            .as_object()
            .is_some_and(|s| ["actor", "verb", "object"].iter().all(|key| s.contains_key(*key)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn body(statement: Value) -> TrackingCreateBody {
        TrackingCreateBody {
            verb: "answered".to_string(),
            object_id: "q1".to_string(),
            content_id: None,
            statement,
            result: None,
            context: None,
        }
    }

    #[test]
    fn statement_needs_actor_verb_object() {
        assert!(body(json!({ "actor": {}, "verb": {}, "object": {} })).statement_is_complete());
        assert!(!body(json!({ "actor": {}, "verb": {} })).statement_is_complete());
        assert!(!body(json!("answered")).statement_is_complete());
    }
}
