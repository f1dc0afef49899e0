use crate::intent::aggregate_intents;
use crate::models::{EntityMap, IntentDecision, QueryResult};

/// Combines per-sub-query decisions and decoded entities into the final result.
pub fn assemble_result(
    decisions: impl IntoIterator<Item = IntentDecision>,
    entities: EntityMap,
) -> QueryResult {
    QueryResult {
        intents: aggregate_intents(decisions),
        entities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EMPTY_QUERY, NO_INTENTS};

    #[test]
    fn merges_intents_and_entities() {
        let mut entities = EntityMap::new();
        entities.insert("DESTINATION".to_string(), vec!["Manila".to_string()]);

        let result = assemble_result(
            vec![
                IntentDecision::Accepted {
                    labels: vec!["get_fare".to_string()],
                },
                IntentDecision::Accepted {
                    labels: vec!["get_travel_time".to_string(), "get_fare".to_string()],
                },
            ],
            entities.clone(),
        );

        assert_eq!(result.intents, vec!["get_fare", "get_travel_time"]);
        assert_eq!(result.entities, entities);
    }

    #[test]
    fn no_decisions_yield_sentinel() {
        let result = assemble_result(Vec::new(), EntityMap::new());
        assert_eq!(result.intents, vec![NO_INTENTS]);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn empty_query_result_shape() {
        let result = QueryResult::empty_query();
        assert_eq!(result.intents, vec![EMPTY_QUERY]);
        assert!(result.entities.is_empty());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "intents": [EMPTY_QUERY], "entities": {} })
        );
    }
}
