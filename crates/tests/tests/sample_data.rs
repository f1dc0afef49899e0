use std::path::PathBuf;

use commute_core::{DecisionThresholds, OOD_INTENT};
use commute_ml::{MlSettings, MlStack};
use commute_observability::AppMetrics;
use commute_pipeline::QueryPipeline;

fn data_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

fn sample_stack() -> MlStack {
    MlStack::load(&MlSettings {
        intent_dataset: Some(data_root().join("intents.jsonl")),
        gazetteer: Some(data_root().join("gazetteer.json")),
        wordpiece_vocab: None,
    })
    .expect("sample models should load")
}

#[test]
fn sample_dataset_trains_centroid_model() {
    let stack = sample_stack();

    assert_eq!(stack.classifier.model_name(), "centroid-intent");
    assert_eq!(
        stack.classifier.labels(),
        [
            "get_distance",
            "get_fare",
            "get_location",
            "get_route",
            "get_travel_time",
            "greet"
        ]
    );
}

#[test]
fn sample_gazetteer_drives_entities() {
    let result = sample_pipeline()
        .understand("which jeep goes from Lawton to Quiapo")
        .unwrap();

    assert_eq!(result.entities["TRANSPORT"], vec!["jeep"]);
    assert_eq!(result.entities["ORIGIN"], vec!["Lawton"]);
    assert_eq!(result.entities["DESTINATION"], vec!["Quiapo"]);
    assert_eq!(result.intents, vec!["get_route"]);
}

fn sample_pipeline() -> QueryPipeline {
    QueryPipeline::from_stack(
        &sample_stack(),
        DecisionThresholds::default(),
        AppMetrics::shared(),
    )
}

#[test]
fn sample_dataset_picks_exact_intents() {
    let pipeline = sample_pipeline();
    let cases = [
        ("how much is the fare from Cubao to Makati", vec!["get_fare"]),
        ("what is the fare to Pasay", vec!["get_fare"]),
        (
            "what's the fare to Manila and how long to get there",
            vec!["get_fare", "get_travel_time"],
        ),
        ("how far is Makati from Cubao", vec!["get_distance"]),
        ("where is the nearest MRT station", vec!["get_location"]),
        ("hello", vec!["greet"]),
    ];

    for (query, expected) in cases {
        let result = pipeline.understand(query).unwrap();
        assert_eq!(result.intents, expected, "intents for {query:?}");
    }
}

#[test]
fn sample_dataset_flags_unrelated_text() {
    let result = sample_pipeline().understand("sing me a song").unwrap();
    assert_eq!(result.intents, vec![OOD_INTENT]);
}
