use netfl_core::{ClientId, Timestamp};
use netfl_metrics::{EvaluateMetrics, FitMetrics, MetricsReport};
use pretty_assertions::assert_eq;
use test_log::test;

fn ts(secs: i64) -> Timestamp {
    Timestamp::from_unix_seconds(secs).unwrap()
}

fn fit(client: u32, round: u32, train_time: f64, exchange_time: Option<f64>) -> FitMetrics {
    FitMetrics {
        client_id: ClientId(client),
        round,
        dataset_length: 10,
        train_time,
        exchange_time,
        cpu_avg: None,
        memory_avg: None,
        timestamp: ts(1_700_000_000),
    }
}

#[test]
fn fit_records_sorted_by_client() {
    let mut report = MetricsReport::new("sorting");
    report.add_fit([fit(3, 1, 1.0, None), fit(0, 1, 1.0, None)]);
    report.add_fit([fit(2, 1, 1.0, None), fit(1, 2, 1.0, None)]);

    let ids: Vec<_> = report.rounds[&1].train.iter().map(|r| r.client_id.0).collect();
    assert_eq!(ids, vec![0, 2, 3]);
    assert_eq!(report.num_rounds(), 2);
}

#[test]
fn averages_skip_first_participation() {
    let mut report = MetricsReport::new("avg");
    report.add_fit([fit(0, 1, 2.0, None), fit(1, 1, 4.0, None)]);
    report.add_fit([fit(0, 2, 3.0, Some(0.5)), fit(1, 2, 3.0, Some(1.5))]);
    assert_eq!(report.average_train_time(), 3.0);
    assert_eq!(report.average_exchange_time(), 1.0);
}

#[test]
fn evaluate_lands_in_its_round() {
    let evaluate = |round, loss| EvaluateMetrics {
        round,
        loss,
        accuracy: 0.5,
        dataset_length: 100,
        timestamp: ts(0),
    };
    let mut report = MetricsReport::new("evaluate");
    report.add_fit([fit(0, 1, 1.0, None)]);
    report.set_evaluate(evaluate(1, 0.9));
    report.set_evaluate(evaluate(1, 0.4));
    report.set_evaluate(evaluate(2, 0.3));

    assert_eq!(report.num_rounds(), 2);
    assert_eq!(report.rounds[&1].evaluate.as_ref().map(|e| e.loss), Some(0.4));
    assert_eq!(report.rounds[&1].train.len(), 1);
    assert_eq!(report.rounds[&2].evaluate.as_ref().map(|e| e.loss), Some(0.3));
    assert!(report.rounds[&2].train.is_empty());
}

#[test]
fn json_layout() {
    let mut report = MetricsReport::new("layout");
    report.add_fit([fit(0, 1, 1.5, None)]);
    report.set_evaluate(EvaluateMetrics {
        round: 1,
        loss: 0.25,
        accuracy: 0.5,
        dataset_length: 100,
        timestamp: ts(0),
    });

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "name": "layout",
            "rounds": {
                "1": {
                    "train": [{
                        "client_id": 0,
                        "round": 1,
                        "dataset_length": 10,
                        "train_time": 1.5,
                        "timestamp": "2023-11-14T22:13:20Z"
                    }],
                    "evaluate": {
                        "round": 1,
                        "loss": 0.25,
                        "accuracy": 0.5,
                        "dataset_length": 100,
                        "timestamp": "1970-01-01T00:00:00Z"
                    }
                }
            }
        })
    );
}

#[test]
fn write_json_creates_parent_dirs() {
    let dir = std::env::temp_dir().join(format!("netfl-report-{}", std::process::id()));
    let path = dir.join("nested").join("report.json");
    let mut report = MetricsReport::new("file");
    report.add_fit([fit(0, 1, 1.0, None)]);
    report.write_json(&path).unwrap();

    let back: MetricsReport =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(back, report);
    std::fs::remove_dir_all(dir).unwrap();
}
