use std::sync::Arc;
use std::thread;

use table_recon::keys::KeyStrategy;
use table_recon::normalize::{self, NormalizeStatus, NormalizeWarning};
use table_recon::{
    CompareOptions, Dataset, ReconError, Reconciler, ResultRegistry, StringPolicy, Value, run,
};

fn dataset(value: serde_json::Value) -> Dataset {
    Dataset::from_json(&value).expect("array of objects")
}

fn employees_source() -> Dataset {
    dataset(serde_json::json!([
        {"id": 1, "name": "Alice", "age": 25, "salary": 50000.0},
        {"id": 2, "name": "Bob", "age": 30, "salary": 60000.0},
        {"id": 3, "name": "Charlie", "age": 35, "salary": 70000.0},
        {"id": 4, "name": "David", "age": 40, "salary": 80000.0}
    ]))
}

fn employees_target() -> Dataset {
    dataset(serde_json::json!([
        {"id": 1, "name": "Alice", "age": 25, "salary": 50000.0},
        {"id": 2, "name": "Robert", "age": 31, "salary": 60500.0},
        {"id": 3, "name": "Charlie", "age": 35, "salary": 70000.0},
        {"id": 5, "name": "Eve", "age": 28, "salary": 55000.0}
    ]))
}

#[test]
fn simple_mismatch_reports_one_field_difference() {
    let source = dataset(serde_json::json!([
        {"id": 1, "name": "Alice"},
        {"id": 2, "name": "Bob"}
    ]));
    let target = dataset(serde_json::json!([
        {"id": 1, "name": "Alice"},
        {"id": 2, "name": "Robert"}
    ]));

    let result = run("simple", &source, &target, &CompareOptions::new().key(["id"]))
        .expect("comparison runs");

    assert_eq!(result.differences.fields.len(), 1);
    let difference = &result.differences.fields[0];
    assert_eq!(difference.key, vec![("id".to_string(), Value::Integer(2))]);
    assert_eq!(difference.column, "name");
    assert_eq!(difference.source_value, Value::from("Bob"));
    assert_eq!(difference.target_value, Value::from("Robert"));
    assert_eq!(result.summary.match_percentage, 50.0);
    assert_eq!(result.summary.total_differences, 1);
}

#[test]
fn missing_record_is_reported_in_one_direction_only() {
    let source = dataset(serde_json::json!([
        {"id": 1, "name": "Alice"},
        {"id": 2, "name": "Bob"},
        {"id": 3, "name": "Carol"}
    ]));
    let target = dataset(serde_json::json!([
        {"id": 1, "name": "Alice"},
        {"id": 2, "name": "Bob"}
    ]));

    let result = run("missing", &source, &target, &CompareOptions::new().key(["id"]))
        .expect("comparison runs");

    assert_eq!(result.summary.missing_in_target, 1);
    assert_eq!(
        result.differences.missing_in_target.records[0].get("id"),
        Some(&Value::Integer(3))
    );
    assert!(result.differences.missing_in_source.is_empty());
    assert!(result.differences.fields.is_empty());
}

#[test]
fn tolerance_absorbs_numeric_noise() {
    let source = dataset(serde_json::json!([{"id": 1, "salary": 50000.0}]));
    let target = dataset(serde_json::json!([{"id": 1, "salary": 50050.0}]));

    let loose = CompareOptions::new().key(["id"]).tolerance("salary", 100.0);
    let result = run("loose", &source, &target, &loose).expect("comparison runs");
    assert_eq!(result.summary.field_differences, 0);

    let tight = CompareOptions::new().key(["id"]).tolerance("salary", 10.0);
    let result = run("tight", &source, &target, &tight).expect("comparison runs");
    assert_eq!(result.summary.field_differences, 1);
    assert_eq!(result.metadata.tolerance.get("salary"), Some(&10.0));
}

#[test]
fn identical_copies_match_fully() {
    let source = employees_source();
    let result = run("self", &source, &source.clone(), &CompareOptions::new().key(["id"]))
        .expect("comparison runs");

    assert_eq!(result.summary.total_differences, 0);
    assert_eq!(result.summary.match_percentage, 100.0);
    assert!(result.ensure_no_differences().is_ok());
}

#[test]
fn missing_sets_swap_when_inputs_swap() {
    let source = employees_source();
    let target = employees_target();
    let options = CompareOptions::new().key(["id"]);

    let forward = run("forward", &source, &target, &options).expect("comparison runs");
    let backward = run("backward", &target, &source, &options).expect("comparison runs");

    assert_eq!(
        forward.differences.missing_in_target,
        backward.differences.missing_in_source
    );
    assert_eq!(
        forward.differences.missing_in_source,
        backward.differences.missing_in_target
    );
}

#[test]
fn two_empty_datasets_match_fully() {
    let result = run(
        "empty",
        &Dataset::default(),
        &Dataset::default(),
        &CompareOptions::new().key(["id"]),
    )
    .expect("comparison runs");

    assert_eq!(result.summary.source_rows, 0);
    assert_eq!(result.summary.target_rows, 0);
    assert_eq!(result.summary.match_percentage, 100.0);
    assert!(result.metadata.warnings.is_empty());
}

#[test]
fn one_empty_side_reports_everything_missing() {
    let result = run(
        "one-sided",
        &employees_source(),
        &Dataset::default(),
        &CompareOptions::new().key(["id"]),
    )
    .expect("comparison runs");

    assert_eq!(result.summary.missing_in_target, 4);
    assert_eq!(result.summary.match_percentage, 0.0);
}

#[test]
fn full_employee_comparison_counts_every_category() {
    let result = run(
        "employees",
        &employees_source(),
        &employees_target(),
        &CompareOptions::new().key(["id"]),
    )
    .expect("comparison runs");

    // id 2 differs in name, age and salary; id 4 and id 5 are one-sided.
    assert_eq!(result.summary.field_differences, 3);
    assert_eq!(result.summary.missing_in_target, 1);
    assert_eq!(result.summary.missing_in_source, 1);
    assert_eq!(result.summary.total_differences, 5);
    assert_eq!(result.summary.match_percentage, 0.0);
    assert!(result.ensure_at_most(5).is_ok());
    assert!(matches!(
        result.ensure_at_most(4),
        Err(ReconError::DifferencesExceeded { found: 5, allowed: 4, .. })
    ));
}

#[test]
fn duplicates_are_set_aside_and_conserved() {
    let source = dataset(serde_json::json!([
        {"id": 1, "name": "Alice"},
        {"id": 1, "name": "Alicia"},
        {"id": 2, "name": "Bob"},
        {"id": 2, "name": "Bob"}
    ]));
    let key = vec!["id".to_string()];

    let normalization = normalize::normalize(&source, &key, "source");
    assert!(normalization.is_clean());
    let cleaned = &normalization.dataset;
    assert_eq!(cleaned.clean.len() + cleaned.duplicates.len(), source.len());
    assert_eq!(
        cleaned.clean.records[0].get("name"),
        Some(&Value::from("Alice"))
    );

    let result = run("dupes", &source, &source, &CompareOptions::new().key(["id"]))
        .expect("comparison runs");
    assert_eq!(result.summary.source_duplicates, 2);
    assert_eq!(result.summary.target_duplicates, 2);
    assert_eq!(result.summary.source_clean_rows, 2);
    assert_eq!(result.summary.total_differences, 0);
}

#[test]
fn column_names_are_canonicalised_across_datasets() {
    let source = dataset(serde_json::json!([{"ID": 1, " Name ": "Alice"}]));
    let target = dataset(serde_json::json!([{" id ": 1, "name": "alice "}]));

    let result = run("columns", &source, &target, &CompareOptions::new().key(["Id"]))
        .expect("comparison runs");

    assert_eq!(result.metadata.key_columns, vec!["id"]);
    let mut common = result.metadata.common_columns.clone();
    common.sort();
    assert_eq!(common, vec!["id", "name"]);
    assert_eq!(result.summary.total_differences, 0);
}

#[test]
fn colliding_columns_fall_back_to_original_data() {
    let source = dataset(serde_json::json!([{"ID": 1, "id": 2}]));
    let normalization = normalize::normalize(&source, &["id".to_string()], "source");

    assert!(matches!(
        normalization.status,
        NormalizeStatus::FellBack(NormalizeWarning::ColumnCollision { .. })
    ));
    assert_eq!(normalization.dataset.clean, source);
    assert!(normalization.dataset.duplicates.is_empty());
}

#[test]
fn supplied_key_absent_from_target_disables_matching() {
    let source = dataset(serde_json::json!([{"id": 1, "name": "Alice"}]));
    let target = dataset(serde_json::json!([{"code": 1, "name": "Bob"}]));

    let result = run("absent-key", &source, &target, &CompareOptions::new().key(["id"]))
        .expect("comparison runs");

    assert!(result.metadata.key_columns.is_empty());
    assert_eq!(result.metadata.key_strategy, KeyStrategy::None);
    assert_eq!(result.summary.total_differences, 0);
    assert!(!result.metadata.warnings.is_empty());
    assert!(!result.is_reliable());
}

#[test]
fn absent_key_column_still_canonicalises_column_names() {
    let source = dataset(serde_json::json!([{"id": 1, "name": "A"}]));
    let target = dataset(serde_json::json!([{"code": 1, " Name ": "A"}]));

    let normalization = normalize::normalize(&target, &["id".to_string()], "target");
    assert!(matches!(
        normalization.status,
        NormalizeStatus::FellBack(NormalizeWarning::MissingKeyColumn { .. })
    ));
    assert!(normalization.dataset.clean.has_column("name"));
    assert!(normalization.dataset.duplicates.is_empty());

    let result = run("absent-key-columns", &source, &target, &CompareOptions::new().key(["id"]))
        .expect("comparison runs");
    assert!(result.metadata.common_columns.contains(&"name".to_string()));
    assert_eq!(result.metadata.source_only_columns, vec!["id"]);
    assert_eq!(result.metadata.target_only_columns, vec!["code"]);
}

#[test]
fn key_is_inferred_from_id_like_column() {
    let source = dataset(serde_json::json!([
        {"name": "Alice", "customer_id": 10},
        {"name": "Bob", "customer_id": 11}
    ]));
    let target = dataset(serde_json::json!([
        {"name": "Alice", "customer_id": 10},
        {"name": "Bobby", "customer_id": 11}
    ]));

    let result = run("inferred", &source, &target, &CompareOptions::new())
        .expect("comparison runs");

    assert_eq!(result.metadata.key_columns, vec!["customer_id"]);
    assert_eq!(result.metadata.key_strategy, KeyStrategy::IdLikeColumn);
    assert!(result.metadata.key_unique);
    assert_eq!(result.summary.field_differences, 1);
    assert!(result.is_reliable());
}

#[test]
fn non_unique_inferred_key_is_flagged() {
    let source = dataset(serde_json::json!([
        {"colour": "red", "size": 1},
        {"colour": "red", "size": 1}
    ]));
    let target = dataset(serde_json::json!([{"colour": "red", "size": 1}]));

    let result = run("fallback", &source, &target, &CompareOptions::new())
        .expect("comparison runs");

    assert_eq!(result.metadata.key_strategy, KeyStrategy::FirstCommonColumn);
    assert!(!result.metadata.key_unique);
    assert!(!result.is_reliable());
    assert!(!result.metadata.warnings.is_empty());
    assert_eq!(result.summary.source_duplicates, 1);
}

#[test]
fn disjoint_schemas_rely_on_missing_detection() {
    let source = dataset(serde_json::json!([{"id": 1, "a": "x"}]));
    let target = dataset(serde_json::json!([{"id": 2, "b": "y"}]));

    let result = run("disjoint", &source, &target, &CompareOptions::new().key(["id"]))
        .expect("comparison runs");

    assert_eq!(result.summary.field_differences, 0);
    assert_eq!(result.summary.missing_in_target, 1);
    assert_eq!(result.summary.missing_in_source, 1);
    assert_eq!(result.metadata.source_only_columns, vec!["a"]);
    assert_eq!(result.metadata.target_only_columns, vec!["b"]);
}

#[test]
fn excluded_columns_are_not_compared() {
    let source = dataset(serde_json::json!([{"id": 1, "updated_at": "monday", "v": 1}]));
    let target = dataset(serde_json::json!([{"id": 1, "updated_at": "tuesday", "v": 1}]));

    let result = run(
        "excluded",
        &source,
        &target,
        &CompareOptions::new().key(["id"]).exclude(["Updated_At"]),
    )
    .expect("comparison runs");

    assert_eq!(result.summary.field_differences, 0);
    assert_eq!(result.metadata.excluded_columns, vec!["updated_at"]);
    assert!(!result.metadata.common_columns.contains(&"updated_at".to_string()));
}

#[test]
fn exact_string_policy_reports_formatting_noise() {
    let source = dataset(serde_json::json!([{"id": 1, "status": "OK"}]));
    let target = dataset(serde_json::json!([{"id": 1, "status": "ok "}]));

    let relaxed = run("relaxed", &source, &target, &CompareOptions::new().key(["id"]))
        .expect("comparison runs");
    assert_eq!(relaxed.summary.field_differences, 0);

    let exact = run(
        "exact",
        &source,
        &target,
        &CompareOptions::new().key(["id"]).strings(StringPolicy::Exact),
    )
    .expect("comparison runs");
    assert_eq!(exact.summary.field_differences, 1);
}

#[test]
fn numeric_tolerance_applies_to_numeric_columns_only() {
    let reconciler = Reconciler::new();
    let result = reconciler
        .compare_with_numeric_tolerance(
            "scalar",
            &employees_source(),
            &employees_target(),
            1000.0,
            &CompareOptions::new().key(["id"]),
        )
        .expect("comparison runs");

    // age (1) and salary (500) are absorbed, the name change is not.
    assert_eq!(result.summary.field_differences, 1);
    assert_eq!(result.differences.fields[0].column, "name");
    assert_eq!(result.metadata.tolerance.get("age"), Some(&1000.0));
    assert!(!result.metadata.tolerance.contains_key("name"));
}

#[test]
fn invalid_tolerance_is_rejected() {
    let source = employees_source();
    let error = run(
        "invalid",
        &source,
        &source,
        &CompareOptions::new().key(["id"]).tolerance("salary", -1.0),
    )
    .expect_err("negative tolerance rejected");
    assert!(matches!(error, ReconError::InvalidTolerance { .. }));

    let error = Reconciler::new()
        .compare_with_numeric_tolerance("invalid", &source, &source, f64::NAN, &CompareOptions::new())
        .expect_err("NaN tolerance rejected");
    assert!(matches!(error, ReconError::InvalidTolerance { .. }));
}

#[test]
fn registry_keeps_latest_result_per_name() {
    let reconciler = Reconciler::new();
    let options = CompareOptions::new().key(["id"]);

    reconciler
        .compare("nightly", &employees_source(), &employees_target(), &options)
        .expect("comparison runs");
    reconciler
        .compare("nightly", &employees_source(), &employees_source(), &options)
        .expect("comparison runs");
    reconciler
        .compare("other", &employees_source(), &employees_target(), &options)
        .expect("comparison runs");

    let latest = reconciler.get_result("nightly").expect("stored");
    assert_eq!(latest.summary.total_differences, 0);

    let summaries = reconciler.get_all_summaries();
    assert_eq!(summaries.keys().collect::<Vec<_>>(), vec!["nightly", "other"]);
    assert_eq!(summaries["other"].total_differences, 5);

    reconciler.clear();
    assert!(reconciler.get_result("nightly").is_none());
    assert!(reconciler.get_all_summaries().is_empty());
}

#[test]
fn bounded_registry_evicts_oldest_name() {
    let registry = Arc::new(ResultRegistry::bounded(2));
    let reconciler = Reconciler::with_registry(Arc::clone(&registry));
    let source = employees_source();
    let options = CompareOptions::new().key(["id"]);

    for name in ["first", "second", "third"] {
        reconciler
            .compare(name, &source, &source, &options)
            .expect("comparison runs");
    }

    assert_eq!(registry.names(), vec!["second", "third"]);
    assert!(registry.get("first").is_none());
}

#[test]
fn shared_registry_accepts_concurrent_writers() {
    let registry = Arc::new(ResultRegistry::new());
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let reconciler = Reconciler::with_registry(Arc::clone(&registry));
            thread::spawn(move || {
                let source = employees_source();
                reconciler
                    .compare(
                        &format!("worker-{worker}"),
                        &source,
                        &employees_target(),
                        &CompareOptions::new().key(["id"]),
                    )
                    .expect("comparison runs");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker finished");
    }

    assert_eq!(registry.len(), 4);
}
