fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use clusterlink_protocol::constants::{
        DONE_MESSAGE, ERROR_PREFIX, FIELD_DATA, FIELD_OPERATION, FIELD_STATE,
    };
    use clusterlink_protocol::{
        ClusterSnapshot, ClusterStatusForm, JobRunState, JobState, OpStatusForm,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes numbers so that the coordinator's `1` and our `1.0` compare
    /// equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values
    /// (order-independent, float-normalized).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  coordinator: {fixture}\n  clusterlink: {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_cluster_snapshot() {
        let snapshot: ClusterSnapshot = roundtrip_test("cluster_snapshot.json");

        assert_eq!(snapshot.jobs.len(), 4);
        assert_eq!(snapshot.mapreduce_nodes, 4);
        assert_eq!(snapshot.jobs[1].status, JobRunState::Failed);
        assert!(snapshot.jobs[1].failure_info.is_some());
        assert!(snapshot.jobs[0].failure_info.is_none());
        assert_eq!(snapshot.jobs[3].status, JobRunState::Prep);
    }

    #[test]
    fn fixture_empty_cluster_snapshot() {
        let snapshot: ClusterSnapshot = roundtrip_test("empty_cluster_snapshot.json");
        assert!(snapshot.jobs.is_empty());
    }

    #[test]
    fn fixture_killed_job_state() {
        let job: JobState = roundtrip_test("killed_job_state.json");
        assert_eq!(job.status, JobRunState::Killed);
        assert!(job.status.is_terminal());
        assert_eq!(job.elapsed_seconds, 17);
    }

    #[test]
    fn fixture_op_status_form() {
        let form: OpStatusForm = roundtrip_test("op_status_form.json");
        assert!(form.state.starts_with("xfer "));
    }

    #[test]
    fn fixture_op_status_error_form() {
        let form: OpStatusForm = roundtrip_test("op_status_error_form.json");
        assert!(form.state.starts_with(ERROR_PREFIX));
    }

    #[test]
    fn form_fields_match_endpoint_contract() {
        let op = serde_json::to_value(OpStatusForm::new("op-1", DONE_MESSAGE)).unwrap();
        let keys: Vec<&str> = op.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&FIELD_STATE));
        assert!(keys.contains(&FIELD_OPERATION));
        assert_eq!(op[FIELD_STATE], "Done");

        let cluster = serde_json::to_value(ClusterStatusForm::new("{}")).unwrap();
        let keys: Vec<&str> = cluster.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, [FIELD_DATA]);
    }

    #[test]
    fn cluster_form_carries_fixture_snapshot() {
        let snapshot: ClusterSnapshot =
            serde_json::from_value(load_fixture("cluster_snapshot.json")).unwrap();
        let form = ClusterStatusForm::from_snapshot(&snapshot).unwrap();

        let embedded: serde_json::Value = serde_json::from_str(&form.data).unwrap();
        assert_eq!(
            normalize_value(&embedded),
            normalize_value(&load_fixture("cluster_snapshot.json"))
        );
        assert_eq!(form.snapshot().unwrap(), snapshot);
    }
}
