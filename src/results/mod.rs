mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::CustomDbRow;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::driver::DriverOutput;
    use crate::executor::OutputFormat;
    use crate::types::SqlValue;

    fn output() -> DriverOutput {
        DriverOutput {
            columns: vec!["id".into(), "posts.title".into()],
            rows: vec![
                vec![SqlValue::Int(1), "first".into()],
                vec![SqlValue::Int(1), "second".into()],
                vec![SqlValue::Int(2), SqlValue::Null],
            ],
            rows_affected: 0,
        }
    }

    #[test]
    fn rows_resolve_dotted_aliases() {
        let set = ResultSet::from_driver(output(), OutputFormat::Object, 100);
        assert_eq!(set.rows_affected, 3);
        assert_eq!(set.results[1].get("posts.title"), Some(&SqlValue::Text("second".into())));
        assert_eq!(set.results[2].get("missing"), None);
        assert_eq!(set.results[0].get_by_index(0), Some(&SqlValue::Int(1)));
    }

    #[test]
    fn max_rows_truncates() {
        let set = ResultSet::from_driver(output(), OutputFormat::Array, 2);
        assert_eq!(set.results.len(), 2);
        assert_eq!(set.to_json(), json!([[1, "first"], [1, "second"]]));
    }

    #[test]
    fn object_format_keys_by_column() {
        let set = ResultSet::from_driver(output(), OutputFormat::Object, 0);
        assert_eq!(set.to_json()[2], json!({"id": 2, "posts.title": null}));
    }

    #[test]
    fn dml_counts_survive_without_rows() {
        let set = ResultSet::from_driver(
            DriverOutput {
                rows_affected: 7,
                ..DriverOutput::default()
            },
            OutputFormat::Object,
            100,
        );
        assert!(set.results.is_empty());
        assert_eq!(set.rows_affected, 7);
    }
}
