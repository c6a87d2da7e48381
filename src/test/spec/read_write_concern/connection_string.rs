use serde::Deserialize;

use super::assert_concern_document_eq;
use crate::{bson::Document, options::ConnectionString, test::run_spec_test};

#[derive(Debug, Deserialize)]
struct TestFile {
    pub tests: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestCase {
    pub description: String,
    pub uri: String,
    pub valid: bool,
    pub read_concern: Option<Document>,
    pub write_concern: Option<Document>,
}

/// Rewrites the wire field names of an encoded write concern to the connection string option
/// names the fixtures use, keeping field order.
fn normalize_write_concern_doc(write_concern_doc: Document) -> Document {
    write_concern_doc
        .into_iter()
        .map(|(key, value)| match key.as_str() {
            "wtimeout" => ("wtimeoutMS".to_string(), value),
            "j" => ("journal".to_string(), value),
            _ => (key, value),
        })
        .collect()
}

async fn run_connection_string_test(test_file: TestFile) {
    for test_case in test_file.tests {
        let description = test_case.description.as_str();

        match ConnectionString::parse(&test_case.uri) {
            Ok(conn_str) => {
                assert!(test_case.valid, "{} should be rejected: {}", test_case.uri, description);

                if let Some(ref expected_read_concern) = test_case.read_concern {
                    let actual_read_concern = conn_str
                        .read_concern
                        .to_document()
                        .unwrap_or_else(|err| panic!("{:?}: {}", err, description));
                    assert_concern_document_eq(
                        &actual_read_concern,
                        expected_read_concern,
                        description,
                    );
                }

                if let Some(ref expected_write_concern) = test_case.write_concern {
                    let actual_write_concern = conn_str
                        .write_concern
                        .to_document()
                        .unwrap_or_else(|err| panic!("{:?}: {}", err, description));
                    assert_concern_document_eq(
                        &normalize_write_concern_doc(actual_write_concern),
                        expected_write_concern,
                        description,
                    );
                }
            }
            Err(err) => {
                assert!(
                    !test_case.valid,
                    "{} should parse but got {:?}: {}",
                    test_case.uri, err, description
                );
            }
        };
    }
}

#[tokio::test]
async fn run() {
    run_spec_test(
        &["read-write-concern", "connection-string"],
        run_connection_string_test,
    )
    .await;
}
