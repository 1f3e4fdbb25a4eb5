fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use dropstep_protocol::{
        ApiError, CommitInfo, DownloadArg, FileMetadata, LookupError, RateLimitError,
        UploadSessionAppendArg, UploadSessionFinishArg, UploadSessionFinishError,
        UploadSessionStartArg, UploadSessionStartResult, WriteMode,
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

    fn parse_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
        serde_json::from_value(load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    ///
    /// Only request arguments go through here: what we send must match the
    /// documented shape field for field.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  API:  {fixture}\n  Rust: {reserialized}"
        );
    }

    // --- Request arguments ---

    #[test]
    fn fixture_commit_info() {
        roundtrip_test::<CommitInfo>("commit_info.json");
    }

    #[test]
    fn fixture_commit_info_update() {
        roundtrip_test::<CommitInfo>("commit_info_update.json");
        let commit: CommitInfo = parse_fixture("commit_info_update.json");
        assert_eq!(
            commit.mode,
            WriteMode::Update {
                update: "a1c10ce0dd78".into()
            }
        );
    }

    #[test]
    fn fixture_upload_session_start_arg() {
        roundtrip_test::<UploadSessionStartArg>("upload_session_start_arg.json");
    }

    #[test]
    fn fixture_upload_session_append_arg() {
        roundtrip_test::<UploadSessionAppendArg>("upload_session_append_arg.json");
    }

    #[test]
    fn fixture_upload_session_finish_arg() {
        roundtrip_test::<UploadSessionFinishArg>("upload_session_finish_arg.json");
    }

    #[test]
    fn fixture_download_arg() {
        roundtrip_test::<DownloadArg>("download_arg.json");
    }

    #[test]
    fn header_json_matches_body_json_for_ascii() {
        let fixture = load_fixture("upload_session_finish_arg.json");
        let arg: UploadSessionFinishArg = serde_json::from_value(fixture.clone()).unwrap();
        let header = dropstep_protocol::to_header_json(&arg).unwrap();
        assert!(header.is_ascii());
        let reparsed: serde_json::Value = serde_json::from_str(&header).unwrap();
        assert_eq!(reparsed, fixture);
    }

    #[test]
    fn header_json_escapes_non_ascii_path() {
        let arg = DownloadArg {
            path: "/Fotos/Año nuevo/🎉.jpg".into(),
        };
        let header = dropstep_protocol::to_header_json(&arg).unwrap();
        assert_eq!(
            header,
            r#"{"path":"/Fotos/A\u00f1o nuevo/\ud83c\udf89.jpg"}"#
        );
        let back: DownloadArg = serde_json::from_str(&header).unwrap();
        assert_eq!(back, arg);
    }

    // --- Responses ---

    #[test]
    fn fixture_upload_session_start_result() {
        let result: UploadSessionStartResult = parse_fixture("upload_session_start_result.json");
        assert_eq!(result.session_id, "1234faaf0678bcde");
    }

    #[test]
    fn fixture_file_metadata_ignores_extra_fields() {
        let meta: FileMetadata = parse_fixture("file_metadata.json");
        assert_eq!(meta.name, "Prime_Numbers.txt");
        assert_eq!(meta.id, "id:a4ayc_80_OEAAAAAAAAAXw");
        assert_eq!(meta.rev, "a1c10ce0dd78");
        assert_eq!(meta.size, 7212);
        assert_eq!(meta.display_path(), "/Homework/math/Prime_Numbers.txt");
        assert_eq!(
            meta.content_hash.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert!(meta.client_modified.is_some());
    }

    // --- Error bodies ---

    #[test]
    fn fixture_append_incorrect_offset() {
        let err: ApiError<LookupError> = parse_fixture("append_incorrect_offset.json");
        assert_eq!(err.error.correct_offset(), Some(4_194_304));
    }

    #[test]
    fn fixture_finish_incorrect_offset() {
        let err: ApiError<UploadSessionFinishError> =
            parse_fixture("finish_incorrect_offset.json");
        assert_eq!(err.error.correct_offset(), Some(12_582_912));
        assert_eq!(err.error_summary, "lookup_failed/incorrect_offset/..");
    }

    #[test]
    fn fixture_finish_path_conflict() {
        let err: ApiError<UploadSessionFinishError> = parse_fixture("finish_path_conflict.json");
        assert_eq!(err.error, UploadSessionFinishError::Other);
        assert_eq!(err.error.correct_offset(), None);
        assert_eq!(err.error_summary, "path/conflict/file/..");
    }

    #[test]
    fn fixture_rate_limited() {
        let err: ApiError<RateLimitError> = parse_fixture("rate_limited.json");
        assert_eq!(err.error.retry_after, 2);
    }

    #[test]
    fn error_summary_readable_without_union() {
        let err: ApiError<serde_json::Value> = parse_fixture("finish_path_conflict.json");
        assert!(err.error_summary.starts_with("path/conflict"));
    }
}
