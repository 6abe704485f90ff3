//! The cache and config are shared across rayon workers.

fn assert_sync_send<T: Sync + Send>() {}

#[test]
fn test_rule_file_cache_is_sync_send() {
    assert_sync_send::<rulecov_core::RuleFileCache>();
}

#[test]
fn test_coverage_config_is_sync_send() {
    assert_sync_send::<rulecov_core::CoverageConfig>();
}

#[test]
fn test_builtin_parser_is_sync_send() {
    assert_sync_send::<rulecov_core::BuiltinApexParser>();
}

#[test]
fn test_project_report_is_sync_send() {
    assert_sync_send::<rulecov_core::ProjectReport>();
}
