mod integration {
    mod catalog_tests;
    mod config_tests;
    mod dedupe_tests;
    mod scan_tests;
}
