#[test]
fn fhub_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/fhub_error_pass.rs");
}
