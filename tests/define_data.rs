#[test]
fn trybuild_tests() {
    let t = trybuild::TestCases::new();

    // Test successful compilations
    t.pass("tests/define_data/pass/*.rs");
}
