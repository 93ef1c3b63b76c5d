//! Runs in its own test binary: it changes the working directory of the
//! whole process.

mod common;

use std::env;
use std::fs;
use std::path::Path;

use cc_case::{Case, Transition, load_descriptor};

#[test]
fn case_created_at_relative_path_reopens_from_inside() {
    let root = tempfile::tempdir().unwrap();
    let case_dir = root.path().join("case");
    fs::create_dir(&case_dir).unwrap();
    common::write_case_files(&case_dir, &[1.0]);
    let original = env::current_dir().unwrap();

    env::set_current_dir(root.path()).unwrap();
    let case = Case::create(common::params(Path::new("case"), Some("2020-01-03-00"), Some("1d"), false)).unwrap();
    assert!(case.path().is_absolute());
    assert!(case.path().ends_with("case"));
    drop(case);

    let descriptor = load_descriptor(&case_dir.join("config.yaml")).unwrap();
    assert!(descriptor.path.is_absolute());

    // Batch jobs run `cc2 control ./config.yaml` from the case directory.
    env::set_current_dir(&case_dir).unwrap();
    let reopened = Case::open(Path::new("./config.yaml"));
    let advanced = reopened.and_then(|mut case| case.advance());
    env::set_current_dir(original).unwrap();

    let Transition::Continue(second) = advanced.unwrap() else {
        panic!("expected a second chunk");
    };
    assert_eq!(second.start, cc_core::parse_case_date("2020-01-02-00").unwrap());
}
