use std::error::Error;

use assetflow::config::Mode;
use assetflow::Pipeline;
use assetflow_test_utils::{ConfigBuilder, ProjectFixture};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn each_group_rebuilds_only_its_own_task() -> TestResult {
    let project = ProjectFixture::new();
    let cfg = project.config(
        &ConfigBuilder::new()
            .index("index.html")
            .index("robots.txt")
            .bundle("app.js", &["source/assets/scripts/app.js"])
            .bundle("vendor.js", &["vendor/*.js"])
            .task_dep("index", &["styles"]),
    );
    let pipeline = Pipeline::new(cfg, Mode::Development)?;
    let bindings = pipeline.standard_bindings()?;

    assert_eq!(bindings.len(), 5);
    let cases = [
        ("source/assets/images/logo.png", vec!["images"]),
        ("source/assets/images/icons/star.svg", vec!["images"]),
        ("source/assets/videos/intro.webm", vec!["videos"]),
        ("source/index.html", vec!["index"]),
        ("source/robots.txt", vec!["index"]),
        ("source/assets/scripts/app.js", vec!["scripts"]),
        ("vendor/jquery.js", vec!["scripts"]),
        ("source/assets/styles/_colors.scss", vec!["styles"]),
        ("source/assets/styles/index.scss", vec!["styles"]),
    ];
    for (path, expected) in cases {
        assert_eq!(bindings.tasks_for(path), expected, "{path}");
    }

    // Dependents of `styles` are not re-run by a stylesheet change.
    assert!(!bindings.tasks_for("source/assets/styles/index.scss").contains(&"index".to_string()));
    Ok(())
}

#[test]
fn unrelated_and_output_paths_trigger_nothing() -> TestResult {
    let project = ProjectFixture::new();
    let cfg = project.config(&ConfigBuilder::new().index("index.html"));
    let pipeline = Pipeline::new(cfg, Mode::Development)?;
    let bindings = pipeline.standard_bindings()?;

    for path in [
        "README.md",
        "Assetflow.toml",
        "build/development/index.html",
        "build/development/assets/images/logo.png",
        "source/assets/images/notes.txt",
    ] {
        assert!(bindings.tasks_for(path).is_empty(), "{path}");
    }
    Ok(())
}
