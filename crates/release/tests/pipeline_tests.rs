//! End-to-end tests for packaging and publishing a project checkout.

use flate2::read::GzDecoder;
use riffraff_ci::BuildEnvironment;
use riffraff_release::{BuildManifest, MemoryStore, Pipeline, Publisher, Settings, Step};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;

const DESCRIPTOR: &str = r#"{"name":"demo","repository":{"url":"git@x/demo"}}"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn project(descriptor: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", descriptor);
    write(temp.path(), "deploy.json", r#"{"stack":"demo"}"#);
    write(temp.path(), "cloudformation.json", r#"{"Resources":{}}"#);
    write(temp.path(), "lib/index.js", "module.exports = 1;");
    temp
}

fn circle_env() -> BuildEnvironment {
    let vars: HashMap<&str, &str> = [
        ("CI", "true"),
        ("CIRCLECI", "true"),
        ("CIRCLE_BRANCH", "release-1"),
        ("CIRCLE_SHA1", "abc123"),
        ("CIRCLE_BUILD_NUM", "42"),
    ]
    .into_iter()
    .collect();
    BuildEnvironment::from_lookup(|name| vars.get(name).map(ToString::to_string))
}

fn bundle_names(path: &Path) -> Vec<String> {
    let zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    zip.file_names().map(str::to_string).collect()
}

fn tarball_names(path: &Path) -> Vec<String> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
    archive
        .entries()
        .unwrap()
        .map(|entry| entry.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_dev_build_produces_archive_and_bundle() {
    let temp = project(DESCRIPTOR);
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();

    assert_eq!(settings.build_id, "dev");
    assert_eq!(settings.branch_name, "dev");
    assert_eq!(settings.vcs_revision, "dev");

    let report = Pipeline::new(&settings).run().await.unwrap();

    assert_eq!(report.completed, Step::ALL.to_vec());
    assert_eq!(
        report.archive_path,
        temp.path().join("target/riffraff/packages/demo/demo.tgz")
    );
    assert_eq!(report.bundle_path, temp.path().join("target/riffraff/artifacts.zip"));
    assert!(report.archive_path.is_file());
    assert!(report.bundle_path.is_file());

    let names = bundle_names(&report.bundle_path);
    assert!(names.contains(&"deploy.json".to_string()));
    assert!(names.contains(&"packages/cloudformation/cloudformation.json".to_string()));
    assert!(names.contains(&"packages/demo/demo.tgz".to_string()));
    assert_eq!(report.bundle_files, 3);

    let tarball = tarball_names(&report.archive_path);
    assert!(tarball.iter().any(|n| n == "lib/index.js"));
    assert!(tarball.iter().any(|n| n == "package.json"));
    assert!(!tarball.iter().any(|n| n.starts_with("target")));
}

#[tokio::test]
async fn test_ci_build_publishes_manifest_and_bundle() {
    let temp = project(DESCRIPTOR);
    let settings = Settings::load(temp.path(), temp.path(), circle_env()).unwrap();
    Pipeline::new(&settings).run().await.unwrap();

    let store = MemoryStore::new();
    let report = Publisher::new(&store).publish(&settings).await.unwrap();

    assert_eq!(report.bundle.key, "demo/42/artifacts.zip");
    assert_eq!(report.manifest.key, "demo/42/build.json");

    let bundle = store.get("riffraff-artifact", "demo/42/artifacts.zip").unwrap();
    assert_eq!(bundle.bytes, std::fs::read(settings.bundle_path()).unwrap());

    let manifest = store.get("riffraff-builds", "demo/42/build.json").unwrap();
    let manifest: BuildManifest = serde_json::from_slice(&manifest.bytes).unwrap();
    assert_eq!(manifest.branch, "release-1");
    assert_eq!(manifest.vcs_url, "git@x/demo");
    assert_eq!(manifest.revision, "abc123");
    assert_eq!(manifest.build_number, "42");
    assert_eq!(manifest.project_name, "demo");
    assert_eq!(manifest.start_time, settings.build_start_time_iso());
}

#[tokio::test]
async fn test_missing_cloudformation_stops_before_compression() {
    let temp = project(DESCRIPTOR);
    std::fs::remove_file(temp.path().join("cloudformation.json")).unwrap();
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();

    let err = Pipeline::new(&settings).run().await.unwrap_err();

    assert_eq!(err.failed_step(), Some(Step::StageCloudformation));
    assert!(!settings.archive_path().exists());
    assert!(!settings.bundle_path().exists());
}

#[tokio::test]
async fn test_missing_deploy_descriptor_fails_staging() {
    let temp = project(DESCRIPTOR);
    std::fs::remove_file(temp.path().join("deploy.json")).unwrap();
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();

    let err = Pipeline::new(&settings).run().await.unwrap_err();

    assert_eq!(err.failed_step(), Some(Step::StageDeployDescriptor));
    assert!(!settings.bundle_path().exists());
}

#[tokio::test]
async fn test_custom_cloudformation_path() {
    let temp = project(r#"{"name":"demo","cloudformation":"infra/stack.json"}"#);
    write(temp.path(), "infra/stack.json", "{}");
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();

    let report = Pipeline::new(&settings).run().await.unwrap();

    let names = bundle_names(&report.bundle_path);
    assert!(names.contains(&"packages/cloudformation/stack.json".to_string()));
}

#[tokio::test]
async fn test_build_dir_is_archived_under_its_name() {
    let temp = project(r#"{"name":"demo","buildDir":"dist"}"#);
    write(temp.path(), "dist/app.js", "bundle");
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();

    let report = Pipeline::new(&settings).run().await.unwrap();

    let tarball = tarball_names(&report.archive_path);
    assert!(tarball.iter().any(|n| n == "dist/app.js"));
    assert!(!tarball.iter().any(|n| n.starts_with("lib")));
}

#[tokio::test]
async fn test_missing_build_dir_fails_compression() {
    let temp = project(r#"{"name":"demo","buildDir":"dist"}"#);
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();

    let err = Pipeline::new(&settings).run().await.unwrap_err();

    assert_eq!(err.failed_step(), Some(Step::Compress));
    assert!(!settings.archive_path().exists());
}

#[tokio::test]
async fn test_rerun_starts_from_clean_staging_directory() {
    let temp = project(DESCRIPTOR);
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();
    let pipeline = Pipeline::new(&settings);

    pipeline.run().await.unwrap();
    write(&settings.lead_dir, "stale/leftover.txt", "old");

    let report = pipeline.run().await.unwrap();

    assert!(!settings.lead_dir.join("stale").exists());
    let names = bundle_names(&report.bundle_path);
    assert!(!names.iter().any(|n| n.starts_with("stale")));
    assert!(!names.iter().any(|n| n == "artifacts.zip"));
}

#[tokio::test]
async fn test_failed_upload_fails_publish() {
    let temp = project(DESCRIPTOR);
    let settings = Settings::load(temp.path(), temp.path(), circle_env()).unwrap();
    Pipeline::new(&settings).run().await.unwrap();

    let store = MemoryStore::new();
    store.fail_bucket("riffraff-builds");

    let err = Publisher::new(&store).publish(&settings).await.unwrap_err();

    assert!(err.is_publish());
    assert!(store.get("riffraff-builds", "demo/42/build.json").is_none());
}

#[tokio::test]
async fn test_republish_overwrites_objects() {
    let temp = project(DESCRIPTOR);
    let settings = Settings::load(temp.path(), temp.path(), circle_env()).unwrap();
    Pipeline::new(&settings).run().await.unwrap();

    let store = MemoryStore::new();
    let publisher = Publisher::new(&store);
    publisher.publish(&settings).await.unwrap();
    publisher.publish(&settings).await.unwrap();

    assert_eq!(store.locations().len(), 2);
}

#[tokio::test]
async fn test_directory_failure_leaves_nothing_staged() {
    let temp = project(DESCRIPTOR);
    write(temp.path(), "target", "not a directory");
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();

    let err = Pipeline::new(&settings).run().await.unwrap_err();

    assert_eq!(err.failed_step(), Some(Step::PrepareDirectories));
    assert!(!settings.lead_dir.join("deploy.json").exists());
    assert!(!settings.archive_path().exists());
    assert!(!settings.bundle_path().exists());
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_output() {
    let temp = project(r#"{"name":"demo","buildDir":"dist"}"#);
    write(temp.path(), "dist/app.js", "bundle");
    write(temp.path(), "dist/css/site.css", "body {}");
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();
    let pipeline = Pipeline::new(&settings);

    let first = pipeline.run().await.unwrap();
    let first_tgz = std::fs::read(&first.archive_path).unwrap();
    let first_entries = bundle_names(&first.bundle_path);

    let second = pipeline.run().await.unwrap();

    assert_eq!(std::fs::read(&second.archive_path).unwrap(), first_tgz);
    assert_eq!(bundle_names(&second.bundle_path), first_entries);
}

#[tokio::test]
async fn test_repeated_runs_of_whole_checkout_produce_identical_tarball() {
    let temp = project(DESCRIPTOR);
    let settings = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap();
    let pipeline = Pipeline::new(&settings);

    let first = pipeline.run().await.unwrap();
    let first_tgz = std::fs::read(&first.archive_path).unwrap();

    // Let the restaged files get a later mtime.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = pipeline.run().await.unwrap();

    assert_eq!(std::fs::read(&second.archive_path).unwrap(), first_tgz);
    let names = tarball_names(&second.archive_path);
    assert!(names.iter().any(|n| n == "lib/index.js"));
    assert!(!names.iter().any(|n| n.starts_with("target")));
}

#[test]
fn test_scoped_package_name_is_a_configuration_error() {
    let temp = project(r#"{"name":"@guardian/demo"}"#);
    let err = Settings::load(temp.path(), temp.path(), BuildEnvironment::dev()).unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("@guardian/demo"));
    assert!(!temp.path().join("target").exists());
}
