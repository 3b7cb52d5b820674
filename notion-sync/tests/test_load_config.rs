use notion_sync::load_config::{
    image_host_from_env, load_config, notion_credentials_from_env, IMG_BASEURL, IMG_DELETE_URL,
    IMG_UPLOAD_AUTHCODE, IMG_UPLOAD_FOLDER, IMG_UPLOAD_URL, NOTION_DATABASE_ID, NOTION_TOKEN,
};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

fn clear_env() {
    for var in [
        NOTION_TOKEN,
        NOTION_DATABASE_ID,
        IMG_UPLOAD_URL,
        IMG_UPLOAD_AUTHCODE,
        IMG_DELETE_URL,
        IMG_BASEURL,
        IMG_UPLOAD_FOLDER,
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn sections_map_onto_sync_config() {
    clear_env();
    let file = config_file(
        r#"
output:
  docs_dir: ./site/docs
  latest_count: 5
query:
  status_labels:
    pending: "To publish"
    published: "Done"
  max_documents: 20
retry:
  max_attempts: 2
media:
  upload_folder: blog
  public_base_url: https://img.example.com
site:
  title: Field Notes
  github_url: https://github.com/example/notes
"#,
    );

    let config = load_config(file.path()).expect("Config should load");
    assert_eq!(config.output.docs_dir, PathBuf::from("./site/docs"));
    assert_eq!(config.output.latest_count, 5);
    assert_eq!(config.query.status_labels.pending, "To publish");
    assert_eq!(config.query.status_labels.draft, "Draft");
    assert_eq!(config.query.max_documents, Some(20));
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.retry.base_delay_ms, 1000);
    assert_eq!(config.media.upload_folder, "blog");
    assert_eq!(config.site.title, "Field Notes");
    assert_eq!(config.site.github_url.as_deref(), Some("https://github.com/example/notes"));
}

#[test]
#[serial]
fn empty_file_yields_defaults() {
    clear_env();
    let file = config_file("");
    let config = load_config(file.path()).expect("Empty config should load");
    assert_eq!(config.output.docs_dir, PathBuf::from("docs"));
    assert_eq!(config.media.freshness_hours, 24);
    assert_eq!(config.fetch.page_size, 50);
}

#[test]
#[serial]
fn environment_overrides_media_location() {
    clear_env();
    env::set_var(IMG_BASEURL, "https://cdn.example.com");
    env::set_var(IMG_UPLOAD_FOLDER, "notes");
    let file = config_file("media:\n  upload_folder: blog\n  public_base_url: https://img.example.com\n");

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.media.public_base_url, "https://cdn.example.com");
    assert_eq!(config.media.upload_folder, "notes");
    clear_env();
}

#[test]
#[serial]
fn invalid_yaml_is_reported() {
    clear_env();
    let file = config_file("output: [unclosed");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn secrets_come_from_environment() {
    clear_env();
    assert!(notion_credentials_from_env().is_err());
    assert!(image_host_from_env().is_err());

    env::set_var(NOTION_TOKEN, "secret_abc");
    env::set_var(NOTION_DATABASE_ID, "db-123");
    env::set_var(IMG_UPLOAD_URL, "https://img.example.com/upload");
    env::set_var(IMG_DELETE_URL, "https://img.example.com/api/manage/delete/");
    env::set_var(IMG_UPLOAD_AUTHCODE, "auth");

    let credentials = notion_credentials_from_env().unwrap();
    assert_eq!(credentials.token, "secret_abc");
    assert_eq!(credentials.database_id, "db-123");

    let host = image_host_from_env().unwrap();
    assert_eq!(host.upload_url, "https://img.example.com/upload");
    assert_eq!(host.auth_code, "auth");
    clear_env();
}

#[test]
#[serial]
fn blank_secret_counts_as_missing() {
    clear_env();
    env::set_var(NOTION_TOKEN, "   ");
    env::set_var(NOTION_DATABASE_ID, "db-123");
    let err = notion_credentials_from_env().unwrap_err();
    assert!(err.to_string().contains("NOTION_TOKEN"));
    clear_env();
}
