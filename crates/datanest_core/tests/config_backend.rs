use datanest_core::{
    logging_status, open_container, Backend, ContainerConfig, FileMode, LoggingConfig, RepoError,
};

#[test]
fn file_system_backend_opens_a_container() {
    let dir = tempfile::tempdir().unwrap();
    let config = ContainerConfig::from_json_str(r#"{"backend": "file_system"}"#).unwrap();

    let file = open_container(dir.path().join("c"), &config).unwrap();
    assert_eq!(file.mode(), FileMode::ReadWrite);
    file.create_block("b", "session").unwrap();

    let read_only = ContainerConfig::new(Backend::FileSystem, FileMode::ReadOnly);
    let reopened = open_container(dir.path().join("c"), &read_only).unwrap();
    assert_eq!(reopened.block_count().unwrap(), 1);
}

#[test]
fn hdf5_backend_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let config = ContainerConfig::new(Backend::Hdf5, FileMode::ReadWrite);
    assert!(matches!(
        open_container(dir.path().join("c.h5"), &config),
        Err(RepoError::UnsupportedBackend(_))
    ));
    assert!(!dir.path().join("c.h5").exists());
}

#[test]
fn logging_section_starts_file_logging_once() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let config = ContainerConfig {
        logging: Some(LoggingConfig::new("info", &logs)),
        ..ContainerConfig::default()
    };

    open_container(dir.path().join("c"), &config).unwrap();
    open_container(dir.path().join("c"), &config).unwrap();
    let (level, log_dir) = logging_status().unwrap();
    assert_eq!(level, "info");
    assert_eq!(log_dir, logs);

    let conflicting = ContainerConfig {
        logging: Some(LoggingConfig::new("trace", &logs)),
        ..ContainerConfig::default()
    };
    assert!(matches!(
        open_container(dir.path().join("c"), &conflicting),
        Err(RepoError::InvalidState(_))
    ));
}
