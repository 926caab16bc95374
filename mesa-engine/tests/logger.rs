//! 日志文件输出测试

use mesa_engine::init_logger_with_file;

#[test]
fn test_logs_written_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_str().unwrap().to_string();
    init_logger_with_file(Some("info"), Some(&path));

    tracing::info!(table_id = 7, "mesa abierta");

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("mesa-engine"))
        .collect();
    assert_eq!(files.len(), 1);
    let content = std::fs::read_to_string(files[0].path()).unwrap();
    assert!(content.contains("mesa abierta"));
}
