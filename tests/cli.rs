//! 命令行集成测试

use std::process::Output;

use assert_cmd::Command;

mod common {
    include!("common/mod.rs");
}

use common::{AssertionHelper, MockChatServer};

fn cli() -> Command {
    let mut command = Command::cargo_bin("doc-translator").expect("可执行文件应已构建");
    command
        .env_remove("DOCTRANS_API_KEY")
        .env_remove("DOCTRANS_PROVIDER")
        .env_remove("DOCTRANS_API_BASE_URL");
    command
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_list_providers() {
    let output = cli().arg("--list-providers").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let providers: Vec<&str> = stdout.lines().collect();
    assert_eq!(providers, vec!["nllb", "openai", "deepseek", "deepseek-reasoner"]);

    println!("✅ List providers test passed");
}

#[test]
fn test_env_help_lists_variables() {
    let output = cli().arg("--env-help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    AssertionHelper::assert_contains_items(&stdout, &["DOCTRANS_PROVIDER", "DOCTRANS_API_KEY"]);

    println!("✅ Env help test passed");
}

#[test]
fn test_missing_input_is_usage_error() {
    let output = cli().output().unwrap();
    assert!(!output.status.success());

    println!("✅ Missing input test passed");
}

#[test]
fn test_unsupported_input_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("table.xlsx");
    std::fs::write(&input, b"cells").unwrap();

    let output = cli()
        .current_dir(dir.path())
        .arg(&input)
        .args(["--source-lang", "en"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("不支持"), "stderr: {}", stderr(&output));

    println!("✅ Unsupported format test passed");
}

#[test]
fn test_remote_provider_requires_key() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("note.txt");
    std::fs::write(&input, b"Hello.\n").unwrap();

    let output = cli()
        .current_dir(dir.path())
        .arg(&input)
        .args(["--provider", "openai", "--source-lang", "en"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("API 密钥"), "stderr: {}", stderr(&output));

    println!("✅ Missing API key test passed");
}

/// 通过模拟服务完成一次完整翻译并写出文件
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_translate_text_file_end_to_end() {
    let server = MockChatServer::start(vec![MockChatServer::reply("你好，世界。")]).await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("greeting.txt");
    std::fs::write(&input, "Hello, world.\n").unwrap();
    let output_dir = dir.path().join("out");

    let base_url = server.base_url.clone();
    let work_dir = dir.path().to_path_buf();
    let target = output_dir.clone();
    let output = tokio::task::spawn_blocking(move || {
        cli()
            .current_dir(&work_dir)
            .env("DOCTRANS_API_BASE_URL", &base_url)
            .env("DOCTRANS_DELAY_MS", "0")
            .arg(&input)
            .arg("--output-dir")
            .arg(&target)
            .args([
                "--provider",
                "deepseek",
                "--api-key",
                "sk-cli",
                "--source-lang",
                "en",
                "--target-lang",
                "zh-CN",
                "--format",
                "txt",
                "--layout",
                "translation_only",
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("greeting_translated.txt"), "stdout: {}", stdout);

    let translated = std::fs::read_to_string(output_dir.join("greeting_translated.txt")).unwrap();
    assert_eq!(translated, "你好，世界。\n");
    assert_eq!(server.request_count(), 1);

    println!("✅ CLI end-to-end test passed");
}

#[test]
fn test_show_config_prints_effective_toml() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli()
        .current_dir(dir.path())
        .env_remove("DOCTRANS_TARGET_LANG")
        .args(["--show-config", "--provider", "nllb", "--source-lang", "en", "--target-lang", "ja", "--workers", "2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = String::from_utf8(output.stdout).unwrap();
    AssertionHelper::assert_contains_items(
        &stdout,
        &["provider = \"nllb\"", "target_language = \"ja\"", "max_workers = 2"],
    );

    println!("✅ Show config test passed");
}

/// 多个文件依次翻译，失败的文件记入批量报告
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_multiple_files_write_batch_report() {
    let server = MockChatServer::start(vec![MockChatServer::reply("你好。")]).await;
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("one.txt");
    let second = dir.path().join("sheet.xlsx");
    let third = dir.path().join("two.txt");
    std::fs::write(&first, "Hello.\n").unwrap();
    std::fs::write(&second, b"cells").unwrap();
    std::fs::write(&third, "Hi.\n").unwrap();
    let output_dir = dir.path().join("out");

    let base_url = server.base_url.clone();
    let work_dir = dir.path().to_path_buf();
    let target = output_dir.clone();
    let output = tokio::task::spawn_blocking(move || {
        cli()
            .current_dir(&work_dir)
            .env("DOCTRANS_API_BASE_URL", &base_url)
            .env("DOCTRANS_DELAY_MS", "0")
            .args([&first, &second, &third])
            .arg("--output-dir")
            .arg(&target)
            .args([
                "--provider",
                "deepseek",
                "--api-key",
                "sk-cli",
                "--source-lang",
                "en",
                "--target-lang",
                "zh-CN",
                "--format",
                "txt",
                "--layout",
                "translation_only",
                "--no-cache",
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(!output.status.success(), "一个文件失败时应返回错误码");
    assert!(output_dir.join("one_translated.txt").exists());
    assert!(output_dir.join("two_translated.txt").exists());
    assert_eq!(server.request_count(), 2);

    let report_path = std::fs::read_dir(&output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().starts_with("batch_report_"))
                .unwrap_or(false)
        })
        .expect("应写出批量报告");
    let report = std::fs::read_to_string(report_path).unwrap();
    AssertionHelper::assert_contains_items(
        &report,
        &["总文件数: 3", "成功文件数: 2", "失败文件数: 1", "2. sheet.xlsx", "输出文件: one_translated.txt"],
    );

    println!("✅ CLI batch report test passed");
}
