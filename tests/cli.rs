use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;

fn cmd() -> Command {
    Command::cargo_bin("avere-tools").unwrap()
}

const BASE: &str = r##"{
    "contentVersion": "1.0.0.0",
    "variables": {
        "customData": "#clusterCustomDataInstallYaml"
    },
    "resources": []
}
"##;

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("base-template.json"), BASE).unwrap();
    fs::write(dir.path().join("install.sh"), "#!/bin/bash\necho \"installing\"\n").unwrap();
    fs::write(dir.path().join("base-template.parameters.json"), "{\"parameters\": {}}").unwrap();
    fs::write(
        dir.path().join("avere-tools.yml"),
        "templates:\n  - name: vfxt\n    output: mainTemplate.json\n    install_script: install.sh\n    parameters_template: base-template.parameters.json\n",
    )
    .unwrap();
    dir
}

#[test]
fn encode_then_decode() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.sh");
    fs::write(&script, "echo hello\n").unwrap();

    let out = cmd().arg("encode").arg(&script).assert().success().get_output().stdout.clone();
    let encoded = String::from_utf8(out).unwrap();
    assert!(encoded.starts_with("H4sI"));

    cmd().arg("decode").write_stdin(encoded).assert().success().stdout("echo hello\n");
}

#[test]
fn decode_rejects_garbage() {
    cmd().args(["decode", "-"]).write_stdin("not base64 at all!").assert().failure();
}

#[test]
fn generate_writes_templates() {
    let dir = project();
    cmd()
        .current_dir(dir.path())
        .args(["generate", "-o", "out"])
        .assert()
        .success()
        .stdout(contains("mainTemplate.json").and(contains("mainTemplate.parameters.json")));

    let text = fs::read_to_string(dir.path().join("out/mainTemplate.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(json["variables"]["customData"].as_str().unwrap().starts_with("#cloud-config\n"));
    assert!(dir.path().join("out/mainTemplate.parameters.json").exists());
}

#[test]
fn generate_is_reproducible() {
    let dir = project();
    cmd().current_dir(dir.path()).args(["generate", "-o", "a"]).assert().success();
    cmd().current_dir(dir.path()).args(["generate", "-o", "b"]).assert().success();
    assert_eq!(
        fs::read(dir.path().join("a/mainTemplate.json")).unwrap(),
        fs::read(dir.path().join("b/mainTemplate.json")).unwrap()
    );
}

#[test]
fn generate_unknown_template_fails() {
    let dir = project();
    cmd()
        .current_dir(dir.path())
        .args(["generate", "--only", "nope"])
        .assert()
        .failure()
        .stderr(contains("no template named 'nope'"));
}

#[test]
fn generate_without_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    cmd().current_dir(dir.path()).arg("generate").assert().failure().stderr(contains("avere-tools.yml"));
}

#[test]
fn embed_broken_template_leaves_err_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.json"), "{\"customData\": #clusterCustomData}").unwrap();
    fs::write(dir.path().join("setup.ps1"), "Write-Host hi\r\n").unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["embed", "--template", "broken.json", "-o", "out.json", "--payload", "raw-script", "setup.ps1"])
        .assert()
        .failure()
        .stderr(contains("not valid JSON"));
    assert!(dir.path().join("broken.json.err").exists());
    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn embed_missing_token_policy() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.json"), "{\"a\": 1}").unwrap();
    fs::write(dir.path().join("i.sh"), "true\n").unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["embed", "--template", "t.json", "-o", "o.json", "--on-missing-token", "fail", "i.sh"])
        .assert()
        .failure()
        .stderr(contains("not found"));

    cmd()
        .current_dir(dir.path())
        .args(["embed", "--template", "t.json", "-o", "o.json", "i.sh"])
        .assert()
        .success();
    assert_eq!(fs::read_to_string(dir.path().join("o.json")).unwrap(), "{\"a\": 1}");
}

#[test]
fn ip_range_expands() {
    cmd()
        .args(["ip-range", "10.0.0.254-10.0.1.1"])
        .assert()
        .success()
        .stdout("10.0.0.254\n10.0.0.255\n10.0.1.0\n10.0.1.1\n");
}

#[test]
fn ip_range_rejects_reversed() {
    cmd().args(["ip-range", "10.0.0.9-10.0.0.1"]).assert().failure().stderr(contains("invalid IP range"));
}

#[test]
fn averecmd_parse_stdin() {
    cmd()
        .args(["averecmd", "parse"])
        .write_stdin("{'name': u'cluster1', 'nodes': ['n1', 'n2'], 'ha': True, 'spare': None}\n")
        .assert()
        .success()
        .stdout(contains("\"name\": \"cluster1\"").and(contains("\"spare\": null")).and(contains("\"ha\": true")));
}

#[test]
fn averecmd_parse_survives_deep_nesting() {
    let deep = "[".repeat(50_000);
    cmd()
        .args(["averecmd", "parse"])
        .write_stdin(deep)
        .assert()
        .success()
        .stdout(contains("\"[[[["));
}

#[test]
fn averecmd_command_reads_password_from_env() {
    cmd()
        .env("AVERE_ADMIN_PW", "pw123")
        .args(["averecmd", "command", "--server", "10.0.0.5", "vserver.list"])
        .assert()
        .success()
        .stdout("averecmd --raw --no-check-certificate --user admin --password pw123 --server 10.0.0.5 vserver.list\n");
}

#[test]
fn deployment_new_and_parameters() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.json"), BASE).unwrap();
    fs::write(dir.path().join("p.json"), "{\"vmCount\": 2}").unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["deployment", "new", "t.json", "--params", "p.json", "--deploy-id", "avtest", "-o", "d.json"])
        .assert()
        .success();
    let saved = fs::read_to_string(dir.path().join("d.json")).unwrap();
    assert!(saved.contains("\"resource_group\": \"avtest-rg\""));

    cmd()
        .current_dir(dir.path())
        .args(["deployment", "parameters", "d.json"])
        .assert()
        .success()
        .stdout(contains("\"vmCount\": {").and(contains("\"value\": 2")));
}

#[test]
fn prime_reports_totals() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("data/sub")).unwrap();
    fs::write(dir.path().join("data/a"), vec![0u8; 1024]).unwrap();
    fs::write(dir.path().join("data/sub/b"), vec![0u8; 1024]).unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["prime", "-d", "data", "--workers", "2"])
        .assert()
        .success()
        .stdout(contains("using 2 workers").and(contains("Total files primed: 2.00")).and(contains("Total data primed: 2.00 KB")));
}
