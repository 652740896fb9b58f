use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tempfile::TempDir;

const SHELL_TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_shell_smoke() {
    let downloads = TempDir::new().expect("create download dir");
    let data = TempDir::new().expect("create data dir");

    let script = "type Title\nh1\npara\ntype body\nmarkdown\nexport-md\nstatus\nquit\n";
    let output = run_shell(
        &[
            "--ephemeral",
            "--log-level",
            "error",
            "--data-dir",
            data.path().to_str().unwrap(),
            "--download-dir",
            downloads.path().to_str().unwrap(),
        ],
        script,
    );

    assert!(output.contains("# Title\n\nbody\n"), "output was:\n{}", output);
    assert!(output.contains("Saved document.md to"));
    assert!(output.contains("theme: light"));

    let exported = std::fs::read_to_string(downloads.path().join("document.md"))
        .expect("markdown export written");
    assert_eq!(exported, "# Title\n\nbody");

    // Ephemeral sessions leave the data directory untouched
    assert_eq!(std::fs::read_dir(data.path()).unwrap().count(), 0);
}

#[test]
fn test_shell_persists_across_runs() {
    let downloads = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let args = [
        "--log-level",
        "error",
        "--origin",
        "smoke",
        "--data-dir",
        data.path().to_str().unwrap(),
        "--download-dir",
        downloads.path().to_str().unwrap(),
    ];

    run_shell(&args, "type remembered\nsave\ntheme\n");
    let output = run_shell(&args, "html\nstatus\n");

    assert!(!output.contains("Start writing..."));
    assert!(output.contains("<p>remembered</p>"));
    assert!(output.contains("theme: dark"));
}

fn run_shell(args: &[&str], script: &str) -> String {
    let bin_path =
        std::env::var("CARGO_BIN_EXE_rte").unwrap_or_else(|_| "target/debug/rte".to_string());

    let mut child = Command::new(bin_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn shell");

    {
        let mut stdin = child.stdin.take().expect("Child stdin should be available");
        stdin
            .write_all(script.as_bytes())
            .expect("Failed to write script");
    }

    let start = Instant::now();
    loop {
        match child.try_wait().expect("Error checking shell status") {
            Some(status) => {
                assert!(status.success(), "shell exited with {:?}", status);
                break;
            }
            None if start.elapsed() > SHELL_TIMEOUT => {
                let _ = child.kill();
                panic!("Timeout waiting for shell to exit");
            }
            None => std::thread::sleep(Duration::from_millis(20)),
        }
    }

    let mut output = String::new();
    child
        .stdout
        .take()
        .expect("Child stdout should be available")
        .read_to_string(&mut output)
        .expect("Failed to read shell output");
    output
}
