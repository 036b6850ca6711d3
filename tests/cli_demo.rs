//! CLI integration tests for the demo and bench modes.

use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    let bin = env!("CARGO_BIN_EXE_order_dispatch");
    Command::new(bin)
        .args(args)
        .output()
        .expect("failed to run order_dispatch binary")
}

#[test]
fn demo_cli_reports_requeue_and_conservation() {
    // Default command is the demo.
    let output = run(&[]);
    assert!(
        output.status.success(),
        "demo exited with non-zero status: {:?}",
        output.status
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("DEMO SUMMARY"),
        "demo summary missing from output"
    );

    let order_line = stdout
        .lines()
        .find(|line| line.starts_with("completion_order="))
        .expect("completion_order line missing");
    // VIP orders 3 and 5 overtake the requeued normal order 2.
    assert_eq!(order_line.trim(), "completion_order=[1, 3, 5, 2, 4]");

    let requeued_line = stdout
        .lines()
        .find(|line| line.starts_with("requeued="))
        .expect("requeued line missing");
    assert_eq!(requeued_line.trim(), "requeued=1");

    let conservation_line = stdout
        .lines()
        .find(|line| line.starts_with("conservation="))
        .expect("conservation line missing");
    assert_eq!(conservation_line.trim(), "conservation=true");
}

#[test]
fn bench_cli_prints_one_csv_row() {
    let output = run(&[
        "bench",
        "--workers",
        "2",
        "--items",
        "20",
        "--churn",
        "--validate",
        "--processing-ms",
        "50",
    ]);
    assert!(output.status.success(), "bench failed: {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "expected header and one row: {stdout}");
    assert!(lines[0].starts_with("workers,items,"));
    assert!(lines[1].starts_with("2,20,20,50,"));
    assert!(lines[1].ends_with(",1,0,false,true"), "unexpected row: {}", lines[1]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("# violation"));
}

#[test]
fn zero_processing_time_is_rejected() {
    let output = run(&["--processing-ms", "0"]);
    assert!(!output.status.success());
}
