use std::{
    io::Write,
    process::{Command, Output, Stdio},
};

fn replay(args: &[&str], script: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_blockwork"))
        .args(args)
        .env("BLOCKWORK_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn blockwork");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(script.as_bytes())
        .expect("failed to write script");
    child.wait_with_output().expect("failed to wait for blockwork")
}

#[test]
fn text_replay_reports_results_and_board() {
    let script = "\
place 0 0 work
place 2 1 rest 2
show
place 0 0 study
";
    let output = replay(&["--width", "4", "--height", "3"], script);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");

    assert!(stdout.contains("line 1: placed work #0 at (0, 0)"), "{stdout}");
    assert!(stdout.contains("  + work #0 at (0, 0)"), "{stdout}");
    assert!(stdout.contains("line 2: placed rest #1 at (2, 1)"), "{stdout}");
    assert!(
        stdout.contains("W1 .. .. ..\n.. .. R2 ..\n.. .. .. ..\n"),
        "{stdout}"
    );
    assert!(stdout.contains("line 4: error:"), "{stdout}");
}

#[test]
fn drag_swap_round_trip_through_the_script() {
    let script = "\
place 1 1 work
place 3 1 study
drag 1 1
preview 2 1
drop 3 1
show
";
    let output = replay(&["--width", "5", "--height", "3"], script);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");

    assert!(stdout.contains("line 5: swapped #0 to (3, 1) with #1 to (1, 1)"), "{stdout}");
    assert!(stdout.contains(".. S1 .. W1 .."), "{stdout}");
}

#[test]
fn json_mode_emits_one_object_per_line() {
    let script = "\
place 0 0 health
remove 3 3
show
";
    let output = replay(&["--width", "4", "--height", "4", "--json"], script);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");

    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 3, "{stdout}");
    assert!(lines[0].get("BlockPlaced").is_some());
    assert_eq!(lines[1]["line"], 2);
    assert_eq!(lines[2]["blocks"].as_array().map(Vec::len), Some(1));
}

#[test]
fn malformed_script_fails_before_replay() {
    let output = replay(&[], "place 0 0 work\nteleport 1 1\n");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("line 2: unknown instruction `teleport`"), "{stderr}");
}

#[test]
fn invalid_dimensions_are_rejected() {
    let output = replay(&["--width", "0"], "show\n");
    assert!(!output.status.success());
}
