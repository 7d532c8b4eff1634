use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const PRINT: &str = "\
; generated by PrusaSlicer
M107
;LAYER_CHANGE
;Z:0.2
G1 Z.2 F720
;AFTER_LAYER_CHANGE
G1 X10 Y10 F9000
G1 E.8 F2100
;TYPE:Perimeter
G1 X20 Y10 E1
G1 X20 Y20 E1
G1 E-.8 F2100
M107
; prusaslicer_config = begin
; deretract_speed = 0
; retract_before_travel = 2
; retract_length = 0.8
; retract_speed = 35
; prusaslicer_config = end
";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Run the binary with a settings file that does not exist, so the
    /// user's own defaults never leak into a test
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_gcodepost"))
            .arg("--settings")
            .arg(self.path("no-settings.toml"))
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_gap_closer_to_output_file() {
    let ws = Workspace::new();
    let input = ws.write("print.gcode", PRINT);
    let output = ws.path("out.gcode");

    let result = ws.run(&["gap-closer", arg(&input), "--output-file-path", arg(&output)]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.contains("G1 X9. Y10. F9000 ; GapCloser\n"));
    assert!(written.contains("G1 X20. Y10. E1.1 ; GapCloser\n"));
    assert!(written.ends_with("; Post-Processed With GapCloser\n; arc_fitting = 0\n; back_up_distance = 1\n; deretract_speed = 2100\n; retract_length = 0.8\n"));

    assert_eq!(fs::read_to_string(&input).unwrap(), PRINT);
    assert!(String::from_utf8_lossy(&result.stdout).starts_with("GapCloser:"));
}

#[test]
fn test_rewrites_in_place() {
    let ws = Workspace::new();
    let input = ws.write("print.gcode", PRINT);

    let result = ws.run(&["toolhead-reorder", arg(&input)]);
    assert!(result.status.success());

    let written = fs::read_to_string(&input).unwrap();
    assert!(written.starts_with(PRINT));
    assert!(written.ends_with("; Post-Processed With ToolheadReorder\n"));
}

#[test]
fn test_missing_config_key_writes_nothing() {
    let ws = Workspace::new();
    let input = ws.write("print.gcode", PRINT);
    let output = ws.path("out.gcode");

    let result = ws.run(&["blip-remover", arg(&input), "--output-file-path", arg(&output)]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("nozzle_diameter"));
    assert!(!output.exists());
    assert_eq!(fs::read_to_string(&input).unwrap(), PRINT);
}

#[test]
fn test_missing_structure_writes_nothing() {
    let ws = Workspace::new();
    let input = ws.write("print.gcode", PRINT);

    let result = ws.run(&["last-ram-remover", arg(&input)]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("; CP TOOLCHANGE START"));
    assert_eq!(fs::read_to_string(&input).unwrap(), PRINT);
}

#[test]
fn test_settings_file_and_flags() {
    let ws = Workspace::new();
    let input = ws.write("print.gcode", PRINT);
    let settings = ws.write(
        "settings.toml",
        "[gap_closer]\nback_up_distance = 2.0\n[travel_multiplier]\nmultiplier = 1.2\n",
    );

    let result = Command::new(env!("CARGO_BIN_EXE_gcodepost"))
        .args(["--settings", arg(&settings), "gap-closer", arg(&input)])
        .output()
        .unwrap();
    assert!(result.status.success());
    let written = fs::read_to_string(&input).unwrap();
    assert!(written.contains("; back_up_distance = 2\n"));
    assert!(written.contains("G1 X8. Y10. F9000 ; GapCloser\n"));

    let input = ws.write("print.gcode", PRINT);
    let result = Command::new(env!("CARGO_BIN_EXE_gcodepost"))
        .args(["--settings", arg(&settings), "gap-closer", arg(&input)])
        .args(["--back-up-distance", "0.5"])
        .output()
        .unwrap();
    assert!(result.status.success());
    assert!(fs::read_to_string(&input)
        .unwrap()
        .contains("; back_up_distance = 0.5\n"));
}

#[test]
fn test_invalid_settings_file() {
    let ws = Workspace::new();
    let input = ws.write("print.gcode", PRINT);
    let settings = ws.write("settings.toml", "[gap_closer]\nback_up_distance = 0.0\n");

    let result = Command::new(env!("CARGO_BIN_EXE_gcodepost"))
        .args(["--settings", arg(&settings), "gap-closer", arg(&input)])
        .output()
        .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("back_up_distance"));
    assert_eq!(fs::read_to_string(&input).unwrap(), PRINT);
}

#[test]
fn test_invalid_flag_writes_nothing() {
    let ws = Workspace::new();
    let input = ws.write("print.gcode", PRINT);
    let output = ws.path("out.gcode");

    let result = ws.run(&[
        "gap-closer",
        arg(&input),
        "--back-up-distance",
        "0",
        "--output-file-path",
        arg(&output),
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("gap_closer.back_up_distance"));
    assert!(!output.exists());
    assert_eq!(fs::read_to_string(&input).unwrap(), PRINT);

    let result = ws.run(&["wipe-hop", arg(&input), "--lift-z=-0.2"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("wipe_hop.lift_z"));
    assert_eq!(fs::read_to_string(&input).unwrap(), PRINT);
}

#[test]
fn test_json_summary() {
    let ws = Workspace::new();
    let input = ws.write("print.gcode", PRINT);

    let result = ws.run(&["gap-closer", arg(&input), "--json"]);
    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("\"tool\": \"GapCloser\""));
    assert!(stdout.contains("\"segments_modified\": 1"));
}

#[test]
fn test_toolchange_info_is_read_only() {
    let ws = Workspace::new();
    let text = "M73 P0 R30\nT0\nG1 X1 Y1 E1\nM73 P50 R15\nT1\nM73 P100 R0\n";
    let input = ws.write("print.gcode", text);

    let result = ws.run(&["toolchange-info", arg(&input)]);
    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.starts_with("Total Print Time: 30 mins\n"));

    let result = ws.run(&["toolchange-info", arg(&input), "--json"]);
    assert!(String::from_utf8_lossy(&result.stdout).contains("\"total_minutes\": 30"));
    assert_eq!(fs::read_to_string(&input).unwrap(), text);
}
