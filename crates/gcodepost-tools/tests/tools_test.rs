use gcodepost_core::{MoveKind, Position};
use gcodepost_engine::{
    parse_move, split_lines, RegionToggle, Segmenter, SegmenterOptions, SlicerConfig,
};
use gcodepost_tools::{
    append_footer, BlipRemover, BlipRemoverOptions, GapCloser, GapCloserOptions, PostProcessor,
    ToolheadReorder, TravelMultiplier, TravelMultiplierOptions, WipeHop, WipeHopOptions,
};
use proptest::prelude::*;

const CONFIG: &str = "\
; prusaslicer_config = begin
; arc_fitting = disabled
; deretract_speed = 0
; nozzle_diameter = 0.4,0.4
; retract_before_travel = 2,2
; retract_length = 0.8,0.8
; retract_lift = 0,0
; retract_speed = 35,35
; travel_speed = 150
; travel_speed_z = 12
; wipe = 0,0
; prusaslicer_config = end";

fn config() -> SlicerConfig {
    SlicerConfig::from_lines(&split_lines(CONFIG))
}

#[test]
fn test_short_segment_removed() {
    let text = "\
; BLIP_REMOVER_ENABLED
;LAYER_CHANGE
;Z:0.2
G1 Z.2 F720
G1 X10 Y10 F9000
G1 X20 Y10 E.5
G1 X20.5 Y10 F9000
G1 X20.6 Y10 E.005
G1 X20.7 Y10 E.005
G1 X21 Y10 F9000
G1 X30 Y10 E.45
M107";
    let mut lines = split_lines(text);
    let mut remover = BlipRemover::from_config(&config(), BlipRemoverOptions::default()).unwrap();
    let report = remover.process(&mut lines).unwrap();

    let mut expected = split_lines(text);
    expected.drain(6..9);
    assert_eq!(lines, expected);
    assert_eq!(report.segments_removed, 1);
    assert_eq!(report.line_delta(), -3);
}

#[test]
fn test_redundant_retraction_pair_removed() {
    let at = Position::new(10.0, 0.0, 0.2);
    let retract = parse_move("G1 X10 Y0 E-1 F2000").unwrap();
    let deretract = parse_move("G1 X10 Y0 E1 F2000").unwrap();
    assert_eq!(MoveKind::classify(&at, &retract), MoveKind::Retraction);
    assert_eq!(MoveKind::classify(&at, &deretract), MoveKind::Retraction);

    let mut lines = split_lines(
        "; BLIP_REMOVER_ENABLED\n;LAYER_CHANGE\nG1 X0 Y0 Z.2 F9000\nG1 X10 Y0 E.5\n\
         G1 X10 Y0 E-1 F2000\nG1 X10 Y1 F9000\nG1 X10 Y1 E1 F2000\nG1 X20 Y1 E.5",
    );
    let mut remover = BlipRemover::from_config(&config(), BlipRemoverOptions::default()).unwrap();
    remover.process(&mut lines).unwrap();

    assert_eq!(lines[4], "; BLIP_REMOVER REMOVE RETRACTION START");
    assert_eq!(lines[5], "G1 X10 Y1 F9000");
    assert_eq!(lines[6], "; BLIP_REMOVER REMOVE RETRACTION END");
}

#[test]
fn test_footer() {
    let mut lines = split_lines("G1 X1 Y1");
    let closer = GapCloser::from_config(&config(), GapCloserOptions::default()).unwrap();
    append_footer(&closer, &mut lines);

    // deretract_speed = 0 falls back to the retraction speed
    assert_eq!(
        lines,
        vec![
            "G1 X1 Y1",
            "; Post-Processed With GapCloser",
            "; arc_fitting = 0",
            "; back_up_distance = 1",
            "; deretract_speed = 2100",
            "; retract_length = 0.8",
            "",
        ]
    );
}

#[test]
fn test_annotated_lines_are_not_rewritten_again() {
    let mut lines = split_lines(
        ";LAYER_CHANGE\nG1 Z.2 F720\n;AFTER_LAYER_CHANGE\nG1 X10 Y10 F9000\nG1 E.8 F2100\n\
         G1 X20 Y10 E1\nG1 X20 Y20 E1\nG1 E-.8 F2100\nM107",
    );

    let mut closer = GapCloser::from_config(&config(), GapCloserOptions::default()).unwrap();
    let first = closer.process(&mut lines).unwrap();
    assert_eq!(lines[3], "G1 X9. Y10. F9000 ; GapCloser");
    assert_eq!(lines[5], "G1 X20. Y10. E1.1 ; GapCloser");
    assert_eq!(first.segments_modified, 1);

    // Annotated lines carry a trailing comment and no longer parse as moves
    let rewritten = lines.clone();
    let second = closer.process(&mut lines).unwrap();
    assert_eq!(lines, rewritten);
    assert!(!second.has_changes());
}

#[test]
fn test_travel_multiplier_splits_boundary_move() {
    let mut lines = split_lines(
        ";LAYER_CHANGE\nG1 Z.2 F720\nG1 X0 Y0 F9000\nG1 E.8 F2100\nG1 X.4 Y0 E.04\n\
         G1 X2 Y0 E.16\nG1 X5 Y0 E.3\nM107",
    );
    let mut tool =
        TravelMultiplier::from_config(&config(), TravelMultiplierOptions::default()).unwrap();
    let report = tool.process(&mut lines).unwrap();

    assert_eq!(
        lines[4..].to_vec(),
        vec![
            "G1 X.4 Y0.000 E.044 ; TEM Updated (1.1x)",
            "G1 X1. Y0.000 E.066 ; TEM Updated (1.1x)",
            "G1 X2. Y0.000 E.1 ; TEM Updated",
            "G1 X5 Y0 E.3",
            "M107",
        ]
    );
    assert_eq!(report.counter("moves_scaled"), 2);
    assert_eq!(report.line_delta(), 1);
}

fn coordinate() -> impl Strategy<Value = f64> {
    (0u16..400).prop_map(|tenths| f64::from(tenths) / 10.0)
}

fn travel() -> impl Strategy<Value = String> {
    (coordinate(), coordinate()).prop_map(|(x, y)| format!("G1 X{:.1} Y{:.1} F9000", x, y))
}

fn extrusion() -> impl Strategy<Value = String> {
    (coordinate(), coordinate(), 1u8..9)
        .prop_map(|(x, y, e)| format!("G1 X{:.1} Y{:.1} E.{}", x, y, e))
}

fn print_line() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => travel(),
        6 => extrusion(),
        1 => Just(";LAYER_CHANGE".to_string()),
        1 => Just("G1 Z.4 F720".to_string()),
        1 => Just("G1 E-.8 F2100".to_string()),
        1 => Just("G1 E.8 F2100".to_string()),
        1 => Just(";TYPE:Perimeter".to_string()),
        1 => Just("; printing object".to_string()),
        1 => Just("; stop printing object".to_string()),
        1 => Just("T1".to_string()),
    ]
}

fn print() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(print_line(), 0..150).prop_map(|mut lines| {
        lines.insert(0, "G1 Z.2 F720".to_string());
        lines.insert(0, ";LAYER_CHANGE".to_string());
        lines
    })
}

proptest! {
    #[test]
    fn prop_disabled_tools_leave_stream_unchanged(lines in print()) {
        let config = config();
        let mut tools: Vec<Box<dyn PostProcessor>> = vec![
            Box::new(BlipRemover::from_config(&config, BlipRemoverOptions::default()).unwrap()),
            Box::new(WipeHop::from_config(&config, WipeHopOptions::default()).unwrap()),
            Box::new(ToolheadReorder::new()),
        ];

        for tool in tools.iter_mut() {
            let mut out = lines.clone();
            tool.process(&mut out).unwrap();
            prop_assert_eq!(&out, &lines);
        }

        let mut out = lines.clone();
        out.insert(0, "; TRAVEL_EXTRUSION_MULT_DISABLED".to_string());
        let expected = out.clone();
        TravelMultiplier::from_config(&config, TravelMultiplierOptions::default())
            .unwrap()
            .process(&mut out)
            .unwrap();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn prop_no_blips_survive(lines in print()) {
        let mut lines = lines;
        lines.insert(0, "; BLIP_REMOVER_ENABLED".to_string());

        let mut remover = BlipRemover::from_config(&config(), BlipRemoverOptions::default()).unwrap();
        remover.process(&mut lines).unwrap();

        let options = SegmenterOptions::new().with_toggle(RegionToggle::named("BLIP_REMOVER", false));
        let tree = Segmenter::new(options).segment(lines).unwrap();
        for segment in tree.segments() {
            let length = segment.extrusion_length();
            prop_assert!(length == 0.0 || length >= 0.4, "blip of {} survived", length);
        }
    }
}
