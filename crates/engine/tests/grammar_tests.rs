use serde_json::json;
use vtrace_common::types::{
    BindingValue, Bindings, CompressedTrace, Diff, Entry, LoopRegion, LoopRegions, Snapshot,
    TraceLog,
};
use vtrace_engine::{
    compress, detect_loops, encode, is_valid, number_lines, parse, prune, validate,
    validate_batch, GrammarError, TraceRejection,
};

fn snap(order: u64, line: usize, vars: &[(&str, serde_json::Value)]) -> Snapshot {
    let bindings: Bindings = vars
        .iter()
        .map(|(name, value)| (name.to_string(), BindingValue::Json(value.clone())))
        .collect();
    Snapshot::line(order, "subject", line, bindings)
}

/// Trace of a small summing program with a loop over lines 3-4
fn summing_log() -> TraceLog {
    vec![
        snap(1, 1, &[]),
        snap(2, 2, &[("n", json!(3))]),
        snap(3, 3, &[("n", json!(3)), ("total", json!(0))]),
        snap(4, 4, &[("i", json!(0)), ("n", json!(3)), ("total", json!(0))]),
        snap(5, 3, &[("i", json!(0)), ("n", json!(3)), ("total", json!(0))]),
        snap(6, 4, &[("i", json!(1)), ("n", json!(3)), ("total", json!(0))]),
        snap(7, 3, &[("i", json!(1)), ("n", json!(3)), ("total", json!(1))]),
        snap(8, 5, &[("i", json!(1)), ("n", json!(3)), ("total", json!(1))]),
        snap(9, 5, &[("i", json!(1)), ("n", json!(3)), ("result", json!("1")), ("total", json!(1))]),
    ]
    .into()
}

const SUMMING_SOURCE: &str =
    "n = int(input())\ntotal = 0\nfor i in range(2):\n    total += i\nresult = str(total)";

#[test]
fn test_end_to_end_encoding() {
    vtrace_common::logging::ensure_test_logging(None);
    let regions = detect_loops(&number_lines(SUMMING_SOURCE));
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].tag(), "[3, 4]");

    let compressed = compress(&summing_log(), &regions);
    let encoded = encode(&compressed);

    assert_eq!(encoded, "[1: {n: 3} | 2: {total: 0} | [3, 4]: {i: 1 , total: 1} | 5: {result: 1}]");
    assert!(is_valid(&encoded));
}

#[test]
fn test_encode_parse_encode_is_stable() {
    vtrace_common::logging::ensure_test_logging(None);
    let regions: LoopRegions = vec![LoopRegion::new([3, 4])].into();
    let encoded = encode(&compress(&summing_log(), &regions));

    let reparsed = parse(&encoded).unwrap();
    assert_eq!(reparsed.encode(), encoded);
}

#[test]
fn test_pruned_form_reparses_identically() {
    vtrace_common::logging::ensure_test_logging(None);
    let trace: CompressedTrace = vec![
        Entry::Line { line: 1, diff: Diff::default() },
        Entry::Line {
            line: 2,
            diff: [(
                "x".to_string(),
                vtrace_common::types::Change::Introduced(BindingValue::Json(json!(5))),
            )]
            .into_iter()
            .collect(),
        },
        Entry::Line { line: 3, diff: Diff::default() },
    ]
    .into();

    let encoded = encode(&trace);
    assert_eq!(encoded, "[1:  | 2: {x: 5} | 3: ]");

    let pruned = prune(&encoded).unwrap();
    assert_eq!(pruned, "[2: {x: 5}]");
    assert_eq!(prune(&pruned).unwrap(), pruned);
    assert_eq!(parse(&pruned).unwrap(), parse(&encoded).unwrap().pruned());
}

#[test]
fn test_validity_examples() {
    vtrace_common::logging::ensure_test_logging(None);
    assert!(!is_valid("[]"));
    assert!(!is_valid("[1: ]"));
    assert!(is_valid("[1: {x: 5}]"));

    assert_eq!(validate("[]"), Err(TraceRejection::NoSignal));
    assert_eq!(validate(" "), Err(TraceRejection::Empty));
    assert!(matches!(validate("[1: {x: 5}"), Err(TraceRejection::Malformed(_))));
}

#[test]
fn test_parse_failure_kinds() {
    vtrace_common::logging::ensure_test_logging(None);
    assert_eq!(parse(""), Err(GrammarError::Empty));
    assert!(matches!(parse("[1: {x: 5} | oops]"), Err(GrammarError::Malformed(_))));
}

#[test]
fn test_text_fallback_values_are_rendered_verbatim() {
    vtrace_common::logging::ensure_test_logging(None);
    let log: TraceLog = vec![
        Snapshot::line(1, "subject", 1, Bindings::new()),
        Snapshot::line(
            2,
            "subject",
            2,
            [("s".to_string(), BindingValue::Text("<generator object g>".to_string()))]
                .into_iter()
                .collect(),
        ),
    ]
    .into();

    let encoded = encode(&compress(&log, &LoopRegions::new()));
    assert_eq!(encoded, "[1: {s: <generator object g>}]");
}

#[test]
fn test_separator_collisions_are_reported() {
    vtrace_common::logging::ensure_test_logging(None);
    let log: TraceLog = vec![
        snap(1, 1, &[]),
        snap(2, 2, &[("s", json!("a | b"))]),
    ]
    .into();

    let compressed = compress(&log, &LoopRegions::new());
    let collisions = compressed.separator_collisions();

    assert_eq!(collisions.len(), 1);
    assert_eq!(collisions[0].label, "1");
    assert_eq!(collisions[0].text, "a | b");
}

#[test]
fn test_batch_validation() {
    vtrace_common::logging::ensure_test_logging(None);
    let traces = ["[1: {x: 5}]", "[1: ]", "", "[[2, 3]: {i: 9} | 4: ]"];
    let verdicts = validate_batch(&traces);

    assert!(verdicts[0].is_ok());
    assert_eq!(verdicts[1], Err(TraceRejection::NoSignal));
    assert_eq!(verdicts[2], Err(TraceRejection::Empty));
    assert_eq!(verdicts[3].as_ref().map(|parsed| parsed.len()), Ok(2));
}
