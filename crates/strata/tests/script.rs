use strata::{DatumKind, ErrorKind, Graph, GraphError, NodeId, Value, ValueType};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn graph_with_node(name: &str) -> (Graph, NodeId) {
    init_logger();
    let mut graph = Graph::new();
    let node = graph.add_node(name).unwrap();
    (graph, node)
}

fn value(graph: &Graph, path: &str) -> Option<Value> {
    let datum = graph.datum_by_path(path)?;
    graph.datum(datum)?.value().cloned()
}

#[test]
fn new_node_has_no_error() {
    let (graph, node) = graph_with_node("n");
    let node = graph.node(node).unwrap();
    assert_eq!(node.error_line(), -1);
    assert_eq!(node.error_message(), "");
    assert_eq!(node.script(), "");
}

#[test]
fn unknown_name_fails_at_its_line() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "wargarble").unwrap();
    let node = graph.node(node).unwrap();
    assert_eq!(node.error_line(), 1);
    assert!(node.error_message().contains("wargarble"));
}

#[test]
fn input_defaults_to_zero_of_its_type() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('x', float)").unwrap();
    assert_eq!(value(&graph, "n.x"), Some(Value::float(0.0)));
    let x = graph.datum_by_path("n.x").unwrap();
    assert_eq!(graph.datum(x).unwrap().kind(), DatumKind::Input);
    assert_eq!(graph.node(node).unwrap().error_line(), -1);
}

#[test]
fn redundant_default_is_elided_from_script() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('x', float, 1.0)").unwrap();
    assert_eq!(graph.node(node).unwrap().script(), "input('x', float)");
    assert_eq!(value(&graph, "n.x"), Some(Value::float(1.0)));
}

#[test]
fn unchanged_script_keeps_datum_identity() {
    let (mut graph, node) = graph_with_node("n");
    graph
        .set_script(node, "input('x', float, 1.0)\noutput('y', x)")
        .unwrap();
    let x = graph.datum_by_path("n.x").unwrap();
    let y = graph.datum_by_path("n.y").unwrap();
    let script = graph.node(node).unwrap().script().to_owned();
    graph.set_script(node, &script).unwrap();
    assert_eq!(graph.datum_by_path("n.x"), Some(x));
    assert_eq!(graph.datum_by_path("n.y"), Some(y));
}

#[test]
fn redeclared_input_is_pinned() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('x', float, 1.0)").unwrap();
    let x = graph.datum_by_path("n.x").unwrap();

    graph.set_script(node, "input('x', float, 2.0)").unwrap();
    assert_eq!(graph.datum_by_path("n.x"), Some(x));
    assert_eq!(value(&graph, "n.x"), Some(Value::float(1.0)));
    assert_eq!(graph.datum(x).unwrap().default_text(), Some("2.0"));
    assert_eq!(graph.node(node).unwrap().script(), "input('x', float, 2.0)");
}

#[test]
fn edited_input_keeps_its_text() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('x', float, 1.0)").unwrap();
    let x = graph.datum_by_path("n.x").unwrap();
    graph.set_text(x, "5.0").unwrap();

    graph.set_script(node, "input('x', float, 7.0)").unwrap();
    let datum = graph.datum(x).unwrap();
    assert!(datum.is_edited());
    assert_eq!(datum.text(), "5.0");
    assert_eq!(datum.value(), Some(&Value::float(5.0)));
    assert_eq!(datum.default_text(), Some("1.0"));
}

#[test]
fn syntax_error_leaves_datums_untouched() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('x', float, 1.0)").unwrap();
    let x = graph.datum_by_path("n.x").unwrap();

    graph
        .set_script(node, "input('x', float, 1.0)wargarble")
        .unwrap();
    let owner = graph.node(node).unwrap();
    assert_eq!(owner.error_line(), 1);
    assert!(owner.error_message().starts_with("SyntaxError"));
    assert_eq!(owner.script(), "input('x', float)");
    assert_eq!(owner.datum("x"), Some(x));
    assert_eq!(value(&graph, "n.x"), Some(Value::float(1.0)));

    // A later valid script clears the rejection
    graph.set_script(node, "input('x', float)").unwrap();
    assert_eq!(graph.node(node).unwrap().error_line(), -1);
    assert_eq!(graph.datum_by_path("n.x"), Some(x));
}

#[test]
fn failing_script_keeps_undeclared_datum_until_it_runs() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('d', float, 2.0)").unwrap();
    let d = graph.datum_by_path("n.d").unwrap();

    graph.set_script(node, "aargh").unwrap();
    assert_eq!(graph.node(node).unwrap().error_line(), 1);
    assert_eq!(graph.node(node).unwrap().datum("d"), Some(d));

    graph.set_script(node, "input('d', float)").unwrap();
    assert_eq!(graph.node(node).unwrap().datum("d"), Some(d));
    assert_eq!(value(&graph, "n.d"), Some(Value::float(2.0)));
    assert_eq!(graph.node(node).unwrap().error_line(), -1);
}

#[test]
fn raise_reports_message_and_line() {
    let (mut graph, node) = graph_with_node("n");
    graph
        .set_script(node, "input('x', float, 2.0)\nraise RuntimeError(str(x))")
        .unwrap();
    let owner = graph.node(node).unwrap();
    assert_eq!(owner.error_line(), 2);
    assert!(owner.error_message().contains("RuntimeError: 2.0"));
    assert_eq!(owner.error().unwrap().kind, ErrorKind::RuntimeError);
}

#[test]
fn output_is_represented_as_text() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "output('x', 1.0)").unwrap();
    let x = graph.datum_by_path("n.x").unwrap();
    let datum = graph.datum(x).unwrap();
    assert_eq!(datum.kind(), DatumKind::Output);
    assert_eq!(datum.text(), "1.0");
    assert_eq!(datum.value(), Some(&Value::float(1.0)));
    assert_eq!(graph.set_text(x, "2.0"), Err(GraphError::ReadOnlyOutput("x".to_owned())));
}

#[test]
fn unrepresentable_output_fails_alone() {
    let (mut graph, node) = graph_with_node("n");
    graph
        .set_script(node, "output('x', float)\noutput('y', 3)")
        .unwrap();
    let owner = graph.node(node).unwrap();
    assert_eq!(owner.error_line(), 1);
    assert_eq!(
        owner.error_message(),
        "Could not evaluate representation of output 'x'"
    );
    let x = graph.datum_by_path("n.x").unwrap();
    assert!(!graph.datum(x).unwrap().is_valid());
    assert_eq!(
        graph.datum(x).unwrap().error().unwrap().kind,
        ErrorKind::RepresentationError
    );
    assert_eq!(value(&graph, "n.y"), Some(Value::Int(3)));
}

#[test]
fn empty_script_removes_declared_datums() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('x', float)").unwrap();
    let x = graph.datum_by_path("n.x").unwrap();
    graph.set_script(node, "").unwrap();
    assert_eq!(graph.node(node).unwrap().datum("x"), None);
    assert!(graph.datum(x).is_none());
    assert_eq!(graph.node(node).unwrap().datum_count(), 0);
}

#[test]
fn direct_datum_outlives_scripts() {
    let (mut graph, node) = graph_with_node("n");
    let d = graph.add_datum(node, "d", "4.0", ValueType::Float).unwrap();
    graph.set_script(node, "input('d', float)").unwrap();
    assert_eq!(graph.node(node).unwrap().datum("d"), Some(d));
    assert_eq!(graph.datum(d).unwrap().kind(), DatumKind::Input);
    assert_eq!(value(&graph, "n.d"), Some(Value::float(4.0)));
}

#[test]
fn direct_datum_reads_sibling() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('x', float, 1.5)").unwrap();
    graph.add_datum(node, "d", "x * 2", ValueType::Float).unwrap();
    assert_eq!(value(&graph, "n.d"), Some(Value::float(3.0)));
}

#[test]
fn invalid_datum_names_reject_script() {
    let (mut graph, node) = graph_with_node("n");

    graph.set_script(node, "input('for', float, 1.0)").unwrap();
    let owner = graph.node(node).unwrap();
    assert_eq!(owner.error_line(), 1);
    assert!(owner.error_message().contains("reserved keyword"));
    assert_eq!(owner.error().unwrap().kind, ErrorKind::InvalidName);

    graph.set_script(node, "input('__x', float, 1.0)").unwrap();
    assert!(graph
        .node(node)
        .unwrap()
        .error_message()
        .contains("cannot begin with '__'"));

    graph
        .set_script(node, "input('x', float)\ninput('x', float)")
        .unwrap();
    let owner = graph.node(node).unwrap();
    assert_eq!(owner.error_line(), 2);
    assert!(owner.error_message().contains("already defined"));
    assert_eq!(owner.datum_count(), 0);
}

#[test]
fn type_mismatch_is_datum_local() {
    let (mut graph, node) = graph_with_node("n");
    let d = graph.add_datum(node, "d", "'hello'", ValueType::Float).unwrap();
    let e = graph.add_datum(node, "e", "2", ValueType::Float).unwrap();
    let datum = graph.datum(d).unwrap();
    assert!(!datum.is_valid());
    assert_eq!(datum.error().unwrap().kind, ErrorKind::TypeMismatch);
    assert_eq!(datum.error_message(), "Expected float, got str");
    // Ints widen to floats
    assert_eq!(graph.datum(e).unwrap().value(), Some(&Value::float(2.0)));
}

#[test]
fn removed_input_is_not_visible_to_script() {
    let (mut graph, node) = graph_with_node("n");
    graph.set_script(node, "input('x', float, 1.0)").unwrap();
    let x = graph.datum_by_path("n.x").unwrap();

    graph
        .set_script(node, "y = x + 1.0\noutput('y', y)")
        .unwrap();
    let owner = graph.node(node).unwrap();
    assert_eq!(owner.error_line(), 1);
    assert_eq!(owner.error_message(), "NameError: name 'x' is not defined");
    let y = graph.datum_by_path("n.y").unwrap();
    assert!(!graph.datum(y).unwrap().is_valid());
    // The failed run does not prune the undeclared input
    assert_eq!(graph.node(node).unwrap().datum("x"), Some(x));

    graph.set_script(node, "output('y', 2.0)").unwrap();
    assert!(graph.datum(x).is_none());
    assert_eq!(value(&graph, "n.y"), Some(Value::float(2.0)));
}

#[test]
fn outputs_are_read_only() {
    let (mut graph, node) = graph_with_node("n");
    graph
        .set_script(node, "input('x', float, 1.0)\noutput('y', x * 3)")
        .unwrap();
    let y = graph.datum_by_path("n.y").unwrap();

    assert_eq!(
        graph.set_text(y, "5.0"),
        Err(GraphError::ReadOnlyOutput("y".to_owned()))
    );
    let datum = graph.datum(y).unwrap();
    assert_eq!(datum.text(), "3.0");
    assert!(!datum.is_edited());
    assert_eq!(datum.value(), Some(&Value::float(3.0)));
}
