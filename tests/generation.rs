mod common;

use common::fixture_plugin;
use ida_mcp_bridge::emitter::{self, HEADER};
use ida_mcp_bridge::generator::GenerateError;
use ida_mcp_bridge::{generate_from_source, load_definition_file, load_stubs, ToolCatalog};

#[test]
fn fixture_generates_every_marked_function_in_file_order() {
    let source = load_definition_file(&fixture_plugin()).unwrap();
    let generated = generate_from_source(&source).unwrap();
    assert_eq!(
        generated.function_names(),
        vec![
            "get_metadata",
            "get_function_by_name",
            "list_functions",
            "decompile_function",
            "set_comment",
            "rename_local_variable",
        ]
    );
    let records: Vec<_> = generated.records().map(|r| r.name.as_str()).collect();
    assert_eq!(records, vec!["Metadata", "Function", "Page"]);
}

#[test]
fn emitted_file_round_trips_to_the_same_stubs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server_generated.py");

    let source = load_definition_file(&fixture_plugin()).unwrap();
    let generated = generate_from_source(&source).unwrap();
    let text = emitter::emit(&generated, &path).unwrap();

    assert!(text.starts_with(HEADER));
    assert!(text.contains("class Page(TypedDict, Generic[T]):\n"));
    assert!(text.contains(
        "def set_comment(address: Annotated[str, Field(description='Address in the function to set the comment for')], \
         comment: Annotated[str, Field(description='Comment text')]):\n"
    ));

    let on_disk = std::fs::read_to_string(&path).unwrap();
    let loaded = load_stubs(&on_disk).unwrap();
    assert_eq!(loaded, generated.stubs().unwrap());
}

#[test]
fn regeneration_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server_generated.py");
    let source = load_definition_file(&fixture_plugin()).unwrap();

    emitter::emit(&generate_from_source(&source).unwrap(), &path).unwrap();
    let first = std::fs::read(&path).unwrap();
    emitter::emit(&generate_from_source(&source).unwrap(), &path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[test]
fn catalog_lists_probe_then_stubs() {
    let source = load_definition_file(&fixture_plugin()).unwrap();
    let stubs = generate_from_source(&source).unwrap().stubs().unwrap();
    let catalog = ToolCatalog::new(&stubs);
    let names = catalog.names();
    assert_eq!(names[0], "check_connection");
    assert_eq!(names.len(), 7);

    let tool = catalog.get("list_functions").unwrap();
    assert_eq!(
        tool.tool.description.as_deref(),
        Some("List all functions in the database (paginated)")
    );
    assert_eq!(
        tool.tool.input_schema["properties"]["offset"]["description"],
        "Offset to start listing from (start at 0)"
    );
}

#[test]
fn invalid_plugin_aborts_generation() {
    let source = load_definition_file(&fixture_plugin())
        .unwrap()
        .replace("new_name: Annotated[str, \"New name for the variable (empty for a default name)\"]", "new_name");
    let err = generate_from_source(&source).unwrap_err();
    assert_eq!(err.to_string(), "Missing argument type for rename_local_variable.new_name");
}

#[test]
fn missing_plugin_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_definition_file(&dir.path().join("mcp-plugin.py")).unwrap_err();
    assert!(matches!(err, GenerateError::DefinitionNotFound(_)));
}

#[test]
fn syntax_error_reports_position() {
    let err = generate_from_source("def ok():\n    pass\n\ndef broken(:\n    pass\n").unwrap_err();
    assert!(matches!(err, GenerateError::Parse(_)));
    assert!(err.to_string().contains("line 4"), "{err}");
}
