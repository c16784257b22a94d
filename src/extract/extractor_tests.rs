use std::path::PathBuf;

use async_trait::async_trait;
use tempfile::TempDir;

use super::*;
use crate::engine::{EngineError, EngineResult, ImportOrigin, Importer};
use crate::extract::error::ExtractError;
use crate::extract::fs_resolver::FsResolver;
use crate::test_utils::{no_imports, write_stylesheet};

fn string(text: &str) -> Option<PlainValue> {
    Some(PlainValue::String(text.to_string()))
}

fn number(value: f64) -> Option<PlainValue> {
    Some(PlainValue::Number(value))
}

fn record(name: &str, value: Option<PlainValue>) -> VariableRecord {
    VariableRecord {
        name: string(name),
        value,
    }
}

#[tokio::test]
async fn test_arithmetic_is_evaluated() {
    let result = extract("/virtual/main.scss", &no_imports, "$x: 1 + 2;").await.unwrap();
    assert_eq!(result.variables, vec![record("x", number(3.0))]);
    assert!(result.dependencies.is_empty());
}

#[tokio::test]
async fn test_color_with_alpha() {
    let result = extract("/virtual/main.scss", &no_imports, "$c: rgba(1, 2, 3, 0.5);")
        .await
        .unwrap();
    assert_eq!(result.variables, vec![record("c", string("rgba(1, 2, 3, 0.5)"))]);
}

#[tokio::test]
async fn test_value_kinds() {
    let source = "\
$flag: true;
$nothing: null;
$size: 12px;
$font: \"Helvetica\";
$red: #ff0000;
$stack: 1px 2px, 3px;
$map: (small: 4px, large: 8px);
";
    let result = extract("/virtual/main.scss", &no_imports, source).await.unwrap();

    assert_eq!(result.get("flag"), Some(&PlainValue::Bool(true)));
    assert_eq!(result.get("nothing"), Some(&PlainValue::Null));
    assert_eq!(result.get("size"), Some(&PlainValue::Number(12.0)));
    assert_eq!(result.get("font"), Some(&PlainValue::String("Helvetica".to_string())));
    assert_eq!(result.get("red"), Some(&PlainValue::String("rgb(255, 0, 0)".to_string())));
    assert_eq!(
        result.get("stack"),
        Some(&PlainValue::List(vec![
            Some(PlainValue::List(vec![number(1.0), number(2.0)])),
            number(3.0),
        ]))
    );

    let Some(PlainValue::Map(map)) = result.get("map") else {
        panic!("expected a map, got {:?}", result.get("map"));
    };
    let keys: Vec<&str> = map.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["small", "large"]);
    assert_eq!(map["large"], number(8.0));
}

#[tokio::test]
async fn test_variables_keep_document_order_and_duplicates() {
    let source = "$a: 1;\n$b: $a + 1;\n$a: 5;";
    let result = extract("/virtual/main.scss", &no_imports, source).await.unwrap();
    assert_eq!(
        result.variables,
        vec![record("a", number(1.0)), record("b", number(2.0)), record("a", number(5.0))]
    );
    assert_eq!(result.get("a"), Some(&PlainValue::Number(5.0)));

    let map = result.to_map();
    assert_eq!(map.len(), 2);
    assert_eq!(map["a"], number(5.0));
}

#[tokio::test]
async fn test_local_shadows_are_not_recorded() {
    let source = "$a: 1;\n.x { color: red; $a: 2; $local: 3; }\n@if true { $b: 4; }";
    let result = extract("/virtual/main.scss", &no_imports, source).await.unwrap();
    assert_eq!(result.variables, vec![record("a", number(1.0))]);
    assert_eq!(result.get("a"), Some(&PlainValue::Number(1.0)));
    assert_eq!(result.get("local"), None);
}

#[tokio::test]
async fn test_hook_returns_value_to_the_declaration() {
    let source = "$base: 4px;\n$double: $base * 2;\n$list: 1, 2;\n$count: length($list);";
    let result = extract("/virtual/main.scss", &no_imports, source).await.unwrap();
    assert_eq!(result.get("double"), Some(&PlainValue::Number(8.0)));
    assert_eq!(result.get("count"), Some(&PlainValue::Number(2.0)));
}

#[tokio::test]
async fn test_default_flag_keeps_first_value() {
    let source = "$theme: dark;\n$theme: light !default;";
    let result = extract("/virtual/main.scss", &no_imports, source).await.unwrap();
    assert_eq!(result.variables, vec![record("theme", string("dark"))]);
}

#[tokio::test]
async fn test_import_records_dependency() {
    let dir = TempDir::new().unwrap();
    let other = write_stylesheet(dir.path(), "other.scss", "$imported-var: \"hi\";");
    let entry = dir.path().join("main.scss");

    let result = extract(&entry, &FsResolver::new(), "@import \"other\"; $y: $imported-var;")
        .await
        .unwrap();

    assert_eq!(result.dependencies, vec![other]);
    // Imported files are evaluated as they are; only the entry reports variables
    assert_eq!(result.variables, vec![record("y", string("hi"))]);
}

#[tokio::test]
async fn test_use_reads_members_through_namespace() {
    let dir = TempDir::new().unwrap();
    let other = write_stylesheet(dir.path(), "other.scss", "$imported-var: \"hi\";");

    let result = extract(
        dir.path().join("main.scss"),
        &FsResolver::new(),
        "@use \"other\";\n$y: other.$imported-var;",
    )
    .await
    .unwrap();

    assert_eq!(result.dependencies, vec![other]);
    assert_eq!(result.variables, vec![record("y", string("hi"))]);
}

#[tokio::test]
async fn test_color_math_produces_colors() {
    let source = "$base: #ff0000;\n$dark: darken($base, 10%);\n$sum: #111 + #222;";
    let result = extract("/virtual/main.scss", &no_imports, source).await.unwrap();
    assert_eq!(result.get("dark"), Some(&PlainValue::String("rgb(204, 0, 0)".to_string())));
    assert_eq!(result.get("sum"), Some(&PlainValue::String("rgb(51, 51, 51)".to_string())));
}

#[tokio::test]
async fn test_user_functions_are_evaluated() {
    let source = "@function double($n) { @return $n * 2; }\n$x: double(4px);\n$big: 1e3;";
    let result = extract("/virtual/main.scss", &no_imports, source).await.unwrap();
    assert_eq!(
        result.variables,
        vec![record("x", number(8.0)), record("big", number(1000.0))]
    );
}

#[tokio::test]
async fn test_nested_imports_resolve_from_importing_file() {
    let dir = TempDir::new().unwrap();
    let theme = write_stylesheet(dir.path(), "theme/_index.scss", "@import \"palette\";\n$accent: $primary;");
    let palette = write_stylesheet(dir.path(), "theme/_palette.scss", "$primary: blue;");

    let result = extract(dir.path().join("main.scss"), &FsResolver::new(), "@import \"theme\";\n$accent: $accent;")
        .await
        .unwrap();

    assert_eq!(result.dependencies, vec![theme, palette]);
    assert_eq!(result.get("accent"), Some(&PlainValue::String("rgb(0, 0, 255)".to_string())));
}

#[tokio::test]
async fn test_unresolvable_import_fails() {
    let dir = TempDir::new().unwrap();
    let result = extract(
        dir.path().join("main.scss"),
        &FsResolver::new(),
        "$before: 1;\n@import \"missing\";",
    )
    .await;

    match result {
        Err(ExtractError::Render(EngineError::Import { url, .. })) => assert_eq!(url, "missing"),
        other => panic!("expected import failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_parse_error_fails() {
    let result = extract("/virtual/main.scss", &no_imports, "$x: (1, 2;").await;
    assert!(matches!(result, Err(ExtractError::Parse(_))));
}

#[tokio::test]
async fn test_evaluation_error_fails() {
    let result = extract("/virtual/main.scss", &no_imports, "$x: $nope;").await;
    assert!(matches!(
        result,
        Err(ExtractError::Render(EngineError::UndefinedVariable { .. }))
    ));
}

#[tokio::test]
async fn test_invalid_export_function_option() {
    let options: ExtractOptions = serde_json::from_str(r#"{"export_function": "bad name"}"#).unwrap();
    let extractor = Extractor::new().with_options(options);
    let result = extractor.extract("/virtual/main.scss", &no_imports, "$x: 1;").await;
    assert!(matches!(result, Err(ExtractError::Rewrite(_))));
}

#[tokio::test]
async fn test_custom_export_function_name() {
    let options: ExtractOptions = serde_json::from_str(r#"{"export_function": "__capture"}"#).unwrap();
    let extractor = Extractor::new().with_options(options);
    let result = extractor.extract("/virtual/main.scss", &no_imports, "$x: 2;").await.unwrap();
    assert_eq!(result.variables, vec![record("x", number(2.0))]);
}

#[test]
fn test_options_default() {
    let options: ExtractOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options.export_function, "export_var");
}

#[tokio::test]
async fn test_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    let other = write_stylesheet(dir.path(), "_other.scss", "$a: 1px;");

    let result = extract(dir.path().join("main.scss"), &FsResolver::new(), "@import \"other\";\n$b: $a;")
        .await
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["variables"][0]["name"], "b");
    assert_eq!(json["variables"][0]["value"], 1.0);
    assert_eq!(json["dependencies"][0], other.to_str().unwrap());
}

/// Engine that calls the export hook with fixed arguments, bypassing evaluation
struct ScriptedEngine {
    calls: Vec<Vec<SassValue>>,
    import: Option<&'static str>,
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn render(
        &self,
        _source: &str,
        importer: &mut dyn Importer,
        functions: &mut FunctionRegistry<'_>,
    ) -> EngineResult<()> {
        if let Some(url) = self.import {
            importer
                .import(url, &ImportOrigin::Stdin)
                .await
                .map_err(|source| EngineError::Import {
                    url: url.to_string(),
                    source,
                })?;
        }
        for args in &self.calls {
            if let Some(result) = functions.call("export_var", args) {
                result.map_err(|message| EngineError::Function {
                    name: "export_var".to_string(),
                    message,
                })?;
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_records_without_plain_name_or_value_are_dropped() {
    let function = SassValue::Function("darken".to_string());
    let engine = ScriptedEngine {
        calls: vec![
            vec![function.clone(), function.clone()],
            vec![SassValue::quoted("f"), function.clone()],
            vec![function.clone(), SassValue::number(1.0)],
        ],
        import: None,
    };

    let result = Extractor::with_engine(engine)
        .extract("/virtual/main.scss", &no_imports, "")
        .await
        .unwrap();

    assert_eq!(
        result.variables,
        vec![
            record("f", None),
            VariableRecord {
                name: None,
                value: number(1.0),
            },
        ]
    );
}

#[tokio::test]
async fn test_extra_arguments_fold_into_a_list() {
    let engine = ScriptedEngine {
        calls: vec![vec![
            SassValue::quoted("l"),
            SassValue::number(1.0),
            SassValue::number(2.0),
        ]],
        import: None,
    };
    let result = Extractor::with_engine(engine)
        .extract("/virtual/main.scss", &no_imports, "")
        .await
        .unwrap();
    assert_eq!(
        result.variables,
        vec![record("l", Some(PlainValue::List(vec![number(1.0), number(2.0)])))]
    );
}

#[tokio::test]
async fn test_missing_value_argument_fails() {
    let engine = ScriptedEngine {
        calls: vec![vec![SassValue::quoted("lonely")]],
        import: None,
    };
    let result = Extractor::with_engine(engine)
        .extract("/virtual/main.scss", &no_imports, "")
        .await;
    assert!(matches!(
        result,
        Err(ExtractError::Render(EngineError::Function { .. }))
    ));
}

#[tokio::test]
async fn test_importer_uses_entry_directory() {
    let engine = ScriptedEngine {
        calls: Vec::new(),
        import: Some("~pkg/vars"),
    };
    let resolver = |dir: PathBuf, request: String| async move {
        Ok::<_, anyhow::Error>(dir.join(request).with_extension("scss"))
    };
    let result = Extractor::with_engine(engine)
        .extract("/project/styles/main.scss", &resolver, "")
        .await
        .unwrap();
    assert_eq!(
        result.dependencies,
        vec![PathBuf::from("/project/styles/pkg/vars.scss")]
    );
}
