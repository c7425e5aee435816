use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::time::Duration;

use agent_workbench::config::{InterpreterConfig, RuntimeConfig, SessionConfig};
use agent_workbench::primitives::EnvironmentManifest;
use agent_workbench::repl::{
    DEADLINE_KIND, ExecutionSession, PythonFactory, RUN_PYTHON_REPL, SUPPORT_MODULE,
    SessionError, SessionManager, SessionState, dispatch,
};
use agent_workbench::tools::{ToolCatalog, ToolRegistry};
use serde_json::json;

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

macro_rules! require_python {
    () => {
        if !python_available() {
            eprintln!("python3 not found; skipping");
            return;
        }
    };
}

async fn python_session() -> ExecutionSession {
    let factory = PythonFactory::new(InterpreterConfig::default());
    ExecutionSession::spawn(&factory, SessionConfig::default())
        .await
        .unwrap()
}

#[test]
fn version_is_exposed() {
    assert_eq!(agent_workbench::version(), env!("CARGO_PKG_VERSION"));
    assert!(!agent_workbench::VERSION.is_empty());
}

#[test]
fn registry_creation_and_listing() {
    let catalog = ToolCatalog::from_json_str(
        r#"{
            "test_module": [
                {
                    "name": "test_function",
                    "description": "A test function",
                    "required_parameters": ["param1"],
                    "optional_parameters": ["param2"]
                }
            ]
        }"#,
    )
    .unwrap();
    let registry = ToolRegistry::new(catalog).unwrap();

    let tool = registry.get_tool_by_name("test_function").unwrap();
    assert_eq!(tool.name(), "test_function");
    assert_eq!(tool.description(), "A test function");

    let tools = registry.list_tools();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name(), "test_function");
}

#[test]
fn linked_modules_include_support_tools() {
    let registry = ToolRegistry::from_linked_modules().unwrap();
    assert!(registry.modules().any(|module| module.as_str() == SUPPORT_MODULE));
    assert!(registry.get_tool_by_name(RUN_PYTHON_REPL).is_some());
}

#[test]
fn environment_manifest_describes_datasets_and_libraries() {
    let manifest = EnvironmentManifest::builder()
        .version("1.0.0")
        .unwrap()
        .datasets(BTreeMap::from([(
            "gene_info.parquet".to_owned(),
            "Gene identifiers and symbols".to_owned(),
        )]))
        .unwrap()
        .libraries(BTreeMap::from([(
            "pandas".to_owned(),
            "Data frames for tabular data".to_owned(),
        )]))
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(manifest.datasets().map(BTreeMap::len), Some(1));
    assert_eq!(manifest.library("pandas"), Some("Data frames for tabular data"));
}

#[tokio::test]
async fn python_session_basics() {
    require_python!();
    let session = python_session().await;

    let hello = session.run("print(\"Hello from the workbench!\")").await.unwrap();
    assert!(hello.stdout().contains("Hello from the workbench!"));

    let math = session.run("x = 5 + 3\nprint(f\"Result: {x}\")").await.unwrap();
    assert!(math.stdout().contains("Result: 8"));

    let persisted = session.run("print(f\"Previous x value: {x}\")").await.unwrap();
    assert!(persisted.stdout().contains("Previous x value: 8"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn failure_then_recovery() {
    require_python!();
    let session = python_session().await;

    session.run("kept = 41").await.unwrap();

    let failed = session.run("print('start')\nprint(missing_name)").await.unwrap();
    assert_eq!(failed.stdout(), "start\n");
    let failure = failed.failure_details().unwrap();
    assert_eq!(failure.kind(), "NameError");
    assert!(!failed.interpreter_restarted());
    assert_eq!(session.state(), SessionState::Ready);

    let recovered = session.run("print(kept + 1)").await.unwrap();
    assert!(recovered.is_success());
    assert_eq!(recovered.stdout(), "42\n");

    let divided = session.run("1 / 0").await.unwrap();
    assert_eq!(divided.failure_details().unwrap().kind(), "ZeroDivisionError");
    assert_eq!(session.get_variable("kept").await.unwrap(), Some(json!(41)));
    session.close().await.unwrap();
}

#[tokio::test]
async fn deadline_interrupts_runaway_fragment() {
    require_python!();
    let session = python_session().await;
    session.run("counter = 41").await.unwrap();

    let result = session
        .run_with_deadline("while True:\n    pass", Some(Duration::from_millis(200)))
        .await
        .unwrap();
    assert_eq!(result.failure_details().unwrap().kind(), DEADLINE_KIND);

    let after = session.run("print(counter + 1)").await.unwrap();
    assert_eq!(after.stdout(), "42\n");
    session.close().await.unwrap();
}

#[tokio::test]
async fn closed_session_rejects_work() {
    require_python!();
    let session = python_session().await;
    session.close().await.unwrap();
    session.close().await.unwrap();

    assert!(matches!(
        session.run("print(1)").await,
        Err(SessionError::Closed { .. })
    ));
}

#[tokio::test]
async fn run_python_repl_through_registry() {
    require_python!();
    let registry = ToolRegistry::from_linked_modules().unwrap();
    let manager = SessionManager::python(&RuntimeConfig::default());
    let session = manager.create().await.unwrap();

    let text = dispatch(
        &registry,
        &session,
        RUN_PYTHON_REPL,
        &json!({ "command": "y = 2 ** 10\nprint(y)" }),
    )
    .await
    .unwrap();
    assert_eq!(text, "1024\n");
    assert_eq!(session.get_variable("y").await.unwrap(), Some(json!(1024)));

    let other = manager.create().await.unwrap();
    let isolated = other.run("print('y' in globals())").await.unwrap();
    assert_eq!(isolated.stdout(), "False\n");

    assert_eq!(manager.dispose_all().await, 2);
}
