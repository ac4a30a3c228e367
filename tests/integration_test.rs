//! Integration tests for Vocalis
//!
//! These tests exercise the tool subsystem end to end without real API keys

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use vocalis::audit::{ExecutionLog, InMemoryLog};
use vocalis::tools::definition::ToolCatalog;
use vocalis::{
    build_dispatcher, AuditBackend, AuditConfig, LLMConfig, OpenAiClient, Parameters, Settings,
    ToolCallBridge, ToolDispatcher, ToolErrorKind, ToolMode, ToolRegistry, ToolsConfig,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn catalog_json(root: &Path, enabled: bool, max_file_size: u64) -> String {
    json!({
        "tools": [{
            "id": "create_document",
            "name": "Create Document",
            "description": "Create a document",
            "category": "files",
            "enabled": enabled,
            "parameters": {
                "filename": {"type": "string", "description": "File name", "required": true},
                "content": {"type": "string", "description": "Body", "required": true},
                "folder": {"type": "string", "description": "Subfolder"},
                "extension": {"type": "string", "description": "Suffix"}
            },
            "permissions": {
                "require_confirmation": true,
                "allowed_paths": [root.to_string_lossy()],
                "max_file_size": max_file_size
            }
        }],
        "settings": {"enable_tools": true, "log_tool_usage": true}
    })
    .to_string()
}

fn dispatcher_for(root: &Path, enabled: bool, max_file_size: u64) -> (Arc<ToolDispatcher>, Arc<InMemoryLog>) {
    let catalog = ToolCatalog::from_json(&catalog_json(root, enabled, max_file_size)).unwrap();
    let registry = Arc::new(ToolRegistry::load(catalog));
    let log = Arc::new(InMemoryLog::new());
    (Arc::new(ToolDispatcher::new(registry, log.clone())), log)
}

fn params(value: Value) -> Parameters {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_create_document_confirmation_round_trip() {
    let dir = tempdir().unwrap();
    let (dispatcher, log) = dispatcher_for(dir.path(), true, 1_048_576);
    let args = json!({"filename": "notes", "content": "hi"});

    let first = dispatcher
        .execute_tool("create_document", params(args.clone()), false)
        .await;
    assert_eq!(first["success"], false);
    assert_eq!(first["data"]["requires_confirmation"], true);
    assert!(first["error"].is_null());
    assert!(!dir.path().join("notes.md").exists());

    let second = dispatcher.execute_tool("create_document", params(args), true).await;
    let expected = dir.path().join("notes.md");
    assert_eq!(second["success"], true);
    assert_eq!(second["data"]["file_path"], &*expected.to_string_lossy());
    assert_eq!(second["data"]["file_size"], 2);
    assert!(second["data"]["message"].is_string());
    assert_eq!(std::fs::read_to_string(&expected).unwrap(), "hi");

    let entries = log.entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].result.requires_confirmation());
    assert!(entries[1].result.success);
}

#[tokio::test]
async fn test_nonexistent_tool() {
    let dir = tempdir().unwrap();
    let (dispatcher, log) = dispatcher_for(dir.path(), true, 1024);

    let document = dispatcher
        .execute_tool("nonexistent_tool", Parameters::new(), true)
        .await;

    assert_eq!(document["success"], false);
    assert_eq!(document["error"], "Tool 'nonexistent_tool' not found");
    assert_eq!(log.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_oversized_content_leaves_no_file() {
    let dir = tempdir().unwrap();
    let (dispatcher, _log) = dispatcher_for(dir.path(), true, 8);

    let result = dispatcher
        .dispatch(
            "create_document",
            params(json!({"filename": "big", "content": "more than eight bytes"})),
            true,
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ToolErrorKind::ContentTooLarge));
    assert!(!dir.path().join("big.md").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_path_escape_is_rejected() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    std::fs::create_dir(&root).unwrap();
    let (dispatcher, _log) = dispatcher_for(&root, true, 1024);

    for args in [
        json!({"filename": "../escape", "content": "x"}),
        json!({"filename": "escape", "folder": "../..", "content": "x"}),
        json!({"filename": "escape", "folder": dir.path().to_string_lossy(), "content": "x"}),
    ] {
        let result = dispatcher.dispatch("create_document", params(args), true).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::PathNotAllowed));
    }

    assert!(!dir.path().join("escape.md").exists());
}

#[tokio::test]
async fn test_missing_required_parameter_never_executes() {
    let dir = tempdir().unwrap();
    let (dispatcher, log) = dispatcher_for(dir.path(), true, 1024);

    let result = dispatcher
        .dispatch("create_document", params(json!({"filename": "notes"})), true)
        .await;

    assert_eq!(result.error.as_deref(), Some("Missing required parameter: content"));
    let entries = log.entries().await.unwrap();
    assert!(entries.iter().all(|entry| !entry.result.success));
}

#[tokio::test]
async fn test_fenced_call_to_disabled_tool_through_http_provider() {
    let dir = tempdir().unwrap();
    let (dispatcher, _log) = dispatcher_for(dir.path(), false, 1024);

    let server = MockServer::start().await;
    let reply = "Saving it now.\n```json\n{\"tool_call\": {\"tool_id\": \"create_document\", \"parameters\": {\"filename\": \"notes\", \"content\": \"hi\"}}}\n```";
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = LLMConfig {
        base_url: format!("{}/v1", server.uri()),
        tool_mode: ToolMode::Fenced,
        max_retries: 1,
        ..LLMConfig::default()
    };
    let provider = Arc::new(OpenAiClient::new("test-key".to_string(), config).unwrap());
    let bridge = ToolCallBridge::new(provider, dispatcher, ToolMode::Fenced);

    let outcome = bridge.respond("save hi as notes", &[]).await;

    assert_eq!(
        outcome.response,
        "I couldn't complete that action: Tool 'create_document' is disabled"
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_build_dispatcher_with_sqlite_audit() {
    let dir = tempdir().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    let tools_path = dir.path().join("tools.json");
    std::fs::write(&tools_path, catalog_json(&docs, true, 1024)).unwrap();

    let settings = Settings {
        tools: ToolsConfig {
            config_path: tools_path,
            execution_timeout_secs: 5,
        },
        audit: AuditConfig {
            backend: AuditBackend::Sqlite,
            path: dir.path().join("data/audit.db"),
        },
        ..Settings::default()
    };

    let dispatcher = build_dispatcher(&settings).unwrap();
    let result = dispatcher
        .dispatch(
            "create_document",
            params(json!({"filename": "todo", "extension": "txt", "content": "milk"})),
            true,
        )
        .await;
    assert!(result.success);
    assert!(docs.join("todo.txt").exists());

    let reopened = build_dispatcher(&settings).unwrap();
    let entries = reopened.log().entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].tool_id, "create_document");
}

#[tokio::test]
async fn test_missing_tool_config_degrades_to_empty_registry() {
    let dir = tempdir().unwrap();
    let registry = ToolRegistry::from_config_path(dir.path().join("absent.json"));

    assert!(registry.is_empty());
    assert!(registry.list_enabled().is_empty());
}

#[test]
fn test_shipped_tool_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/tools.json");
    let catalog = ToolCatalog::from_path(&path).unwrap();
    let registry = ToolRegistry::load(catalog);

    assert!(registry.has_tool("create_document"));
    assert!(!registry.system_prompt_addition().is_empty());
    assert_eq!(registry.describe_for_model()[0].name, "create_document");
}
