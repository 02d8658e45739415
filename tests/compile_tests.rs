//! End-to-end compilation tests
//!
//! Compiles the fixture source tree under `tests/fixtures/schema` and checks
//! the emitted artifacts on disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tachyon_schemas::checksum::MANIFEST_FILE;
use tachyon_schemas::{
    compile_project, load_project, Actor, ChecksumManifest, CompileError, CompilerConfig,
    MessageKind, OutputFormat,
};
use tempfile::TempDir;
use walkdir::WalkDir;

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/schema")
}

fn config_for(source: &Path, out: &Path) -> CompilerConfig {
    let mut config = CompilerConfig::default();
    config.source.root = source.to_path_buf();
    config.output.dir = out.to_path_buf();
    config
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Copy the fixture tree so a test can add broken declarations to it
fn copy_fixtures(dest: &Path) {
    let root = fixtures_path();
    for entry in WalkDir::new(&root) {
        let entry = entry.unwrap();
        let target = dest.join(entry.path().strip_prefix(&root).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn compile_fixtures() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("schema");
    compile_project(&config_for(&fixtures_path(), &out)).unwrap();
    (dir, out)
}

// =============================================================================
// Artifact layout
// =============================================================================

#[test]
fn test_full_pipeline_writes_expected_files() {
    let (_dir, out) = compile_fixtures();

    for path in [
        "definitions/player.json",
        "definitions/privateUser.json",
        "definitions/battleStatus.json",
        "lobby/list/request.json",
        "lobby/list/response.json",
        "lobby/sendMessage/request.json",
        "lobby/sendMessage/response.json",
        "lobby/updated/event.json",
        "user/self/event.json",
        "user/whois/request.json",
        "user/whois/response.json",
        "autohost/start/request.json",
        "autohost/start/response.json",
        "compiled.json",
        "meta.json",
        MANIFEST_FILE,
    ] {
        assert!(out.join(path).is_file(), "missing artifact {path}");
    }

    assert!(!out.join("lobby/updated/request.json").exists());
    assert!(!out.join("lobby/list/event.json").exists());
}

#[test]
fn test_references_are_rewritten_per_location() {
    let (_dir, out) = compile_fixtures();

    let updated = read_json(&out.join("lobby/updated/event.json"));
    assert_eq!(updated["properties"]["data"]["$ref"], "../../definitions/battleStatus.json");

    let private_user = read_json(&out.join("definitions/privateUser.json"));
    assert_eq!(private_user["allOf"][0]["$ref"], "../definitions/player.json");
    assert_eq!(private_user["title"], "PrivateUser");

    let player = read_json(&out.join("definitions/player.json"));
    assert_eq!(player["title"], "Player");
    assert_eq!(player["$id"], "player");
}

#[test]
fn test_compiled_schema_is_closed() {
    let (_dir, out) = compile_fixtures();
    let compiled = read_json(&out.join("compiled.json"));

    let definitions = compiled["definitions"].as_object().unwrap();
    let mut names: Vec<_> = definitions.keys().cloned().collect();
    names.sort();
    assert_eq!(names, vec!["battleStatus", "player", "privateUser"]);

    let mut refs = Vec::new();
    collect_refs(&compiled, &mut refs);
    assert!(!refs.is_empty());
    for reference in refs {
        let name = reference
            .strip_prefix("#/definitions/")
            .unwrap_or_else(|| panic!("unexpected ref {reference}"));
        assert!(definitions.contains_key(name), "dangling ref {reference}");
    }

    // 4 request/response commands contribute two members each, 2 events one each
    assert_eq!(compiled["anyOf"].as_array().unwrap().len(), 4 * 2 + 2);
}

fn collect_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("$ref") {
                refs.push(target.clone());
            }
            for child in map.values() {
                collect_refs(child, refs);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, refs)),
        _ => {}
    }
}

// =============================================================================
// Envelopes
// =============================================================================

#[test]
fn test_failed_responses_collapse_into_one_member() {
    let (_dir, out) = compile_fixtures();
    let response = read_json(&out.join("lobby/sendMessage/response.json"));

    assert_eq!(response["$id"], "lobby/sendMessage/response");
    assert_eq!(response["title"], "LobbySendMessageResponse");
    assert_eq!(response["scopes"], json!(["tachyon.lobby"]));

    let members = response["anyOf"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["title"], "LobbySendMessageOkResponse");
    assert_eq!(members[0]["properties"]["status"]["const"], "success");
    assert_eq!(members[1]["title"], "LobbySendMessageFailResponse");
    assert_eq!(members[1]["properties"]["reason"]["enum"], json!(["not_in_lobby", "muted"]));
}

#[test]
fn test_titled_success_variants() {
    let (_dir, out) = compile_fixtures();
    let response = read_json(&out.join("user/whois/response.json"));

    let titles: Vec<_> = response["anyOf"]
        .as_array()
        .unwrap()
        .iter()
        .map(|member| member["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        titles,
        vec!["UserWhoisPlayerResponse", "UserWhoisSelfResponse", "UserWhoisFailResponse"]
    );
}

#[test]
fn test_messages_validate_against_endpoint_schemas() {
    let (_dir, out) = compile_fixtures();

    // Standalone validation: drop the relative $id so it can't become the base URI
    let mut request = read_json(&out.join("lobby/sendMessage/request.json"));
    request.as_object_mut().unwrap().remove("$id");
    let validator = jsonschema::JSONSchema::compile(&request).unwrap();

    assert!(validator.is_valid(&json!({
        "type": "request",
        "messageId": "m-1",
        "commandId": "lobby/sendMessage",
        "data": { "message": "gg" }
    })));
    assert!(!validator.is_valid(&json!({
        "type": "request",
        "messageId": "m-1",
        "commandId": "lobby/list",
        "data": { "message": "gg" }
    })));
    assert!(!validator.is_valid(&json!({
        "type": "request",
        "messageId": "m-1",
        "commandId": "lobby/sendMessage"
    })));

    let mut response = read_json(&out.join("lobby/sendMessage/response.json"));
    response.as_object_mut().unwrap().remove("$id");
    let validator = jsonschema::JSONSchema::compile(&response).unwrap();

    let failed = |reason: &str| {
        json!({
            "type": "response",
            "messageId": "m-1",
            "commandId": "lobby/sendMessage",
            "status": "failed",
            "reason": reason
        })
    };
    assert!(validator.is_valid(&failed("not_in_lobby")));
    assert!(!validator.is_valid(&failed("banned")));
    assert!(validator.is_valid(&json!({
        "type": "response",
        "messageId": "m-1",
        "commandId": "lobby/sendMessage",
        "status": "success"
    })));
}

// =============================================================================
// Routing
// =============================================================================

#[test]
fn test_meta_routes_request_response_both_ways() {
    let (_dir, out) = compile_fixtures();
    let meta = read_json(&out.join("meta.json"));

    let contains = |actor: &str, kind: &str, direction: &str, id: &str| {
        meta["actors"][actor][kind][direction]
            .as_array()
            .unwrap()
            .contains(&json!(id))
    };

    assert!(contains("user", "request", "send", "lobby/sendMessage"));
    assert!(contains("server", "request", "receive", "lobby/sendMessage"));
    assert!(contains("server", "response", "send", "lobby/sendMessage"));
    assert!(contains("user", "response", "receive", "lobby/sendMessage"));
    assert!(!contains("user", "response", "send", "lobby/sendMessage"));

    assert!(contains("server", "request", "send", "autohost/start"));
    assert!(contains("autohost", "response", "send", "autohost/start"));
    assert!(contains("server", "event", "send", "user/self"));
    assert!(contains("user", "event", "receive", "user/self"));

    assert_eq!(meta["serviceIds"]["lobby"], json!(["list", "sendMessage", "updated"]));
    assert_eq!(meta["serviceIds"]["autohost"], json!(["start"]));
}

#[test]
fn test_every_sent_command_has_a_receiver() {
    let artifacts = load_project(&config_for(&fixtures_path(), Path::new("unused"))).unwrap();
    let meta = &artifacts.schema_meta;

    for actor in Actor::ALL {
        for kind in MessageKind::ALL {
            for id in &meta.routes(actor, kind).send {
                let receivers: Vec<_> = Actor::ALL
                    .into_iter()
                    .filter(|other| meta.routes(*other, kind).receive.contains(id))
                    .collect();
                assert_eq!(receivers.len(), 1, "{id} {kind:?} has receivers {receivers:?}");
            }
        }
    }
}

#[test]
fn test_ordered_endpoints() {
    let artifacts = load_project(&config_for(&fixtures_path(), Path::new("unused"))).unwrap();
    // declared order wins over ids, undeclared endpoints come last
    assert_eq!(artifacts.ordered_endpoints("lobby"), vec!["sendMessage", "list", "updated"]);
    assert_eq!(artifacts.ordered_endpoints("user"), vec!["whois", "self"]);
    assert!(artifacts.ordered_endpoints("matchmaking").is_empty());

    // serviceIds stays lexical
    assert_eq!(
        artifacts.schema_meta.service_ids["lobby"],
        vec!["list", "sendMessage", "updated"]
    );
}

// =============================================================================
// Failure and reproducibility
// =============================================================================

#[test]
fn test_invalid_endpoint_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("src");
    copy_fixtures(&source);
    fs::write(
        source.join("lobby/broken.json"),
        r#"{ "source": "user", "target": "server", "request": {}, "event": {}, "response": [] }"#,
    )
    .unwrap();

    let out = dir.path().join("out");
    let err = compile_project(&config_for(&source, &out)).unwrap_err();

    assert!(matches!(err, CompileError::RequestAndEvent { .. }));
    assert_eq!(err.to_string(), "Endpoint lobby/broken cannot have both a request and an event");
    assert_eq!(err.command_id(), Some("lobby/broken"));
    assert!(!out.exists());
}

#[test]
fn test_hyphenated_service_directory_compiles() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("src");
    copy_fixtures(&source);
    fs::create_dir_all(source.join("lobby-v2")).unwrap();
    fs::write(
        source.join("lobby-v2/join-queue.json"),
        r#"{ "source": "server", "target": "user", "event": { "data": { "$ref": "player" } } }"#,
    )
    .unwrap();

    let out = dir.path().join("out");
    compile_project(&config_for(&source, &out)).unwrap();

    let event = read_json(&out.join("lobby-v2/join-queue/event.json"));
    assert_eq!(event["properties"]["commandId"]["const"], "lobby-v2/join-queue");
    assert_eq!(event["properties"]["data"]["$ref"], "../../definitions/player.json");
}

#[test]
fn test_unknown_definition_reference_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("src");
    copy_fixtures(&source);
    fs::write(
        source.join("user/left.json"),
        r#"{ "source": "server", "target": "user", "event": { "data": { "$ref": "lobby" } } }"#,
    )
    .unwrap();

    let out = dir.path().join("out");
    let err = compile_project(&config_for(&source, &out)).unwrap_err();
    assert!(matches!(err, CompileError::UnresolvedReference { .. }));
    assert!(!out.exists());
}

#[test]
fn test_checksums_are_reproducible() {
    let (_first_dir, first) = compile_fixtures();
    let (_second_dir, second) = compile_fixtures();

    let first_manifest = fs::read_to_string(first.join(MANIFEST_FILE)).unwrap();
    let second_manifest = fs::read_to_string(second.join(MANIFEST_FILE)).unwrap();
    assert_eq!(first_manifest, second_manifest);

    let manifest = ChecksumManifest::parse(&first_manifest);
    assert!(manifest.verify(&second).unwrap().is_empty());
    assert!(manifest.entries().iter().any(|(path, _)| path == "compiled.json"));
}

#[test]
fn test_compact_output_without_checksums() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("schema");
    let mut config = config_for(&fixtures_path(), &out);
    config.output.format = OutputFormat::Compact;
    config.output.include_checksums = false;
    config.output.include_meta = false;

    let (_, written) = compile_project(&config).unwrap();

    assert!(!out.join(MANIFEST_FILE).exists());
    assert!(!out.join("meta.json").exists());
    assert!(!written.iter().any(|file| file.path == "meta.json"));

    let compiled = fs::read_to_string(out.join("compiled.json")).unwrap();
    assert!(!compiled.contains('\n'));
}
