//! Integration tests for the win_iis_website module
//!
//! Covers validation (every offending field reported, nothing delegated on
//! error), dispatch through a fake executor, and the JSON executor protocol
//! over a mock connection.

mod common;

use std::sync::Arc;

use common::*;
use iis_site::connection::{CommandResult, ConnectionError};
use iis_site::modules::windows::site_executor::{EXECUTOR_VAR, HOST_ENV};
use iis_site::modules::windows::{
    ExecutionFailure, ExecutionFailureKind, KnownParameter, ScriptExecutor, SiteRunState,
    SiteState, WebsiteValidator, WinIisWebsiteModule,
};
use iis_site::modules::{
    Module, ModuleContext, ModuleError, ModuleRegistry, ModuleStatus, ValidationError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_missing_name_fails() {
    let validator = WebsiteValidator::default();

    for input in [
        json!({}),
        json!({"state": "started"}),
        json!({"name": null, "port": 80}),
        json!({"name": "   "}),
    ] {
        let errors = validator.validate(&params(input.clone())).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::MissingRequiredField { field } if field == "name")),
            "expected MissingRequiredField for {}",
            input
        );
    }
}

#[test]
fn test_state_outside_choices_fails() {
    let validator = WebsiteValidator::default();

    for state in ["bogus", "Started", "present", "running", ""] {
        let errors = validator
            .validate(&params(json!({"name": "acme", "state": state})))
            .unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidChoice { field, .. } if field == "state")),
            "expected InvalidChoice for state '{}'",
            state
        );
    }
}

#[test]
fn test_invalid_choice_message_lists_choices() {
    let errors = WebsiteValidator::default()
        .validate(&params(json!({"name": "acme", "state": "bogus"})))
        .unwrap_err();
    assert_eq!(
        errors.to_string(),
        "value of state must be one of: absent, started, stopped, restarted, got: bogus"
    );
}

#[test]
fn test_name_only_is_accepted_unmodified() {
    let validated = WebsiteValidator::default()
        .validate(&params(json!({"name": "Default Web Site"})))
        .unwrap();

    assert_eq!(validated.name, "Default Web Site");
    assert_eq!(validated.state, None);
    assert_eq!(validated.to_params(), params(json!({"name": "Default Web Site"})));
}

#[test]
fn test_full_parameter_set_preserved() {
    let input = json!({
        "name": "acme",
        "state": "started",
        "port": 80,
        "ip": "127.0.0.1",
        "hostname": "acme.local",
        "application_pool": "acme",
        "physical_path": "C:\\sites\\acme"
    });

    let validated = WebsiteValidator::default().validate(&params(input.clone())).unwrap();
    assert_eq!(validated.state, Some(SiteState::Started));
    assert_eq!(validated.port, Some(80));
    assert_eq!(validated.physical_path.as_deref(), Some("C:\\sites\\acme"));
    assert_eq!(validated.to_params(), params(input));
}

#[test]
fn test_physical_path_namespace_forms_accepted() {
    let validator = WebsiteValidator::default();

    for path in [r"\\?\C:\sites\acme", r"\\?\UNC\files\sites\acme", r"\\.\C:\sites\acme"] {
        let validated = validator
            .validate(&params(json!({"name": "acme", "physical_path": path})))
            .unwrap();
        assert_eq!(validated.physical_path.as_deref(), Some(path));
    }

    let errors = validator
        .validate(&params(json!({"name": "acme", "physical_path": r"\\?\C:\sites\a*b"})))
        .unwrap_err();
    assert_eq!(errors.fields(), vec!["physical_path"]);
}

#[test]
fn test_port_coercion() {
    let validator = WebsiteValidator::default();

    for port in [json!(8080), json!("8080"), json!(8080.0)] {
        let validated = validator
            .validate(&params(json!({"name": "acme", "port": port})))
            .unwrap();
        assert_eq!(validated.port, Some(8080));
    }

    for port in [json!("eighty"), json!(70000), json!(-1), json!(80.5), json!([80])] {
        let errors = validator
            .validate(&params(json!({"name": "acme", "port": port.clone()})))
            .unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidType { field, .. } if field == "port")),
            "expected InvalidType for port {}",
            port
        );
    }
}

#[test]
fn test_every_offending_field_reported() {
    let errors = WebsiteValidator::default()
        .validate(&params(json!({
            "state": "bogus",
            "port": "http",
            "parameters": "logfile.directory",
            "ip": "localhost",
            "colour": "blue"
        })))
        .unwrap_err();

    let mut fields = errors.fields();
    fields.sort_unstable();
    assert_eq!(
        fields,
        vec!["colour", "ip", "name", "parameters", "port", "state"]
    );
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::UnsupportedParameter { field } if field == "colour")));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::MalformedParameters { .. })));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::InvalidValue { field, .. } if field == "ip")));
}

#[test]
fn test_parameters_parsed_into_pairs() {
    let validated = WebsiteValidator::default()
        .validate(&params(json!({
            "name": "acme",
            "parameters": "logfile.directory:D:\\logs|logfile.period:Daily"
        })))
        .unwrap();

    let parameters = validated.parameters.unwrap();
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters.known(KnownParameter::LogDirectory), Some("D:\\logs"));
    assert_eq!(parameters.get("logfile.period"), Some("Daily"));
}

#[test]
fn test_site_id_and_ssl() {
    let validator = WebsiteValidator::default();
    let validated = validator
        .validate(&params(json!({"name": "acme", "site_id": 12, "ssl": true})))
        .unwrap();
    assert_eq!(validated.site_id.as_deref(), Some("12"));
    assert_eq!(validated.ssl.as_deref(), Some("true"));

    let errors = validator
        .validate(&params(json!({"name": "acme", "site_id": "twelve"})))
        .unwrap_err();
    assert_eq!(errors.fields(), vec!["site_id"]);
}

#[test]
fn test_describe_exposes_schema() {
    let validator = WebsiteValidator::default();
    let schema = validator.describe();

    assert_eq!(schema.module, "win_iis_website");
    assert_eq!(schema.version_added, "2.0");
    assert_eq!(schema.required_options().collect::<Vec<_>>(), vec!["name"]);

    let state = schema.get("state").unwrap();
    assert_eq!(
        state.choices.as_deref(),
        Some(&["absent", "started", "stopped", "restarted"].map(String::from)[..])
    );
    assert_eq!(
        schema.get("site_id").unwrap().version_added.as_deref(),
        Some("2.1")
    );

    let described: serde_json::Value = serde_json::from_str(&schema.to_json().unwrap()).unwrap();
    assert_eq!(described["options"]["port"]["type"], json!("int"));
    assert_eq!(described["options"]["name"]["required"], json!(true));

    // every option carries a version marker
    for (name, option) in described["options"].as_object().unwrap() {
        let expected = if name == "site_id" { "2.1" } else { "2.0" };
        assert_eq!(option["version_added"], json!(expected), "option {}", name);
    }
    assert_eq!(described["metadata"]["status"], json!(["preview"]));
    assert_eq!(described["metadata"]["supported_by"], json!("community"));
    assert_eq!(described["author"], json!(["Henrik Wallström (@henrikwallstrom)"]));
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_invalid_params_never_reach_executor() {
    let executor = Arc::new(FakeExecutor::new());
    let module = WinIisWebsiteModule::with_executor(executor.clone());

    let err = module
        .run(
            &params(json!({"name": "acme", "state": "bogus"})),
            &ModuleContext::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::Validation(_)));
    assert!(err.is_validation());
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn test_create_site() {
    let executor = Arc::new(FakeExecutor::new());
    let module = WinIisWebsiteModule::with_executor(executor.clone());

    let output = module
        .run(
            &params(json!({
                "name": "acme",
                "state": "started",
                "port": 8080,
                "physical_path": "C:\\sites\\acme"
            })),
            &ModuleContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(output.status(), ModuleStatus::Changed);
    assert_eq!(output.data["site"]["Name"], json!("acme"));
    assert_eq!(output.data["site"]["State"], json!("Started"));
    assert_eq!(output.data["site"]["Bindings"], json!(["*:8080:"]));

    let applied = executor.applied();
    assert_eq!(applied.len(), 1);
    assert!(!applied[0].check_mode);
    assert_eq!(applied[0].params.port, Some(8080));
    assert!(executor.current().is_some());
}

#[tokio::test]
async fn test_idempotent_second_run() {
    let executor = Arc::new(FakeExecutor::with_site(site(1, "acme", SiteRunState::Started)));
    let module = WinIisWebsiteModule::with_executor(executor.clone());

    let output = module
        .run(
            &params(json!({"name": "acme", "state": "started"})),
            &ModuleContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(output.status(), ModuleStatus::Ok);
    assert!(!output.changed);
}

#[tokio::test]
async fn test_check_mode_is_forwarded() {
    let executor = Arc::new(FakeExecutor::with_site(site(3, "acme", SiteRunState::Started)));
    let module = WinIisWebsiteModule::with_executor(executor.clone());

    let output = module
        .run(
            &params(json!({"name": "acme", "state": "absent"})),
            &ModuleContext::new().with_check_mode(true),
        )
        .await
        .unwrap();

    assert!(output.changed);
    assert!(!output.data.contains_key("site"));
    assert!(executor.applied()[0].check_mode);
    // check mode leaves the host untouched
    assert_eq!(executor.current().map(|s| s.id), Some(3));
}

#[tokio::test]
async fn test_diff_mode_renders_before_and_after() {
    let executor = Arc::new(FakeExecutor::with_site(site(1, "acme", SiteRunState::Started)));
    let module = WinIisWebsiteModule::with_executor(executor);

    let output = module
        .run(
            &params(json!({"name": "acme", "state": "stopped"})),
            &ModuleContext::new().with_diff_mode(true),
        )
        .await
        .unwrap();

    let diff = output.diff.expect("diff in diff mode");
    assert!(diff.before.contains("State: Started"));
    assert!(diff.after.contains("State: Stopped"));
}

#[tokio::test]
async fn test_executor_failure_keeps_kind() {
    for kind in [
        ExecutionFailureKind::NotFound,
        ExecutionFailureKind::InvalidPhysicalPath,
        ExecutionFailureKind::PermissionDenied,
    ] {
        let executor = Arc::new(FakeExecutor::failing(ExecutionFailure::new(
            kind,
            "raised by the host",
        )));
        let module = WinIisWebsiteModule::with_executor(executor);

        let err = module
            .run(&params(json!({"name": "acme"})), &ModuleContext::new())
            .await
            .unwrap_err();

        match err {
            ModuleError::Execution(failure) => {
                assert_eq!(failure.kind, kind);
                assert_eq!(failure.to_string(), "raised by the host");
            }
            other => panic!("expected an execution failure, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_registry_dispatch() {
    let registry = ModuleRegistry::with_builtins();
    assert_eq!(registry.names(), vec!["win_iis_website"]);

    let err = registry
        .execute("win_iis_site", &params(json!({"name": "acme"})), &ModuleContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::NotFound(_)));
}

// ============================================================================
// Script executor protocol
// ============================================================================

fn script_context(connection: Arc<MockConnection>) -> ModuleContext {
    ModuleContext::new()
        .with_host("web1")
        .with_vars(
            [
                (EXECUTOR_VAR.to_string(), json!("site-exec --target {host}")),
                ("ansible_host".to_string(), json!("10.0.0.5")),
            ]
            .into_iter()
            .collect(),
        )
        .with_connection(connection)
}

#[tokio::test]
async fn test_script_executor_round_trip() {
    let connection = Arc::new(MockConnection::new("web1"));
    connection.reply(r#"{"changed": false, "site": null}"#);
    connection.reply(
        r#"WARNING: noise before the payload
{"changed": true, "msg": "site created", "site": {"ID": 2, "Name": "acme", "ApplicationPool": "acme", "PhysicalPath": "C:\\sites\\acme", "Bindings": ["*:80:"], "State": "Started"}}"#,
    );

    let module = WinIisWebsiteModule::new();
    let output = module
        .run(
            &params(json!({"name": "acme", "state": "started", "port": "80"})),
            &script_context(connection.clone()),
        )
        .await
        .unwrap();

    assert!(output.changed);
    assert_eq!(output.msg, "site created");
    assert_eq!(output.data["site"]["ID"], json!(2));

    assert_eq!(
        connection.get_commands(),
        vec!["site-exec --target 10.0.0.5", "site-exec --target 10.0.0.5"]
    );
    let requests = connection.get_requests();
    assert_eq!(requests[0]["action"], json!("query"));
    assert_eq!(requests[1]["action"], json!("apply"));
    assert_eq!(requests[1]["check_mode"], json!(false));
    assert_eq!(
        requests[1]["params"],
        json!({"name": "acme", "state": "started", "port": 80})
    );
    assert_eq!(
        connection.get_options()[0].env.get(HOST_ENV).map(String::as_str),
        Some("10.0.0.5")
    );
}

#[tokio::test]
async fn test_script_executor_failure_reason() {
    let connection = Arc::new(MockConnection::new("web1"));
    connection.reply_with(CommandResult::failure(
        1,
        r#"{"failed": true, "msg": "Access is denied", "reason": "permission_denied"}"#.into(),
        String::new(),
    ));

    let err = WinIisWebsiteModule::new()
        .run(&params(json!({"name": "acme"})), &script_context(connection))
        .await
        .unwrap_err();

    match err {
        ModuleError::Execution(failure) => {
            assert_eq!(failure.kind, ExecutionFailureKind::PermissionDenied);
            assert_eq!(failure.message, "Access is denied");
        }
        other => panic!("expected an execution failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_script_executor_stderr_on_crash() {
    let connection = Arc::new(MockConnection::new("web1"));
    connection.reply_with(CommandResult::failure(
        127,
        String::new(),
        "site-exec: command not found".into(),
    ));

    let err = WinIisWebsiteModule::new()
        .run(&params(json!({"name": "acme"})), &script_context(connection))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "site-exec: command not found");
}

#[tokio::test]
async fn test_script_executor_connection_error() {
    let connection = Arc::new(MockConnection::new("web1"));
    connection.fail_with(ConnectionError::Timeout(30));

    let err = WinIisWebsiteModule::new()
        .run(&params(json!({"name": "acme"})), &script_context(connection))
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::Connection(ConnectionError::Timeout(30))));
}

#[tokio::test]
async fn test_missing_executor_command() {
    let connection = Arc::new(MockConnection::new("web1"));
    let context = ModuleContext::new().with_connection(connection.clone());

    let err = WinIisWebsiteModule::new()
        .run(&params(json!({"name": "acme"})), &context)
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::Connection(ConnectionError::InvalidConfig(_))));
    assert_eq!(connection.command_count(), 0);
}

#[test]
fn test_render_command_quotes_address() {
    let executor = ScriptExecutor::new(Arc::new(MockConnection::new("x")), "exec {host}")
        .with_address("host with space");
    assert_eq!(executor.render_command(), "exec 'host with space'");
}
