//! Check sequences as a board CRUD test would run them.

use restcheck_core::fakes::{MemoryLogSink, MemoryStepRecorder};
use restcheck_core::matcher::{self, json as jm};
use restcheck_core::{RecordedResponse, StepStatus, VerificationEngine, VerificationError};
use serde_json::json;
use std::sync::Arc;

fn engine() -> (VerificationEngine, Arc<MemoryLogSink>, Arc<MemoryStepRecorder>) {
    let log = Arc::new(MemoryLogSink::new());
    let steps = Arc::new(MemoryStepRecorder::new());
    (
        VerificationEngine::new(log.clone(), steps.clone()),
        log,
        steps,
    )
}

fn created_board(name: &str) -> RecordedResponse {
    RecordedResponse::new(200)
        .with_time_ms(412)
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_json(json!({
            "id": "5f1d7c0e9b1a2c3d4e5f6a7b",
            "name": name,
            "closed": false,
            "prefs": { "permissionLevel": "private", "background": "blue" }
        }))
}

/// Test: create-board sequence passes, then a mismatched name fails with both values
#[test]
fn test_create_board_sequence() -> anyhow::Result<()> {
    let (engine, log, _) = engine();
    let response = created_board("X");

    engine.verify_status_code("Status code should be 200", &response, 200)?;
    engine.verify_json_field_equals("Board name should be X", &response, "name", "X")?;

    let err = engine
        .verify_json_field_equals("Board name should be Y", &response, "name", "Y")
        .unwrap_err();
    let failure = err.as_failure().expect("mismatch is a failure");
    assert!(failure.actual.contains('X'));
    assert!(failure.expected.contains('Y'));
    let rendered = err.to_string();
    assert!(rendered.contains("Board name should be Y"));
    assert!(rendered.contains("\"X\"") && rendered.contains("\"Y\""));

    let lines = log.lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Assertion Passed: Status code should be 200");
    assert_eq!(lines[1], "Assertion Passed: Board name should be X");
    assert!(lines[2].starts_with("Assertion Failed: Board name should be Y"));
    Ok(())
}

/// Test: a failing check short-circuits the rest of the test body via `?`
#[test]
fn test_failure_terminates_test_body() {
    let (engine, log, steps) = engine();
    let response = created_board("ITI_Project_Board");

    let body = || -> Result<(), VerificationError> {
        engine.verify_response_time_less_than_or_equal("fast", &response, 3000)?;
        engine.verify_status_code("created", &response, 201)?;
        engine.verify_json_field_exists("never reached", &response, "id")?;
        Ok(())
    };

    assert!(body().unwrap_err().is_failure());
    assert_eq!(log.len(), 2);
    let statuses: Vec<StepStatus> = steps.steps().into_iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![StepStatus::Passed, StepStatus::Failed]);
}

/// Test: compound conditions on a single field
#[test]
fn test_board_field_conditions() -> anyhow::Result<()> {
    let (engine, _, _) = engine();
    let response = created_board("ITI_Project_Board");

    engine.verify_json_field_matches(
        "Name is an ITI board",
        &response,
        "name",
        &jm::string_that(matcher::starts_with("ITI").and(matcher::ends_with("Board"))),
    )?;
    engine.verify_json_field_in(
        "Permission level is known",
        &response,
        "prefs.permissionLevel",
        &[json!("private"), json!("org"), json!("public")],
    )?;
    engine.verify_json_field_not_exists("No organization", &response, "idOrganization")?;
    engine.verify_header_equals(
        "JSON content",
        &response,
        "content-type",
        "application/json; charset=utf-8",
    )?;
    engine.verify_all(
        "Board name length",
        &"ITI_Project_Board".len(),
        &[matcher::greater_than(3), matcher::less_than(64)],
    )?;
    Ok(())
}

/// Test: plain-text error bodies compare through the raw body
#[test]
fn test_invalid_token_body() -> anyhow::Result<()> {
    let (engine, _, _) = engine();
    let response = RecordedResponse::new(401)
        .with_time_ms(120)
        .with_text("invalid app token");

    engine.verify_status_code("Unauthorized", &response, 401)?;
    engine.verify_equals(
        "Error message should indicate invalid token",
        response.body_as_string(),
        "invalid app token",
    )?;
    // Nothing parses as JSON, so every field reads as absent.
    engine.verify_json_field_not_exists("no id", &response, "id")?;
    Ok(())
}

/// Test: list lookups by id through `find` closures on a board's lists
#[test]
fn test_board_lists_find_by_id() -> anyhow::Result<()> {
    let (engine, log, _) = engine();
    let response = RecordedResponse::new(200).with_json(json!([
        { "id": "l1", "name": "To Do", "idBoard": "b1", "closed": false },
        { "id": "l2", "name": "ITI_List", "idBoard": "b1", "closed": false }
    ]));

    engine.verify_json_array_contains("List is on the board", &response, "id", "l2")?;
    engine.verify_json_field_equals(
        "List name",
        &response,
        "find { it.id == 'l2' }.name",
        "ITI_List",
    )?;
    engine.verify_json_field_equals(
        "List board",
        &response,
        "find { it.id == 'l2' }.idBoard",
        "b1",
    )?;
    engine.verify_json_field_not_exists(
        "Archived list is gone",
        &response,
        "find { it.id == 'l9' }.name",
    )?;
    engine.verify_json_field_matches(
        "Open lists are flagged",
        &response,
        "findAll { it.closed == false }.closed",
        &jm::is_array().and(jm::has_size(2)),
    )?;

    let err = engine
        .verify_json_field_equals("Unsupported query", &response, "sort { it.id }.name", "x")
        .unwrap_err();
    assert!(!err.is_failure());
    assert_eq!(log.len(), 5);
    Ok(())
}
