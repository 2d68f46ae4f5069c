use super::*;
use crate::test_support::ScriptedModel;

const TEMPLATE: &str = "Task: {$TASK}\n\n{$HISTORY}\n\nRespond with one tool call.";

const PLAN_CALL: &str = r#"<tool_call name="plan"><steps>Check open incidents</steps></tool_call>"#;
const LOOKUP_CALL: &str = r#"<tool_call name="call_user_tool">
  <tool_name>list_open_incidents</tool_name>
  <arguments><service> api </service></arguments>
</tool_call>"#;
const FINISH_CALL: &str =
    r#"<tool_call name="finish"><summary>Two incidents open on api & escalated</summary></tool_call>"#;

fn task_variables() -> BTreeMap<String, String> {
    BTreeMap::from([("TASK".to_string(), "triage the outage".to_string())])
}

fn config_from_json(json: &str) -> MultiTurnConfig {
    serde_json::from_str(json).unwrap()
}

fn incident_config() -> MultiTurnConfig {
    config_from_json(
        r#"{
            "simulated_observations": {
                "plan": "<observation>Plan noted for turn {turn}.</observation>",
                "call_user_tool": {
                    "list_open_incidents": {"template": "<observation>{service}: 2 open</observation>"}
                },
                "default": "<observation>ok</observation>"
            },
            "requirements": {
                "plan_first": true,
                "must_call_user_tools": ["list_open_incidents"],
                "finish_summary_keywords": ["INCIDENTS"]
            }
        }"#,
    )
}

fn prompt_of(model: &ScriptedModel, index: usize) -> String {
    model.requests()[index].messages[0].content.clone()
}

// =============================================================================
// Tool call parsing
// =============================================================================

#[test]
fn test_parse_tool_call_fields_and_arguments() {
    let call = parse_tool_call(LOOKUP_CALL).unwrap();

    assert_eq!(call.name, "call_user_tool");
    assert_eq!(call.tool_name, "list_open_incidents");
    assert_eq!(call.arguments.get("service").map(String::as_str), Some("api"));
    assert_eq!(
        call.fields.get("tool_name").map(String::as_str),
        Some("list_open_incidents")
    );
}

#[test]
fn test_parse_tool_call_rejects_leading_narration() {
    let err = parse_tool_call(&format!("Sure! {}", PLAN_CALL)).unwrap_err();
    assert_eq!(err, ToolCallError::TextBefore);
    assert_eq!(
        err.to_string(),
        "Response must not contain text before the <tool_call> element."
    );
}

#[test]
fn test_parse_tool_call_rejects_trailing_text() {
    let err = parse_tool_call(&format!("{}\nLet me know!", PLAN_CALL)).unwrap_err();
    assert_eq!(err, ToolCallError::TextAfter);
}

#[test]
fn test_parse_tool_call_tolerates_stray_closer() {
    let call = parse_tool_call(&format!("  {}</tool_call>\n", PLAN_CALL)).unwrap();
    assert_eq!(call.name, "plan");
}

#[test]
fn test_parse_tool_call_missing_and_multiple() {
    assert_eq!(
        parse_tool_call("I will plan first.").unwrap_err(),
        ToolCallError::Missing
    );
    assert_eq!(
        parse_tool_call(&format!("{}{}", PLAN_CALL, PLAN_CALL)).unwrap_err(),
        ToolCallError::Multiple
    );
}

#[test]
fn test_parse_tool_call_requires_name() {
    let err = parse_tool_call("<tool_call><steps>a</steps></tool_call>").unwrap_err();
    assert_eq!(err, ToolCallError::MissingName);
}

#[test]
fn test_parse_tool_call_user_tool_needs_tool_name() {
    let err =
        parse_tool_call(r#"<tool_call name="call_user_tool"><arguments /></tool_call>"#).unwrap_err();
    assert_eq!(err, ToolCallError::MissingUserTool);
}

#[test]
fn test_parse_tool_call_malformed_xml() {
    let err = parse_tool_call(r#"<tool_call name="plan"><steps>a</tool_call>"#).unwrap_err();
    assert!(matches!(err, ToolCallError::Malformed(_)));
    assert!(err.to_string().starts_with("Tool call XML not well formed: "));
}

#[test]
fn test_textual_fields_accept_markup_characters() {
    let call = parse_tool_call(
        r#"<tool_call name="finish"><summary>Fixed A & B in <30m</summary></tool_call>"#,
    )
    .unwrap();

    assert_eq!(
        call.fields.get("summary").map(String::as_str),
        Some("Fixed A & B in <30m")
    );
    assert!(call.xml.contains("<summary><![CDATA[Fixed A & B in <30m]]></summary>"));
}

#[test]
fn test_nested_field_is_kept_as_xml() {
    let call = parse_tool_call(
        r#"<tool_call name="plan"><steps><step>one</step><step>two</step></steps></tool_call>"#,
    )
    .unwrap();

    assert_eq!(
        call.fields.get("steps").map(String::as_str),
        Some("<steps><step>one</step><step>two</step></steps>")
    );
}

#[test]
fn test_wrap_cdata_splits_terminator() {
    assert_eq!(wrap_cdata(""), "<![CDATA[]]>");
    assert_eq!(wrap_cdata("a]]>b"), "<![CDATA[a]]]><![CDATA[>b]]>");
}

#[test]
fn test_wrap_textual_fields_leaves_wrapped_content() {
    let xml = "<tool_call name=\"finish\"><summary><![CDATA[a & b]]></summary></tool_call>";
    assert_eq!(wrap_textual_fields(xml), xml);
}

// =============================================================================
// History rendering
// =============================================================================

#[test]
fn test_dedent_removes_common_margin() {
    assert_eq!(dedent("    a\n      b\n   \n    c"), "a\n  b\n\nc");
}

#[test]
fn test_indent_block_levels() {
    assert_eq!(
        indent_block("<a>\n  <b />\n</a>\n", 2),
        "    <a>\n      <b />\n    </a>"
    );
}

#[test]
fn test_empty_history() {
    assert_eq!(render_history(&[], &[]), "<history />");
    assert_eq!(render_history(&["   ".to_string()], &[]), "<history />");
}

#[test]
fn test_history_includes_seed_turns() {
    let seed = vec!["<turn index=\"0\">seed</turn>".to_string()];
    assert_eq!(
        render_history(&seed, &[]),
        "<history>\n  <turn index=\"0\">seed</turn>\n</history>"
    );
}

#[test]
fn test_turn_entry_layout() {
    let entry = render_turn_entry(
        2,
        "<tool_call name=\"plan\"><steps>a</steps></tool_call>",
        "<observation>ok</observation>",
    );

    assert_eq!(
        entry,
        "  <turn index=\"2\">\n    <agent>\n      <tool_call name=\"plan\"><steps>a</steps></tool_call>\n    </agent>\n    <environment>\n      <observation>ok</observation>\n    </environment>\n  </turn>"
    );
}

#[test]
fn test_format_violation_entry_wraps_output() {
    let feedback = format_error_feedback("Response must contain a <tool_call> element.");
    let entry = render_format_violation(3, "no call here", &feedback, 1);

    assert!(entry.starts_with("  <turn index=\"3\" type=\"format_violation\" attempt=\"1\">"));
    assert!(entry.contains("<invalid_output><![CDATA[no call here]]></invalid_output>"));
    assert!(entry.contains(
        "FORMAT ERROR: Response must contain a <tool_call> element. Respond with exactly one <tool_call> element"
    ));
}

// =============================================================================
// Observations
// =============================================================================

#[test]
fn test_observation_for_agent_tool() {
    let config = incident_config();
    let call = parse_tool_call(PLAN_CALL).unwrap();

    let observation = build_observation(&call, &config.simulated_observations, 4).unwrap();
    assert_eq!(observation, "<observation>Plan noted for turn 4.</observation>");
}

#[test]
fn test_observation_for_user_tool_uses_arguments() {
    let config = incident_config();
    let call = parse_tool_call(LOOKUP_CALL).unwrap();

    let observation = build_observation(&call, &config.simulated_observations, 2).unwrap();
    assert_eq!(observation, "<observation>api: 2 open</observation>");
}

#[test]
fn test_user_tool_falls_back_to_user_default_then_global() {
    let call = parse_tool_call(
        r#"<tool_call name="call_user_tool"><tool_name>page_oncall</tool_name></tool_call>"#,
    )
    .unwrap();

    let with_user_default = config_from_json(
        r#"{"simulated_observations": {
            "call_user_tool": {"default": "<observation>{tool_name} ran</observation>"},
            "default": "<observation>global</observation>"
        }}"#,
    );
    assert_eq!(
        build_observation(&call, &with_user_default.simulated_observations, 1).unwrap(),
        "<observation>page_oncall ran</observation>"
    );

    let global_only = config_from_json(
        r#"{"simulated_observations": {"default": "<observation>global</observation>"}}"#,
    );
    assert_eq!(
        build_observation(&call, &global_only.simulated_observations, 1).unwrap(),
        "<observation>global</observation>"
    );
}

#[test]
fn test_missing_observation_uses_placeholder() {
    let call = parse_tool_call(PLAN_CALL).unwrap();
    let observation = build_observation(&call, &SimulatedObservations::default(), 1).unwrap();
    assert_eq!(observation, NO_OBSERVATION);
}

#[test]
fn test_object_entry_prefers_text() {
    let entry = ObservationEntry::Object {
        text: Some("inline".to_string()),
        template: Some("template".to_string()),
    };
    assert_eq!(entry.template(), Some("inline"));

    let empty_text = ObservationEntry::Object {
        text: Some(String::new()),
        template: Some("template".to_string()),
    };
    assert_eq!(empty_text.template(), Some("template"));
}

#[test]
fn test_observation_values_have_braces_doubled() {
    let config = config_from_json(
        r#"{"simulated_observations": {"finish": "<observation>{summary}</observation>"}}"#,
    );
    let call =
        parse_tool_call(r#"<tool_call name="finish"><summary>set {x}</summary></tool_call>"#)
            .unwrap();

    let observation = build_observation(&call, &config.simulated_observations, 1).unwrap();
    assert_eq!(observation, "<observation>set {{x}}</observation>");
}

#[test]
fn test_observation_with_unknown_placeholder_is_user_error() {
    let config = config_from_json(
        r#"{"simulated_observations": {"plan": "<observation>{ticket_id}</observation>"}}"#,
    );
    let call = parse_tool_call(PLAN_CALL).unwrap();

    let err = build_observation(&call, &config.simulated_observations, 1).unwrap_err();
    assert!(matches!(err, ForgeError::UserError(_)));
    assert_eq!(
        err.to_string(),
        "Observation template expected value for 'ticket_id'."
    );
}

#[test]
fn test_observation_with_lone_closing_brace_is_user_error() {
    let config = config_from_json(
        r#"{"simulated_observations": {"plan": "<observation>done}</observation>"}}"#,
    );
    let call = parse_tool_call(PLAN_CALL).unwrap();

    let err = build_observation(&call, &config.simulated_observations, 1).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid observation template: single '}' encountered at position 17"
    );
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_multi_turn_defaults() {
    let config = config_from_json("{}");

    assert_eq!(config, MultiTurnConfig::default());
    assert_eq!(config.history_variable, "$HISTORY");
    assert_eq!(config.max_turns, 6);
    assert_eq!(config.finish_tool, "finish");
    assert_eq!(config.format_retry_limit, 2);
    assert!(config.requirements.is_empty());
}

#[test]
fn test_turn_budget_fallbacks() {
    let mut config = MultiTurnConfig::default();
    assert_eq!(config.turn_max_tokens(None), DEFAULT_TURN_MAX_TOKENS);
    assert_eq!(config.turn_max_tokens(Some(300)), 300);

    config.per_turn_max_tokens = Some(200);
    assert_eq!(config.turn_max_tokens(Some(300)), 200);
}

// =============================================================================
// Conversations
// =============================================================================

#[test]
fn test_full_conversation_succeeds() {
    let model = ScriptedModel::replying(&[PLAN_CALL, LOOKUP_CALL, FINISH_CALL]);
    let config = incident_config();

    let outcome = run_conversation(&model, TEMPLATE, &task_variables(), &config, None).unwrap();

    assert_eq!(outcome.used_user_tools, vec!["list_open_incidents".to_string()]);
    assert_eq!(outcome.finish_call.name, "finish");
    assert_eq!(outcome.conversation.len(), 3);

    let observations: Vec<&str> = outcome
        .conversation
        .iter()
        .map(|turn| turn.observation.as_str())
        .collect();
    assert_eq!(
        observations,
        vec![
            "<observation>Plan noted for turn 1.</observation>",
            "<observation>api: 2 open</observation>",
            "<observation>ok</observation>",
        ]
    );
    assert!(outcome.conversation.iter().all(|turn| turn.attempt == 1));
    assert!(outcome.final_history.contains("<turn index=\"3\">"));
    assert_eq!(model.remaining(), 0);
}

#[test]
fn test_history_grows_between_turns() {
    let model = ScriptedModel::replying(&[PLAN_CALL, FINISH_CALL]);

    run_conversation(
        &model,
        TEMPLATE,
        &task_variables(),
        &MultiTurnConfig::default(),
        None,
    )
    .unwrap();

    let first = prompt_of(&model, 0);
    assert!(first.starts_with("Task: triage the outage"));
    assert!(first.contains("<history />"));

    let second = prompt_of(&model, 1);
    assert!(second.contains("<turn index=\"1\">"));
    assert!(second.contains("<steps>Check open incidents</steps>"));
    assert!(second.contains(NO_OBSERVATION));
}

#[test]
fn test_turn_prompt_fills_history_last() {
    let history = "<history><summary>Restating {$TASK} verbatim</summary></history>";

    let err = fill_turn_prompt(TEMPLATE, &task_variables(), "$HISTORY", history).unwrap_err();

    match err {
        ForgeError::Substitution { missing } => assert_eq!(missing, vec!["$TASK".to_string()]),
        other => panic!("expected substitution error, got {other:?}"),
    }
}

#[test]
fn test_turn_prompt_ignores_case_value_for_history() {
    let mut variables = task_variables();
    variables.insert("HISTORY".to_string(), "stale".to_string());

    let prompt = fill_turn_prompt(TEMPLATE, &variables, "$HISTORY", "<history />").unwrap();

    assert_eq!(
        prompt,
        "Task: triage the outage\n\n<history />\n\nRespond with one tool call."
    );
}

#[test]
fn test_agent_text_in_history_is_not_rewritten() {
    let restating =
        r#"<tool_call name="plan"><summary>Restating {$TASK} verbatim</summary></tool_call>"#;
    let model = ScriptedModel::replying(&[restating, FINISH_CALL]);

    let err = run_conversation(
        &model,
        TEMPLATE,
        &task_variables(),
        &MultiTurnConfig::default(),
        None,
    )
    .unwrap_err();

    assert!(matches!(err, ForgeError::Substitution { .. }));
    assert_eq!(model.requests().len(), 1);
    assert_eq!(model.remaining(), 1);
}

#[test]
fn test_braced_observation_value_fails_next_turn() {
    let config = config_from_json(
        r#"{"simulated_observations": {
            "call_user_tool": {"lookup": "<observation>{query}</observation>"}
        }}"#,
    );
    let lookup = r#"<tool_call name="call_user_tool">
  <tool_name>lookup</tool_name>
  <arguments><query>{"service":"api"}</query></arguments>
</tool_call>"#;
    let model = ScriptedModel::replying(&[lookup, FINISH_CALL]);

    let err = run_conversation(&model, TEMPLATE, &task_variables(), &config, None).unwrap_err();

    match err {
        ForgeError::Substitution { missing } => {
            assert!(missing.contains(&"\"service\":\"api\"".to_string()));
        }
        other => panic!("expected substitution error, got {other:?}"),
    }
    assert_eq!(model.requests().len(), 1);
}

#[test]
fn test_turn_budget_reaches_requests() {
    let model = ScriptedModel::replying(&[FINISH_CALL]);

    run_conversation(
        &model,
        TEMPLATE,
        &task_variables(),
        &MultiTurnConfig::default(),
        Some(300),
    )
    .unwrap();

    let request = &model.requests()[0];
    assert_eq!(request.params.max_tokens, 300);
    assert_eq!(request.params.temperature, None);
}

#[test]
fn test_format_violation_is_retried() {
    let narrated = format!("Sure! {}", FINISH_CALL);
    let model = ScriptedModel::replying(&[narrated.as_str(), FINISH_CALL]);

    let outcome = run_conversation(
        &model,
        TEMPLATE,
        &task_variables(),
        &MultiTurnConfig::default(),
        None,
    )
    .unwrap();

    assert_eq!(outcome.conversation.len(), 2);
    let rejected = &outcome.conversation[0];
    assert_eq!((rejected.turn, rejected.attempt), (1, 1));
    assert!(rejected.tool_call.is_none());
    assert_eq!(
        rejected.format_error.as_deref(),
        Some("Response must not contain text before the <tool_call> element.")
    );
    assert_eq!(
        (outcome.conversation[1].turn, outcome.conversation[1].attempt),
        (1, 2)
    );

    let retry_prompt = prompt_of(&model, 1);
    assert!(retry_prompt.contains("type=\"format_violation\" attempt=\"1\""));
    assert!(retry_prompt.contains("FORMAT ERROR: Response must not contain text before"));
}

#[test]
fn test_repeated_format_violation_fails() {
    let model = ScriptedModel::replying(&["I'll start by planning.", "Still planning."]);

    let err = run_conversation(
        &model,
        TEMPLATE,
        &task_variables(),
        &MultiTurnConfig::default(),
        None,
    )
    .unwrap_err();

    match err {
        ForgeError::Protocol { turn, message } => {
            assert_eq!(turn, 1);
            assert_eq!(message, "Response must contain a <tool_call> element.");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert_eq!(model.requests().len(), 2);
}

#[test]
fn test_retry_limit_of_one_fails_immediately() {
    let model = ScriptedModel::replying(&["no tool call", FINISH_CALL]);
    let mut config = MultiTurnConfig::default();
    config.format_retry_limit = 1;

    let err = run_conversation(&model, TEMPLATE, &task_variables(), &config, None).unwrap_err();

    assert!(matches!(err, ForgeError::Protocol { turn: 1, .. }));
    assert_eq!(model.remaining(), 1);
}

#[test]
fn test_user_tool_without_name_is_retryable() {
    let model = ScriptedModel::replying(&[
        r#"<tool_call name="call_user_tool"><arguments /></tool_call>"#,
        FINISH_CALL,
    ]);

    let outcome = run_conversation(
        &model,
        TEMPLATE,
        &task_variables(),
        &MultiTurnConfig::default(),
        None,
    )
    .unwrap();

    assert_eq!(
        outcome.conversation[0].format_error.as_deref(),
        Some("call_user_tool responses must include a <tool_name> element.")
    );
    assert!(outcome.used_user_tools.is_empty());
}

#[test]
fn test_turn_limit_without_finish() {
    let model = ScriptedModel::replying(&[PLAN_CALL, PLAN_CALL, PLAN_CALL]);
    let mut config = MultiTurnConfig::default();
    config.max_turns = 2;

    let err = run_conversation(&model, TEMPLATE, &task_variables(), &config, None).unwrap_err();

    assert!(matches!(
        err,
        ForgeError::TurnLimit { ref finish_tool, max_turns: 2 } if finish_tool == "finish"
    ));
    assert_eq!(model.requests().len(), 2);
}

#[test]
fn test_custom_finish_tool() {
    let model = ScriptedModel::replying(&[
        PLAN_CALL,
        r#"<tool_call name="handoff"><handoff>to the on-call lead</handoff></tool_call>"#,
    ]);
    let mut config = MultiTurnConfig::default();
    config.finish_tool = "handoff".to_string();

    let outcome = run_conversation(&model, TEMPLATE, &task_variables(), &config, None).unwrap();

    assert_eq!(outcome.finish_call.name, "handoff");
    assert_eq!(
        outcome.finish_call.fields.get("handoff").map(String::as_str),
        Some("to the on-call lead")
    );
}

#[test]
fn test_elapsed_deadline_stops_before_model_call() {
    let model = ScriptedModel::replying(&[FINISH_CALL]);
    let mut config = MultiTurnConfig::default();
    config.deadline_seconds = Some(0);

    let err = run_conversation(&model, TEMPLATE, &task_variables(), &config, None).unwrap_err();

    assert!(matches!(err, ForgeError::Deadline { seconds: 0, turn: 1 }));
    assert!(model.requests().is_empty());
}

#[test]
fn test_missing_case_variable_fails_before_model_call() {
    let model = ScriptedModel::replying(&[FINISH_CALL]);

    let err = run_conversation(
        &model,
        TEMPLATE,
        &BTreeMap::new(),
        &MultiTurnConfig::default(),
        None,
    )
    .unwrap_err();

    match err {
        ForgeError::Substitution { missing } => assert_eq!(missing, vec!["$TASK".to_string()]),
        other => panic!("expected substitution error, got {other:?}"),
    }
    assert!(model.requests().is_empty());
}

#[test]
fn test_provider_error_propagates() {
    let model = ScriptedModel::replying(&[]);

    let err = run_conversation(
        &model,
        TEMPLATE,
        &task_variables(),
        &MultiTurnConfig::default(),
        None,
    )
    .unwrap_err();

    assert!(matches!(err, ForgeError::Provider(_)));
}

// =============================================================================
// Requirements
// =============================================================================

#[test]
fn test_plan_first_requirement() {
    let model = ScriptedModel::replying(&[LOOKUP_CALL, FINISH_CALL]);

    let err = run_conversation(&model, TEMPLATE, &task_variables(), &incident_config(), None)
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        ForgeError::Requirement("The first turn must invoke the plan tool.".to_string())
            .to_string()
    );
}

#[test]
fn test_missing_user_tools_are_sorted() {
    let model = ScriptedModel::replying(&[FINISH_CALL]);
    let mut config = MultiTurnConfig::default();
    config.requirements.must_call_user_tools = vec!["zeta".to_string(), "alpha".to_string()];

    let err = run_conversation(&model, TEMPLATE, &task_variables(), &config, None).unwrap_err();

    match err {
        ForgeError::Requirement(message) => assert_eq!(
            message,
            "The conversation never invoked the required user tools: alpha, zeta"
        ),
        other => panic!("expected requirement error, got {other:?}"),
    }
}

#[test]
fn test_summary_keywords_are_case_insensitive() {
    let requirements = Requirements {
        plan_first: false,
        must_call_user_tools: Vec::new(),
        finish_summary_keywords: vec!["Escalated".to_string(), "rollback".to_string()],
    };
    let finish = parse_tool_call(FINISH_CALL).unwrap();

    let err = check_requirements(&requirements, &[], &[], Some(&finish)).unwrap_err();
    match err {
        ForgeError::Requirement(message) => assert_eq!(
            message,
            "Finish summary missing required keywords: rollback"
        ),
        other => panic!("expected requirement error, got {other:?}"),
    }
}

#[test]
fn test_empty_requirements_always_pass() {
    assert!(check_requirements(&Requirements::default(), &[], &[], None).is_ok());
}

#[test]
fn test_outcome_serializes_without_empty_format_error() {
    let model = ScriptedModel::replying(&[FINISH_CALL]);
    let outcome = run_conversation(
        &model,
        TEMPLATE,
        &task_variables(),
        &MultiTurnConfig::default(),
        None,
    )
    .unwrap();

    let value = serde_json::to_value(&outcome).unwrap();
    assert!(value["conversation"][0].get("format_error").is_none());
    assert_eq!(value["finish_call"]["name"], "finish");
}
