//! End-to-end tests for the graph QA pipeline against scripted doubles.

use std::sync::Arc;
use std::time::Duration;

use adk_arangodb::mock::{MockGraphExecutor, MockLanguageModel};
use adk_arangodb::pipeline::{TOOL_CALL_ID, TOOL_NAME};
use adk_arangodb::{
    ArangoError, GraphQaPipeline, IntermediateStep, Message, PromptTemplate, QaAnswer, QaConfig,
    QaInputs, Row, Stage, into_row,
};
use serde_json::json;

const QUESTION: &str = "Which developers worked on project X?";
const QUERY: &str = "FOR d IN developers FILTER \"X\" IN d.projects RETURN { name: d.name }";
const SCHEMA: &str = "developers: { name: string, projects: [string] }";

fn developer_rows() -> Vec<Row> {
    vec![into_row(json!({"name": "Alice"})), into_row(json!({"name": "Bob"}))]
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn pipeline(
    graph: &Arc<MockGraphExecutor>,
    llm: &Arc<MockLanguageModel>,
    config: QaConfig,
) -> GraphQaPipeline {
    init_tracing();
    GraphQaPipeline::builder()
        .graph(graph.clone())
        .llm(llm.clone())
        .schema(SCHEMA)
        .config(config)
        .build()
        .unwrap()
}

#[tokio::test]
async fn answers_from_generated_query_results() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(developer_rows()));
    let llm = Arc::new(
        MockLanguageModel::new("mock")
            .with_response(QUERY)
            .with_response("Alice and Bob worked on project X."),
    );

    let output = pipeline(&graph, &llm, QaConfig::default()).invoke(QUESTION).await.unwrap();

    assert_eq!(output.result, QaAnswer::Answer("Alice and Bob worked on project X.".into()));
    assert!(output.intermediate_steps.is_none());

    let calls = graph.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, QUERY);
    assert!(calls[0].1.is_empty());

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    let generation = requests[0].messages[0].content();
    assert!(generation.contains(SCHEMA));
    assert!(generation.contains(QUESTION));
    let synthesis = requests[1].messages[0].content();
    assert!(synthesis.contains(r#"[{"name":"Alice"},{"name":"Bob"}]"#));
    assert!(synthesis.contains(QUESTION));
    assert!(requests.iter().all(|r| r.tools.is_none()));
}

#[tokio::test]
async fn return_direct_skips_synthesis() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(developer_rows()));
    let llm = Arc::new(MockLanguageModel::new("mock").with_response(QUERY));
    let config = QaConfig::builder().return_direct(true).build().unwrap();

    let output = pipeline(&graph, &llm, config).invoke(QUESTION).await.unwrap();

    assert_eq!(output.result, QaAnswer::Rows(developer_rows()));
    assert_eq!(llm.requests().len(), 1);
}

#[tokio::test]
async fn return_direct_with_steps_records_only_the_query() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(developer_rows()));
    let llm = Arc::new(MockLanguageModel::new("mock").with_response(QUERY));
    let config =
        QaConfig::builder().return_direct(true).return_intermediate_steps(true).build().unwrap();

    let output = pipeline(&graph, &llm, config).invoke(QUESTION).await.unwrap();

    assert_eq!(output.intermediate_steps, Some(vec![IntermediateStep::GeneratedQuery(QUERY.into())]));
}

#[tokio::test]
async fn empty_query_is_not_executed() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(developer_rows()));
    let llm = Arc::new(
        MockLanguageModel::new("mock").with_response("  \n ").with_response("I don't know."),
    );
    let config = QaConfig::builder().return_intermediate_steps(true).build().unwrap();

    let output = pipeline(&graph, &llm, config).invoke(QUESTION).await.unwrap();

    assert_eq!(graph.call_count(), 0);
    assert_eq!(output.result.as_text(), Some("I don't know."));
    assert_eq!(
        output.intermediate_steps,
        Some(vec![
            IntermediateStep::GeneratedQuery(String::new()),
            IntermediateStep::Context(Vec::new()),
        ])
    );
    assert!(llm.requests()[1].messages[0].content().contains("Information:\n[]"));
}

#[tokio::test]
async fn context_keeps_the_first_top_k_rows() {
    let rows: Vec<Row> = (1..=5).map(|i| into_row(json!({"rank": i}))).collect();
    let graph = Arc::new(MockGraphExecutor::new().with_rows(rows.clone()));
    let llm = Arc::new(MockLanguageModel::new("mock").with_response(QUERY).with_response("ok"));
    let config = QaConfig::builder().top_k(2).return_intermediate_steps(true).build().unwrap();

    let output = pipeline(&graph, &llm, config).invoke(QUESTION).await.unwrap();

    let steps = output.intermediate_steps.unwrap();
    assert_eq!(steps[1], IntermediateStep::Context(rows[..2].to_vec()));
}

#[tokio::test]
async fn fenced_query_is_normalized_before_execution() {
    let graph = Arc::new(MockGraphExecutor::new());
    let llm = Arc::new(
        MockLanguageModel::new("mock")
            .with_response(format!("```aql\n{QUERY}\n```"))
            .with_response("nobody"),
    );

    pipeline(&graph, &llm, QaConfig::default()).invoke(QUESTION).await.unwrap();

    assert_eq!(graph.calls()[0].0, QUERY);
}

#[tokio::test]
async fn fence_only_reply_is_not_executed() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(developer_rows()));
    let llm = Arc::new(MockLanguageModel::new("mock").with_response("```").with_response("I don't know."));
    let config = QaConfig::builder().return_intermediate_steps(true).build().unwrap();

    let output = pipeline(&graph, &llm, config).invoke(QUESTION).await.unwrap();

    assert_eq!(graph.call_count(), 0);
    assert_eq!(output.intermediate_steps.unwrap()[0], IntermediateStep::GeneratedQuery(String::new()));
}

#[tokio::test]
async fn function_response_sends_context_as_tool_result() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(developer_rows()));
    let llm = Arc::new(
        MockLanguageModel::new("tools")
            .with_tool_calling()
            .with_response(QUERY)
            .with_response("Alice, Bob."),
    );
    let config = QaConfig::builder().use_function_response(true).build().unwrap();

    let output = pipeline(&graph, &llm, config).invoke(QUESTION).await.unwrap();
    assert_eq!(output.result.as_text(), Some("Alice, Bob."));

    let requests = llm.requests();
    let synthesis = &requests[1];
    let tools = synthesis.tools.as_ref().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, TOOL_NAME);

    let messages = &synthesis.messages;
    assert_eq!(messages.len(), 4);
    assert!(matches!(messages[0], Message::System { .. }));
    assert_eq!(messages[1], Message::user(QUESTION));
    match &messages[2] {
        Message::Assistant { content, tool_calls } => {
            assert!(content.is_empty());
            assert_eq!(tool_calls[0].id, TOOL_CALL_ID);
            assert_eq!(tool_calls[0].name, TOOL_NAME);
            assert_eq!(tool_calls[0].arguments, json!({"question": QUESTION}));
        }
        other => panic!("expected assistant message, got {other:?}"),
    }
    assert_eq!(messages[3], Message::tool(TOOL_CALL_ID, r#"[{"name":"Alice"},{"name":"Bob"}]"#));
}

#[tokio::test]
async fn function_response_needs_tool_calling() {
    let config = QaConfig::builder().use_function_response(true).build().unwrap();
    let result = GraphQaPipeline::builder()
        .graph(Arc::new(MockGraphExecutor::new()))
        .llm(Arc::new(MockLanguageModel::new("plain")))
        .config(config)
        .build();

    match result {
        Err(ArangoError::Capability { model, .. }) => assert_eq!(model, "plain"),
        Err(other) => panic!("expected capability error, got {other}"),
        Ok(_) => panic!("expected capability error"),
    }
}

#[tokio::test]
async fn models_are_required() {
    let missing_all = GraphQaPipeline::builder().graph(Arc::new(MockGraphExecutor::new())).build();
    assert!(matches!(missing_all, Err(ArangoError::Config(_))));

    let missing_qa = GraphQaPipeline::builder()
        .graph(Arc::new(MockGraphExecutor::new()))
        .aql_llm(Arc::new(MockLanguageModel::new("aql")))
        .build();
    assert!(matches!(missing_qa, Err(ArangoError::Config(_))));

    let missing_graph =
        GraphQaPipeline::builder().llm(Arc::new(MockLanguageModel::new("mock"))).build();
    assert!(matches!(missing_graph, Err(ArangoError::Config(_))));
}

#[tokio::test]
async fn struct_literal_configs_are_validated_at_build() {
    for config in [
        QaConfig { top_k: 0, ..QaConfig::default() },
        QaConfig { stage_timeout_ms: Some(0), ..QaConfig::default() },
    ] {
        let result = GraphQaPipeline::builder()
            .graph(Arc::new(MockGraphExecutor::new()))
            .llm(Arc::new(MockLanguageModel::new("mock")))
            .config(config)
            .build();
        assert!(matches!(result, Err(ArangoError::Config(_))));
    }
}

#[tokio::test]
async fn separate_models_get_their_own_stage() {
    let graph = Arc::new(MockGraphExecutor::new().with_rows(developer_rows()));
    let aql_llm = Arc::new(MockLanguageModel::new("aql").with_response(QUERY));
    let qa_llm = Arc::new(MockLanguageModel::new("qa").with_response("Alice and Bob."));

    let pipeline = GraphQaPipeline::builder()
        .graph(graph.clone())
        .aql_llm(aql_llm.clone())
        .qa_llm(qa_llm.clone())
        .build()
        .unwrap();
    let output = pipeline.invoke(QUESTION).await.unwrap();

    assert_eq!(output.result.as_text(), Some("Alice and Bob."));
    assert_eq!(aql_llm.requests().len(), 1);
    assert_eq!(qa_llm.requests().len(), 1);
}

#[tokio::test]
async fn extra_inputs_reach_the_generation_prompt() {
    let graph = Arc::new(MockGraphExecutor::new());
    let llm = Arc::new(MockLanguageModel::new("mock").with_response("").with_response("?"));
    let pipeline = GraphQaPipeline::builder()
        .graph(graph)
        .llm(llm.clone())
        .schema("S")
        .aql_prompt(PromptTemplate::new("{{schema}}|{{question}}|{{dialect}}"))
        .build()
        .unwrap();

    let inputs = QaInputs::new("Q").with_input("dialect", "AQL 3.11").with_input("question", "hijacked");
    pipeline.invoke_with_inputs(inputs).await.unwrap();

    assert_eq!(llm.requests()[0].messages[0].content(), "S|Q|AQL 3.11");
}

#[tokio::test]
async fn execution_failure_aborts_synthesis() {
    let graph = Arc::new(MockGraphExecutor::new().with_failure("collection not found"));
    let llm = Arc::new(MockLanguageModel::new("mock").with_response(QUERY).with_response("unused"));

    let err = pipeline(&graph, &llm, QaConfig::default()).invoke(QUESTION).await.unwrap_err();

    match err {
        ArangoError::Execution { message, .. } => assert_eq!(message, "collection not found"),
        other => panic!("expected execution error, got {other}"),
    }
    assert_eq!(llm.requests().len(), 1);
}

#[tokio::test]
async fn generation_failure_aborts_execution() {
    let graph = Arc::new(MockGraphExecutor::new());
    let llm = Arc::new(MockLanguageModel::new("broken").with_failure("rate limited"));

    let err = pipeline(&graph, &llm, QaConfig::default()).invoke(QUESTION).await.unwrap_err();

    assert!(matches!(err, ArangoError::Model { ref model, .. } if model == "broken"));
    assert_eq!(graph.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_execution_times_out() {
    let graph = Arc::new(
        MockGraphExecutor::new().with_rows(developer_rows()).with_delay(Duration::from_secs(10)),
    );
    let llm = Arc::new(MockLanguageModel::new("mock").with_response(QUERY).with_response("unused"));
    let config = QaConfig::builder().stage_timeout_ms(100).build().unwrap();

    let err = pipeline(&graph, &llm, config).invoke(QUESTION).await.unwrap_err();

    assert!(matches!(err, ArangoError::Timeout { stage: Stage::Execute, timeout_ms: 100 }));
    assert_eq!(llm.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn fast_stages_finish_within_the_timeout() {
    let graph = Arc::new(
        MockGraphExecutor::new().with_rows(developer_rows()).with_delay(Duration::from_millis(10)),
    );
    let llm = Arc::new(MockLanguageModel::new("mock").with_response(QUERY).with_response("done"));
    let config = QaConfig::builder().stage_timeout_ms(1_000).build().unwrap();

    let output = pipeline(&graph, &llm, config).invoke(QUESTION).await.unwrap();
    assert_eq!(output.result.as_text(), Some("done"));
}

#[tokio::test]
async fn shutdown_closes_the_executor() {
    let graph = Arc::new(MockGraphExecutor::new());
    let llm = Arc::new(MockLanguageModel::new("mock"));

    pipeline(&graph, &llm, QaConfig::default()).shutdown().await.unwrap();

    assert!(graph.is_closed());
}
