//! End-to-end tests for the OpenAI chat-completions vendor against a mock server

use futures::StreamExt;
use serde_json::json;
use unillm_core::config::ProviderConfig;
use unillm_core::http::Method;
use unillm_core::protocol::{
    CompletionRequest, FinishReason, Message, ResponseSchema, Tool, ToolChoice,
};
use unillm_core::providers::{Provider, ProviderError, ProviderKind};
use unillm_core::tools::{execute_tools, ToolArgs, ToolRegistry};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Route library logs through the test harness; set RUST_LOG to see them
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn provider(server: &MockServer) -> Provider {
    init_tracing();
    let config = ProviderConfig::new(ProviderKind::OpenAI, "sk-test")
        .with_base_url(format!("{}/v1", server.uri()));
    Provider::from_config(&config).expect("provider")
}

fn sse(frames: &[&str]) -> ResponseTemplate {
    let body: String = frames.iter().map(|f| format!("data: {}\n\n", f)).collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn weather_tool() -> Tool {
    Tool::new(
        "get_weather",
        "Current weather for a city",
        json!({"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]}),
    )
}

#[tokio::test]
async fn test_chat_returns_normalized_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header_exists("x-request-id"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello there!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server)
        .chat(CompletionRequest::new("gpt-4o-mini", vec![Message::user("Hi")]))
        .await
        .unwrap();

    assert_eq!(response.content, "Hello there!");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.unwrap().total_tokens, 12);
    assert_eq!(response.provider, "openai");
    assert!(response.vendor_response_id.is_none());
    assert_eq!(response.original["id"], "chatcmpl-1");
}

#[tokio::test]
async fn test_tool_call_ids_survive_a_full_tool_loop() {
    let server = MockServer::start().await;

    // The follow-up turn must echo the vendor's call id verbatim
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "user"},
                {"role": "assistant", "tool_calls": [{"id": "call_Xy9"}]},
                {"role": "tool", "tool_call_id": "call_Xy9", "content": "Sunny in Paris"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "It is sunny."}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_Xy9",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    let mut messages = vec![Message::user("Weather in Paris?")];
    let first = provider
        .chat(
            CompletionRequest::new("gpt-4o-mini", messages.clone())
                .with_tools(vec![weather_tool()])
                .with_tool_choice(ToolChoice::Auto),
        )
        .await
        .unwrap();

    assert_eq!(first.finish_reason, FinishReason::ToolCalls);
    assert_eq!(first.tool_calls.len(), 1);
    assert_eq!(first.tool_calls[0].call_id, "call_Xy9");
    assert_eq!(first.tool_calls[0].arguments, json!({"city": "Paris"}));

    let registry = ToolRegistry::new().with("get_weather", |args: ToolArgs| -> anyhow::Result<serde_json::Value> {
        let city: String = args.get_as("city")?;
        Ok(json!(format!("Sunny in {}", city)))
    });
    messages.push(first.to_assistant_message());
    messages.extend(execute_tools(&first, &registry).unwrap());

    let second = provider
        .chat(CompletionRequest::new("gpt-4o-mini", messages).with_tools(vec![weather_tool()]))
        .await
        .unwrap();
    assert_eq!(second.content, "It is sunny.");
}

#[tokio::test]
async fn test_interleaved_streamed_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse(&[
            r#"{"choices":[{"index":0,"delta":{"role":"assistant","tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"first","arguments":""}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":1,"id":"call_b","type":"function","function":{"name":"second","arguments":""}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"a\":1"}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":1,"function":{"arguments":"{\"x\":2"}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"}"}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":1,"function":{"arguments":"}"}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
            r#"{"choices":[],"usage":{"prompt_tokens":20,"completion_tokens":10,"total_tokens":30}}"#,
            "[DONE]",
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("go")]).with_tools(vec![
        Tool::new("first", "", json!({"type": "object"})),
        Tool::new("second", "", json!({"type": "object"})),
    ]);
    let mut stream = provider(&server).stream(request).await.unwrap();

    let mut fragments: Vec<(usize, String)> = Vec::new();
    let mut terminal = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        if let Some(delta) = &chunk.tool_call_delta {
            if !delta.arguments_fragment.is_empty() {
                fragments.push((delta.index, delta.arguments_fragment.clone()));
            }
        }
        if chunk.is_terminal() {
            terminal = Some(chunk);
        }
    }

    assert_eq!(
        fragments,
        vec![
            (0, "{\"a\":1".to_string()),
            (1, "{\"x\":2".to_string()),
            (0, "}".to_string()),
            (1, "}".to_string()),
        ]
    );
    let terminal = terminal.expect("terminal chunk");
    assert_eq!(terminal.finish_reason, Some(FinishReason::ToolCalls));
    assert_eq!(terminal.usage.unwrap().total_tokens, 30);

    let response = stream.response().expect("aggregate");
    assert!(response.complete);
    assert_eq!(response.tool_calls[0].call_id, "call_a");
    assert_eq!(response.tool_calls[0].arguments, json!({"a": 1}));
    assert_eq!(response.tool_calls[1].call_id, "call_b");
    assert_eq!(response.tool_calls[1].arguments, json!({"x": 2}));
}

#[tokio::test]
async fn test_malformed_streamed_arguments_do_not_fail_the_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(&[
            r#"{"choices":[{"index":0,"delta":{"content":"Calling."}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_bad","function":{"name":"first","arguments":"{\"a\":"}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]))
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("go")])
        .with_tools(vec![Tool::new("first", "", json!({"type": "object"}))]);
    let response = provider(&server)
        .stream(request)
        .await
        .unwrap()
        .collect_response()
        .await
        .unwrap();

    assert_eq!(response.content, "Calling.");
    let call = &response.tool_calls[0];
    assert_eq!(call.call_id, "call_bad");
    let err = call.arguments().unwrap_err();
    assert_eq!(err.raw, "{\"a\":");
}

#[tokio::test]
async fn test_duplicate_tool_names_rejected_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")])
        .with_tools(vec![weather_tool(), weather_tool()]);
    let err = provider(&server).chat(request).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_structured_output_schema_is_embedded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_schema", "json_schema": {"name": "person"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"name\":\"Ada\",\"age\":36}"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    #[derive(serde::Deserialize)]
    struct Person {
        name: String,
        age: u32,
    }

    let schema = ResponseSchema::new(json!({
        "type": "object",
        "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
        "required": ["name", "age"]
    }))
    .with_name("person");
    let response = provider(&server)
        .chat(CompletionRequest::new("gpt-4o-mini", vec![Message::user("Who?")]).with_response_schema(schema))
        .await
        .unwrap();

    let person: Person = response.parse_json().unwrap();
    assert_eq!(person.name, "Ada");
    assert_eq!(person.age, 36);
}

#[tokio::test]
async fn test_vendor_error_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "message": "The model `gpt-9` does not exist",
                "type": "invalid_request_error",
                "code": "model_not_found"
            }
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .chat(CompletionRequest::new("gpt-9", vec![Message::user("hi")]))
        .await
        .unwrap_err();

    match err {
        ProviderError::Vendor { status, code, message } => {
            assert_eq!(status, Some(404));
            assert_eq!(code, "model_not_found");
            assert!(message.contains("gpt-9"));
        }
        other => panic!("expected vendor error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_passthrough_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("x-trace", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "gpt-4o-mini", "object": "model"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body = provider(&server)
        .request(
            Method::GET,
            "/models",
            None,
            Some([("x-trace".to_string(), "abc".to_string())].into_iter().collect()),
        )
        .await
        .unwrap();
    assert_eq!(body["data"][0]["id"], "gpt-4o-mini");
}
