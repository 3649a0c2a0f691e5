//! Request checks that run before anything is sent

use std::collections::HashSet;

use crate::protocol::{CompletionRequest, Tool};
use crate::providers::adapter::{Adapter, Capability};
use crate::providers::error::{ProviderError, ProviderResult};

/// Capabilities `request` depends on
pub fn required_capabilities(request: &CompletionRequest) -> Vec<Capability> {
    let mut required = Vec::new();
    if request.stream {
        required.push(Capability::Streaming);
    }
    if !request.tools.is_empty() {
        required.push(Capability::ToolCalls);
    }
    if request.options.response_schema.is_some() {
        required.push(Capability::StructuredOutput);
    }
    if request.options.previous_response_id.is_some() {
        required.push(Capability::StatelessContinuation);
    }
    required
}

/// Fail with `UnsupportedFeature` for the first capability the adapter lacks
pub fn check_capabilities(adapter: &dyn Adapter, request: &CompletionRequest) -> ProviderResult<()> {
    match required_capabilities(request)
        .into_iter()
        .find(|capability| !adapter.supports(*capability))
    {
        Some(capability) => Err(ProviderError::unsupported(adapter.name(), capability)),
        None => Ok(()),
    }
}

/// Tool names must be `[A-Za-z0-9_-]+` and unique within the request
pub fn validate_tools(tools: &[Tool]) -> ProviderResult<()> {
    let mut seen = HashSet::new();
    for tool in tools {
        let valid = !tool.name.is_empty()
            && tool
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ProviderError::InvalidRequest(format!(
                "tool name '{}' must match [A-Za-z0-9_-]+",
                tool.name
            )));
        }
        if !seen.insert(tool.name.as_str()) {
            return Err(ProviderError::InvalidRequest(format!(
                "duplicate tool name '{}'",
                tool.name
            )));
        }
    }
    Ok(())
}

/// Every check the facade runs before building a request
pub fn validate_request(adapter: &dyn Adapter, request: &CompletionRequest) -> ProviderResult<()> {
    if request.model.trim().is_empty() {
        return Err(ProviderError::InvalidRequest("model is required".to_string()));
    }
    if request.messages.is_empty() {
        return Err(ProviderError::InvalidRequest(
            "at least one message is required".to_string(),
        ));
    }
    validate_tools(&request.tools)?;
    check_capabilities(adapter, request)
}
