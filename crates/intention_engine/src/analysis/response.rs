use serde_json::Value;

/// Text of a Responses-style payload.
///
/// Tries `output_text`, then every `text` part under `output[].content[]`
/// joined by newlines, then a chat-style `choices[0].message.content`.
pub fn extract_response_text(resp: &Value) -> Option<String> {
    if let Some(text) = resp
        .get("output_text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
    {
        return Some(text.to_string());
    }

    if let Some(items) = resp.get("output").and_then(Value::as_array) {
        let parts: Vec<&str> = items
            .iter()
            .filter_map(|item| item.get("content").and_then(Value::as_array))
            .flatten()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();
        if !parts.is_empty() {
            return Some(parts.join("\n").trim().to_string());
        }
    }

    resp.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
}
