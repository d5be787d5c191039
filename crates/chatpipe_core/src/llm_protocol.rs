use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The name the generated code must operate on. The execution harness binds
/// the dataset copy under this name and reads it back afterwards.
pub const DATAFRAME_BINDING: &str = "df";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "user" | "assistant" | "system"
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

impl ChatRequest {
    /// Single user-role message, temperature pinned to zero so the service
    /// decodes as close to greedily as it allows.
    pub fn for_prompt(model: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage { role: "user".into(), content: prompt.into() }],
            temperature: 0.0,
        }
    }
}

/// Extracts the single completion text from a chat response.
pub fn completion_text(resp: &ChatResponse) -> Result<String> {
    let choice = resp
        .choices
        .first()
        .ok_or_else(|| anyhow::anyhow!("completion response contained no choices"))?;
    Ok(choice.message.content.clone())
}

/// Builds the generation prompt: the literal column list, the verbatim
/// instruction, and the fixed constraints. Same inputs, same prompt.
pub fn build_prompt(columns: &[String], instruction: &str) -> String {
    let profile = format!("The dataset contains the following columns: {:?}", columns);
    format!(
        r#"{profile}
User instruction: {instruction}

Generate only Python pandas code to apply the above transformation to a DataFrame named '{name}'.
Make sure to handle missing values (e.g., with dropna or fillna) before performing type conversions or aggregations.
Do NOT include explanations or markdown. Output ONLY executable code."#,
        profile = profile,
        instruction = instruction,
        name = DATAFRAME_BINDING,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_is_deterministic() {
        let cols = vec!["age".to_string(), "income".to_string()];
        let a = build_prompt(&cols, "fill missing age with the mean");
        let b = build_prompt(&cols, "fill missing age with the mean");
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_carries_columns_and_verbatim_instruction() {
        let cols = vec!["age".to_string(), "income".to_string()];
        let p = build_prompt(&cols, "drop rows where income < 0");
        assert!(p.contains(r#"["age", "income"]"#));
        assert!(p.contains("User instruction: drop rows where income < 0"));
        assert!(p.contains("a DataFrame named 'df'"));
        assert!(p.contains("Output ONLY executable code."));
    }

    #[test]
    fn request_pins_temperature_to_zero() {
        let req = ChatRequest::for_prompt("gpt-3.5-turbo", "hello");
        assert_eq!(req.temperature, 0.0);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
    }

    #[test]
    fn parses_completion_response() {
        let v = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "df = df.dropna()"}}
            ]
        });
        let resp: ChatResponse = serde_json::from_value(v).unwrap();
        assert_eq!(completion_text(&resp).unwrap(), "df = df.dropna()");
    }

    #[test]
    fn rejects_response_without_choices() {
        let resp: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(completion_text(&resp).is_err());
    }
}
