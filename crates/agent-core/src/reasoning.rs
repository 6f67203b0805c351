//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern: the model either answers
//! directly or asks for a tool, sees the tool's result, and tries again.

use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt template
    pub system_prompt: String,

    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate."#;

/// Final answer of one agent run, together with every tool result that
/// was produced on the way there.
#[derive(Clone, Debug)]
pub struct AgentReply {
    pub content: String,
    pub tool_results: Vec<ToolResult>,
    pub iterations: usize,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Build the full system prompt including tool descriptions
    pub fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Run the agent until it produces a reply without a tool call
    pub async fn run(&self, conversation: &mut Conversation) -> Result<AgentReply> {
        if !conversation.has_system_prompt() {
            conversation.set_system_prompt(self.build_system_prompt());
        }

        let mut tool_results = Vec::new();
        let mut iterations = 0;

        loop {
            iterations += 1;

            if iterations > self.config.max_iterations {
                return Err(AgentError::MaxIterations(self.config.max_iterations));
            }

            conversation.truncate_to_fit();
            let completion = self
                .provider
                .complete(conversation.messages(), &self.config.generation)
                .await?;

            let content = completion.content;
            conversation.push(Message::assistant(&content));

            if let Some(tool_call) = parse_tool_call(&content) {
                tracing::debug!(tool = %tool_call.name, iteration = iterations, "Executing tool");

                let result = self.execute_tool(&tool_call).await;
                conversation.push(Message::tool(
                    format_tool_result(&result),
                    tool_call.id.clone(),
                ));
                tool_results.push(result);
                continue;
            }

            return Ok(AgentReply {
                content,
                tool_results,
                iterations,
            });
        }
    }

    /// Run with a simple string input (creates temporary conversation)
    pub async fn ask(&self, question: &str) -> Result<AgentReply> {
        let mut conversation = Conversation::with_system_prompt(self.build_system_prompt());
        conversation.push(Message::user(question));
        self.run(&mut conversation).await
    }

    /// Execute a tool call; errors become failed results the model can read
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call).await {
            Ok(mut result) => {
                result.id.clone_from(&call.id);
                result
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult {
                    name: call.name.clone(),
                    id: call.id.clone(),
                    success: false,
                    output: format!("Error: {}", e),
                    data: None,
                }
            }
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Parse a tool call from an LLM response.
///
/// Accepts a fenced ```` ```tool ```` block first, then falls back to the
/// outermost inline JSON object carrying a `"tool"` key.
pub fn parse_tool_call(content: &str) -> Option<ToolCall> {
    const TOOL_START: &str = "```tool";
    const TOOL_END: &str = "```";

    let fenced = content.find(TOOL_START).and_then(|start_idx| {
        let after_marker = &content[start_idx + TOOL_START.len()..];
        let end_idx = after_marker.find(TOOL_END)?;
        serde_json::from_str::<ToolCall>(after_marker[..end_idx].trim()).ok()
    });

    let mut call = fenced.or_else(|| parse_inline_tool_call(content))?;
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    Some(call)
}

fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

/// Format tool result for conversation
fn format_tool_result(result: &ToolResult) -> String {
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, result.output)
    } else {
        format!("[Tool '{}' failed]\n{}", result.name, result.output)
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::provider::{Completion, ModelInfo, ProviderInfo};
    use crate::tool::{ParameterSchema, ToolSchema};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions and records what it was sent.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(ToString::to_string).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: "scripted".into(),
                models: Vec::new(),
                supports_tools: false,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            options: &GenerationOptions,
        ) -> Result<Completion> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "```tool\n{\"tool\": \"lookup\", \"arguments\": {\"question\": \"loop\"}}\n```".into());
            Ok(Completion::text(reply, options.model.clone()))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    struct LookupTool;

    #[async_trait]
    impl Tool for LookupTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "lookup".into(),
                description: "Look something up".into(),
                parameters: vec![ParameterSchema::required_string("question", "The question")],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            let question = call.str_arg("question").unwrap_or_default();
            Ok(ToolResult::success("lookup", format!("rows for {question}"))
                .with_data(serde_json::json!({"question": question})))
        }
    }

    fn agent_with(provider: Arc<ScriptedProvider>) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tool(LookupTool)
            .system_prompt("Kamu asisten hidroponik.")
            .max_iterations(3)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_fenced_tool_call() {
        let content = r#"Saya cek dulu.
```tool
{"tool": "lookup", "arguments": {"question": "ec ideal selada"}}
```"#;
        let call = parse_tool_call(content).unwrap();
        assert_eq!(call.name, "lookup");
        assert_eq!(call.str_arg("question"), Some("ec ideal selada"));
        assert!(call.id.is_some());
    }

    #[test]
    fn test_parse_inline_tool_call() {
        let content = r#"{"tool": "lookup", "arguments": {"question": "ph ideal"}}"#;
        let call = parse_tool_call(content).unwrap();
        assert_eq!(call.str_arg("question"), Some("ph ideal"));
    }

    #[test]
    fn test_plain_answer_is_not_a_tool_call() {
        assert!(parse_tool_call("EC ideal untuk selada adalah 1.2 sampai 1.8.").is_none());
        assert!(parse_tool_call("```tool\nnot json\n```").is_none());
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let provider = Arc::new(ScriptedProvider::new(&["Halo! Ada yang bisa dibantu?"]));
        let agent = agent_with(provider.clone());

        let reply = agent.ask("halo").await.unwrap();
        assert_eq!(reply.content, "Halo! Ada yang bisa dibantu?");
        assert!(reply.tool_results.is_empty());
        assert_eq!(reply.iterations, 1);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0][0].role, Role::System);
        assert!(seen[0][0].content.contains("### lookup"));
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "```tool\n{\"tool\": \"lookup\", \"arguments\": {\"question\": \"ec ideal selada\"}}\n```",
            "EC ideal selada 1.2 - 1.8 mS/cm.",
        ]));
        let agent = agent_with(provider.clone());

        let reply = agent.ask("EC ideal selada?").await.unwrap();
        assert_eq!(reply.content, "EC ideal selada 1.2 - 1.8 mS/cm.");
        assert_eq!(reply.tool_results.len(), 1);
        assert!(reply.tool_results[0].success);
        assert_eq!(
            reply.tool_results[0].data,
            Some(serde_json::json!({"question": "ec ideal selada"}))
        );

        let seen = provider.seen.lock().unwrap();
        let tool_message = seen[1].last().unwrap();
        assert_eq!(tool_message.role, Role::Tool);
        assert!(tool_message.content.starts_with("[Tool 'lookup' returned]"));
        assert_eq!(tool_message.tool_call_id, reply.tool_results[0].id);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "```tool\n{\"tool\": \"weather\", \"arguments\": {}}\n```",
            "Maaf, saya tidak punya info cuaca.",
        ]));
        let agent = agent_with(provider.clone());

        let reply = agent.ask("cuaca?").await.unwrap();
        assert!(!reply.tool_results[0].success);
        assert!(reply.tool_results[0].output.contains("Tool not found"));
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let agent = agent_with(provider);

        let err = agent.ask("loop").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(3)));
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }
}
