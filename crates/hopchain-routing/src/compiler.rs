// crates/hopchain-routing/src/compiler.rs
//
// PromptCompiler: turns a normalized prompt into a structured compiled
// prompt (intent, constraints, safety flags, tools, execution plan, fallback
// plan, token budget). The compiled prompt is the content of the `interpret`
// hop. Classification is keyword based and deterministic.

use regex::Regex;
use serde::{Deserialize, Serialize};

use hopchain_core::error::HopchainError;
use hopchain_core::scoring::{estimate_tokens, DEFAULT_CONTEXT_WINDOW};

use crate::rules::prompt_length;

/// Version tag written into every compiled prompt.
pub const COMPILED_FORMAT_VERSION: &str = "1.0.0";

/// Longest accepted prompt, in UTF-16 code units.
pub const MAX_PROMPT_LENGTH: usize = 50_000;

/// Tokens held back for the system prompt when budgeting.
pub const RESERVED_SYSTEM_TOKENS: u64 = 200;

/// Completion budget ceiling when none is configured.
pub const DEFAULT_MAX_TOKENS: u64 = 1024;

const SENSITIVE_KEYWORDS: [&str; 8] = [
    "password",
    "hack",
    "exploit",
    "weapon",
    "illegal",
    "confidential",
    "private",
    "secret",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    CodeGeneration,
    Explanation,
    Analysis,
    ContentGeneration,
    Transformation,
    Summarization,
    QuestionAnswering,
    General,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::CodeGeneration => "code_generation",
            IntentKind::Explanation => "explanation",
            IntentKind::Analysis => "analysis",
            IntentKind::ContentGeneration => "content_generation",
            IntentKind::Transformation => "transformation",
            IntentKind::Summarization => "summarization",
            IntentKind::QuestionAnswering => "question_answering",
            IntentKind::General => "general",
        }
    }
}

/// Checked in order; the first kind with a matching keyword wins.
const INTENT_TABLE: [(IntentKind, f64, &[&str]); 7] = [
    (IntentKind::CodeGeneration, 0.85, &["code", "program", "function", "script"]),
    (IntentKind::Explanation, 0.9, &["explain", "what is", "how does"]),
    (IntentKind::Analysis, 0.85, &["analyze", "review", "evaluate"]),
    (IntentKind::ContentGeneration, 0.8, &["write", "create", "generate"]),
    (IntentKind::Transformation, 0.9, &["translate", "convert"]),
    (IntentKind::Summarization, 0.95, &["summarize", "summary"]),
    (IntentKind::QuestionAnswering, 0.75, &["?", "why", "when", "where"]),
];

const GENERAL_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    pub confidence: f64,
    /// Digest of the raw prompt, filled in by the caller that holds the
    /// crypto provider.
    #[serde(default)]
    pub raw_prompt_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Length { value: u64, unit: String },
    Format { value: String },
    Tone { value: String },
    Language { value: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SafetyFlag {
    SensitiveContent { keyword: String, severity: Severity },
    PiiDetected { subtype: String, severity: Severity },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequiredTool {
    pub name: String,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    PrepareContext,
    ApplyConstraints,
    InvokeTools,
    GenerateResponse,
    FormatOutput,
    ValidateOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanStep {
    pub step: u32,
    pub action: PlanAction,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FallbackAction {
    pub condition: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FallbackPlan {
    pub on_error: String,
    pub max_retries: u32,
    pub fallback_actions: Vec<FallbackAction>,
}

impl Default for FallbackPlan {
    fn default() -> Self {
        let action = |condition: &str, action: &str| FallbackAction {
            condition: condition.to_string(),
            action: action.to_string(),
        };
        Self {
            on_error: "retry_with_simplified_prompt".to_string(),
            max_retries: 2,
            fallback_actions: vec![
                action("timeout", "reduce_max_tokens"),
                action("rate_limit", "queue_and_retry"),
                action("content_filter", "sanitize_and_retry"),
                action("parse_error", "request_structured_output"),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenBudget {
    pub max_tokens: u64,
    pub context_window: u64,
    pub estimated_prompt_tokens: u64,
    pub reserved_system_tokens: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileMetadata {
    pub prompt_length: usize,
    pub constraint_count: usize,
    pub safety_flag_count: usize,
    pub tool_count: usize,
}

/// Structured form of one prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompiledPrompt {
    pub version: String,
    /// The normalized prompt this was compiled from.
    pub prompt: String,
    pub intent: Intent,
    pub constraints: Vec<Constraint>,
    pub safety_flags: Vec<SafetyFlag>,
    pub required_tools: Vec<RequiredTool>,
    pub execution_plan: Vec<PlanStep>,
    pub fallback_plan: FallbackPlan,
    pub target_models: Vec<String>,
    pub token_budget: TokenBudget,
    pub metadata: CompileMetadata,
}

impl CompiledPrompt {
    /// Pretty JSON, as stored in the `interpret` hop.
    pub fn to_json(&self) -> Result<String, HopchainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, HopchainError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Budget and target settings for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub context_window: u64,
    pub max_tokens: u64,
    pub target_models: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            max_tokens: DEFAULT_MAX_TOKENS,
            target_models: vec!["default".to_string()],
        }
    }
}

pub struct PromptCompiler {
    length: Regex,
    language: Regex,
    email: Regex,
    phone: Regex,
    ssn: Regex,
}

fn pattern(source: &str) -> Result<Regex, HopchainError> {
    Regex::new(source)
        .map_err(|e| HopchainError::Validation(format!("invalid pattern {}: {}", source, e)))
}

impl PromptCompiler {
    pub fn new() -> Result<Self, HopchainError> {
        Ok(Self {
            length: pattern(r"(?i)([0-9]+)\s*(words?|characters?|sentences?|paragraphs?)")?,
            language: pattern(
                r"(?i)in\s+(english|spanish|french|german|chinese|japanese|korean|portuguese|italian|russian)",
            )?,
            email: pattern(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b")?,
            phone: pattern(r"\b[0-9]{3}[-.]?[0-9]{3}[-.]?[0-9]{4}\b")?,
            ssn: pattern(r"\b[0-9]{3}-?[0-9]{2}-?[0-9]{4}\b")?,
        })
    }

    /// Compile `prompt`. Fails with `Validation` above [`MAX_PROMPT_LENGTH`].
    pub fn compile(
        &self,
        prompt: &str,
        options: &CompileOptions,
    ) -> Result<CompiledPrompt, HopchainError> {
        let length = prompt_length(prompt);
        if length > MAX_PROMPT_LENGTH {
            return Err(HopchainError::Validation(format!(
                "prompt exceeds maximum length ({} > {})",
                length, MAX_PROMPT_LENGTH
            )));
        }

        let lower = prompt.to_lowercase();
        let intent = classify_intent(&lower);
        let constraints = self.extract_constraints(prompt, &lower);
        let safety_flags = self.detect_safety_flags(prompt, &lower);
        let required_tools = identify_tools(&lower, intent.kind);
        let execution_plan = build_plan(intent.kind, &constraints, &required_tools);

        let estimated_prompt_tokens = estimate_tokens(prompt);
        let available = options
            .context_window
            .saturating_sub(estimated_prompt_tokens + RESERVED_SYSTEM_TOKENS);
        let token_budget = TokenBudget {
            max_tokens: options.max_tokens.min(available * 4 / 5),
            context_window: options.context_window,
            estimated_prompt_tokens,
            reserved_system_tokens: RESERVED_SYSTEM_TOKENS,
        };

        let metadata = CompileMetadata {
            prompt_length: length,
            constraint_count: constraints.len(),
            safety_flag_count: safety_flags.len(),
            tool_count: required_tools.len(),
        };

        tracing::debug!(
            "Compiled prompt: intent {}, {} constraints, {} safety flags",
            intent.kind.as_str(),
            metadata.constraint_count,
            metadata.safety_flag_count
        );

        Ok(CompiledPrompt {
            version: COMPILED_FORMAT_VERSION.to_string(),
            prompt: prompt.to_string(),
            intent,
            constraints,
            safety_flags,
            required_tools,
            execution_plan,
            fallback_plan: FallbackPlan::default(),
            target_models: options.target_models.clone(),
            token_budget,
            metadata,
        })
    }

    fn extract_constraints(&self, prompt: &str, lower: &str) -> Vec<Constraint> {
        let mut constraints = Vec::new();

        if let Some(caps) = self.length.captures(prompt) {
            if let Ok(value) = caps[1].parse::<u64>() {
                constraints.push(Constraint::Length {
                    value,
                    unit: caps[2].to_lowercase(),
                });
            }
        }

        let format = |value: &str| Constraint::Format {
            value: value.to_string(),
        };
        if lower.contains("json") {
            constraints.push(format("json"));
        }
        if lower.contains("markdown") {
            constraints.push(format("markdown"));
        }
        if lower.contains("bullet") || lower.contains("list") {
            constraints.push(format("list"));
        }
        if lower.contains("table") {
            constraints.push(format("table"));
        }

        let tone = |value: &str| Constraint::Tone {
            value: value.to_string(),
        };
        if lower.contains("formal") {
            constraints.push(tone("formal"));
        }
        if lower.contains("casual") || lower.contains("informal") {
            constraints.push(tone("casual"));
        }
        if lower.contains("professional") {
            constraints.push(tone("professional"));
        }

        if let Some(caps) = self.language.captures(prompt) {
            constraints.push(Constraint::Language {
                value: caps[1].to_lowercase(),
            });
        }

        constraints
    }

    fn detect_safety_flags(&self, prompt: &str, lower: &str) -> Vec<SafetyFlag> {
        let mut flags: Vec<SafetyFlag> = SENSITIVE_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .map(|kw| SafetyFlag::SensitiveContent {
                keyword: kw.to_string(),
                severity: Severity::Medium,
            })
            .collect();

        let pii = |subtype: &str, severity| SafetyFlag::PiiDetected {
            subtype: subtype.to_string(),
            severity,
        };
        if self.email.is_match(prompt) {
            flags.push(pii("email", Severity::Low));
        }
        if self.phone.is_match(prompt) {
            flags.push(pii("phone", Severity::Low));
        }
        if self.ssn.is_match(prompt) {
            flags.push(pii("ssn", Severity::High));
        }
        flags
    }
}

fn classify_intent(lower: &str) -> Intent {
    let (kind, confidence) = INTENT_TABLE
        .iter()
        .find(|(_, _, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(kind, confidence, _)| (*kind, *confidence))
        .unwrap_or((IntentKind::General, GENERAL_CONFIDENCE));
    Intent {
        kind,
        confidence,
        raw_prompt_hash: None,
    }
}

fn identify_tools(lower: &str, intent: IntentKind) -> Vec<RequiredTool> {
    let table: [(&str, &[&str]); 4] = [
        ("web_search", &["search", "find", "lookup"]),
        ("image_generation", &["image", "picture", "photo"]),
        ("file_handler", &["file", "document", "pdf"]),
        ("calculator", &["calculate", "math", "compute"]),
    ];

    let mut tools = Vec::new();
    if intent == IntentKind::CodeGeneration {
        tools.push("code_interpreter");
    }
    for (name, keywords) in table {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            tools.push(name);
        }
    }
    tools
        .into_iter()
        .map(|name| RequiredTool {
            name: name.to_string(),
            required: false,
        })
        .collect()
}

fn build_plan(intent: IntentKind, constraints: &[Constraint], tools: &[RequiredTool]) -> Vec<PlanStep> {
    let mut steps: Vec<PlanStep> = Vec::new();
    let mut push = |action: PlanAction, description: String, constraints: Vec<Constraint>, tools: Vec<String>| {
        let step = steps.len() as u32 + 1;
        steps.push(PlanStep {
            step,
            action,
            description,
            constraints,
            tools,
        });
    };

    push(
        PlanAction::PrepareContext,
        "Prepare and validate input context".to_string(),
        Vec::new(),
        Vec::new(),
    );
    if !constraints.is_empty() {
        push(
            PlanAction::ApplyConstraints,
            "Apply extracted constraints to prompt".to_string(),
            constraints.to_vec(),
            Vec::new(),
        );
    }
    if !tools.is_empty() {
        push(
            PlanAction::InvokeTools,
            "Invoke required tools".to_string(),
            Vec::new(),
            tools.iter().map(|t| t.name.clone()).collect(),
        );
    }
    push(
        PlanAction::GenerateResponse,
        format!("Generate {} response", intent.as_str()),
        Vec::new(),
        Vec::new(),
    );
    let format = constraints.iter().find_map(|c| match c {
        Constraint::Format { value } => Some(value.clone()),
        _ => None,
    });
    if let Some(format) = format {
        push(
            PlanAction::FormatOutput,
            format!("Format output as {}", format),
            Vec::new(),
            Vec::new(),
        );
    }
    push(
        PlanAction::ValidateOutput,
        "Validate output against constraints and safety rules".to_string(),
        Vec::new(),
        Vec::new(),
    );
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopchain_core::scoring::parse_validity;

    fn compile(prompt: &str) -> CompiledPrompt {
        PromptCompiler::new()
            .unwrap()
            .compile(prompt, &CompileOptions::default())
            .unwrap()
    }

    fn actions(compiled: &CompiledPrompt) -> Vec<PlanAction> {
        compiled.execution_plan.iter().map(|s| s.action).collect()
    }

    #[test]
    fn test_constraints_and_plan() {
        let c = compile("Write a 300 word summary in Spanish as a bullet list");
        assert_eq!(c.intent.kind, IntentKind::ContentGeneration);
        assert_eq!(c.intent.confidence, 0.8);
        assert_eq!(
            c.constraints,
            vec![
                Constraint::Length {
                    value: 300,
                    unit: "word".to_string()
                },
                Constraint::Format {
                    value: "list".to_string()
                },
                Constraint::Language {
                    value: "spanish".to_string()
                },
            ]
        );
        assert_eq!(
            actions(&c),
            vec![
                PlanAction::PrepareContext,
                PlanAction::ApplyConstraints,
                PlanAction::GenerateResponse,
                PlanAction::FormatOutput,
                PlanAction::ValidateOutput,
            ]
        );
        assert_eq!(c.execution_plan[3].description, "Format output as list");
        assert_eq!(c.execution_plan[4].step, 5);
    }

    #[test]
    fn test_code_prompt_gets_tools() {
        let c = compile("Write a function to parse CSV files");
        assert_eq!(c.intent.kind, IntentKind::CodeGeneration);
        let tools: Vec<&str> = c.required_tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tools, vec!["code_interpreter", "file_handler"]);
        assert_eq!(
            actions(&c),
            vec![
                PlanAction::PrepareContext,
                PlanAction::InvokeTools,
                PlanAction::GenerateResponse,
                PlanAction::ValidateOutput,
            ]
        );
        assert_eq!(c.execution_plan[1].tools, vec!["code_interpreter", "file_handler"]);
    }

    #[test]
    fn test_intent_order_and_fallback() {
        assert_eq!(compile("Explain what is a monad").intent.kind, IntentKind::Explanation);
        assert_eq!(compile("Please summarize this").intent.kind, IntentKind::Summarization);
        assert_eq!(compile("Is it raining?").intent.kind, IntentKind::QuestionAnswering);
        let general = compile("hello there");
        assert_eq!(general.intent.kind, IntentKind::General);
        assert_eq!(general.intent.confidence, GENERAL_CONFIDENCE);
    }

    #[test]
    fn test_safety_flags() {
        let c = compile("My password leaked, mail ops@example.com or call 555-123-4567");
        assert_eq!(
            c.safety_flags,
            vec![
                SafetyFlag::SensitiveContent {
                    keyword: "password".to_string(),
                    severity: Severity::Medium
                },
                SafetyFlag::PiiDetected {
                    subtype: "email".to_string(),
                    severity: Severity::Low
                },
                SafetyFlag::PiiDetected {
                    subtype: "phone".to_string(),
                    severity: Severity::Low
                },
            ]
        );
        assert_eq!(c.metadata.safety_flag_count, 3);

        let ssn = compile("record 123-45-6789");
        assert!(ssn.safety_flags.contains(&SafetyFlag::PiiDetected {
            subtype: "ssn".to_string(),
            severity: Severity::High
        }));
    }

    #[test]
    fn test_token_budget() {
        let compiler = PromptCompiler::new().unwrap();
        let prompt = "a".repeat(40);

        let roomy = compiler.compile(&prompt, &CompileOptions::default()).unwrap();
        assert_eq!(roomy.token_budget.estimated_prompt_tokens, 10);
        assert_eq!(roomy.token_budget.max_tokens, DEFAULT_MAX_TOKENS);

        let tight = CompileOptions {
            context_window: 1000,
            ..Default::default()
        };
        // (1000 - 10 - 200) * 0.8 = 632
        assert_eq!(compiler.compile(&prompt, &tight).unwrap().token_budget.max_tokens, 632);

        let tiny = CompileOptions {
            context_window: 100,
            ..Default::default()
        };
        assert_eq!(compiler.compile(&prompt, &tiny).unwrap().token_budget.max_tokens, 0);
    }

    #[test]
    fn test_length_limit() {
        let compiler = PromptCompiler::new().unwrap();
        let options = CompileOptions::default();
        assert!(compiler.compile(&"a".repeat(MAX_PROMPT_LENGTH), &options).is_ok());
        assert!(matches!(
            compiler.compile(&"a".repeat(MAX_PROMPT_LENGTH + 1), &options),
            Err(HopchainError::Validation(_))
        ));
    }

    #[test]
    fn test_json_form_is_fully_valid() {
        let c = compile("Analyze the quarterly report as a table");
        let json = c.to_json().unwrap();
        assert_eq!(parse_validity(&json), 20);
        assert_eq!(CompiledPrompt::from_json(&json).unwrap(), c);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["intent"]["type"], "analysis");
        assert_eq!(value["constraints"][0]["type"], "format");
        assert_eq!(value["version"], COMPILED_FORMAT_VERSION);
    }
}
