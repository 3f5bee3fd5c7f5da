// crates/hopchain-routing/src/lib.rs
//
// hopchain-routing: Pure interpretation and selection utilities used by the
// command runner.
//
// PromptCompiler turns a prompt into a structured compiled prompt (intent,
// constraints, safety flags, execution plan, token budget).
// RoutingRuleEngine picks an execution model from ordered rules and request
// features. The template matcher ranks curated templates against a
// free-text intent by token overlap.

pub mod compiler;
pub mod rules;
pub mod templates;

// Re-export key types for ergonomic access from downstream crates.
pub use compiler::{
    CompileOptions, CompiledPrompt, IntentKind, PromptCompiler, MAX_PROMPT_LENGTH,
};
pub use rules::{evaluate, prompt_length, RequestFeatures, RoutingDecision, RoutingRuleEngine};
pub use templates::{
    calculate_similarity, find_matching_templates, tokenize, TemplateMatch, DEFAULT_MIN_SCORE,
};
