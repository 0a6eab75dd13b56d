//! Iteration Loop Test Fixture
//!
//! Runs one worker/reviewer task against real providers with a few mock tools.
//!
//! Usage:
//!   GROQ_API_KEY="..." OPENROUTER_API_KEY="..." \
//!   TEST_TASK="what's the weather in boston, in celsius" \
//!   TEST_WORKER_MODEL="groq/llama-3.3-70b-versatile" \
//!   TEST_REVIEWER_MODEL="openrouter/meta-llama/llama-3.3-70b-instruct:free" \
//!   TEST_TASK_CATEGORY="research" \
//!   TEST_MAX_ITERATIONS="3" \
//!   TEST_CONFIG="loop.ron" \
//!   cargo run --bin loop_test
//!
//! Ctrl-C cancels the run and prints the partial history.

use async_trait::async_trait;
use critic_loop::ai::OpenAIService;
use critic_loop::config::LoopConfig;
use critic_loop::engine::{IterationEngine, TaskCategory, TaskRequest};
use critic_loop::providers::ProviderDirectory;
use critic_loop::routing::StaticFallbackSource;
use critic_loop::tools::{PropertySchema, Tool, ToolDefinition, ToolRegistry, ToolResult};
use serde_json::Value;
use std::env;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Test Tools
// ============================================================================

struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_weather",
            "Get current weather for a location. Use this when the user asks about weather.",
        )
        .with_property(
            "location",
            PropertySchema::string("The city and state/country, e.g. 'Boston, MA' or 'London, UK'"),
            true,
        )
        .with_property(
            "units",
            PropertySchema::one_of("Temperature units", &["celsius", "fahrenheit"]),
            false,
        )
    }

    async fn execute(&self, params: Value, _caller_id: &str) -> ToolResult {
        let location = params.get("location").and_then(|v| v.as_str()).unwrap_or("unknown");
        let reading = match params.get("units").and_then(|v| v.as_str()) {
            Some("celsius") => "7°C (high 11°C, low 3°C)",
            _ => "45°F (high 52°F, low 38°F)",
        };
        ToolResult::success(format!(
            "Weather for {}: Currently {}, partly cloudy. Humidity 65%. Wind 10 mph NW.",
            location, reading
        ))
    }
}

struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "web_search",
            "Search the web for information. Use this when you need to find current information.",
        )
        .with_property("query", PropertySchema::string("The search query"), true)
    }

    async fn execute(&self, params: Value, _caller_id: &str) -> ToolResult {
        let query = params.get("query").and_then(|v| v.as_str()).unwrap_or("unknown");
        ToolResult::success(format!(
            "Search results for '{}': [1] Example result about {}. [2] Another relevant page. [3] More information here.",
            query, query
        ))
    }
}

struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("calculator", "Perform mathematical calculations.")
            .with_property(
                "expression",
                PropertySchema::string("The mathematical expression to evaluate, e.g. '2 + 2' or '15 * 3'"),
                true,
            )
    }

    async fn execute(&self, params: Value, _caller_id: &str) -> ToolResult {
        match params.get("expression").and_then(|v| v.as_str()) {
            Some(expr) => ToolResult::success(format!("Result: {} = 42 (mock result)", expr)),
            None => ToolResult::error("Missing 'expression'"),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn load_config() -> LoopConfig {
    match env::var("TEST_CONFIG") {
        Ok(path) => LoopConfig::load(Path::new(&path)).unwrap_or_else(|e| {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }),
        Err(_) => LoopConfig::from_env(),
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    println!("🔁 Iteration Loop Test Fixture");
    println!("==============================\n");

    let task = env::var("TEST_TASK").unwrap_or_else(|_| {
        eprintln!("❌ TEST_TASK not set. Using default.");
        "What's the weather in Boston? Answer in Celsius.".to_string()
    });

    let worker = env::var("TEST_WORKER_MODEL").unwrap_or_else(|_| {
        eprintln!("❌ TEST_WORKER_MODEL not set!");
        std::process::exit(1);
    });

    let reviewer = env::var("TEST_REVIEWER_MODEL").ok().filter(|m| !m.is_empty());
    let category = TaskCategory::from_label(&env::var("TEST_TASK_CATEGORY").unwrap_or_default());
    let max_iterations = env::var("TEST_MAX_ITERATIONS").ok().and_then(|v| v.parse::<u32>().ok());
    let with_tools = env::var("TEST_NO_TOOLS").is_err();
    let config = load_config();

    println!("📝 Configuration:");
    println!("   Task:       {}", task);
    println!("   Worker:     {}", worker);
    println!("   Reviewer:   {}", reviewer.as_deref().unwrap_or("none"));
    println!("   Category:   {}", category);
    println!("   Tools:      {}", if with_tools { "mock" } else { "none" });
    println!("   Iterations: {}", max_iterations.unwrap_or(config.max_iterations));
    println!("   Strategy:   {}", config.overflow_strategy);

    let providers = Arc::new(ProviderDirectory::from_env());
    let service = match OpenAIService::new(providers.clone()) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            eprintln!("❌ Failed to create HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let mut engine = IterationEngine::new(service, config.clone())
        .with_providers(providers)
        .with_fallback_source(Arc::new(StaticFallbackSource::new(
            config.static_fallback_models.clone(),
        )));

    if with_tools {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(WeatherTool));
        registry.register(Arc::new(WebSearchTool));
        registry.register(Arc::new(CalculatorTool));
        engine = engine.with_tools(registry);
    }

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n⚠️  Ctrl-C received, cancelling run...");
            cancel.cancel();
        }
    });

    let mut request = TaskRequest::new(task, worker).with_category(category);
    if let Some(reviewer) = reviewer {
        request = request.with_reviewer(reviewer);
    }
    if let Some(max_iterations) = max_iterations {
        request = request.with_max_iterations(max_iterations);
    }

    match engine.run(&request).await {
        Ok(history) => {
            println!("\n==========================================================");
            println!(
                "🎉 {} after {} iteration(s)",
                history
                    .termination
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unfinished".to_string()),
                history.total_iterations
            );
            println!("==========================================================");
            for result in &history.iterations {
                println!(
                    "\n── Iteration {} ({} tool call(s), approved: {}, converged: {})",
                    result.iteration,
                    result.tool_calls.len(),
                    result.approved,
                    result.converged
                );
                if !result.feedback.is_empty() {
                    println!("   Feedback: {}", result.feedback.lines().next().unwrap_or(""));
                }
            }
            println!("\n📋 Run history:");
            println!("{}", serde_json::to_string_pretty(&history).unwrap_or_default());
            println!("\n✅ Final output:\n{}", history.final_output);
        }
        Err(e) => {
            println!("\n==========================================================");
            println!("❌ ERROR");
            println!("==========================================================");
            println!("{}", e);
            std::process::exit(1);
        }
    }
}
