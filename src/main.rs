use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;

use codecraft_core::config::Config;
use codecraft_core::conversation::{ConversationStore, Outcome};
use codecraft_core::fastpath::FastPathRouter;
use codecraft_core::nlrouter::{NaturalLanguageRouter, RouteContext, RoutingKind};
use codecraft_core::orchestrator::{ApprovalCache, Orchestrator, ResultsCache, TerminationPolicy, UnapprovedPolicy};
use codecraft_core::provider::{CancelToken, CompletionOptions, Message};
use codecraft_core::router::{Router, RoutingInputs};
use codecraft_core::tools::ToolRegistry;

/// Reference REPL wiring the core's components together. The terminal UI
/// proper (rendering, keybindings, multi-pane layout) is out of scope per
/// spec §1 — this is a line-at-a-time harness, not a product shell.
#[derive(Parser)]
#[command(name = "codecraft", about = "Interactive coding assistant core", long_about = None)]
struct Cli {
    /// Route and (when applicable) run a single line non-interactively, then exit.
    #[arg(long)]
    once: Option<String>,
}

struct Session {
    nl_router: NaturalLanguageRouter,
    router: Router,
    tools: ToolRegistry,
    conversation: ConversationStore,
    approvals: ApprovalCache,
    results_cache: ResultsCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}), falling back to defaults");
        Config::default()
    });

    let providers = config.build_providers();
    if providers.is_empty() {
        log::warn!("no providers configured; conversation turns will fail until config.toml lists one");
    }

    let persist_path = config
        .conversation
        .persist_path
        .clone()
        .or_else(|| Config::config_dir().ok().map(|d| d.join("conversation.json")));
    let conversation = match &persist_path {
        Some(path) => ConversationStore::load(path, config.conversation.max_turns)
            .with_context(|| format!("loading conversation history from {}", path.display()))?,
        None => ConversationStore::new(config.conversation.max_turns),
    };

    let fast_path = FastPathRouter::new()
        .with_command("help")
        .with_command("git-status")
        .with_alias("h", "help")
        .with_alias("gs", "git-status");

    let mut session = Session {
        nl_router: NaturalLanguageRouter::new(fast_path),
        router: Router::new(providers),
        tools: ToolRegistry::new().register_all_builtin(),
        conversation,
        approvals: ApprovalCache::new(),
        results_cache: ResultsCache::new(config.tools.results_cache_size),
    };

    if let Some(line) = cli.once {
        process_line(&line, &mut session).await;
        session.conversation.persist().ok();
        return Ok(());
    }

    println!("codecraft — type a request, or 'exit' to quit.");
    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            print!("> ");
            io::stdout().flush().ok();
            continue;
        }
        if trimmed.eq_ignore_ascii_case("exit") {
            break;
        }
        process_line(trimmed, &mut session).await;
        print!("> ");
        io::stdout().flush().ok();
    }

    session.conversation.persist().ok();
    Ok(())
}

/// Routes one line of input and carries out whatever [`RoutingKind`] it
/// resolved to, mirroring spec §6's `process_line` / `execute_*` contract.
async fn process_line(line: &str, session: &mut Session) {
    let context = RouteContext { project_files: Vec::new(), recent_files: Vec::new(), ..Default::default() };
    let decision = session.nl_router.route(line, &context, None, None).await;
    let turn_id = session.conversation.add_turn(line, Some(format!("{:?}", decision.risk)));

    match decision.kind {
        RoutingKind::Command { action, method, confidence, .. } => {
            println!("[command] {action} (method={method}, confidence={confidence:.2})");
            session.conversation.record_action(&turn_id, format!("command:{action}"));
            session.conversation.update_outcome(&turn_id, Outcome::Success, format!("resolved command {action}"));
        }
        RoutingKind::Clarification(request) => {
            for question in &request.questions {
                println!("[clarify] {question}");
            }
            session.conversation.update_outcome(&turn_id, Outcome::Pending, "awaiting clarification");
        }
        RoutingKind::FileOperation(op) => {
            println!(
                "[file_operation] {:?} on {:?} (requires_approval={}, safety={:?})",
                op.operation, op.targets, op.requires_approval, op.safety
            );
            session.conversation.update_outcome(&turn_id, Outcome::Pending, "file operation staged for safety review");
        }
        RoutingKind::TaskPlan { action, summary } => {
            println!("[task_plan] {action}: {summary}");
            session.conversation.update_outcome(&turn_id, Outcome::Pending, "handed off to task planner");
        }
        RoutingKind::Conversation { prompt } => {
            run_conversation_turn(session, &turn_id, prompt).await;
        }
    }
}

async fn run_conversation_turn(session: &mut Session, turn_id: &str, prompt: String) {
    let history = vec![Message::user(prompt)];
    let options = CompletionOptions { tools: Some(session.tools.schemas()), ..Default::default() };
    let routing = RoutingInputs::default();
    let cancel = CancelToken::new();

    let mut stdout_sink = |delta: &str| {
        print!("{delta}");
        io::stdout().flush().ok();
    };
    let mut approval_prompt = |call: &codecraft_core::provider::ToolCall| -> bool {
        print!("\napprove tool '{}' with args {}? [y/N] ", call.name, call.arguments);
        io::stdout().flush().ok();
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer).ok();
        answer.trim().eq_ignore_ascii_case("y")
    };

    let orchestrator = Orchestrator::new(&session.router, &session.tools)
        .with_policy(TerminationPolicy::default())
        .with_unapproved_policy(UnapprovedPolicy::Prompt);

    let outcome = orchestrator
        .run_turn(
            &routing,
            history,
            &options,
            &mut session.approvals,
            &mut session.results_cache,
            Some(&mut approval_prompt),
            &mut stdout_sink,
            &cancel,
        )
        .await;

    println!();
    match outcome {
        Ok(codecraft_core::orchestrator::TurnOutcome::Final { content }) => {
            session.conversation.update_outcome(turn_id, Outcome::Success, content);
        }
        Ok(codecraft_core::orchestrator::TurnOutcome::Cancelled) => {
            session.conversation.update_outcome(turn_id, Outcome::Failure, "cancelled");
        }
        Err(e) => {
            log::error!("conversation turn failed: {e}");
            session.conversation.update_outcome(turn_id, Outcome::Failure, e.to_string());
        }
    }
}
