//! Deterministic workflow conductor.
//!
//! Each command loads a session from `.conductor/sessions/`, advances it,
//! persists it, and prints the next directive. The exit code tells a driving
//! script whether to keep going.

use std::env;
use std::path::Path;
use std::process::exit;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};

use conductor::core::actor::Actor;
use conductor::core::dynamic::Preset;
use conductor::core::phases::{AlgorithmPhase, PhaseName, ScaffoldMode};
use conductor::core::session::WorkflowState;
use conductor::decompose;
use conductor::driver::{self, DynamicFlowSpec};
use conductor::exit_codes;
use conductor::interview;
use conductor::io::init::{InitOptions, init_conductor};
use conductor::io::session_store::list_sessions;
use conductor::logging;
use conductor::outcome::Outcome;
use conductor::phase;
use conductor::scaffold;
use conductor::tdd;
use conductor::verify;
use conductor::workspace::Workspace;

#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Deterministic workflow conductor for external cognitive agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.conductor/` with config, learnings and session directories.
    Init {
        /// Overwrite the config and `.gitignore`. Learnings are kept.
        #[arg(short, long)]
        force: bool,
    },
    /// Create a session and print its id.
    New {
        query: String,
        #[arg(long, value_enum, default_value_t = Kind::Algorithm)]
        kind: Kind,
        /// File or component under test (tdd sessions).
        #[arg(long)]
        target: Option<String>,
        /// Scaffold from scratch or update existing docs (scaffold sessions).
        #[arg(long, value_enum, default_value_t = Mode::Scaffold)]
        mode: Mode,
    },
    /// Move an algorithm session to a phase and print its entry directive.
    Phase { session: String, phase: String },
    /// Report that an actor wrote its memory file.
    Next { session: String, actor: Actor },
    /// Skip the conditional step owned by an actor.
    Skip { session: String, actor: Actor },
    /// Re-derive the outstanding directive, or leave a halt or escalation.
    Resume { session: String },
    /// Pause an algorithm session for user input.
    Halt {
        session: String,
        #[arg(long)]
        reason: String,
        /// Question for the user. Repeatable.
        #[arg(long = "question")]
        questions: Vec<String>,
    },
    /// Score the verification artifacts of a session in VERIFY.
    Verify { session: String },
    /// Score the IDEAL STATE artifact of a session in INTERVIEW or IDEAL_STATE.
    Interview { session: String },
    /// Start decomposition, or register a subtask definition file.
    Decompose {
        session: String,
        subtasks: Option<String>,
    },
    /// Report a completed child session to its parent.
    ChildComplete { session: String },
    /// Start, continue or finish a TDD cycle.
    Tdd {
        session: String,
        /// Start another RED/GREEN/REFACTOR cycle after DOC.
        #[arg(long)]
        cycle: bool,
    },
    /// Start or continue a documentation scaffold session.
    Scaffold { session: String },
    /// Run a flow built at runtime on a session.
    Flow {
        session: String,
        #[arg(long, conflicts_with = "actors", required_unless_present = "actors")]
        preset: Option<String>,
        /// Comma-separated actor names, run in order.
        #[arg(long, value_delimiter = ',')]
        actors: Vec<Actor>,
    },
    /// Print a session record, or list every session.
    Show { session: Option<String> },
    /// List built-in flows and dynamic presets.
    Flows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Algorithm,
    Tdd,
    Scaffold,
    Decompose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Scaffold,
    Update,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = env::current_dir().context("resolve current directory")?;
    if let Command::Init { force } = cli.command {
        let paths = init_conductor(&root, &InitOptions { force })?;
        println!("Initialized {}", paths.conductor_dir.display());
        return Ok(exit_codes::OK);
    }
    let ws = Workspace::open(&root)?;
    let outcome = dispatch(&ws, cli.command)?;
    Ok(emit(&outcome))
}

fn dispatch(ws: &Workspace, command: Command) -> Result<Outcome> {
    match command {
        Command::Init { .. } => Err(anyhow!("init is handled before the workspace opens")),
        Command::New {
            query,
            kind,
            target,
            mode,
        } => {
            let workflow = match kind {
                Kind::Algorithm => WorkflowState::algorithm(),
                Kind::Tdd => WorkflowState::tdd(target),
                Kind::Scaffold => WorkflowState::scaffold(match mode {
                    Mode::Scaffold => ScaffoldMode::Scaffold,
                    Mode::Update => ScaffoldMode::Update,
                }),
                Kind::Decompose => WorkflowState::decompose(),
            };
            let session = phase::create_session(ws, &query, workflow)?;
            Ok(Outcome::Directive(session.id))
        }
        Command::Phase { session, phase } => {
            let target = AlgorithmPhase::parse_name(&phase).ok_or_else(|| {
                anyhow!(
                    "unknown phase '{phase}' (expected one of: {})",
                    AlgorithmPhase::ALL
                        .iter()
                        .map(|phase| phase.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?;
            let mut session = ws.load(&session)?;
            phase::enter_phase(ws, &mut session, target)
        }
        Command::Next { session, actor } => driver::next(ws, &session, actor),
        Command::Skip { session, actor } => driver::skip(ws, &session, actor),
        Command::Resume { session } => driver::resume(ws, &session),
        Command::Halt {
            session,
            reason,
            questions,
        } => {
            let mut session = ws.load(&session)?;
            phase::halt(ws, &mut session, &reason, questions)
        }
        Command::Verify { session } => {
            let mut session = ws.load(&session)?;
            verify::evaluate(ws, &mut session)
        }
        Command::Interview { session } => {
            let mut session = ws.load(&session)?;
            interview::evaluate(ws, &mut session)
        }
        Command::Decompose { session, subtasks } => {
            let mut session = ws.load(&session)?;
            match subtasks {
                Some(path) => {
                    let defs = decompose::read_defs(Path::new(&path))?;
                    decompose::register_subtasks(ws, &mut session, &defs)
                }
                None => decompose::start(ws, &mut session),
            }
        }
        Command::ChildComplete { session } => {
            Ok(decompose::on_child_complete(ws, &session)?.into_outcome())
        }
        Command::Tdd { session, cycle } => {
            let mut session = ws.load(&session)?;
            tdd::advance(ws, &mut session, cycle)
        }
        Command::Scaffold { session } => {
            let mut session = ws.load(&session)?;
            scaffold::advance(ws, &mut session)
        }
        Command::Flow {
            session,
            preset,
            actors,
        } => {
            let spec = match preset {
                Some(id) => DynamicFlowSpec::Preset(Preset::parse_id(&id).ok_or_else(|| {
                    anyhow!(
                        "unknown preset '{id}' (expected one of: {})",
                        Preset::ALL.map(Preset::id).join(", ")
                    )
                })?),
                None => DynamicFlowSpec::Actors(actors),
            };
            driver::run_dynamic_flow(ws, &session, &spec)
        }
        Command::Show { session } => show(ws, session.as_deref()),
        Command::Flows => Ok(Outcome::Directive(flows(ws)?)),
    }
}

fn show(ws: &Workspace, session_id: Option<&str>) -> Result<Outcome> {
    if let Some(id) = session_id {
        let session = ws.load(id)?;
        return Ok(Outcome::Directive(
            serde_json::to_string_pretty(&session).context("serialize session")?,
        ));
    }
    let lines: Vec<String> = list_sessions(&ws.paths)?
        .iter()
        .map(|session| {
            format!(
                "{}  {:<9}  {:<12}  {:<11}  {}",
                session.id,
                session.workflow.kind(),
                session.workflow.phase_name(),
                session.status.as_str(),
                session.query
            )
        })
        .collect();
    if lines.is_empty() {
        return Ok(Outcome::Directive("No sessions.".to_string()));
    }
    Ok(Outcome::Directive(lines.join("\n")))
}

fn flows(ws: &Workspace) -> Result<String> {
    let mut lines: Vec<String> = ws
        .registry
        .flows()
        .map(|flow| format!("{}  {}  ({})", flow.id(), flow.name(), flow.chain_label()))
        .collect();
    lines.push(String::new());
    lines.push("Presets for `conductor flow --preset`:".to_string());
    for preset in Preset::ALL {
        let flow = preset.build()?;
        lines.push(format!("{}  ({})", preset.id(), flow.chain_label()));
    }
    Ok(lines.join("\n"))
}

/// Print the outcome and map it to an exit code.
fn emit(outcome: &Outcome) -> i32 {
    println!("{}", outcome.text().trim_end());
    match outcome {
        Outcome::Directive(_) => exit_codes::OK,
        Outcome::Complete(_) => exit_codes::COMPLETE,
        Outcome::Waiting(_) => exit_codes::WAITING,
        Outcome::Escalated(_) => exit_codes::ESCALATED,
        Outcome::Blocked(_) => exit_codes::INVALID,
    }
}
