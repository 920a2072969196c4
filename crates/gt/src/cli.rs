//! Clap CLI definitions for the `gt` command.

use clap::{Args, Parser, Subcommand};

/// gt -- Gas Town dispatch.
///
/// Routes beads to rigs, materialises the ready queue, and fans work out
/// to polecats.
#[derive(Parser, Debug)]
#[command(
    name = "gt",
    about = "Gas Town dispatch",
    long_about = "Routes beads to rigs, materialises the label-driven ready queue, and fans work out to ephemeral workers.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Town root (default: auto-discover via mayor/rigs.json).
    #[arg(long, global = true, env = "GT_TOWN_ROOT")]
    pub town: Option<String>,

    /// Actor identity for hook mirrors and audit (default: $GT_ACTOR, $USER).
    #[arg(long, global = true, env = "GT_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the ready queue.
    Queue(QueueArgs),

    /// Dispatch queued beads to a spawner.
    Dispatch(DispatchArgs),

    /// Inspect the town route table.
    Routes(RoutesArgs),

    /// List the rigs registered in this town.
    Rigs,

    /// Resolve or set up .beads redirects.
    Redirect(RedirectArgs),

    /// Attach a formula to a bead.
    Attach(AttachArgs),

    /// Manage tracking convoys.
    Convoy(ConvoyArgs),

    /// Hook a bead to an agent.
    Hook(HookArgs),

    /// Show version information.
    Version,
}

// ===== Queue =====

#[derive(Args, Debug)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommands,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Queue a bead for dispatch.
    Add(QueueAddArgs),

    /// List queued, ready beads across all rigs.
    List,

    /// Remove a bead from the queue.
    #[command(alias = "remove")]
    Rm(QueueRmArgs),

    /// Remove every queued bead (best effort).
    Clear,
}

#[derive(Args, Debug)]
pub struct QueueAddArgs {
    /// Bead id to queue (rig-level only).
    pub bead_id: String,
}

#[derive(Args, Debug)]
pub struct QueueRmArgs {
    /// Bead id to remove.
    pub bead_id: String,
}

// ===== Dispatch =====

#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// Plan only: no spawns, no queue changes.
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum beads to dispatch (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Spawner fan-out (0 or 1 = sequential).
    #[arg(long, default_value_t = 1)]
    pub parallel: usize,

    /// Spawner command, invoked as `<cmd> <rig> <bead-id>`.
    #[arg(long, env = "GT_SPAWNER")]
    pub spawner: Option<String>,
}

// ===== Routes =====

#[derive(Args, Debug)]
pub struct RoutesArgs {
    #[command(subcommand)]
    pub command: Option<RoutesCommands>,
}

#[derive(Subcommand, Debug)]
pub enum RoutesCommands {
    /// List the route table (default).
    List,

    /// Show prefixes claimed by more than one route.
    Conflicts,
}

// ===== Redirect =====

#[derive(Args, Debug)]
pub struct RedirectArgs {
    #[command(subcommand)]
    pub command: RedirectCommands,
}

#[derive(Subcommand, Debug)]
pub enum RedirectCommands {
    /// Print the effective store directory for a working directory.
    Resolve(RedirectResolveArgs),

    /// Point a worktree's .beads at its rig's canonical store.
    Setup(RedirectSetupArgs),
}

#[derive(Args, Debug)]
pub struct RedirectResolveArgs {
    /// Working directory (default: current directory).
    pub dir: Option<String>,
}

#[derive(Args, Debug)]
pub struct RedirectSetupArgs {
    /// The worktree directory receiving the redirect.
    pub worktree: String,

    /// The rig directory owning the canonical store.
    pub rig: String,
}

// ===== Attach =====

#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Formula name.
    pub formula: String,

    /// Target bead id.
    pub bead_id: String,

    /// Extra wisp variables as key=value.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Skip cooking (the proto already exists).
    #[arg(long)]
    pub skip_cook: bool,

    /// Execution mode recorded on the bead.
    #[arg(long)]
    pub mode: Option<String>,

    /// Merge strategy recorded on the bead.
    #[arg(long)]
    pub merge_strategy: Option<String>,

    /// Suppress merging for this bead.
    #[arg(long)]
    pub no_merge: bool,
}

// ===== Convoy =====

#[derive(Args, Debug)]
pub struct ConvoyArgs {
    #[command(subcommand)]
    pub command: ConvoyCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConvoyCommands {
    /// Create a convoy tracking a bead.
    Create(ConvoyCreateArgs),

    /// Add a bead to an existing convoy (reopens a closed convoy).
    Add(ConvoyAddArgs),

    /// Show the open convoy tracking a bead, if any.
    Tracked(ConvoyTrackedArgs),
}

#[derive(Args, Debug)]
pub struct ConvoyCreateArgs {
    /// Bead to track.
    pub bead_id: String,

    /// Convoy title.
    #[arg(long)]
    pub title: String,

    /// Convoy assignee.
    #[arg(long)]
    pub assignee: Option<String>,

    /// Record a lifecycle owner in the convoy description.
    #[arg(long)]
    pub owned_by: Option<String>,

    /// Record a merge strategy in the convoy description.
    #[arg(long)]
    pub merge: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConvoyAddArgs {
    /// Convoy id.
    pub convoy_id: String,

    /// Bead to add.
    pub bead_id: String,
}

#[derive(Args, Debug)]
pub struct ConvoyTrackedArgs {
    /// Bead id to look up.
    pub bead_id: String,
}

// ===== Hook =====

#[derive(Args, Debug)]
pub struct HookArgs {
    /// Bead id to hook.
    pub bead_id: String,

    /// Agent identity taking the work (e.g. gastown/polecats/nux).
    pub agent: String,
}
