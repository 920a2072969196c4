//! `gt` -- Gas Town dispatch CLI.
//!
//! Parses CLI arguments with clap, resolves the runtime context, and
//! dispatches to command handlers.

mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;

use cli::{Cli, Commands};
use context::RuntimeContext;

fn main() {
    let cli = Cli::parse();

    // Version needs no town; everything else resolves one first.
    if matches!(cli.command, Some(Commands::Version)) {
        let ctx = RuntimeContext {
            town_root: std::path::PathBuf::new(),
            actor: String::new(),
            json: cli.global.json,
            verbose: cli.global.verbose,
            quiet: cli.global.quiet,
        };
        exit_on_error(&cli, commands::version::run(&ctx));
        return;
    }

    let ctx = match RuntimeContext::from_global_args(&cli.global) {
        Ok(ctx) => ctx,
        Err(e) => {
            print_error(&cli, &e);
            std::process::exit(1);
        }
    };

    // Set up logging based on verbosity.
    if ctx.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("gt=debug,gastown_routing=debug,gastown_ops=debug,gastown_dispatch=debug,gastown_attach=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command.as_ref() {
        Some(Commands::Queue(args)) => commands::queue_cmd::run(&ctx, args),
        Some(Commands::Dispatch(args)) => commands::dispatch_cmd::run(&ctx, args),
        Some(Commands::Routes(args)) => commands::routes_cmd::run(&ctx, args),
        Some(Commands::Rigs) => commands::rigs_cmd::run(&ctx),
        Some(Commands::Redirect(args)) => commands::redirect_cmd::run(&ctx, args),
        Some(Commands::Attach(args)) => commands::attach_cmd::run(&ctx, args),
        Some(Commands::Convoy(args)) => commands::convoy_cmd::run(&ctx, args),
        Some(Commands::Hook(args)) => commands::hook_cmd::run(&ctx, args),
        Some(Commands::Version) => unreachable!("handled above"),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    exit_on_error(&cli, result);
}

fn exit_on_error(cli: &Cli, result: anyhow::Result<()>) {
    if let Err(e) = result {
        print_error(cli, &e);
        std::process::exit(1);
    }
}

fn print_error(cli: &Cli, e: &anyhow::Error) {
    if cli.global.json {
        let err_json = serde_json::json!({
            "error": format!("{:#}", e),
        });
        if let Ok(s) = serde_json::to_string_pretty(&err_json) {
            eprintln!("{}", s);
        }
    } else {
        eprintln!("Error: {:#}", e);
    }
}
