//! 🚀 heimdex-cli — the front door, the bouncer, the maitre d' of heimdex.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config, sets up
//! logging, wires up Ctrl-C, and then lets the library do the heavy lifting.
//! Like a manager. 🦆
//!
//! Usage:
//!   heimdex [config.toml] import [glob-pattern]
//!   heimdex [config.toml] watch

use std::path::Path;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use heimdex::registry::RegistryCache;
use heimdex::store::ElasticsearchStore;
use heimdex::{import_files, load_config, start_watch_mode};

/// 🗺️ The two things this binary knows how to do, parsed by hand — two
/// subcommands and one optional pattern do not earn a parser dependency.
enum Command {
    /// 📂 One-shot batch: import matching daily files, print totals, exit.
    Import { pattern: Option<String> },
    /// 👀 Run forever (well, until Ctrl-C): tail today's file, index live.
    Watch,
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args (config path is optional, command is not)
/// 3. Load config (the moment of truth)
/// 4. Run the chosen mode (send it and pray 🙏)
/// 5. Handle errors (cry, helpfully)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 🎯 Grab the args like catching Pokémon — the first one that ends in
    // `.toml` is the config file, everything after is the command
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_arg, command_args) = match args.first() {
        Some(first) if first.ends_with(".toml") => (first.as_str(), &args[1..]),
        _ => ("heimdex.toml", &args[..]),
    };

    let command = parse_command(command_args)?;

    // 🔒 Validate the config file exists before we get too emotionally attached
    let config_file = Path::new(config_arg);
    let config_file_path_which_is_validated_to_exist = match config_file.try_exists()
        .context(format!("💀 Configuration file may not exist, couldn't find it. Double check that it exists, or maybe, it's an issue with pwd/cwd and relative paths. In that case, use an absolute path, to be absolutely certain, you are not messing this up. Was checking here: '{}'", config_file.display()))
    /* ? */ ? // ⚠️ Unwrap this, maybe — like unwrapping a gift that might be socks
    {
        true => Some(config_file),  // ✅ Found it! Better than finding my car keys
        false => None               // 💤 Not there. Env vars only. Living dangerously.
    };

    // 🔧 Load the config — this is the moment where we find out if the TOML is valid
    // or if someone put a tab where a space should be (looking at you, Kevin)
    let app_config = load_config(config_file_path_which_is_validated_to_exist)
        .context("💀 In heimdex-cli, main, we couldn't load the config. Take a look at the file, make sure it's correct, and that [elasticsearch] has a url")
    /* ? */ ?;

    // 🚀 SEND IT. No take-backs. This is not a drill.
    let result = run(app_config, command).await;

    // 💀 Error handling: the part where we find out what went wrong
    // and print it in a way that's helpful at 3am
    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            // -- 🕵️ sniff the cause like a truffle pig hunting for connection problems
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        // -- 📡 if it smells like a connection problem, it's probably a connection problem
        // -- like when your wifi icon has full bars but nothing loads
        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like the cluster isn't reachable. \
                Double-check that Elasticsearch is actually running at the configured url. \
                If you're using Docker, try: `docker ps` to see what's up, or \
                `docker compose up -d` to resurrect it. Even servers need a nudge sometimes. ☕"
            );
        }

        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }

    // ✅ If we got here, everything worked. Pop the champagne. 🍾
    Ok(())
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        Some("import") => Ok(Command::Import {
            pattern: args.get(1).cloned(),
        }),
        Some("watch") => Ok(Command::Watch),
        Some(other) => bail!(
            "💀 '{other}' is not a thing we do. Usage: heimdex [config.toml] import [pattern] | watch"
        ),
        None => bail!(
            "💀 No command given. Usage: heimdex [config.toml] import [pattern] | watch"
        ),
    }
}

/// 🏗️ Build the real collaborators (cluster client, registry cache) and hand
/// off to the chosen delivery mode.
async fn run(app_config: heimdex::AppConfig, command: Command) -> Result<()> {
    let store = ElasticsearchStore::new(app_config.elasticsearch.clone())
        .await
        .context("💀 Couldn't construct the Elasticsearch client. The pipeline has no store, and a pipeline with no store is just a very elaborate logger")?;
    let registry = RegistryCache::new(app_config.ingest.registry_file.clone());

    match command {
        Command::Import { pattern } => {
            let totals =
                import_files(&store, &registry, &app_config.ingest, pattern.as_deref()).await?;
            info!(
                "✅ Done: {} files, {} indexed, {} failed, {} skipped",
                totals.files, totals.indexed, totals.failed, totals.skipped
            );
            Ok(())
        }
        Command::Watch => {
            // 🛑 Ctrl-C → CancellationToken. Cooperative, clean, no half-indexed
            // lines left on the floor.
            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("🛑 Ctrl-C — winding down the watch");
                    ctrl_c_cancel.cancel();
                }
            });

            start_watch_mode(&store, &registry, &app_config.ingest, cancel).await
        }
    }
}
