use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use uuid::Uuid;

use backoffice_gate::authz::{convert_all, Ability, Action, RoutePermissionTable, UnmappedRoutePolicy};
use backoffice_gate::middleware::{Gate, GateDecision};
use backoffice_gate::models::session::{LoginProvider, Session, SessionRole, SessionUser};

#[derive(Parser, Debug)]
#[command(author, version, about = "back-office permission and route gate tool", long_about = None)]
struct Cli {
    /// JSON route table to use instead of the built-in one
    #[arg(long, global = true)]
    routes_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the normalized form of backend permission strings
    Convert { permissions: Vec<String> },
    /// Evaluate an ability check against a permission list
    Check {
        #[arg(long = "perm")]
        permissions: Vec<String>,
        /// One or more actions separated by commas; any one is enough
        actions: String,
        subject: String,
    },
    /// Show what the gate does for a signed-in user with the given permissions
    Route {
        #[arg(long = "perm")]
        permissions: Vec<String>,
        #[arg(long, default_value = "allow")]
        unmapped: String,
        path: String,
    },
    /// Print the effective route permission table
    Routes,
}

fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert { permissions } => {
            let normalized = convert_all(&permissions);
            println!("{}", serde_json::to_string_pretty(&normalized)?);
        }
        Commands::Check {
            permissions,
            actions,
            subject,
        } => {
            let actions = actions
                .split(',')
                .map(|a| a.trim().parse::<Action>())
                .collect::<Result<Vec<_>, _>>()
                .context("invalid action")?;
            let ability = Ability::from_permission_strings(&permissions);
            let allowed = ability.can(actions, &subject);
            println!("{}", if allowed { "allowed" } else { "denied" });
        }
        Commands::Route {
            permissions,
            unmapped,
            path,
        } => {
            let unmapped = unmapped.parse::<UnmappedRoutePolicy>()?;
            let gate = Gate::new(load_table(cli.routes_file.as_deref())?, unmapped);
            let session = cli_session(permissions);

            match gate.decide(&path, true, Some(&session)) {
                GateDecision::Bypass => println!("bypass"),
                GateDecision::Continue => println!("continue"),
                GateDecision::Redirect(to) => println!("redirect {to}"),
            }
        }
        Commands::Routes => {
            let table = load_table(cli.routes_file.as_deref())?;
            for rule in table.rules() {
                let required = if rule.required.is_empty() {
                    "(authenticated)".to_string()
                } else {
                    rule.required.join(", ")
                };
                println!("{:<24} {}", rule.prefix, required);
            }
        }
    }

    Ok(())
}

fn load_table(path: Option<&std::path::Path>) -> anyhow::Result<RoutePermissionTable> {
    match path {
        Some(path) => Ok(RoutePermissionTable::from_json_file(path)?),
        None => Ok(RoutePermissionTable::default()),
    }
}

fn cli_session(permissions: Vec<String>) -> Session {
    let now = Utc::now();
    Session {
        id: Uuid::new_v4(),
        user: SessionUser {
            id: "gatectl".to_string(),
            name: None,
            email: None,
            image: None,
            access_token: String::new(),
            roles: vec![SessionRole {
                name: "cli".to_string(),
                permissions,
            }],
            login_by: LoginProvider::Credentials,
        },
        issued_at: now,
        expires: now + Duration::hours(1),
    }
}
