use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinaccess_core::constants::{CONFIG_PATH_ENV, ORGANIZATIONS_PATH_ENV, RESOURCES_PATH_ENV};
use clinaccess_core::{
    classify, display_reference, resolve_config, AccessEngine, Actor, InMemoryResourceStore,
    Operation, Role, TenancyRegistry,
};
use fhir::{display_of, ClinicalResource, CodeableConcept, LookupError, Reference};

#[derive(Parser)]
#[command(name = "clinaccess")]
#[command(about = "Role-based access decisions and display resolution for clinical resources")]
struct Cli {
    /// Access configuration file (YAML). Built-in defaults are used when absent.
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether an actor may perform an operation on a resource
    Decide {
        /// Actor file (YAML)
        #[arg(long)]
        actor: PathBuf,
        /// Resource file (YAML)
        #[arg(long)]
        resource: PathBuf,
        /// view, create, update or delete
        #[arg(long, default_value = "view")]
        operation: String,
        /// Resource type tag to decide for (defaults to the resource's own type)
        #[arg(long)]
        resource_type: Option<String>,
    },
    /// List the resources an actor may perform an operation on
    Filter {
        /// Actor file (YAML)
        #[arg(long)]
        actor: PathBuf,
        /// Resource list file (YAML)
        #[arg(long, env = RESOURCES_PATH_ENV)]
        resources: PathBuf,
        /// view, create, update or delete
        #[arg(long, default_value = "view")]
        operation: String,
    },
    /// Print the effective capabilities of one role, or all of them
    Capabilities {
        #[arg(long)]
        role: Option<String>,
    },
    /// Describe an actor and the organization it acts for
    Whoami {
        /// Actor file (YAML)
        #[arg(long)]
        actor: PathBuf,
        /// Organization list file (YAML)
        #[arg(long, env = ORGANIZATIONS_PATH_ENV)]
        organizations: Option<PathBuf>,
    },
    /// Resolve the display text of a CodeableConcept
    Display {
        /// CodeableConcept file (YAML)
        #[arg(long)]
        concept: PathBuf,
        /// Prefer codings from this code-system URI
        #[arg(long)]
        system: Option<String>,
    },
    /// Parse a reference and resolve its display text
    Reference {
        /// Reference string, e.g. Practitioner/P1
        reference: String,
        /// Cached display carried alongside the reference
        #[arg(long)]
        display: Option<String>,
        /// Resource list file (YAML) used for lookups
        #[arg(long, env = RESOURCES_PATH_ENV)]
        resources: Option<PathBuf>,
    },
    /// Load the configuration and report hierarchy problems
    CheckConfig,
}

/// Main entry point for the clinaccess CLI
///
/// # Environment Variables
/// - `CLINACCESS_CONFIG`: access configuration file
/// - `CLINACCESS_RESOURCES`: resource list used by `filter` and `reference`
/// - `CLINACCESS_ORGANIZATIONS`: organization list used by `whoami`
/// - `RUST_LOG`: log filter (default: `clinaccess=info`)
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinaccess=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config)?;
    tracing::debug!(
        practitioner_scoping = ?config.practitioner_scoping(),
        strict_hierarchy = config.strict_hierarchy(),
        "access configuration ready"
    );

    match cli.command {
        Commands::Decide {
            actor,
            resource,
            operation,
            resource_type,
        } => {
            let engine = AccessEngine::from_config(&config);
            let actor = load_actor(&actor)?;
            let resource = ClinicalResource::parse(&read_file(&resource, "resource")?)?;
            let resource_type =
                resource_type.unwrap_or_else(|| resource.resource_type.to_string());
            let decision = engine.decide_raw(&actor, &resource_type, &operation, &resource);

            let output = json!({
                "actor": actor.id().as_str(),
                "role": actor.role().to_string(),
                "resource": resource.display_label(),
                "operation": operation,
                "relationship": classify(&actor, &resource).to_string(),
                "decision": decision,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Filter {
            actor,
            resources,
            operation,
        } => {
            let engine = AccessEngine::from_config(&config);
            let actor = load_actor(&actor)?;
            let operation: Operation = operation.parse()?;
            let store = InMemoryResourceStore::load(&resources)?;

            let mut permitted = engine.filter_permitted(&actor, operation, store.resources());
            permitted.sort_by_key(|resource| (resource.resource_type, resource.id.clone()));
            if permitted.is_empty() {
                println!("No permitted resources.");
            }
            for resource in permitted {
                println!("{}\t{}", resource.reference().reference, resource.display_label());
            }
        }
        Commands::Capabilities { role } => {
            let roles = match role {
                Some(role) => vec![role.parse::<Role>()?],
                None => Role::ALL.to_vec(),
            };
            for role in roles {
                if role == Role::SuperAdmin {
                    println!("{role}: *");
                    continue;
                }
                let grants = config.capabilities().grants_for(role);
                let grants: Vec<String> = grants.iter().map(ToString::to_string).collect();
                println!("{role}: {}", grants.join(", "));
            }
        }
        Commands::Whoami {
            actor,
            organizations,
        } => {
            let actor = load_actor(&actor)?;
            let registry = match organizations {
                Some(path) => TenancyRegistry::load(&path)?,
                None => TenancyRegistry::new(),
            };
            let organization = registry
                .organization_name_of(&actor)
                .or_else(|| actor.organization_id().map(|id| id.as_str()))
                .unwrap_or("-");

            println!("ID: {}", actor.id());
            println!("Name: {}", actor.display_name());
            println!("Role: {}", actor.role());
            println!("Organization: {organization}");
            println!("Active: {}", actor.is_active());
        }
        Commands::Display { concept, system } => {
            let registry = config.code_system_registry();
            let concept: CodeableConcept =
                fhir::parse_yaml(&read_file(&concept, "concept")?, "concept")?;

            match system {
                Some(uri) => {
                    let system = registry.system_of_uri(&uri);
                    println!("{}", registry.resolve_display_in(&concept, system));
                }
                None => println!("{}", fhir::resolve_display(&concept)),
            }
            for coding in &concept.coding {
                let rendered = registry.render_coding(coding);
                println!("  {}: {rendered}", rendered.system);
            }
        }
        Commands::Reference {
            reference,
            display,
            resources,
        } => {
            let mut reference = Reference::new(reference);
            if let Some(display) = display {
                reference = reference.with_display(display);
            }

            match reference.parse() {
                Ok(parsed) => println!("Parsed: {parsed}"),
                Err(e) => println!("Error: {e}"),
            }
            let text = match resources {
                Some(path) => display_reference(&InMemoryResourceStore::load(&path)?, &reference),
                None => display_of(&reference, |_| Err(LookupError::NotFound)),
            };
            println!("Display: {text}");
        }
        Commands::CheckConfig => {
            let violations = config.capabilities().check_monotonic();
            println!(
                "Practitioner scoping: {:?}, strict hierarchy: {}",
                config.practitioner_scoping(),
                config.strict_hierarchy()
            );
            if violations.is_empty() {
                println!("Capability table is monotonic.");
            } else {
                for violation in violations {
                    println!("warning: {violation}");
                }
            }
        }
    }

    Ok(())
}

fn read_file(path: &Path, what: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file {}", path.display()))
}

fn load_actor(path: &Path) -> anyhow::Result<Actor> {
    Ok(Actor::parse(&read_file(path, "actor")?)?)
}
