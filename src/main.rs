use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use workspace_acl::config::Config;
use workspace_acl::domain::{
    CreateResourceInput, CreateWorkspaceInput, EntityId, ResourceKind, SubjectId, User,
};
use workspace_acl::policy::AccessControl;
use workspace_acl::repository::{
    InMemoryResourceRepository, InMemoryUserRepository, InMemoryWorkspaceRepository,
    UserRepository,
};
use workspace_acl::service::{MembershipService, WorkspaceLocks, WorkspaceService};
use workspace_acl::telemetry;

#[derive(Parser)]
#[command(
    name = "workspace-acl",
    about = "Inspect and validate workspace role catalogs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configured role catalog.
    Check,
    /// List roles with the roles they subsume.
    Roles,
    /// Print every role a role expands to.
    Expand {
        /// Role name (e.g. "Developer").
        role: String,
    },
    /// Print the permissions a role grants on one resource kind.
    Permissions {
        role: String,
        /// workspace, application or datasource.
        #[arg(long, default_value = "workspace")]
        kind: ResourceKind,
    },
    /// Run an invite against an in-memory workspace with one application and
    /// one datasource, then print the resulting policies as JSON.
    Simulate {
        /// Workspace owner.
        #[arg(long, default_value = "owner@example.com")]
        owner: String,
        /// Subject to invite.
        #[arg(long)]
        subject: String,
        /// Role to invite with.
        #[arg(long)]
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    telemetry::init(&config.telemetry);

    let catalog = config.load_role_catalog()?;
    let access = Arc::new(AccessControl::from_config(&catalog).context("Invalid role catalog")?);

    match cli.command {
        Commands::Check => {
            let roles: Vec<_> = access.graph().roles().collect();
            println!(
                "ok: {} roles, top role '{}'",
                roles.len(),
                access.top_role()
            );
        }
        Commands::Roles => {
            for role in access.graph().roles() {
                let expanded = access.expand(role)?;
                let subsumed: Vec<_> = expanded.iter().filter(|r| r.as_str() != role).collect();
                println!(
                    "{}\t{}\t{}",
                    role,
                    subsumed.len(),
                    access.graph().description(role).unwrap_or_default()
                );
            }
        }
        Commands::Expand { role } => {
            for name in access.expand(&role)? {
                println!("{}", name);
            }
        }
        Commands::Permissions { role, kind } => {
            for permission in access.permissions_for_role(&role, kind)? {
                println!("{}", permission);
            }
        }
        Commands::Simulate {
            owner,
            subject,
            role,
        } => simulate(&config, access, &owner, &subject, &role).await?,
    }

    Ok(())
}

async fn simulate(
    config: &Config,
    access: Arc<AccessControl>,
    owner: &str,
    subject: &str,
    role: &str,
) -> Result<()> {
    let workspace_repo = Arc::new(InMemoryWorkspaceRepository::new());
    let resource_repo = Arc::new(InMemoryResourceRepository::new());
    let user_repo = Arc::new(InMemoryUserRepository::new());
    let locks = Arc::new(WorkspaceLocks::new());

    let owner_subject = SubjectId::parse(owner).map_err(anyhow::Error::msg)?;
    user_repo.save(&User::new(owner_subject, true)).await?;

    let workspaces = WorkspaceService::new(
        workspace_repo.clone(),
        resource_repo.clone(),
        user_repo.clone(),
        access.clone(),
        locks.clone(),
    );
    let membership = MembershipService::new(
        workspace_repo,
        resource_repo,
        user_repo,
        access,
        locks,
        config.propagation.clone(),
    );

    let workspace = workspaces
        .create(
            CreateWorkspaceInput {
                name: "Simulation".to_string(),
                ..Default::default()
            },
            owner,
        )
        .await?;
    let app = workspaces
        .add_dependent(
            workspace.id,
            CreateResourceInput {
                kind: ResourceKind::Application,
                name: "app".to_string(),
            },
        )
        .await?;
    let datasource = workspaces
        .add_dependent(
            workspace.id,
            CreateResourceInput {
                kind: ResourceKind::Datasource,
                name: "datasource".to_string(),
            },
        )
        .await?;

    let member = membership
        .add_or_invite_member(workspace.id, subject, role)
        .await?;
    info!(subject = %member.subject, status = %member.status(), "Simulated invite");

    let workspace = workspaces.get(workspace.id).await?;
    let dependents = workspaces.dependents(workspace.id).await?;
    let policies_of = |id: EntityId| {
        dependents
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.policies.clone())
            .unwrap_or_default()
    };

    let output = serde_json::json!({
        "members": workspace.members,
        "workspace": workspace.policies,
        "application": policies_of(app.id),
        "datasource": policies_of(datasource.id),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
