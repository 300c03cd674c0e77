use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use unified_core::models::{ConnectionId, LinkedUserId, ObjectType, ProjectId, Vertical};

#[derive(Debug, Parser)]
#[command(name = "unified", version, about = "Unified field-mapping and sync engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Which mapper a command talks to.
#[derive(Debug, Clone, Args)]
pub struct Target {
    /// crm, ticketing, hris, ...
    #[arg(long)]
    pub vertical: Vertical,

    /// contact, company, ticket, benefit, ...
    #[arg(long = "object")]
    pub object_type: ObjectType,

    /// Provider slug, e.g. `hubspot`.
    #[arg(long)]
    pub provider: String,
}

/// The tenant connection a network command acts for.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    #[arg(long, env = "UNIFIED_PROJECT_ID")]
    pub project_id: ProjectId,

    #[arg(long, env = "UNIFIED_LINKED_USER_ID")]
    pub linked_user_id: LinkedUserId,

    /// Reuse a connection id so its sync runs can be listed later.
    #[arg(long)]
    pub connection_id: Option<ConnectionId>,

    /// JSON file with provider credentials (`access_token`, `api_base`, ...).
    #[arg(long)]
    pub credentials: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List every registered (vertical, object, provider) mapper.
    Providers,

    /// Translate provider records (file or `-` for stdin) to unified entities.
    Unify {
        #[command(flatten)]
        target: Target,

        /// A provider record or an array of records.
        #[arg(long)]
        input: PathBuf,

        /// JSON array of `{ slug, remote_field_key, data_type? }`.
        #[arg(long)]
        mappings: Option<PathBuf>,
    },

    /// Translate unified input to the provider's write payload.
    Desunify {
        #[command(flatten)]
        target: Target,

        /// A unified input object or an array of them.
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        mappings: Option<PathBuf>,
    },

    /// Pull records from the provider and persist the unified result.
    Sync {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        connection: ConnectionArgs,

        /// Page size hint passed to the provider.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Create one record (object input) or many (array input) at the provider.
    Add {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(long)]
        input: PathBuf,
    },

    /// Register a tenant custom field mapping in the store.
    AddCustomField {
        #[command(flatten)]
        target: Target,

        #[arg(long, env = "UNIFIED_PROJECT_ID")]
        project_id: ProjectId,

        /// Unified-side name, e.g. `favorite_color`.
        #[arg(long)]
        slug: String,

        /// Provider-side field key.
        #[arg(long)]
        remote_key: String,

        /// string, number, boolean, date or json.
        #[arg(long)]
        data_type: Option<String>,
    },

    /// List recorded sync runs for a connection.
    Runs {
        #[arg(long)]
        connection_id: ConnectionId,
    },

    /// Print current configuration (redacted secrets).
    Config,
}
