use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

use crate::cache::FilterOptions;
use crate::error::AppError;
use crate::resources::ResourceKind;

/// Command-line arguments for the `vitrine` binary.
#[derive(Debug, Parser)]
#[command(name = "vitrine", version, about = "Museum content collection client")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VITRINE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Fetch a collection and print its normalized view.
    List(ListArgs),
    /// Print the canonical query key for a collection request.
    Key(KeyArgs),
    /// Print the current session, or null when unauthenticated.
    Session(SessionArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceArg {
    Museums,
    Stories,
    Gallery,
}

impl From<ResourceArg> for ResourceKind {
    fn from(value: ResourceArg) -> Self {
        match value {
            ResourceArg::Museums => ResourceKind::Museums,
            ResourceArg::Stories => ResourceKind::Stories,
            ResourceArg::Gallery => ResourceKind::Gallery,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct ClientOverrides {
    /// Override the API base URL.
    #[arg(long = "api-base-url", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Override the request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS")]
    pub api_timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle request fencing (newest request wins).
    #[arg(
        long = "cache-fencing",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_fencing: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct FilterArgs {
    #[arg(long = "museum-id", value_name = "ID")]
    pub museum_id: Option<String>,

    #[arg(long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub approved: Option<bool>,

    #[arg(long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub featured: Option<bool>,

    /// Media or museum type filter.
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// Repeatable; order is preserved in the query key.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub offset: Option<u32>,

    #[arg(long)]
    pub page: Option<u32>,

    #[arg(long, value_name = "QUERY")]
    pub search: Option<String>,
}

/// `--offset` and `--page` are alternative pagination modes.
impl TryFrom<&FilterArgs> for FilterOptions {
    type Error = AppError;

    fn try_from(args: &FilterArgs) -> Result<Self, Self::Error> {
        if args.offset.is_some() && args.page.is_some() {
            return Err(AppError::validation(
                "--offset and --page cannot be combined; pick one pagination mode",
            ));
        }
        Ok(Self {
            museum_id: args.museum_id.clone().map(|id| match id.parse::<i64>() {
                Ok(numeric) => numeric.into(),
                Err(_) => id.into(),
            }),
            approved: args.approved,
            featured: args.featured,
            kind: args.kind.clone(),
            tags: args.tags.clone(),
            limit: args.limit,
            offset: args.offset,
            page: args.page,
            search_query: args.search.clone(),
            extra: Default::default(),
        })
    }
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub overrides: ClientOverrides,

    #[arg(value_enum, value_name = "RESOURCE")]
    pub resource: ResourceArg,

    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    #[arg(value_enum, value_name = "RESOURCE")]
    pub resource: ResourceArg,

    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SessionArgs {
    #[command(flatten)]
    pub overrides: ClientOverrides,
}
