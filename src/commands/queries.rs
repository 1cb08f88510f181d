//! Registered query inspection.

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use dataquery_core::config::AppConfig;
use dataquery_core::error::AppError;
use dataquery_core::types::{Dialect, PageRequest, QueryMode, Sort};
use dataquery_database::repositories::Repositories;
use dataquery_query::Params;

/// Arguments for query commands
#[derive(Debug, Args)]
pub struct QueriesArgs {
    /// Query subcommand
    #[command(subcommand)]
    pub command: QueriesCommand,
}

/// Execution mode for `explain`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    List,
    Page,
    Slice,
}

impl From<ModeArg> for QueryMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::List => QueryMode::List,
            ModeArg::Page => QueryMode::Page,
            ModeArg::Slice => QueryMode::Slice,
        }
    }
}

/// Query subcommands
#[derive(Debug, Subcommand)]
pub enum QueriesCommand {
    /// Build every repository and report descriptor errors
    Validate,
    /// Print the SQL a member query compiles to
    Explain {
        /// Registered query name, e.g. `findByUsernameAndAgeGreaterThan`
        name: String,
        /// Execution mode
        #[arg(long, value_enum, default_value = "list")]
        mode: ModeArg,
        /// Page number
        #[arg(long)]
        page: Option<u64>,
        /// Page size
        #[arg(long)]
        size: Option<u64>,
        /// Sort as `field[,asc|desc]`; repeatable
        #[arg(long)]
        sort: Vec<String>,
    },
}

/// Registered query display row
#[derive(Debug, Serialize, Tabled)]
struct QueryRow {
    /// Entity
    entity: String,
    /// Query name
    name: String,
}

/// Execute query commands
pub async fn execute(
    args: &QueriesArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let repositories = Repositories::build(&config.query)?;

    match &args.command {
        QueriesCommand::Validate => {
            let members = repositories.members.repository();
            let teams = repositories.teams.repository();
            let rows: Vec<QueryRow> = members
                .query_names()
                .into_iter()
                .map(|name| (members.schema().entity, name))
                .chain(
                    teams
                        .query_names()
                        .into_iter()
                        .map(|name| (teams.schema().entity, name)),
                )
                .map(|(entity, name)| QueryRow {
                    entity: entity.to_string(),
                    name: name.to_string(),
                })
                .collect();
            output::print_rows(&rows, &rows, format);
            if format == OutputFormat::Table {
                output::print_success(&format!("{} queries validated.", rows.len()));
            }
        }
        QueriesCommand::Explain {
            name,
            mode,
            page,
            size,
            sort,
        } => {
            let sort = Sort::parse(sort)?;
            let request = if page.is_some() || size.is_some() || !sort.is_unsorted() {
                Some(PageRequest::from_params(*page, *size, sort, &config.query)?)
            } else {
                None
            };
            let explained = repositories.members.repository().explain(
                name,
                Dialect::Postgres,
                (*mode).into(),
                request.as_ref(),
                &Params::new(),
            )?;
            match format {
                OutputFormat::Table => {
                    output::print_kv("sql", &explained.sql);
                    if let Some(count_sql) = &explained.count_sql {
                        output::print_kv("count sql", count_sql);
                    }
                }
                OutputFormat::Json => output::print_json(&explained),
            }
        }
    }

    Ok(())
}
