//! Member read commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use dataquery_core::config::AppConfig;
use dataquery_core::error::AppError;
use dataquery_core::types::{PageRequest, PageResult, Sort};
use dataquery_entity::{Member, MemberDto};
use dataquery_query::Session;

/// Page size used by `members list` when none is given.
const DEFAULT_LIST_SIZE: u64 = 5;

/// Arguments for member commands
#[derive(Debug, Args)]
pub struct MembersArgs {
    /// Member subcommand
    #[command(subcommand)]
    pub command: MembersCommand,
}

/// Member subcommands
#[derive(Debug, Subcommand)]
pub enum MembersCommand {
    /// Show one member's username
    Get {
        /// Member id
        id: i64,
    },
    /// List members one page at a time
    List {
        /// Page number
        #[arg(long)]
        page: Option<u64>,
        /// Page size
        #[arg(long, default_value_t = DEFAULT_LIST_SIZE)]
        size: u64,
        /// Sort as `field[,asc|desc]`; repeatable
        #[arg(long)]
        sort: Vec<String>,
        /// Print member DTOs instead of members
        #[arg(long)]
        dto: bool,
    },
}

/// Member display row for table output
#[derive(Debug, Serialize, Tabled)]
struct MemberRow {
    /// Member ID
    id: i64,
    /// Username
    username: String,
    /// Age
    age: i32,
    /// Team name
    team: String,
}

impl From<&Member> for MemberRow {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.unwrap_or_default(),
            username: member.username.clone(),
            age: member.age,
            team: member.team().map(|t| t.name.clone()).unwrap_or_else(|| "-".into()),
        }
    }
}

/// DTO display row for table output
#[derive(Debug, Serialize, Tabled)]
struct DtoRow {
    /// Member ID
    id: i64,
    /// Username
    username: String,
    /// Team name
    team_name: String,
}

impl From<&MemberDto> for DtoRow {
    fn from(dto: &MemberDto) -> Self {
        Self {
            id: dto.id,
            username: dto.username.clone(),
            team_name: dto.team_name.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

/// Execute member commands
pub async fn execute(
    args: &MembersArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let backend = super::open_backend(config, true).await?;
    let members = backend.repositories.members.repository();
    let mut session = Session::open(backend.store.as_ref()).await?;

    match &args.command {
        MembersCommand::Get { id } => {
            let member = members
                .find_by_id(&mut session, *id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Member {id} does not exist")))?;
            match format {
                OutputFormat::Table => output::print_kv("username", &member.username),
                OutputFormat::Json => output::print_json(&member.username),
            }
        }
        MembersCommand::List {
            page,
            size,
            sort,
            dto,
        } => {
            let request =
                PageRequest::from_params(*page, Some(*size), Sort::parse(sort)?, &config.query)?;
            let result = members.find_all_paged(&mut session, &request).await?;
            if *dto {
                let result: PageResult<MemberDto> = result.map(|m| MemberDto::from(&m));
                let rows: Vec<DtoRow> = result.content.iter().map(DtoRow::from).collect();
                output::print_rows(&rows, &result, format);
                print_page_footer(&result, format);
            } else {
                let rows: Vec<MemberRow> = result.content.iter().map(MemberRow::from).collect();
                output::print_rows(&rows, &result, format);
                print_page_footer(&result, format);
            }
        }
    }

    Ok(())
}

fn print_page_footer<T>(page: &PageResult<T>, format: OutputFormat) {
    if format != OutputFormat::Table {
        return;
    }
    output::print_kv("page", &format!("{} (size {})", page.page, page.size));
    if let (Some(total), Some(pages)) = (page.total_elements, page.total_pages) {
        output::print_kv("total", &format!("{total} in {pages} pages"));
    }
    output::print_kv("has next", &page.has_next.to_string());
}
