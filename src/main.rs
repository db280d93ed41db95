// ==========================================
// 客户关系管理工具 - 命令行入口
// ==========================================
// 子命令: import / preview / template / history / customers
// 输出: 默认本地化文本, --json 输出机器可读 JSON（日志写 stderr）
// ==========================================

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ppop_crm::api::{ApiResponse, ImportApi};
use ppop_crm::config::FileSettingsProvider;
use ppop_crm::domain::ColumnMapping;
use ppop_crm::importer::report::{
    render_history, render_import_report, render_preview, render_template,
};
use ppop_crm::importer::MappingStrategy;
use ppop_crm::{i18n, logging};
use serde::Serialize;
use std::path::PathBuf;

/// 默认数据库文件名（与设置文件同目录）
const DEFAULT_DB_FILE_NAME: &str = "crm.db";

#[derive(Parser)]
#[command(name = "ppop-crm")]
#[command(about = "PPOP CRM - customer spreadsheet import")]
#[command(version)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Settings file path (default: $APP_DATA_PATH/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Output language (en, ko)
    #[arg(long, global = true, default_value = "en")]
    locale: String,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import customers from a CSV or Excel file
    Import {
        /// Input file
        file: PathBuf,

        /// Header that holds the customer name
        #[arg(long)]
        name_column: Option<String>,

        /// Header that holds the email address
        #[arg(long)]
        email_column: Option<String>,

        /// Header that holds the phone number
        #[arg(long)]
        phone_column: Option<String>,

        /// Column mapping strategy (heuristic, inference)
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Preview a file and the detected column mapping without importing
    Preview {
        /// Input file
        file: PathBuf,

        /// Column mapping strategy (heuristic, inference)
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Show the expected import template
    Template,

    /// Show recent import batches
    History {
        /// Number of batches to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List imported customers
    Customers {
        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        page_size: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    i18n::set_locale(&cli.locale);

    let provider = match &cli.settings {
        Some(path) => FileSettingsProvider::new(path),
        None => FileSettingsProvider::from_default_location()?,
    };
    let mut settings = provider
        .load()
        .with_context(|| format!("无法加载设置: {}", provider.path().display()))?;

    let strategy = match &cli.command {
        Commands::Import { strategy, .. } | Commands::Preview { strategy, .. } => strategy.as_deref(),
        _ => None,
    };
    if let Some(raw) = strategy {
        settings.import.mapping_strategy = MappingStrategy::parse(raw)
            .ok_or_else(|| anyhow!("unknown mapping strategy: {}", raw))?;
    }

    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => provider
            .path()
            .parent()
            .map(|dir| dir.join(DEFAULT_DB_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE_NAME)),
    };
    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("无法创建数据目录: {}", dir.display()))?;
    }
    let db_path = db_path.to_string_lossy().to_string();

    tracing::info!(version = ppop_crm::VERSION, db = %db_path, "{} 启动", ppop_crm::APP_NAME);
    let api = ImportApi::new(&db_path, settings)?;

    match cli.command {
        Commands::Import {
            file,
            name_column,
            email_column,
            phone_column,
            ..
        } => {
            let explicit = explicit_mapping(name_column, email_column, phone_column);
            let result = api.import_path(&file, explicit).await;
            if cli.json {
                return print_json(&ApiResponse::from(result));
            }
            let outcome = result?;
            println!(
                "{}",
                render_import_report(&outcome.result, Some(&outcome.mapping))
            );
        }
        Commands::Preview { file, .. } => {
            let preview = api.preview_path(&file).await;
            if cli.json {
                return print_json(&preview);
            }
            match preview.error.as_deref() {
                Some(err) => return Err(anyhow!("{}", err)),
                None => println!("{}", render_preview(&preview, &file.display().to_string())),
            }
        }
        Commands::Template => {
            let template = api.import_template();
            if cli.json {
                return print_json(&ApiResponse::ok(template));
            }
            println!("{}", render_template(&template));
        }
        Commands::History { limit } => {
            let batches = api.recent_batches(limit).await?;
            if cli.json {
                return print_json(&ApiResponse::ok(batches));
            }
            println!("{}", render_history(&batches));
        }
        Commands::Customers { page, page_size } => {
            let customers = api.list_customers(page, page_size).await?;
            print_json(&ApiResponse::ok(customers))?;
        }
    }

    Ok(())
}

/// 任一列参数存在时构造显式映射
fn explicit_mapping(
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
) -> Option<ColumnMapping> {
    if name.is_none() && email.is_none() && phone.is_none() {
        return None;
    }
    Some(ColumnMapping { name, email, phone })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
