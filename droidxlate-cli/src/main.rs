use clap::{Args as ClapArgs, Parser, Subcommand};
use droidxlate::{CancelFlag, RunStatus};
use droidxlate_cli::{
    check::run_check_command,
    config::Overrides,
    project::ProjectOptions,
    translate::{TranslateOptions, run_translate_command},
};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log every scanned file and per-item detail
    #[arg(long, global = true)]
    log_trace: bool,

    #[command(subcommand)]
    commands: Commands,
}

/// Options shared by `check` and `translate`.
#[derive(ClapArgs, Debug)]
struct ProjectArgs {
    /// Project roots to scan (defaults to the current directory)
    #[arg(default_value = ".")]
    paths: Vec<String>,

    /// Config file (defaults to ./droidxlate.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Folder names or glob patterns to skip, comma separated
    #[arg(long, value_delimiter = ',')]
    ignore_folders: Option<Vec<String>>,

    /// Do not honour .gitignore files
    #[arg(long)]
    no_gitignore: bool,

    /// Only process these locales (Android qualifiers or BCP 47 tags), comma separated
    #[arg(short, long, value_delimiter = ',')]
    locales: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl ProjectArgs {
    fn into_options(self, overrides: Overrides) -> (ProjectOptions, bool) {
        let overrides = Overrides {
            ignore_folders: self.ignore_folders,
            no_gitignore: self.no_gitignore,
            ..overrides
        };
        let options = ProjectOptions {
            roots: self.paths,
            config: self.config,
            overrides,
            locales: self.locales,
        };
        (options, self.json)
    }
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Report missing translations without translating anything.
    Check {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Translate missing entries and merge them into the target files.
    Translate {
        #[command(flatten)]
        project: ProjectArgs,

        /// LLM provider: openai or openrouter
        #[arg(long)]
        provider: Option<String>,

        /// Model identifier
        #[arg(short, long)]
        model: Option<String>,

        /// API key (defaults to OPENAI_API_KEY or OPENROUTER_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Short description of the app, passed to the translator
        #[arg(long)]
        project_context: Option<String>,

        /// Maximum items per request
        #[arg(long)]
        batch_size: Option<i64>,

        /// Files translated at once
        #[arg(long)]
        concurrency: Option<i64>,

        /// Maximum existing translations sent as examples (0 disables)
        #[arg(long)]
        reference_context_limit: Option<i64>,

        /// Do not send existing translations as examples
        #[arg(long)]
        no_reference_context: bool,

        /// Stop sending requests after this many
        #[arg(long)]
        request_budget: Option<i64>,

        /// Report what is missing without translating or writing
        #[arg(long)]
        dry_run: bool,

        /// Write the markdown report to this file
        #[arg(long)]
        report: Option<String>,

        /// Review every translation before it is written
        #[arg(short, long)]
        interactive: bool,

        /// Site URL sent to OpenRouter as HTTP-Referer
        #[arg(long)]
        openrouter_site_url: Option<String>,

        /// Site name sent to OpenRouter as X-Title
        #[arg(long)]
        openrouter_site_name: Option<String>,

        /// Send the site URL and name to OpenRouter
        #[arg(long, overrides_with = "no_openrouter_send_site_info")]
        openrouter_send_site_info: bool,

        /// Do not send the site URL and name to OpenRouter
        #[arg(long, overrides_with = "openrouter_send_site_info")]
        no_openrouter_send_site_info: bool,
    },
}

fn init_tracing(log_trace: bool) {
    let level = if log_trace { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},reqwest=warn,hyper=warn", level)));

    fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_trace);

    let result = match args.commands {
        Commands::Check { project } => {
            let (options, json) = project.into_options(Overrides::default());
            run_check_command(&options, json)
        }
        Commands::Translate {
            project,
            provider,
            model,
            api_key,
            project_context,
            batch_size,
            concurrency,
            reference_context_limit,
            no_reference_context,
            request_budget,
            dry_run,
            report,
            interactive,
            openrouter_site_url,
            openrouter_site_name,
            openrouter_send_site_info,
            no_openrouter_send_site_info,
        } => {
            let send_site_info = if no_openrouter_send_site_info {
                Some(false)
            } else if openrouter_send_site_info {
                Some(true)
            } else {
                None
            };
            let overrides = Overrides {
                provider,
                model,
                api_key,
                project_context,
                no_reference_context,
                reference_context_limit,
                max_batch_size: batch_size,
                concurrency,
                request_budget,
                openrouter_site_url,
                openrouter_site_name,
                openrouter_send_site_info: send_site_info,
                ..Overrides::default()
            };
            let (project, json) = project.into_options(overrides);
            let options = TranslateOptions {
                project,
                dry_run,
                json,
                report_file: report,
                interactive,
            };

            let cancel = CancelFlag::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted; finishing files in progress");
                    on_signal.cancel();
                }
            });
            run_translate_command(&options, cancel).await
        }
    };

    let status = match result {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {}", e);
            RunStatus::Fatal
        }
    };
    std::process::exit(status.exit_code());
}
