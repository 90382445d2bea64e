use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notedown::{
    Config, GeminiClient, Note, NotionClient, PageFetcher, recap_to_html, summarize_page,
    weekly_recap,
};

#[derive(Parser)]
#[command(name = "notedown")]
#[command(about = "Summarize web pages with Gemini and keep the notes in Notion")]
struct Cli {
    /// Config file (defaults to <config dir>/notedown/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output; repeat for debug and trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a Markdown file to blocks and print them as JSON
    Convert {
        /// Input Markdown file
        input: PathBuf,

        /// Emit Notion API block objects instead of the block model
        #[arg(long)]
        notion: bool,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a web page into a Markdown file
    Summarize {
        url: String,

        /// Output file (defaults to <date>-<title>.md in the configured output dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also save the summary to Notion
        #[arg(long)]
        save: bool,

        /// Tags for the Notion page, replacing the suggested ones
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Save a Markdown file as a Notion page
    Save {
        input: PathBuf,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        url: String,

        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Recap the notes saved in the past week
    Recap {
        /// Write the recap Markdown here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also render the recap to an HTML page
        #[arg(long)]
        html: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli
        .config
        .or_else(Config::default_path)
        .map(|path| Config::load(&path))
        .unwrap_or_default()
        .with_env();

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "notedown=warn",
        1 => "notedown=info",
        2 => "notedown=debug",
        _ => "notedown=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Command, config: &Config) -> notedown::Result<()> {
    match command {
        Command::Convert {
            input,
            notion,
            output,
        } => {
            let markdown = fs::read_to_string(&input)?;
            let json = if notion {
                serde_json::to_string_pretty(&notedown::markdown_to_notion(&markdown))?
            } else {
                serde_json::to_string_pretty(&notedown::parse(&markdown))?
            };
            write_or_print(output.as_deref(), &json)
        }

        Command::Summarize {
            url,
            output,
            save,
            tags,
        } => {
            let page = PageFetcher::new(&config.summary.user_agent)?
                .fetch(&url)
                .await?;
            info!(title = %page.title, source = %page.source_info, "extracted page");

            let gemini = GeminiClient::new(config.gemini_api_key()?, &config.gemini)?;
            let today = Local::now().date_naive();
            let summary = summarize_page(
                &gemini,
                &page,
                &url,
                today,
                config.gemini.max_content_chars,
            )
            .await?;

            let path = output.unwrap_or_else(|| match &config.summary.output_dir {
                Some(dir) => dir.join(summary.filename()),
                None => PathBuf::from(summary.filename()),
            });
            fs::write(&path, &summary.markdown)?;
            println!("Created {}", path.display());

            if save {
                let tags = clean_tags(tags);
                let note = Note {
                    title: summary.title.clone(),
                    url: summary.url.clone(),
                    tags: if tags.is_empty() { summary.tags.clone() } else { tags },
                    date: summary.date,
                };
                save_to_notion(config, &note, &summary.markdown).await?;
            }
            Ok(())
        }

        Command::Save {
            input,
            title,
            url,
            tags,
        } => {
            let markdown = fs::read_to_string(&input)?;
            let note = Note {
                title,
                url,
                tags: clean_tags(tags),
                date: Local::now().date_naive(),
            };
            save_to_notion(config, &note, &markdown).await
        }

        Command::Recap { output, html } => {
            let notion = NotionClient::new(config.notion_api_key()?, &config.notion)?;
            let gemini = GeminiClient::new(config.gemini_api_key()?, &config.gemini)?;
            let recap = weekly_recap(
                &notion,
                &gemini,
                config.notion_database_id()?,
                config.recap.max_chars,
            )
            .await?;

            if let Some(path) = &html {
                fs::write(path, recap_to_html(&recap))?;
                println!("Created {}", path.display());
            }
            match output {
                Some(path) => write_or_print(Some(&path), &recap),
                None if html.is_none() => write_or_print(None, &recap),
                None => Ok(()),
            }
        }
    }
}

async fn save_to_notion(config: &Config, note: &Note, markdown: &str) -> notedown::Result<()> {
    let notion = NotionClient::new(config.notion_api_key()?, &config.notion)?;
    let outcome = notion
        .save_note(
            config.notion_database_id()?,
            note,
            markdown,
            config.notion.chunk_size,
        )
        .await?;

    if let Some(warning) = &outcome.warning {
        warn!(page_id = %outcome.page_id, "note saved partially");
        eprintln!("Warning: {}", warning);
    }
    println!("Saved to Notion page {}", outcome.page_id);
    Ok(())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn write_or_print(output: Option<&Path>, text: &str) -> notedown::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            println!("Created {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
