mod cache;
mod collector;
mod display;
mod export;
mod flatfile;
mod master;
mod models;
mod postings;
mod ranking;
mod sitemap;

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use collector::{CollectorConfig, HttpPageSource};
use models::Posting;
use postings::PostingRepository;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "escal")]
#[command(about = "Entry-sheet deadline calendar - scrape the market-cap ranking and browse postings")]
struct Cli {
    /// Directory holding postings.csv and the tag/industry/benefit masters
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the market-cap ranking into a CSV file
    Scrape {
        /// Ranking URL, may contain a {page} placeholder
        #[arg(long, default_value = collector::DEFAULT_BASE_URL)]
        base_url: String,

        /// Number of companies to collect
        #[arg(short, long, default_value = "200")]
        target: usize,

        /// Companies listed per ranking page
        #[arg(long, default_value = "30")]
        per_page: usize,

        /// Pause between page requests, in milliseconds
        #[arg(long, default_value = "1000")]
        delay_ms: u64,

        /// Output CSV path
        #[arg(short, long, default_value = "output/popular_companies.csv")]
        output: PathBuf,
    },

    /// List postings, earliest deadline first
    List {
        /// Only postings carrying this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show posting details
    Show {
        /// Posting ID
        id: String,
    },

    /// List every tag in use
    Tags,

    /// List every industry in use
    Industries,

    /// List every benefit in use
    Benefits,

    /// Print the XML sitemap for the posting pages
    Sitemap {
        /// Public site URL
        #[arg(long, default_value = sitemap::DEFAULT_SITE_URL)]
        site_url: String,

        /// Print robots.txt instead
        #[arg(long)]
        robots: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .unwrap_or_else(PostingRepository::default_data_dir);

    match cli.command {
        Commands::Scrape {
            base_url,
            target,
            per_page,
            delay_ms,
            output,
        } => {
            let config = CollectorConfig {
                base_url,
                target_count: target,
                per_page,
                delay: Duration::from_millis(delay_ms),
            };

            let source = HttpPageSource::new(config.clone())?;
            let (companies, stats) = collector::collect(&source, &config, std::thread::sleep)?;

            println!(
                "Scraped {} companies ({} pages ok, {} failed{})",
                companies.len(),
                stats.pages_fetched,
                stats.pages_failed,
                if stats.stopped_early { ", stopped early" } else { "" }
            );

            export::export_companies(&companies, &output)?;
            println!("Exported to {}", output.display());
        }

        Commands::List { tag, json } => {
            let repo = PostingRepository::open(&data_dir);
            let postings = postings::filter_by_tag(repo.all()?, tag.as_deref());

            if json {
                println!("{}", serde_json::to_string_pretty(&postings)?);
            } else if postings.is_empty() {
                println!("No postings found.");
            } else {
                let today = Local::now().date_naive();
                println!(
                    "{:<8} {:<10} {:<6} {:<24} {:<28} {:<12}",
                    "ID", "DEADLINE", "TIME", "COMPANY", "TITLE", "STATUS"
                );
                println!("{}", "-".repeat(92));
                for posting in postings {
                    let days = posting.days_until_deadline(today);
                    println!(
                        "{:<8} {:<10} {:<6} {:<24} {:<28} {:<12}",
                        truncate(&posting.id, 8),
                        display::format_date_short(posting.deadline_date),
                        posting.deadline_time_text(),
                        truncate(&posting.company_name, 22),
                        truncate(&posting.posting_title, 26),
                        posting.urgency(today).label(days)
                    );
                }
            }
        }

        Commands::Show { id } => {
            let repo = PostingRepository::open(&data_dir);
            match repo.get(&id)? {
                Some(posting) => {
                    print_posting(posting);
                    let related = repo.by_company(&posting.company_name, &posting.id)?;
                    if !related.is_empty() {
                        println!("\n{}の他の募集:", posting.company_name);
                        for other in related {
                            println!(
                                "  #{} - {} (締切: {})",
                                other.id,
                                other.posting_title,
                                display::format_date_long(other.deadline_date)
                            );
                        }
                    }
                }
                None => {
                    return Err(anyhow!("Posting '{}' not found.", id));
                }
            }
        }

        Commands::Tags => print_values(&PostingRepository::open(&data_dir).tags()?, "tags"),

        Commands::Industries => {
            print_values(&PostingRepository::open(&data_dir).industries()?, "industries")
        }

        Commands::Benefits => {
            print_values(&PostingRepository::open(&data_dir).benefits()?, "benefits")
        }

        Commands::Sitemap { site_url, robots } => {
            if robots {
                print!("{}", sitemap::render_robots(&site_url));
            } else {
                let repo = PostingRepository::open(&data_dir);
                let today = Local::now().date_naive();
                let xml = sitemap::render_sitemap(&site_url, repo.all()?, today)?;
                println!("{}", xml);
            }
        }
    }

    Ok(())
}

fn print_posting(posting: &Posting) {
    let now = Local::now().fixed_offset();
    let today = now.date_naive();
    let days = posting.days_until_deadline(today);

    println!("{} {}", posting.company_name, posting.posting_title);
    match &posting.target_year {
        Some(year) => println!("{} / {}", posting.event_type, year),
        None => println!("{}", posting.event_type),
    }

    let time = posting.deadline_time_text();
    println!(
        "\n締切: {}{} [{}]",
        display::format_date_long(posting.deadline_date),
        if time.is_empty() { String::new() } else { format!(" {}まで", time) },
        posting.urgency(today).label(days)
    );

    println!("\n--- 募集概要 ---");
    if !posting.industry.is_empty() {
        println!("業界: {}", posting.industry);
    }
    if !posting.job_type.is_empty() {
        println!("職種: {}", posting.job_type);
    }

    println!("\n--- 待遇 ---");
    println!("初任給: {}", display::format_salary(posting.salary));
    println!("賞与: {}", display::format_bonus(posting.has_bonus));
    if !posting.salary_notes.is_empty() {
        println!("備考: {}", posting.salary_notes);
    }

    println!("\n--- 働き方 ---");
    println!("転勤: {}", posting.transfer_type.as_str());
    println!("年間有給: {}日", posting.annual_paid_leave_days);
    if !posting.benefits.is_empty() {
        println!("福利厚生: {}", posting.benefits.join(", "));
    }

    if !posting.tags.is_empty() {
        println!("\nタグ: {}", posting.tags.join(", "));
    }

    println!("\n出典: {}", posting.official_url);
    println!(
        "最終確認: {}",
        display::format_verified_at(posting.last_verified_at, now)
    );
}

fn print_values(values: &[String], what: &str) {
    if values.is_empty() {
        println!("No {} found.", what);
    } else {
        for value in values {
            println!("{}", value);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
