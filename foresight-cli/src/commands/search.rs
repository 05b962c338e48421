//! `foresight search` command handler

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::info;

use foresight_core::config::ForesightConfig;
use foresight_core::types::LogLevel;
use foresight_log_search::{LogItem, SearchConfig, SearchManager, SearchQuery};

use crate::cli::SearchArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `search` command: open one session, drain it up to `limit`, close it.
pub async fn execute(
    args: SearchArgs,
    config: &ForesightConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let query = build_query(&args)?;
    let manager = SearchManager::new(SearchConfig::from_core(&config.search))?;
    let report = collect(&manager, &args.dir, query, args.limit).await;
    manager.shutdown().await;
    writer.render(&report?)
}

async fn collect(
    manager: &SearchManager,
    dir: &Path,
    query: SearchQuery,
    limit: usize,
) -> Result<SearchReport, CliError> {
    let session = manager
        .search(dir, query, "")
        .await?
        .ok_or_else(|| CliError::Command("search session was not created".to_owned()))?;
    info!(dir = %dir.display(), token = session.token(), "searching");

    let mut items = Vec::new();
    let mut truncated = false;
    while let Some(item) = session.next().await? {
        if limit > 0 && items.len() == limit {
            truncated = true;
            break;
        }
        items.push(item);
    }

    Ok(SearchReport {
        dir: dir.display().to_string(),
        returned: items.len(),
        truncated,
        items,
    })
}

fn build_query(args: &SearchArgs) -> Result<SearchQuery, CliError> {
    let mut query = SearchQuery::new(args.text.as_str());
    if let Some(level) = &args.level {
        let level = LogLevel::from_str_loose(level)
            .ok_or_else(|| CliError::Command(format!("unknown log level: {level}")))?;
        query = query.with_min_level(level);
    }
    if let Some(begin) = &args.begin {
        query = query.with_begin(parse_bound("begin", begin)?);
    }
    if let Some(end) = &args.end {
        query = query.with_end(parse_bound("end", end)?);
    }
    Ok(query)
}

fn parse_bound(name: &str, value: &str) -> Result<DateTime<FixedOffset>, CliError> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| CliError::Command(format!("invalid --{name} '{value}': {e}")))
}

#[derive(Serialize)]
pub struct SearchReport {
    pub dir: String,
    pub returned: usize,
    /// More items matched than `--limit` allowed.
    pub truncated: bool,
    pub items: Vec<LogItem>,
}

impl Render for SearchReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for item in &self.items {
            let time = item
                .time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f %:z").to_string())
                .unwrap_or_else(|| "-".to_owned());
            let level = match item.level {
                Some(LogLevel::Error | LogLevel::Fatal) => item_level(item).red(),
                Some(LogLevel::Warn) => item_level(item).yellow(),
                _ => item_level(item).normal(),
            };
            writeln!(
                w,
                "{} {:<5} {}:{} {} {}",
                time.dimmed(),
                level,
                item.host,
                item.port,
                item.component,
                String::from_utf8_lossy(item.body())
            )?;
        }

        let footer = format!("{} items from {}", self.returned, self.dir);
        if self.truncated {
            writeln!(w, "{} (truncated, raise --limit to see more)", footer.bold())?;
        } else {
            writeln!(w, "{}", footer.bold())?;
        }
        Ok(())
    }
}

fn item_level(item: &LogItem) -> String {
    item.level.map_or_else(|| "-".to_owned(), |l| l.to_string())
}
