use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::http::{RetryPolicy, get_json_text};

/// What the player needs to know about an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Episode {
    pub(crate) title: String,
    pub(crate) members: String,
    pub(crate) thumbnail_url: String,
    pub(crate) duration_seconds: u64,
    pub(crate) media_url: String,
}

/// A row of the episode list: the playable part plus list-only fields.
#[derive(Debug, Clone)]
pub(crate) struct EpisodeSummary {
    pub(crate) id: String,
    pub(crate) published_at: String,
    pub(crate) description: String,
    pub(crate) episode: Episode,
}

#[derive(Debug, Default)]
pub(crate) struct EpisodeParseOutcome {
    pub(crate) episodes: Vec<EpisodeSummary>,
    pub(crate) warnings: Vec<String>,
}

/// Number of entries shown as latest releases; the rest form the full list.
pub(crate) const LATEST_RELEASES: usize = 2;

pub(crate) fn fetch_episodes(api_url: &str, limit: u32) -> Result<EpisodeParseOutcome> {
    let url = format!("{}/episodes", api_url.trim_end_matches('/'));
    let query = [
        ("_limit", limit.to_string()),
        ("_sort", "published_at".to_string()),
        ("_order", "desc".to_string()),
    ];
    let body = get_json_text(&url, &query, RetryPolicy::default())
        .with_context(|| format!("failed to fetch episodes from {url}"))?;
    parse_episodes(&body)
}

pub(crate) fn parse_episodes(raw: &str) -> Result<EpisodeParseOutcome> {
    let value: Value = serde_json::from_str(raw).context("episode payload is not valid JSON")?;
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("episode payload is not a JSON array"))?;

    let mut outcome = EpisodeParseOutcome::default();
    for (position, item) in items.iter().enumerate() {
        match parse_episode_record(item) {
            Some(summary) => outcome.episodes.push(summary),
            None => outcome
                .warnings
                .push(format!("skipped malformed episode record #{}", position + 1)),
        }
    }
    Ok(outcome)
}

fn parse_episode_record(item: &Value) -> Option<EpisodeSummary> {
    let title = string_field(item, "/title")?;
    let media_url = string_field(item, "/file/url")?;
    if title.is_empty() || media_url.is_empty() {
        return None;
    }

    let id = match item.get("id") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    };

    Some(EpisodeSummary {
        id,
        published_at: string_field(item, "/published_at").unwrap_or_default(),
        description: string_field(item, "/description").unwrap_or_default(),
        episode: Episode {
            title,
            members: string_field(item, "/members").unwrap_or_default(),
            thumbnail_url: string_field(item, "/thumbnail").unwrap_or_default(),
            duration_seconds: item
                .pointer("/file/duration")
                .and_then(duration_from_value)
                .unwrap_or(0),
            media_url,
        },
    })
}

fn string_field(item: &Value, pointer: &str) -> Option<String> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .map(|text| text.trim().to_string())
}

fn duration_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// The queue the list page plays from: every fetched episode, in list order.
pub(crate) fn playable_queue(summaries: &[EpisodeSummary]) -> Vec<Episode> {
    summaries
        .iter()
        .map(|summary| summary.episode.clone())
        .collect()
}

pub(crate) fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub(crate) fn format_published_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.format("%-d %b %y").to_string();
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%-d %b %y").to_string())
        .unwrap_or_else(|_| trimmed.to_string())
}

pub(crate) fn format_listened_at(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

/// Drops markup from the HTML descriptions the API serves.
pub(crate) fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
