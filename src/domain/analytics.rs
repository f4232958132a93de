//! Owner analytics over the YouTube Analytics `reports` endpoint.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::clients::youtube::{AnalyticsQuery, ChannelApi};
use crate::domain::into_payload;
use crate::domain::utils::{analytics_window, number, round2};
use crate::errors::{ApiError, RegistryError};
use crate::mcp::registry::ToolRegistry;

pub const CHANNEL_METRICS: [&str; 10] = [
    "views",
    "estimatedMinutesWatched",
    "averageViewDuration",
    "averageViewPercentage",
    "subscribersGained",
    "subscribersLost",
    "likes",
    "dislikes",
    "comments",
    "shares",
];

pub const VIDEO_METRICS: [&str; 8] = [
    "views",
    "estimatedMinutesWatched",
    "averageViewDuration",
    "averageViewPercentage",
    "likes",
    "dislikes",
    "comments",
    "shares",
];

pub const COMPARISON_METRICS: [&str; 6] = [
    "views",
    "estimatedMinutesWatched",
    "likes",
    "comments",
    "shares",
    "subscribersGained",
];

const BREAKDOWN_METRICS: [&str; 2] = ["views", "estimatedMinutesWatched"];
const RETENTION_METRICS: [&str; 1] = ["audienceWatchRatio"];
const RANKED_METRICS: [&str; 4] = [
    "views",
    "watch_time_minutes",
    "engagement_rate",
    "subscribers_gained",
];
const TOP_TRAFFIC_SOURCES: usize = 10;
const TOP_COUNTRIES: u32 = 20;
const GROWTH_METRICS: [&str; 3] = ["views", "estimatedMinutesWatched", "subscribersGained"];
const GROWTH_WINDOW: usize = 7;
const MIN_TREND_DAYS: usize = 3;

type DailyRow = Map<String, Value>;

#[macros::mcp_tool(
    name = "get_channel_analytics",
    description = "Get detailed analytics for your YouTube channel"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetChannelAnalyticsTool {
    /// Reporting window in days (default 30, at most 365)
    pub days: Option<u32>,
}

#[macros::mcp_tool(
    name = "get_video_analytics",
    description = "Get detailed analytics for a specific video"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetVideoAnalyticsTool {
    pub video_id: String,
    /// Reporting window in days (default 30, at most 365)
    pub days: Option<u32>,
}

#[macros::mcp_tool(
    name = "analyze_audience_insights",
    description = "Analyze audience demographics, countries and devices for your channel"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct AnalyzeAudienceInsightsTool {
    /// Reporting window in days (default 30, at most 365)
    pub days: Option<u32>,
}

#[macros::mcp_tool(
    name = "compare_video_performance",
    description = "Compare performance metrics between multiple videos"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CompareVideoPerformanceTool {
    /// Comma-separated video IDs, at least two
    pub video_ids: String,
    /// Reporting window in days (default 30, at most 365)
    pub days: Option<u32>,
}

fn metric(row: &DailyRow, name: &str) -> f64 {
    row.get(name).and_then(Value::as_f64).unwrap_or(0.0)
}

fn average(rows: &[DailyRow], name: &str) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|row| metric(row, name)).sum::<f64>() / rows.len() as f64
}

/// Zips `columnHeaders` with each row; the `day` column becomes `date`.
pub fn daily_rows(report: &Value) -> Vec<DailyRow> {
    let headers: Vec<&str> = report
        .get("columnHeaders")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|header| header.get("name").and_then(Value::as_str).unwrap_or_default())
        .collect();

    report
        .get("rows")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .map(|cells| {
            headers
                .iter()
                .zip(cells)
                .map(|(name, cell)| {
                    let key = if *name == "day" { "date" } else { *name };
                    (key.to_string(), cell.clone())
                })
                .collect()
        })
        .collect()
}

pub fn period_stats(rows: &[DailyRow], metrics: &[&str]) -> Value {
    let mut stats = Map::new();
    if rows.is_empty() {
        return Value::Object(stats);
    }

    for name in metrics {
        let values: Vec<f64> = rows.iter().map(|row| metric(row, name)).collect();
        let total: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        stats.insert(
            name.to_string(),
            json!({
                "total": number(total),
                "average": number(total / values.len() as f64),
                "min": number(min),
                "max": number(max),
            }),
        );
    }
    Value::Object(stats)
}

/// Percent change between the first and last week, or between the two
/// halves when the window is shorter than two weeks' worth of rows.
pub fn growth_rates(rows: &[DailyRow]) -> Value {
    let mut rates = Map::new();
    if rows.len() < 2 {
        return Value::Object(rates);
    }

    let (first, last) = if rows.len() >= GROWTH_WINDOW {
        (&rows[..GROWTH_WINDOW], &rows[rows.len() - GROWTH_WINDOW..])
    } else {
        rows.split_at(rows.len() / 2)
    };

    for name in GROWTH_METRICS {
        let first_avg = average(first, name);
        let last_avg = average(last, name);
        if first_avg > 0.0 {
            let rate = (last_avg - first_avg) / first_avg * 100.0;
            rates.insert(format!("{name}_growth"), json!(round2(rate)));
        }
    }
    Value::Object(rates)
}

pub fn best_day(rows: &[DailyRow]) -> Value {
    let mut best: Option<&DailyRow> = None;
    for row in rows {
        if best.map_or(true, |current| metric(row, "views") > metric(current, "views")) {
            best = Some(row);
        }
    }

    match best {
        Some(row) => json!({
            "date": row.get("date").cloned().unwrap_or(Value::Null),
            "views": number(metric(row, "views")),
            "watch_time_minutes": number(metric(row, "estimatedMinutesWatched")),
            "engagement": number(metric(row, "likes") + metric(row, "comments")),
        }),
        None => json!({}),
    }
}

pub fn view_trend(rows: &[DailyRow]) -> Value {
    if rows.len() < MIN_TREND_DAYS {
        return json!({"overall": "insufficient data"});
    }

    let (first, second) = rows.split_at(rows.len() / 2);
    let first_avg = average(first, "views");
    let second_avg = average(second, "views");
    let direction = if second_avg > first_avg * 1.1 {
        "rising"
    } else if second_avg < first_avg * 0.9 {
        "declining"
    } else {
        "flat"
    };
    json!({ "views": direction })
}

fn engagement_level(rate: f64) -> &'static str {
    if rate > 5.0 {
        "very high"
    } else if rate > 2.0 {
        "high"
    } else if rate > 1.0 {
        "standard"
    } else {
        "low"
    }
}

pub fn performance_summary(rows: &[DailyRow]) -> Value {
    let total = |name: &str| rows.iter().map(|row| metric(row, name)).sum::<f64>();
    let mut summary = Map::new();

    let views = total("views");
    if views > 0.0 {
        let rate = (total("likes") + total("comments")) / views * 100.0;
        summary.insert("engagement_rate".to_string(), json!(format!("{rate:.2}%")));
        summary.insert("engagement_level".to_string(), json!(engagement_level(rate)));
    }
    summary.insert(
        "average_view_duration".to_string(),
        json!(format!("{:.1}s", average(rows, "averageViewDuration"))),
    );
    summary.insert(
        "average_view_percentage".to_string(),
        json!(format!("{:.1}%", average(rows, "averageViewPercentage"))),
    );
    Value::Object(summary)
}

fn date_range(start: NaiveDate, end: NaiveDate) -> Value {
    json!({
        "start": start.format("%Y-%m-%d").to_string(),
        "end": end.format("%Y-%m-%d").to_string(),
    })
}

fn period(start: NaiveDate, end: NaiveDate, days: usize) -> Value {
    let mut range = date_range(start, end);
    if let Some(fields) = range.as_object_mut() {
        fields.insert("days".to_string(), json!(days));
    }
    range
}

/// Runs a breakdown report. A report the API rejects leaves its section
/// empty; credential and transport failures still fail the call.
async fn optional_report(api: &dyn ChannelApi, query: &AnalyticsQuery) -> Result<Option<Value>, ApiError> {
    match api.analytics_report(query).await {
        Ok(report) => Ok(Some(report)),
        Err(ApiError::Status { status, body, .. }) => {
            warn!(dimensions = ?query.dimensions, status, body = %body, "analytics breakdown unavailable");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn report_rows(report: Option<&Value>) -> Vec<&[Value]> {
    report
        .and_then(|report| report.get("rows"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .map(Vec::as_slice)
        .collect()
}

fn cell(cells: &[Value], index: usize) -> Value {
    cells.get(index).cloned().unwrap_or(Value::Null)
}

fn cell_f64(cells: &[Value], index: usize) -> f64 {
    cells.get(index).and_then(Value::as_f64).unwrap_or(0.0)
}

/// `[{<label>, views, watch_time_minutes}]` from a one-dimension report.
pub fn view_breakdown(report: Option<&Value>, label: &str) -> Vec<Value> {
    report_rows(report)
        .into_iter()
        .map(|cells| {
            let mut entry = Map::new();
            entry.insert(label.to_string(), cell(cells, 0));
            entry.insert("views".to_string(), cell(cells, 1));
            entry.insert("watch_time_minutes".to_string(), cell(cells, 2));
            Value::Object(entry)
        })
        .collect()
}

pub fn retention_analysis(report: Option<&Value>, totals: &Value) -> Value {
    let points: Vec<Value> = report_rows(report)
        .into_iter()
        .map(|cells| json!({"time_ratio": cell(cells, 0), "retention_ratio": cell(cells, 1)}))
        .collect();
    json!({
        "average_view_percentage": totals
            .pointer("/averageViewPercentage/average")
            .cloned()
            .unwrap_or(Value::Null),
        "retention_points": points,
    })
}

/// Device rows with each device's share of the total views.
pub fn device_shares(report: Option<&Value>) -> Vec<Value> {
    let rows = report_rows(report);
    let total: f64 = rows.iter().map(|cells| cell_f64(cells, 1)).sum();
    rows.into_iter()
        .map(|cells| {
            let share = if total > 0.0 {
                round2(cell_f64(cells, 1) / total * 100.0)
            } else {
                0.0
            };
            json!({
                "device": cell(cells, 0),
                "views": cell(cells, 1),
                "watch_time_minutes": cell(cells, 2),
                "percentage": share,
            })
        })
        .collect()
}

fn audience_summary(age_gender: &[Value], countries: &[Value], devices: &[Value]) -> Value {
    let primary = age_gender.first().map_or(Value::Null, |group| {
        json!(format!(
            "{} {}",
            group["age_group"].as_str().unwrap_or_default(),
            group["gender"].as_str().unwrap_or_default()
        ))
    });
    json!({
        "primary_audience": primary,
        "top_countries": countries.iter().take(3).map(|entry| entry["country"].clone()).collect::<Vec<_>>(),
        "preferred_devices": devices.iter().take(2).map(|entry| entry["device"].clone()).collect::<Vec<_>>(),
    })
}

pub fn parse_video_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Period totals of one video, keyed the way the comparison reports them.
pub fn comparison_entry(video_id: &str, report: &Value) -> Value {
    let Some(cells) = report_rows(Some(report)).into_iter().next() else {
        return json!({"video_id": video_id, "error": "no data for this period"});
    };
    let views = cell_f64(cells, 0);
    let engagement = if views > 0.0 {
        round2((cell_f64(cells, 2) + cell_f64(cells, 3)) / views * 100.0)
    } else {
        0.0
    };
    json!({
        "video_id": video_id,
        "views": number(views),
        "watch_time_minutes": number(cell_f64(cells, 1)),
        "likes": number(cell_f64(cells, 2)),
        "comments": number(cell_f64(cells, 3)),
        "shares": number(cell_f64(cells, 4)),
        "subscribers_gained": number(cell_f64(cells, 5)),
        "engagement_rate": engagement,
    })
}

fn usable(entries: &[Value]) -> Vec<&Value> {
    entries.iter().filter(|entry| entry.get("error").is_none()).collect()
}

/// Videos ordered best-first for each ranked metric.
pub fn performance_rankings(entries: &[Value]) -> Value {
    let mut rankings = Map::new();
    for name in RANKED_METRICS {
        let mut ranked: Vec<(&Value, f64)> = usable(entries)
            .into_iter()
            .filter_map(|entry| entry.get(name).and_then(Value::as_f64).map(|value| (entry, value)))
            .collect();
        if ranked.is_empty() {
            continue;
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let list: Vec<Value> = ranked
            .into_iter()
            .map(|(entry, _)| json!({"video_id": entry["video_id"], "value": entry[name]}))
            .collect();
        rankings.insert(name.to_string(), Value::Array(list));
    }
    Value::Object(rankings)
}

pub fn correlations(entries: &[Value]) -> Value {
    let valid = usable(entries);
    if valid.len() < 2 {
        return json!({"message": "not enough data for correlation analysis"});
    }

    fn long_watch(entry: &Value) -> bool {
        entry["watch_time_minutes"].as_f64().unwrap_or(0.0) > 1000.0
    }
    fn engaged(entry: &Value) -> bool {
        entry["engagement_rate"].as_f64().unwrap_or(0.0) > 2.0
    }

    let overlap = valid.iter().filter(|entry| long_watch(entry) && engaged(entry)).count();

    json!({
        "watch_time_engagement_correlation":
            if overlap as f64 > valid.len() as f64 / 3.0 { "positive" } else { "weak" },
        "high_performers": valid.iter().filter(|entry| long_watch(entry)).count(),
        "high_engagement_videos": valid.iter().filter(|entry| engaged(entry)).count(),
    })
}

pub fn best_practices(entries: &[Value], rankings: &Value) -> Vec<&'static str> {
    let mut practices = Vec::new();

    if let Some(top_id) = rankings.pointer("/views/0/video_id") {
        let top = entries.iter().find(|entry| &entry["video_id"] == top_id);
        if top.is_some_and(|entry| entry["engagement_rate"].as_f64().unwrap_or(0.0) > 3.0) {
            practices.push("The most viewed video also reaches high engagement");
        }
    }
    if rankings
        .pointer("/watch_time_minutes/0/value")
        .and_then(Value::as_f64)
        .is_some_and(|minutes| minutes > 5000.0)
    {
        practices.push("Videos that hold viewers for long watch times perform best");
    }

    if practices.is_empty() {
        practices.push("More data is needed");
    }
    practices
}

pub async fn channel_analytics(api: &dyn ChannelApi, days: Option<u32>, today: NaiveDate) -> Result<Value, ApiError> {
    let (start_date, end_date) = analytics_window(days, today)?;
    let channel = api.my_channel().await?;

    let report = api
        .analytics_report(&AnalyticsQuery::new(start_date, end_date, &CHANNEL_METRICS).by("day"))
        .await?;
    let rows = daily_rows(&report);

    Ok(json!({
        "channel_id": channel.get("id").cloned().unwrap_or(Value::Null),
        "period": period(start_date, end_date, rows.len()),
        "total_stats": period_stats(&rows, &CHANNEL_METRICS),
        "growth_rates": growth_rates(&rows),
        "best_performing_day": best_day(&rows),
        "trends": view_trend(&rows),
        "daily_data": rows,
    }))
}

pub async fn video_analytics(
    api: &dyn ChannelApi,
    video_id: &str,
    days: Option<u32>,
    today: NaiveDate,
) -> Result<Value, ApiError> {
    let video_id = video_id.trim();
    if video_id.is_empty() {
        return Err(ApiError::validation("video_id must not be empty"));
    }
    let (start_date, end_date) = analytics_window(days, today)?;

    let report = api
        .analytics_report(
            &AnalyticsQuery::new(start_date, end_date, &VIDEO_METRICS)
                .by("day")
                .for_video(video_id),
        )
        .await?;
    let rows = daily_rows(&report);
    let totals = period_stats(&rows, &VIDEO_METRICS);

    let breakdown = |dimensions: &'static str| {
        AnalyticsQuery::new(start_date, end_date, &BREAKDOWN_METRICS)
            .by(dimensions)
            .for_video(video_id)
            .sorted("-views")
    };
    let traffic = optional_report(api, &breakdown("insightTrafficSourceType")).await?;
    let devices = optional_report(api, &breakdown("deviceType")).await?;
    let retention = optional_report(
        api,
        &AnalyticsQuery::new(start_date, end_date, &RETENTION_METRICS)
            .by("elapsedVideoTimeRatio")
            .for_video(video_id),
    )
    .await?;

    let mut traffic_sources = view_breakdown(traffic.as_ref(), "source");
    traffic_sources.truncate(TOP_TRAFFIC_SOURCES);

    Ok(json!({
        "video_id": video_id,
        "period": period(start_date, end_date, rows.len()),
        "performance_summary": performance_summary(&rows),
        "traffic_sources": traffic_sources,
        "retention_analysis": retention_analysis(retention.as_ref(), &totals),
        "device_breakdown": view_breakdown(devices.as_ref(), "device"),
        "total_stats": totals,
        "daily_data": rows,
    }))
}

pub async fn audience_insights(api: &dyn ChannelApi, days: Option<u32>, today: NaiveDate) -> Result<Value, ApiError> {
    let (start_date, end_date) = analytics_window(days, today)?;

    let demographics = optional_report(
        api,
        &AnalyticsQuery::new(start_date, end_date, &["viewerPercentage"])
            .by("ageGroup,gender")
            .sorted("-viewerPercentage"),
    )
    .await?;
    let geography = optional_report(
        api,
        &AnalyticsQuery::new(start_date, end_date, &BREAKDOWN_METRICS)
            .by("country")
            .sorted("-views")
            .limit(TOP_COUNTRIES),
    )
    .await?;
    let devices = optional_report(
        api,
        &AnalyticsQuery::new(start_date, end_date, &BREAKDOWN_METRICS)
            .by("deviceType")
            .sorted("-views"),
    )
    .await?;

    let age_gender: Vec<Value> = report_rows(demographics.as_ref())
        .into_iter()
        .map(|cells| {
            json!({
                "age_group": cell(cells, 0),
                "gender": cell(cells, 1),
                "percentage": cell(cells, 2),
            })
        })
        .collect();
    let countries = view_breakdown(geography.as_ref(), "country");
    let devices = device_shares(devices.as_ref());

    Ok(json!({
        "period": date_range(start_date, end_date),
        "audience_summary": audience_summary(&age_gender, &countries, &devices),
        "demographics": {"age_gender": age_gender},
        "geography": countries,
        "devices": devices,
    }))
}

/// Per-video totals side by side. A video whose report fails is kept with an
/// `error` and left out of the rankings.
pub async fn compare_videos(
    api: &dyn ChannelApi,
    video_ids: &str,
    days: Option<u32>,
    today: NaiveDate,
) -> Result<Value, ApiError> {
    let video_ids = parse_video_ids(video_ids);
    if video_ids.len() < 2 {
        return Err(ApiError::validation(
            "At least two comma-separated video IDs are required for comparison",
        ));
    }
    let (start_date, end_date) = analytics_window(days, today)?;

    let mut entries = Vec::with_capacity(video_ids.len());
    for video_id in &video_ids {
        let query = AnalyticsQuery::new(start_date, end_date, &COMPARISON_METRICS).for_video(video_id);
        let entry = match api.analytics_report(&query).await {
            Ok(report) => comparison_entry(video_id, &report),
            Err(err) => {
                warn!(video_id = %video_id, error = %err, "comparison report failed");
                json!({"video_id": video_id, "error": err.to_string()})
            }
        };
        entries.push(entry);
    }

    let rankings = performance_rankings(&entries);
    Ok(json!({
        "period": date_range(start_date, end_date),
        "videos_compared": video_ids.len(),
        "correlations": correlations(&entries),
        "best_practices": best_practices(&entries, &rankings),
        "rankings": rankings,
        "comparison_data": entries,
    }))
}

pub fn register(registry: &mut ToolRegistry, channel: Arc<dyn ChannelApi>) -> Result<(), RegistryError> {
    let api = channel.clone();
    registry.register_fn(GetChannelAnalyticsTool::tool(), move |params: GetChannelAnalyticsTool| {
        let api = api.clone();
        async move {
            let today = Utc::now().date_naive();
            Ok(into_payload(channel_analytics(api.as_ref(), params.days, today).await))
        }
    })?;

    let api = channel.clone();
    registry.register_fn(GetVideoAnalyticsTool::tool(), move |params: GetVideoAnalyticsTool| {
        let api = api.clone();
        async move {
            let today = Utc::now().date_naive();
            Ok(into_payload(
                video_analytics(api.as_ref(), &params.video_id, params.days, today).await,
            ))
        }
    })?;

    let api = channel.clone();
    registry.register_fn(
        AnalyzeAudienceInsightsTool::tool(),
        move |params: AnalyzeAudienceInsightsTool| {
            let api = api.clone();
            async move {
                let today = Utc::now().date_naive();
                Ok(into_payload(audience_insights(api.as_ref(), params.days, today).await))
            }
        },
    )?;

    let api = channel;
    registry.register_fn(
        CompareVideoPerformanceTool::tool(),
        move |params: CompareVideoPerformanceTool| {
            let api = api.clone();
            async move {
                let today = Utc::now().date_naive();
                Ok(into_payload(
                    compare_videos(api.as_ref(), &params.video_ids, params.days, today).await,
                ))
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Serves reports keyed by their dimensions, or by their filter when a
    /// query has none. Unknown queries get the 400 the API would send.
    struct FakeReports {
        reports: HashMap<String, Value>,
        queries: Mutex<Vec<AnalyticsQuery>>,
    }

    impl FakeReports {
        fn new(daily: Value) -> Self {
            Self::routed(vec![("day", daily)])
        }

        fn routed(reports: Vec<(&str, Value)>) -> Self {
            Self {
                reports: reports
                    .into_iter()
                    .map(|(key, report)| (key.to_string(), report))
                    .collect(),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn dimensions_asked(&self) -> Vec<Option<&'static str>> {
            self.queries
                .lock()
                .expect("lock")
                .iter()
                .map(|query| query.dimensions)
                .collect()
        }
    }

    #[async_trait]
    impl ChannelApi for FakeReports {
        async fn my_channel(&self) -> Result<Value, ApiError> {
            Ok(json!({"id": "UC42"}))
        }

        async fn playlist_items(&self, _: &str, _: u32, _: Option<&str>) -> Result<Value, ApiError> {
            Ok(json!({}))
        }

        async fn videos(&self, _: &[String], _: &str) -> Result<Value, ApiError> {
            Ok(json!({}))
        }

        async fn update_video_snippet(&self, _: &str, _: Value) -> Result<Value, ApiError> {
            Ok(json!({}))
        }

        async fn analytics_report(&self, query: &AnalyticsQuery) -> Result<Value, ApiError> {
            self.queries.lock().expect("lock").push(query.clone());
            let key = query
                .dimensions
                .map(str::to_string)
                .or_else(|| query.filters.clone())
                .unwrap_or_default();
            self.reports.get(&key).cloned().ok_or_else(|| ApiError::Status {
                status: 400,
                url: "https://youtubeanalytics.googleapis.com/v2/reports".to_string(),
                body: "unsupported query".to_string(),
            })
        }
    }

    fn report(rows: Value) -> Value {
        json!({
            "columnHeaders": [
                {"name": "day"},
                {"name": "views"},
                {"name": "estimatedMinutesWatched"},
                {"name": "subscribersGained"},
                {"name": "likes"},
                {"name": "comments"},
                {"name": "averageViewDuration"},
            ],
            "rows": rows,
        })
    }

    fn four_days() -> Value {
        report(json!([
            ["2024-03-01", 100, 10, 0, 5, 1, 60],
            ["2024-03-02", 100, 10, 0, 4, 0, 60],
            ["2024-03-03", 150, 10, 0, 9, 2, 90],
            ["2024-03-04", 150, 10, 0, 3, 0, 90],
        ]))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).expect("date")
    }

    #[test]
    fn rows_rename_day_to_date() {
        let rows = daily_rows(&four_days());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["date"], "2024-03-01");
        assert_eq!(rows[0]["views"], 100);
        assert!(!rows[0].contains_key("day"));
    }

    #[test]
    fn short_windows_compare_halves() {
        let rows = daily_rows(&four_days());
        let rates = growth_rates(&rows);
        assert_eq!(rates["views_growth"], 50.0);
        assert_eq!(rates["estimatedMinutesWatched_growth"], 0.0);
        assert!(rates.get("subscribersGained_growth").is_none());
    }

    #[test]
    fn best_day_keeps_the_first_maximum() {
        let rows = daily_rows(&four_days());
        assert_eq!(
            best_day(&rows),
            json!({"date": "2024-03-03", "views": 150, "watch_time_minutes": 10, "engagement": 11})
        );
        assert_eq!(best_day(&[]), json!({}));
    }

    #[test]
    fn trend_needs_three_days() {
        let rows = daily_rows(&four_days());
        assert_eq!(view_trend(&rows), json!({"views": "rising"}));
        assert_eq!(view_trend(&rows[..2]), json!({"overall": "insufficient data"}));

        let falling = daily_rows(&report(json!([
            ["2024-03-01", 200, 0, 0, 0, 0, 0],
            ["2024-03-02", 200, 0, 0, 0, 0, 0],
            ["2024-03-03", 100, 0, 0, 0, 0, 0],
        ])));
        assert_eq!(view_trend(&falling), json!({"views": "declining"}));
    }

    #[tokio::test]
    async fn channel_report_aggregates_daily_rows() {
        let api = FakeReports::new(four_days());
        let result = channel_analytics(&api, Some(7), today()).await.expect("analytics");

        assert_eq!(result["channel_id"], "UC42");
        assert_eq!(
            result["period"],
            json!({"start": "2024-03-24", "end": "2024-03-31", "days": 4})
        );
        assert_eq!(
            result["total_stats"]["views"],
            json!({"total": 500, "average": 125, "min": 100, "max": 150})
        );
        assert_eq!(result["total_stats"]["shares"]["total"], 0);
        assert_eq!(result["trends"]["views"], "rising");

        let queries = api.queries.lock().expect("lock");
        assert_eq!(queries[0].metrics.len(), 10);
        assert_eq!(queries[0].filters, None);
    }

    #[tokio::test]
    async fn video_report_filters_by_video() {
        let api = FakeReports::new(four_days());
        let result = video_analytics(&api, "abc", None, today()).await.expect("analytics");

        assert_eq!(result["video_id"], "abc");
        assert_eq!(result["performance_summary"]["engagement_rate"], "4.80%");
        assert_eq!(result["performance_summary"]["engagement_level"], "high");
        assert_eq!(result["performance_summary"]["average_view_duration"], "75.0s");
        assert!(result["total_stats"].get("subscribersGained").is_none());

        let queries = api.queries.lock().expect("lock");
        assert_eq!(queries[0].filters.as_deref(), Some("video==abc"));
        assert_eq!(queries[0].start_date, NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"));
    }

    #[tokio::test]
    async fn video_report_includes_breakdowns() {
        let api = FakeReports::routed(vec![
            ("day", four_days()),
            (
                "insightTrafficSourceType",
                json!({"rows": [["YT_SEARCH", 300, 40], ["SUGGESTED", 120, 9]]}),
            ),
            ("deviceType", json!({"rows": [["MOBILE", 350, 30], ["DESKTOP", 150, 20]]})),
            ("elapsedVideoTimeRatio", json!({"rows": [[0.01, 1.0], [0.5, 0.42]]})),
        ]);
        let result = video_analytics(&api, "abc", Some(30), today()).await.expect("analytics");

        assert_eq!(
            result["traffic_sources"][0],
            json!({"source": "YT_SEARCH", "views": 300, "watch_time_minutes": 40})
        );
        assert_eq!(result["device_breakdown"][1]["device"], "DESKTOP");
        assert_eq!(
            result["retention_analysis"]["retention_points"][1],
            json!({"time_ratio": 0.5, "retention_ratio": 0.42})
        );
        assert!(api
            .queries
            .lock()
            .expect("lock")
            .iter()
            .all(|query| query.filters.as_deref() == Some("video==abc")));
    }

    #[tokio::test]
    async fn rejected_breakdowns_leave_sections_empty() {
        let api = FakeReports::new(four_days());
        let result = video_analytics(&api, "abc", None, today()).await.expect("analytics");

        assert_eq!(result["traffic_sources"], json!([]));
        assert_eq!(result["device_breakdown"], json!([]));
        assert_eq!(result["retention_analysis"]["retention_points"], json!([]));
        assert_eq!(result["total_stats"]["views"]["total"], 500);
    }

    #[tokio::test]
    async fn audience_insights_summarize_breakdowns() {
        let api = FakeReports::routed(vec![
            (
                "ageGroup,gender",
                json!({"rows": [["age25-34", "male", 41.5], ["age18-24", "female", 20.0]]}),
            ),
            (
                "country",
                json!({"rows": [["JP", 500, 60], ["US", 300, 40], ["DE", 50, 5], ["FR", 10, 1]]}),
            ),
            ("deviceType", json!({"rows": [["MOBILE", 300, 30], ["DESKTOP", 100, 20]]})),
        ]);
        let result = audience_insights(&api, Some(28), today()).await.expect("insights");

        assert_eq!(
            result["audience_summary"],
            json!({
                "primary_audience": "age25-34 male",
                "top_countries": ["JP", "US", "DE"],
                "preferred_devices": ["MOBILE", "DESKTOP"],
            })
        );
        assert_eq!(result["devices"][0]["percentage"], 75.0);
        assert_eq!(result["demographics"]["age_gender"][1]["percentage"], 20.0);

        let queries = api.queries.lock().expect("lock");
        let country = queries
            .iter()
            .find(|query| query.dimensions == Some("country"))
            .expect("country query");
        assert_eq!(country.max_results, Some(20));
        assert_eq!(country.sort, Some("-views"));
    }

    #[tokio::test]
    async fn comparison_ranks_videos_and_keeps_failures() {
        let api = FakeReports::routed(vec![
            ("video==a", json!({"rows": [[1000, 6000, 30, 10, 4, 7]]})),
            ("video==b", json!({"rows": [[4000, 2000, 40, 0, 1, 2]]})),
        ]);
        let result = compare_videos(&api, "a, b ,c", None, today()).await.expect("comparison");

        assert_eq!(result["videos_compared"], 3);
        assert_eq!(result["comparison_data"][0]["engagement_rate"], 4.0);
        assert_eq!(result["comparison_data"][2]["video_id"], "c");
        assert!(result["comparison_data"][2]["error"].is_string());
        assert_eq!(result["rankings"]["views"][0], json!({"video_id": "b", "value": 4000}));
        assert_eq!(result["rankings"]["watch_time_minutes"][0]["video_id"], "a");
        assert_eq!(result["correlations"]["watch_time_engagement_correlation"], "positive");
        assert_eq!(
            result["best_practices"],
            json!(["Videos that hold viewers for long watch times perform best"])
        );
        assert!(api.dimensions_asked().iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn comparison_needs_two_videos() {
        let api = FakeReports::new(four_days());
        let err = compare_videos(&api, "a, ,", None, today()).await.expect_err("one id");
        assert!(err.is_local());
        assert!(api.queries.lock().expect("lock").is_empty());
    }

    #[test]
    fn correlations_need_two_usable_videos() {
        let entries = vec![
            json!({"video_id": "a", "views": 10, "watch_time_minutes": 5, "engagement_rate": 1.0}),
            json!({"video_id": "b", "error": "boom"}),
        ];
        assert_eq!(
            correlations(&entries),
            json!({"message": "not enough data for correlation analysis"})
        );
        assert_eq!(
            best_practices(&entries, &performance_rankings(&entries)),
            vec!["More data is needed"]
        );
    }

    #[tokio::test]
    async fn out_of_range_days_never_reach_the_api() {
        let api = FakeReports::new(four_days());
        let err = channel_analytics(&api, Some(0), today()).await.expect_err("days");
        assert!(err.is_local());
        assert!(api.queries.lock().expect("lock").is_empty());
    }
}
