use serde::{Deserialize, Serialize};

/// GA4 Data API `runReport` 响应中用到的部分
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<ReportValue>,
    #[serde(default)]
    pub metric_values: Vec<ReportValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportValue {
    #[serde(default)]
    pub value: Option<String>,
}

impl ReportRow {
    fn metric(&self, index: usize) -> u64 {
        self.metric_values
            .get(index)
            .and_then(|cell| cell.value.as_deref())
            .map(parse_metric)
            .unwrap_or(0)
    }
}

/// 指标值是数字字符串，无法解析时记为 0
fn parse_metric(raw: &str) -> u64 {
    let raw = raw.trim();
    raw.parse::<u64>().ok().unwrap_or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0)
            .map(|value| value.round() as u64)
            .unwrap_or(0)
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GaOverviewMetrics {
    pub active_users: u64,
    pub new_users: u64,
    pub sessions: u64,
    pub screen_page_views: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopPage {
    pub page_path: String,
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GaAnalyticsResponse {
    pub last7: GaOverviewMetrics,
    pub last30: GaOverviewMetrics,
    pub top_pages: Vec<TopPage>,
}

impl RunReportResponse {
    /// 概览报表只有一行，四个指标依次为 activeUsers、newUsers、sessions、screenPageViews
    pub fn overview_metrics(&self) -> GaOverviewMetrics {
        match self.rows.first() {
            Some(row) => GaOverviewMetrics {
                active_users: row.metric(0),
                new_users: row.metric(1),
                sessions: row.metric(2),
                screen_page_views: row.metric(3),
            },
            None => GaOverviewMetrics::default(),
        }
    }

    pub fn top_pages(&self) -> Vec<TopPage> {
        self.rows
            .iter()
            .map(|row| TopPage {
                page_path: row
                    .dimension_values
                    .first()
                    .and_then(|cell| cell.value.clone())
                    .filter(|path| !path.is_empty())
                    .unwrap_or_else(|| "/".to_string()),
                views: row.metric(0),
            })
            .collect()
    }
}
