//! Web dashboard with JSON API endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::alert::{AlertFilter, AlertRecord, AlertStatus};
use crate::navigator::{is_on_alert_list, ViewTracker};
use crate::notifier::active_alerts_message;
use crate::poller::MonitorControl;
use crate::SosMonitorError;

/// Dashboard application state
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub control: MonitorControl,
    pub view: ViewTracker,
    pub alert_list_path: String,
}

/// Build the dashboard axum router.
///
/// Unknown paths serve the HTML page so the operator's view can live at any
/// path, including the alert list the monitor redirects to.
pub fn build_router(dashboard_state: DashboardState) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/alerts", get(alerts_handler))
        .route("/api/alerts/{id}/status", patch(update_status_handler))
        .route("/api/history", get(history_handler))
        .route("/api/view", get(view_handler).put(report_view_handler))
        .route("/health", get(health_handler))
        .fallback(index_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(dashboard_state)
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: AlertStatus,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ViewReport {
    path: String,
}

/// Maps monitor errors onto HTTP responses
struct ApiError(SosMonitorError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SosMonitorError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SosMonitorError::Api { status, .. } if *status == 404 => StatusCode::NOT_FOUND,
            SosMonitorError::Api { .. } | SosMonitorError::Http(_) | SosMonitorError::Json(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn status_colors(status: AlertStatus) -> (&'static str, &'static str) {
    match status {
        AlertStatus::Pending => ("#721c24", "#f8d7da"),
        AlertStatus::InProgress => ("#856404", "#fff3cd"),
        AlertStatus::Resolved => ("#155724", "#d4edda"),
    }
}

fn alert_row(alert: &AlertRecord) -> String {
    let (color, bg) = status_colors(alert.status);
    let (latitude, longitude) = alert.coordinates();
    format!(
        r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{:.4}, {:.4}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">
                        <span style="display: inline-block; padding: 0.25em 0.6em; border-radius: 0.25rem; font-size: 0.85em; font-weight: 600; color: {}; background-color: {};">{}</span>
                    </td>
                    <td style="padding: 0.5rem;">{}</td>
                </tr>"#,
        alert.id,
        escape_html(&alert.kind),
        escape_html(alert.raised_by.as_deref().unwrap_or("Unknown")),
        latitude,
        longitude,
        alert.raised_at.format("%Y-%m-%d %H:%M:%S UTC"),
        color,
        bg,
        alert.status,
        escape_html(alert.comment.as_deref().unwrap_or("")),
    )
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.control.state();
    let state = state.read().await;

    let banner = if state.unauthenticated {
        r#"<div id="auth-banner" style="padding: 1rem; background: #e2e3e5; color: #383d41; border-radius: 0.25rem;">Not authenticated. Sign in to see SOS alerts.</div>"#
            .to_string()
    } else if state.has_active() {
        format!(
            r#"<div id="active-banner" style="padding: 1rem; background: #f8d7da; color: #721c24; border-radius: 0.25rem; font-weight: 600;">{}</div>"#,
            active_alerts_message(state.active_count)
        )
    } else {
        String::new()
    };

    let error_line = match (&state.last_error, state.unauthenticated) {
        (Some(err), false) => format!(
            r#"<p id="last-error" style="color: #721c24;">Last poll failed ({} in a row): {}</p>"#,
            state.consecutive_failures,
            escape_html(err)
        ),
        _ => String::new(),
    };

    let alert_rows: String = if state.is_loading {
        r#"<tr><td colspan="7" style="padding: 0.5rem;">Loading...</td></tr>"#.to_string()
    } else {
        state.alerts.iter().map(alert_row).collect()
    };

    let on_alert_list = is_on_alert_list(
        &dashboard.view.snapshot().path,
        &dashboard.alert_list_path,
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>SOS Alerts</title>
    <script>
        function reportView() {{
            fetch('/api/view', {{
                method: 'PUT',
                headers: {{ 'Content-Type': 'application/json' }},
                body: JSON.stringify({{ path: location.pathname + location.search }}),
            }});
        }}
        function followRedirect() {{
            fetch('/api/view')
                .then(r => r.json())
                .then(view => {{
                    if (view.pending_redirect && view.pending_redirect !== location.pathname) {{
                        location.replace(view.pending_redirect);
                    }} else if (view.pending_redirect) {{
                        reportView();
                    }}
                }});
        }}
        setInterval(followRedirect, 2000);
        setInterval(() => location.reload(), 15000);
        reportView();
    </script>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem;">
    <h1>SOS Alerts</h1>
    {banner}
    {error_line}
    <section data-alert-list="{on_alert_list}">
        <h2>Alerts ({active} active of {total})</h2>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="border-bottom: 2px solid #dee2e6;">
                    <th style="padding: 0.5rem; text-align: left;">ID</th>
                    <th style="padding: 0.5rem; text-align: left;">Type</th>
                    <th style="padding: 0.5rem; text-align: left;">Raised By</th>
                    <th style="padding: 0.5rem; text-align: left;">Location</th>
                    <th style="padding: 0.5rem; text-align: left;">Raised At</th>
                    <th style="padding: 0.5rem; text-align: left;">Status</th>
                    <th style="padding: 0.5rem; text-align: left;">Comment</th>
                </tr>
            </thead>
            <tbody id="alert-body">{alert_rows}</tbody>
        </table>
    </section>
</body>
</html>"#,
        banner = banner,
        error_line = error_line,
        on_alert_list = on_alert_list,
        active = state.active_count,
        total = state.alerts.len(),
        alert_rows = alert_rows,
    );

    Html(html)
}

async fn status_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.control.state();
    let snapshot = state.read().await.snapshot();
    Json(snapshot)
}

async fn alerts_handler(
    State(dashboard): State<DashboardState>,
    Query(filter): Query<AlertFilter>,
) -> impl IntoResponse {
    let state = dashboard.control.state();
    let state = state.read().await;
    let alerts: Vec<AlertRecord> = filter.apply(&state.alerts).into_iter().cloned().collect();
    Json(alerts)
}

async fn update_status_handler(
    State(dashboard): State<DashboardState>,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<AlertRecord>, ApiError> {
    tracing::debug!("Status update requested for SOS {}: {:?}", id, update);
    let updated = dashboard
        .control
        .update_alert_status(id, update.status, update.comment)
        .await
        .map_err(ApiError)?;
    Ok(Json(updated))
}

async fn history_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let state = dashboard.control.state();
    let state = state.read().await;
    let history: Vec<_> = state.history.iter().cloned().collect();
    Json(history)
}

async fn view_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    Json(dashboard.view.snapshot())
}

async fn report_view_handler(
    State(dashboard): State<DashboardState>,
    Json(report): Json<ViewReport>,
) -> impl IntoResponse {
    dashboard.view.report_path(&report.path);
    Json(dashboard.view.snapshot())
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
