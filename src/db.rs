use tiberius::{Client, Config, Row, SqlBrowser, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use crate::config::{DatabaseSettings, QuerySettings};
use crate::error::ReportError;
use crate::models::{ProviderVisits, ReportingWindow, VisitCounts};

pub type SqlClient = Client<Compat<TcpStream>>;

/// Statement text plus the values bound to its `@P` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductivityQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl ProductivityQuery {
    pub fn build(window: &ReportingWindow, query: &QuerySettings) -> Self {
        let mut params = Vec::new();
        let mut placeholders = |ids: &[String]| -> String {
            ids.iter()
                .map(|id| {
                    params.push(id.clone());
                    format!("@P{}", params.len())
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let departments = placeholders(&query.department_ids);
        let excluded_providers = placeholders(&query.excluded_provider_ids);

        let mut sql = format!(
            r#"
DECLARE @begindate date = '{begin}'
DECLARE @enddate date = '{end}'
SELECT
    loc.department_name AS Loc_Name,
    prov.prov_id AS Prov_ID,
    prov.name AS Prov_Name,
    SUM(CASE WHEN astat.name = 'Completed' THEN 1 ELSE 0 END) AS Checked_Out,
    SUM(CASE WHEN astat.name = 'No Show' THEN 1 ELSE 0 END) AS No_Shows,
    FORMAT((SUM(CASE WHEN astat.name = 'No Show' THEN 1 ELSE 0 END) / CAST(COUNT(enc.pat_enc_csn_id) AS float)), 'P') AS "No_Show_%",
    (SUM(CASE WHEN zcr.name IS NOT NULL THEN 1 ELSE 0 END)
        - (SUM(CASE WHEN zcr.name = 'Late Cancel' THEN 1 ELSE 0 END)
            + SUM(CASE WHEN zcr.name LIKE '%Reschedule%' OR astat.name LIKE '%Reschedule%' THEN 1 ELSE 0 END))) AS Canceled,
    SUM(CASE WHEN zcr.name = 'Late Cancel' THEN 1 ELSE 0 END) AS Late_Canceled,
    SUM(CASE WHEN zcr.name LIKE '%Reschedule%' OR astat.name LIKE '%Reschedule%' THEN 1 ELSE 0 END) AS Rescheduled,
    COUNT(enc.pat_enc_csn_id) AS Scheduled_Appts,
    SUM(CASE WHEN DATEDIFF(d, enc.appt_made_date, enc.contact_date) = 0 THEN 1 ELSE 0 END) AS Walk_Ins,
    FORMAT((SUM(CASE WHEN DATEDIFF(d, enc.appt_made_date, enc.contact_date) = 0 THEN 1 ELSE 0 END) / CAST(COUNT(enc.pat_enc_csn_id) AS float)), 'P') AS "Walk_Ins_%"
FROM clarity_emp_view prov
    INNER JOIN clarity_ser_2 AS cs
        ON cs.prov_id = prov.prov_id
    LEFT JOIN pat_enc_view AS enc
        ON prov.prov_id = enc.visit_prov_id
    LEFT JOIN clarity_dep_view AS loc
        ON enc.department_id = loc.department_id
    LEFT JOIN zc_appt_status AS astat
        ON enc.appt_status_c = astat.appt_status_c
    LEFT JOIN patient AS pat
        ON enc.pat_id = pat.pat_id
    LEFT JOIN zc_cancel_reason AS zcr
        ON enc.cancel_reason_c = zcr.cancel_reason_c
WHERE cs.npi IS NOT NULL
    AND enc.department_id IN ({departments})
    AND prov.user_status_c = '1'
    AND enc.contact_date BETWEEN @begindate AND @enddate
    AND enc.appt_prc_id IS NOT NULL"#,
            begin = window.begin_mdy(),
            end = window.end_mdy(),
        );

        if let Some(reason) = &query.excluded_cancel_reason {
            params.push(reason.clone());
            sql.push_str(&format!(
                "\n    AND (enc.cancel_reason_c != @P{} OR enc.cancel_reason_c IS NULL)",
                params.len()
            ));
        }
        if !excluded_providers.is_empty() {
            sql.push_str(&format!("\n    AND prov.prov_id NOT IN ({excluded_providers})"));
        }

        sql.push_str(
            "\nGROUP BY prov.prov_id,\n    prov.name,\n    loc.department_name\n\
             ORDER BY loc.department_name, prov.name\n",
        );

        Self { sql, params }
    }
}

/// Connects to `server`/`database`, as validated by `Settings::connection_target`.
pub async fn connect(
    settings: &DatabaseSettings,
    server: &str,
    database: &str,
) -> Result<SqlClient, ReportError> {
    let mut config = Config::new();
    apply_server(&mut config, server)?;
    config.database(database);
    config.application_name(&settings.application_name);
    integrated_auth(&mut config)?;
    if settings.trust_server_certificate {
        config.trust_cert();
    }

    let failed = |source: tiberius::error::Error| ReportError::ConnectionFailed {
        server: server.to_string(),
        source,
    };

    let tcp = TcpStream::connect_named(&config).await.map_err(failed)?;
    tcp.set_nodelay(true)
        .map_err(|e| failed(tiberius::error::Error::from(e)))?;
    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(failed)?;

    info!(server, database, "connected to SQL Server");
    Ok(client)
}

/// Splits `HOST`, `HOST,PORT` and `HOST\INSTANCE` forms into the driver config.
fn apply_server(config: &mut Config, server: &str) -> Result<(), ReportError> {
    let server = server.trim();
    if let Some((host, port)) = server.split_once(',') {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ReportError::Config(format!("invalid port in server `{server}`")))?;
        config.host(host.trim());
        config.port(port);
    } else if let Some((host, instance)) = server.split_once('\\') {
        config.host(host);
        config.instance_name(instance);
    } else {
        config.host(server);
    }
    Ok(())
}

#[cfg(any(windows, feature = "gssapi"))]
fn integrated_auth(config: &mut Config) -> Result<(), ReportError> {
    config.authentication(tiberius::AuthMethod::Integrated);
    Ok(())
}

#[cfg(not(any(windows, feature = "gssapi")))]
fn integrated_auth(_config: &mut Config) -> Result<(), ReportError> {
    Err(ReportError::Config(
        "integrated authentication needs a Windows build or the `gssapi` feature".to_string(),
    ))
}

/// Runs the query and closes the connection whatever the outcome.
pub async fn fetch_productivity(
    mut client: SqlClient,
    query: &ProductivityQuery,
) -> Result<Vec<ProviderVisits>, ReportError> {
    let result = run_query(&mut client, query).await;
    if let Err(e) = client.close().await {
        warn!(error = %e, "failed to close SQL Server connection");
    }
    result
}

async fn run_query(
    client: &mut SqlClient,
    query: &ProductivityQuery,
) -> Result<Vec<ProviderVisits>, ReportError> {
    let params: Vec<&dyn ToSql> = query.params.iter().map(|p| p as &dyn ToSql).collect();
    debug!(params = ?query.params, "running productivity query");

    let rows = client
        .query(query.sql.as_str(), &params)
        .await
        .map_err(ReportError::QueryFailed)?
        .into_first_result()
        .await
        .map_err(ReportError::QueryFailed)?;

    let mut visits = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        visits.push(decode_row(index, row)?);
    }

    info!(rows = visits.len(), "fetched productivity rows");
    Ok(visits)
}

fn decode_row(index: usize, row: &Row) -> Result<ProviderVisits, ReportError> {
    let text = |column: &'static str| -> Result<String, ReportError> {
        row.try_get::<&str, _>(column)
            .map(|value| value.unwrap_or_default().to_string())
            .map_err(|e| malformed(index, column, e))
    };
    let count = |column: &'static str| -> Result<i64, ReportError> {
        row.try_get::<i32, _>(column)
            .map(|value| i64::from(value.unwrap_or_default()))
            .map_err(|e| malformed(index, column, e))
    };

    Ok(ProviderVisits {
        loc_name: text("Loc_Name")?,
        prov_id: text("Prov_ID")?,
        prov_name: text("Prov_Name")?,
        counts: VisitCounts {
            checked_out: count("Checked_Out")?,
            no_shows: count("No_Shows")?,
            canceled: count("Canceled")?,
            late_canceled: count("Late_Canceled")?,
            rescheduled: count("Rescheduled")?,
            scheduled_appts: count("Scheduled_Appts")?,
            walk_ins: count("Walk_Ins")?,
        },
        no_show_pct: text("No_Show_%")?,
        walk_ins_pct: text("Walk_Ins_%")?,
    })
}

fn malformed(row: usize, column: &'static str, error: tiberius::error::Error) -> ReportError {
    ReportError::MalformedRow {
        row,
        column,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuerySettings;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn window() -> ReportingWindow {
        ReportingWindow::for_date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    #[test]
    fn default_query_binds_departments_then_exclusions() {
        let query = ProductivityQuery::build(&window(), &QuerySettings::default());

        assert!(query.sql.contains("DECLARE @begindate date = '10/01/2026'"));
        assert!(query.sql.contains("DECLARE @enddate date = '10/16/2026'"));
        assert!(query
            .sql
            .contains("enc.department_id IN (@P1, @P2, @P3, @P4, @P5)"));
        assert!(query.sql.contains("prov.prov_id NOT IN (@P6)"));
        assert!(query.sql.contains("enc.cancel_reason_c != @P7"));
        assert_eq!(
            query.params,
            vec![
                "246001002",
                "246002001",
                "246003002",
                "246004002",
                "246006002",
                "246206",
                "4"
            ]
        );
        assert!(query
            .sql
            .trim_end()
            .ends_with("ORDER BY loc.department_name, prov.name"));
    }

    #[test]
    fn empty_exclusions_drop_their_clauses() {
        let settings = QuerySettings {
            department_ids: vec!["1".to_string()],
            excluded_provider_ids: Vec::new(),
            excluded_cancel_reason: None,
        };
        let query = ProductivityQuery::build(&window(), &settings);

        assert!(query.sql.contains("enc.department_id IN (@P1)"));
        assert!(!query.sql.contains("NOT IN"));
        assert!(!query.sql.contains("cancel_reason_c !="));
        assert_eq!(query.params, vec!["1"]);
    }

    #[test]
    fn config_values_never_reach_the_sql_text() {
        let settings = QuerySettings {
            department_ids: vec!["1'); DROP TABLE patient; --".to_string()],
            ..QuerySettings::default()
        };
        let query = ProductivityQuery::build(&window(), &settings);
        assert!(!query.sql.contains("DROP TABLE"));
    }

    #[test]
    fn server_forms_are_parsed() {
        let mut config = Config::new();
        assert!(apply_server(&mut config, "sqlhost,1533").is_ok());
        assert_eq!(config.get_addr(), "sqlhost:1533");

        let mut config = Config::new();
        assert!(apply_server(&mut config, "sqlhost").is_ok());
        assert_eq!(config.get_addr(), "sqlhost:1433");

        let mut config = Config::new();
        assert!(apply_server(&mut config, "sqlhost,abc").is_err());
    }
}
