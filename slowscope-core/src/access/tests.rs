//! Access layer tests against the scripted connector.

use super::mock::{ConnectBehavior, MockConnector, Response, row};
use super::*;
use crate::error::ErrorKind;
use crate::models::HostRole;
use crate::security::Credentials;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const MASTER: &str = "db-master-01";
const STANDBY: &str = "db-standby-01";

fn endpoint(host: &str) -> DatabaseEndpoint {
    DatabaseEndpoint::new(
        host,
        Credentials::new("report".to_string(), Some("secret".to_string())),
    )
}

fn config() -> AccessConfig {
    AccessConfig::new(endpoint(MASTER))
        .with_topology(StandbyTopology::default().with_pair(MASTER, STANDBY))
}

fn layer(mock: &MockConnector, config: AccessConfig) -> AccessLayer {
    AccessLayer::new(config, Arc::new(mock.clone())).unwrap()
}

// =============================================================================
// Connection acquisition and standby fallback
// =============================================================================

#[tokio::test]
async fn test_master_connection_is_prepared_read_only() {
    let mock = MockConnector::new();
    let layer = layer(&mock, config());

    let result = layer.get_safe_connection(MASTER, Some("shop")).await;
    assert!(result.is_connected());
    assert_eq!(result.host(), Some(MASTER));
    assert_eq!(result.role(), Some(HostRole::Master));

    let executed = mock.executed_on(MASTER);
    assert_eq!(executed[0], "SET SESSION TRANSACTION READ ONLY");
    assert!(executed.iter().any(|s| s == "SET SESSION max_execution_time = 30000"));
    assert!(executed.iter().any(|s| s == "SET SESSION sql_select_limit = 1000"));
    assert!(executed.iter().any(|s| s == "SET SESSION sql_safe_updates = 1"));

    result.into_result().unwrap().release().await.unwrap();
    assert_eq!(mock.closes(), 1);
}

#[tokio::test]
async fn test_standby_used_when_master_refuses() {
    let mock = MockConnector::new().host(MASTER, ConnectBehavior::Refuse);
    let layer = layer(&mock, config());

    let result = layer.get_safe_connection(MASTER, None).await;
    assert_eq!(result.host(), Some(STANDBY));
    assert_eq!(result.role(), Some(HostRole::Standby));
    assert_eq!(mock.connect_attempts(), vec![MASTER, STANDBY]);
}

#[tokio::test]
async fn test_failed_result_when_both_hosts_refuse() {
    let mock = MockConnector::new()
        .host(MASTER, ConnectBehavior::Refuse)
        .host(STANDBY, ConnectBehavior::Refuse);
    let layer = layer(&mock, config());

    let result = layer.get_safe_connection(MASTER, None).await;
    assert!(!result.is_connected());
    assert_eq!(result.error_kind(), Some(ErrorKind::Connection));
    match result {
        ConnectionResult::Failed { attempts, .. } => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].role, HostRole::Master);
            assert_eq!(attempts[1].host, STANDBY);
            assert_eq!(attempts[1].role, HostRole::Standby);
        }
        ConnectionResult::Connected { .. } => panic!("expected failure"),
    }
    assert_eq!(mock.connect_attempts(), vec![MASTER, STANDBY]);
}

#[tokio::test]
async fn test_permission_failure_does_not_fall_back() {
    let mock = MockConnector::new().host(MASTER, ConnectBehavior::Deny);
    let layer = layer(&mock, config());

    let result = layer.get_safe_connection(MASTER, None).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Permission));
    assert_eq!(mock.connect_attempts(), vec![MASTER]);
}

#[tokio::test]
async fn test_no_fallback_without_known_standby() {
    let mock = MockConnector::new().host(MASTER, ConnectBehavior::Refuse);
    let layer = layer(&mock, AccessConfig::new(endpoint(MASTER)));

    let result = layer.get_safe_connection(MASTER, None).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Connection));
    assert_eq!(mock.connect_attempts(), vec![MASTER]);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_falls_back_to_standby() {
    let mock = MockConnector::new().host(MASTER, ConnectBehavior::Hang);
    let layer = layer(&mock, config());

    let result = layer.get_safe_connection(MASTER, None).await;
    assert_eq!(result.role(), Some(HostRole::Standby));
}

#[tokio::test]
async fn test_overloaded_master_falls_back() {
    let session = SessionSettings {
        max_active_sessions: Some(10),
        ..SessionSettings::default()
    };
    let mock = MockConnector::new()
        .respond(MASTER, "processlist", Response::Rows(vec![row(json!({"active_sessions": 25}))]))
        .respond(STANDBY, "processlist", Response::Rows(vec![row(json!({"active_sessions": 2}))]));
    let layer = layer(&mock, config().with_session(session));

    let result = layer.get_safe_connection(MASTER, None).await;
    assert_eq!(result.role(), Some(HostRole::Standby));
    // the rejected master session was closed
    assert_eq!(mock.closes(), 1);
}

#[tokio::test]
async fn test_read_only_setup_failure_is_terminal() {
    let mock = MockConnector::new().respond(
        MASTER,
        "TRANSACTION READ ONLY",
        Response::Error(ErrorKind::Syntax),
    );
    let layer = layer(&mock, config());

    let result = layer.get_safe_connection(MASTER, None).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Syntax));
    assert_eq!(mock.connect_attempts(), vec![MASTER]);
    assert_eq!(mock.closes(), 1);
}

#[tokio::test]
async fn test_optional_session_setting_failure_is_tolerated() {
    let mock = MockConnector::new().respond(
        "*",
        "max_execution_time",
        Response::Error(ErrorKind::Syntax),
    );
    let layer = layer(&mock, config());

    let result = layer.get_safe_connection(MASTER, None).await;
    assert_eq!(result.role(), Some(HostRole::Master));
}

// =============================================================================
// Query execution
// =============================================================================

#[tokio::test]
async fn test_execute_safe_query_releases_on_success() {
    let mock = MockConnector::new().respond(
        MASTER,
        "FROM users",
        Response::Rows(vec![row(json!({"id": 1})), row(json!({"id": 2}))]),
    );
    let layer = layer(&mock, config());

    let outcome = layer
        .execute_safe_query("SELECT id FROM users", Some("shop"))
        .await
        .unwrap();
    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(outcome.host, MASTER);
    assert_eq!(outcome.role, HostRole::Master);
    assert_eq!(mock.opened(), 1);
    assert_eq!(mock.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_execute_safe_query_releases_on_timeout() {
    let mock = MockConnector::new().respond(MASTER, "FROM users", Response::Hang);
    let layer = layer(&mock, config().with_statement_timeout(Duration::from_secs(2)));

    let error = layer
        .execute_safe_query("SELECT id FROM users", None)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert_eq!(mock.closes(), 1);
    // a timeout is not a connection failure
    assert_eq!(mock.connect_attempts(), vec![MASTER]);
}

#[tokio::test]
async fn test_execute_safe_query_releases_on_database_error() {
    let mock = MockConnector::new().respond(
        MASTER,
        "FROM users",
        Response::Error(ErrorKind::Syntax),
    );
    let layer = layer(&mock, config());

    let error = layer
        .execute_safe_query("SELECT id FROM users WHERE", None)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Syntax);
    assert_eq!(mock.closes(), 1);
    assert_eq!(mock.connect_attempts(), vec![MASTER]);
}

#[tokio::test]
async fn test_connection_lost_mid_query_retries_on_standby() {
    let mock = MockConnector::new()
        .respond(MASTER, "FROM users", Response::DropConnection)
        .respond(STANDBY, "FROM users", Response::Rows(vec![row(json!({"id": 7}))]));
    let layer = layer(&mock, config());

    let outcome = layer
        .execute_safe_query("SELECT id FROM users", None)
        .await
        .unwrap();
    assert_eq!(outcome.host, STANDBY);
    assert_eq!(outcome.role, HostRole::Standby);
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(mock.opened(), 2);
    assert_eq!(mock.closes(), 2);
}

#[tokio::test]
async fn test_standby_query_failure_is_not_retried() {
    let mock = MockConnector::new()
        .host(MASTER, ConnectBehavior::Refuse)
        .respond(STANDBY, "FROM users", Response::DropConnection);
    let layer = layer(&mock, config());

    let error = layer
        .execute_safe_query("SELECT id FROM users", None)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Connection);
    assert_eq!(mock.connect_attempts(), vec![MASTER, STANDBY]);
    assert_eq!(mock.closes(), 1);
}

#[tokio::test]
async fn test_write_statements_rejected_before_connecting() {
    let mock = MockConnector::new();
    let layer = layer(&mock, config());

    for sql in [
        "DELETE FROM users WHERE id = 1",
        "UPDATE users SET name = 'x' WHERE id = 1",
        "SELECT * FROM users FOR UPDATE",
        "SELECT 1; DROP TABLE users",
    ] {
        let error = layer.execute_safe_query(sql, None).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Permission, "{}", sql);
    }
    assert!(mock.connect_attempts().is_empty());
}

#[tokio::test]
async fn test_bound_parameters_reach_the_session() {
    let mock = MockConnector::new();
    let layer = layer(&mock, config());

    layer
        .execute_safe_query_with(
            "SELECT id FROM users WHERE email = ?",
            None,
            &[QueryParam::from("a@example.com")],
        )
        .await
        .unwrap();
    assert_eq!(
        mock.params_of("WHERE email = ?"),
        Some(vec![QueryParam::Text("a@example.com".to_string())])
    );
}

#[tokio::test]
async fn test_on_host_targets_the_given_master() {
    let mock = MockConnector::new().host("db-master-02", ConnectBehavior::Refuse);
    let config = config().with_topology(
        StandbyTopology::default().with_convention("{master}-standby"),
    );
    let layer = layer(&mock, config);

    let outcome = layer
        .on_host("db-master-02")
        .execute_safe_query("SELECT 1", None)
        .await
        .unwrap();
    assert_eq!(outcome.host, "db-master-02-standby");
    assert_eq!(mock.connect_attempts(), vec!["db-master-02", "db-master-02-standby"]);
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test]
async fn test_close_safe_connection_is_idempotent() {
    let mock = MockConnector::new();
    let layer = layer(&mock, config());

    assert_eq!(layer.close_safe_connection().await.unwrap(), 0);

    let connection = layer
        .get_safe_connection(MASTER, None)
        .await
        .into_result()
        .unwrap();
    assert_eq!(layer.close_safe_connection().await.unwrap(), 1);
    assert_eq!(layer.close_safe_connection().await.unwrap(), 0);
    assert_eq!(mock.closes(), 1);

    let error = connection.fetch_all("SELECT 1", &[]).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Connection);
    connection.release().await.unwrap();
    assert_eq!(mock.closes(), 1);
}

#[tokio::test]
async fn test_released_connections_are_not_closed_again() {
    let mock = MockConnector::new();
    let layer = layer(&mock, config());

    layer.execute_safe_query("SELECT 1", None).await.unwrap();
    layer.execute_safe_query("SELECT 2", None).await.unwrap();
    assert_eq!(layer.close_safe_connection().await.unwrap(), 0);
    assert_eq!(mock.closes(), 2);
}

// =============================================================================
// Standby resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_standby_sources() {
    let mock = MockConnector::new();

    let layer_static = layer(&mock, config());
    assert_eq!(
        layer_static.resolve_standby("DB-MASTER-01").await.as_deref(),
        Some(STANDBY)
    );
    assert_eq!(layer_static.resolve_standby("db-other").await, None);

    let convention = config()
        .with_topology(StandbyTopology::default().with_convention("{master}.replica"));
    let layer_convention = layer(&mock, convention);
    assert_eq!(
        layer_convention.resolve_standby("db-7").await.as_deref(),
        Some("db-7.replica")
    );

    let same = config().with_topology(StandbyTopology::default().with_pair(MASTER, MASTER));
    assert_eq!(layer(&mock, same).resolve_standby(MASTER).await, None);
}

#[tokio::test]
async fn test_resolve_standby_from_cluster_registry() {
    let mock = MockConnector::new()
        .respond(
            MASTER,
            "SELECT cluster_name FROM",
            Response::Rows(vec![row(json!({"cluster_name": "orders_cluster"}))]),
        )
        .respond(
            MASTER,
            "SELECT ip FROM",
            Response::Rows(vec![row(json!({"ip": "10.0.0.12"}))]),
        );
    let config = config()
        .with_topology(StandbyTopology::default().with_registry(ClusterRegistry::default()));
    let layer = layer(&mock, config);

    assert_eq!(
        layer.resolve_standby("10.0.0.11").await.as_deref(),
        Some("10.0.0.12")
    );
    assert_eq!(
        mock.params_of("SELECT ip FROM cluster"),
        Some(vec![QueryParam::Text("orders_cluster".to_string())])
    );
    assert_eq!(mock.closes(), 1);
}

#[tokio::test]
async fn test_registry_failure_means_no_standby() {
    let mock = MockConnector::new().host(MASTER, ConnectBehavior::Refuse);
    let config = config()
        .with_topology(StandbyTopology::default().with_registry(ClusterRegistry::default()));
    let layer = layer(&mock, config);

    assert_eq!(layer.resolve_standby("10.0.0.11").await, None);
}

// =============================================================================
// Introspection
// =============================================================================

fn statistics_row(index: &str, column: &str, non_unique: u64, seq: u64) -> Row {
    row(json!({
        "INDEX_NAME": index,
        "COLUMN_NAME": column,
        "NON_UNIQUE": non_unique,
        "SEQ_IN_INDEX": seq,
        "INDEX_TYPE": "BTREE",
        "COLLATION": "A",
    }))
}

#[tokio::test]
async fn test_get_table_indexes_orders_primary_first() {
    let mock = MockConnector::new()
        .respond("*", "AS table_count", Response::Rows(vec![row(json!({"table_count": 1}))]))
        .respond(
            "*",
            "INFORMATION_SCHEMA.STATISTICS",
            Response::Rows(vec![
                statistics_row("idx_status", "status", 1, 1),
                statistics_row("idx_status", "created_at", 1, 2),
                statistics_row("PRIMARY", "id", 0, 1),
                statistics_row("idx_email", "email", 0, 1),
            ]),
        );
    let layer = layer(&mock, config());

    let indexes = layer.get_table_indexes("shop", "users").await.unwrap();
    let names: Vec<&str> = indexes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["PRIMARY", "idx_email", "idx_status"]);
    assert!(indexes[0].is_primary);
    assert!(indexes[1].is_unique);
    assert_eq!(indexes[2].column_names(), vec!["status", "created_at"]);
    assert_eq!(indexes[2].schema.as_deref(), Some("shop"));
    assert_eq!(mock.opened(), mock.closes());
}

#[tokio::test]
async fn test_get_table_indexes_missing_table() {
    let mock = MockConnector::new()
        .respond("*", "AS table_count", Response::Rows(vec![row(json!({"table_count": 0}))]));
    let layer = layer(&mock, config());

    assert!(!layer.check_table_exists("shop", "ghost").await.unwrap());
    let error = layer.get_table_indexes("shop", "ghost").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SchemaNotFound);
}

#[tokio::test]
async fn test_find_database_for_table_skips_system_and_excluded() {
    let mock = MockConnector::new().respond(
        "*",
        "CAST(TABLE_SCHEMA",
        Response::Rows(vec![
            row(json!({"TABLE_SCHEMA": "archive"})),
            row(json!({"TABLE_SCHEMA": "mysql"})),
            row(json!({"TABLE_SCHEMA": "shop"})),
        ]),
    );
    let layer = layer(&mock, config().with_excluded_databases(["archive"]));

    assert_eq!(
        layer.find_database_for_table("users").await.unwrap().as_deref(),
        Some("shop")
    );
}

#[tokio::test]
async fn test_estimate_row_count() {
    let unknown = MockConnector::new()
        .respond("*", "SELECT TABLE_ROWS", Response::Rows(vec![row(json!({"TABLE_ROWS": null}))]));
    let known = MockConnector::new()
        .respond("*", "SELECT TABLE_ROWS", Response::Rows(vec![row(json!({"TABLE_ROWS": 1200}))]));
    let missing = MockConnector::new();

    let estimate = layer(&unknown, config()).estimate_row_count("shop", "users").await;
    assert_eq!(estimate.unwrap(), None);

    let estimate = layer(&known, config()).estimate_row_count("shop", "users").await;
    assert_eq!(estimate.unwrap(), Some(1200));

    let error = layer(&missing, config())
        .estimate_row_count("shop", "ghost")
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SchemaNotFound);
}

#[tokio::test]
async fn test_show_create_table_rejects_unsafe_names() {
    let mock = MockConnector::new().respond(
        "*",
        "SHOW CREATE TABLE",
        Response::Rows(vec![row(json!({"Table": "users", "Create Table": "CREATE TABLE `users` (`id` int)"}))]),
    );
    let layer = layer(&mock, config());

    let ddl = layer.show_create_table("shop", "users").await.unwrap();
    assert_eq!(ddl.as_deref(), Some("CREATE TABLE `users` (`id` int)"));

    let error = layer.show_create_table("shop", "users`; --").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Syntax);
    assert_eq!(mock.opened(), 1);
}

// =============================================================================
// Execution plans
// =============================================================================

#[tokio::test]
async fn test_explain_statement_reads_plan_rows() {
    let mock = MockConnector::new().respond(
        "*",
        "EXPLAIN SELECT",
        Response::Rows(vec![
            row(json!({
                "id": 1,
                "select_type": "SIMPLE",
                "table": "o",
                "type": "ALL",
                "possible_keys": "idx_user_id,idx_status",
                "key": null,
                "rows": 48000,
                "Extra": "Using where; Using filesort",
            })),
            row(json!({
                "id": 1,
                "select_type": "SIMPLE",
                "table": "u",
                "type": "eq_ref",
                "possible_keys": "PRIMARY",
                "key": "PRIMARY",
                "rows": 1,
                "Extra": null,
            })),
        ]),
    );
    let layer = layer(&mock, config());

    let plan = layer
        .explain_statement(
            "SELECT * FROM orders o JOIN users u ON u.id = o.user_id ORDER BY o.created_at;",
            Some("shop"),
        )
        .await
        .unwrap();

    assert_eq!(plan.rows.len(), 2);
    assert_eq!(plan.rows[0].possible_keys, vec!["idx_user_id", "idx_status"]);
    assert_eq!(plan.rows_examined(), 48001);
    assert!(plan.using_filesort());
    assert!(!plan.using_temporary());
    assert!(plan.has_full_scan());
    assert_eq!(plan.used_key(), Some("PRIMARY"));
    assert_eq!(plan.access_type(), Some("eq_ref"));

    let executed = mock.executed_on(MASTER);
    assert!(executed.iter().any(|sql| {
        sql == "EXPLAIN SELECT * FROM orders o JOIN users u ON u.id = o.user_id ORDER BY o.created_at"
    }));
    assert_eq!(mock.opened(), mock.closes());
}

#[tokio::test]
async fn test_explain_statement_rejects_writes_before_connecting() {
    let mock = MockConnector::new();
    let layer = layer(&mock, config());

    for sql in ["UPDATE users SET name = 'x'", "SELECT 1; DROP TABLE users"] {
        let error = layer.explain_statement(sql, Some("shop")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Permission);
    }
    assert!(mock.connect_attempts().is_empty());
}

#[tokio::test]
async fn test_explain_statement_falls_back_to_standby() {
    let mock = MockConnector::new()
        .host(MASTER, ConnectBehavior::Refuse)
        .respond(
            STANDBY,
            "EXPLAIN",
            Response::Rows(vec![row(json!({"id": 1, "table": "users", "type": "const", "key": "PRIMARY", "rows": 1}))]),
        );
    let layer = layer(&mock, config());

    let plan = layer
        .explain_statement("SELECT * FROM users WHERE id = 1", Some("shop"))
        .await
        .unwrap();
    assert_eq!(plan.access_type(), Some("const"));
    assert!(mock.executed_on(MASTER).is_empty());
}

// =============================================================================
// Slow-query log
// =============================================================================

fn slow_log_config() -> AccessConfig {
    config().with_slow_log(SlowLogEndpoint::new(endpoint("db-dba-01").with_database("dba")))
}

#[tokio::test]
async fn test_fetch_slow_queries_reads_month_window() {
    let mock = MockConnector::new()
        .respond("db-dba-01", "SHOW TABLES LIKE", Response::Rows(vec![row(json!({"Tables_in_dba (slow)": "slow"}))]))
        .respond(
            "db-dba-01",
            "FROM slow",
            Response::Rows(vec![
                row(json!({
                    "checksum": "A1B2",
                    "sql_content": "SELECT * FROM shop.orders WHERE user_id = 42",
                    "execute_cnt": 120,
                    "query_time": "3.250000",
                    "hostname_max": "10.0.0.11",
                })),
                row(json!({
                    "checksum": "C3D4",
                    "sql_content": null,
                })),
            ]),
        );
    let layer = layer(&mock, slow_log_config());
    let filter = SlowQueryFilter {
        min_execute_count: 10,
        min_query_time: 1.5,
        month_offset: 1,
    };

    let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let records = layer.fetch_slow_queries_at(&filter, today).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.checksum.as_deref(), Some("A1B2"));
    assert_eq!(record.execute_count, 120);
    assert!((record.query_time_max - 3.25).abs() < f64::EPSILON);
    assert_eq!(record.host.as_deref(), Some("10.0.0.11"));
    assert_eq!(record.database.as_deref(), Some("shop"));
    assert_eq!(record.table.as_deref(), Some("orders"));
    assert!(!record.masked);

    assert_eq!(
        mock.params_of("FROM slow"),
        Some(vec![
            QueryParam::Text("2024-02-01".to_string()),
            QueryParam::Text("2024-03-01".to_string()),
            QueryParam::UInt(10),
            QueryParam::Float(1.5),
        ])
    );
    // the business hosts are never touched
    assert!(mock.executed_on(MASTER).is_empty());
    assert_eq!(mock.opened(), mock.closes());
}

#[tokio::test]
async fn test_fetch_slow_queries_missing_table_is_empty() {
    let mock = MockConnector::new();
    let layer = layer(&mock, slow_log_config());

    let records = layer
        .fetch_slow_queries(&SlowQueryFilter::default())
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_fetch_slow_queries_requires_configuration() {
    let mock = MockConnector::new();
    let layer = layer(&mock, config());

    let error = layer
        .fetch_slow_queries(&SlowQueryFilter::default())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Configuration);
    assert!(mock.connect_attempts().is_empty());
}

#[tokio::test]
async fn test_compare_slow_queries_reads_two_months() {
    let mock = MockConnector::new()
        .respond("db-dba-01", "SHOW TABLES LIKE", Response::Rows(vec![row(json!({"Tables_in_dba (slow)": "slow"}))]))
        .respond(
            "db-dba-01",
            "FROM slow",
            Response::Rows(vec![row(json!({
                "checksum": "A1B2",
                "sql_content": "SELECT * FROM orders WHERE user_id = 42",
                "execute_cnt": 120,
                "query_time": "3.5",
                "hostname_max": "10.0.0.11",
            }))]),
        );
    let layer = layer(&mock, slow_log_config());
    let filter = SlowQueryFilter {
        min_execute_count: 10,
        min_query_time: 1.0,
        month_offset: 1,
    };

    let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let comparison = layer.compare_slow_queries_at(&filter, today).await.unwrap();

    assert_eq!(comparison.current.month, "2024-02");
    assert_eq!(comparison.previous.month, "2024-01");
    assert_eq!(comparison.current.total, 1);
    assert_eq!(comparison.previous.total, 1);
    assert!(comparison.growth_rate.abs() < f64::EPSILON);
    assert_eq!(comparison.new_statements, 0);
    assert_eq!(comparison.resolved_statements, 0);

    let windows: Vec<Vec<QueryParam>> = mock
        .all_params_of("FROM slow")
        .into_iter()
        .map(|params| params.into_iter().take(2).collect())
        .collect();
    assert_eq!(
        windows,
        vec![
            vec![
                QueryParam::Text("2024-02-01".to_string()),
                QueryParam::Text("2024-03-01".to_string()),
            ],
            vec![
                QueryParam::Text("2024-01-01".to_string()),
                QueryParam::Text("2024-02-01".to_string()),
            ],
        ]
    );
    assert_eq!(mock.opened(), mock.closes());
}
