//! Integration tests for dbkit with MySQL testcontainer
//!
//! These tests run the full stack against a real server: statement
//! building, catalog loading, NULL handling, hooks and transactions.
//!
//! A single container is shared across all tests using the `ctor` pattern.
//! Tests run sequentially with `serial_test` and clean up tables between runs.
//!
//! Container cleanup:
//! - The `watchdog` feature handles cleanup on CTRL+C or SIGTERM signals
//! - For normal process exit, we use `shutdown_hooks` to signal the container thread to stop
//! - The container lives inside the thread, so it's dropped when the thread exits

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};

use chrono::{NaiveDate, NaiveDateTime};
use ctor::ctor;
use dbkit::{
    helper, params, Hook, IsolationLevel, LikeKind, MySqlPool, Record, Table, Transaction,
    Transactional,
};
use rust_decimal::Decimal;
use serial_test::serial;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::mysql::Mysql;

// Holds the connection URL (container lives in the thread)
static DB_URL: OnceLock<String> = OnceLock::new();
// Flag to signal the container thread to exit
static SHUTDOWN: AtomicBool = AtomicBool::new(false);
// Thread handle for joining on exit
static CONTAINER_THREAD: OnceLock<JoinHandle<()>> = OnceLock::new();

/// Cleanup function called on process exit.
/// Signals the container thread to stop and waits for it to finish.
extern "C" fn cleanup_on_exit() {
    SHUTDOWN.store(true, Ordering::SeqCst);
    // Give the container thread time to clean up
    std::thread::sleep(std::time::Duration::from_millis(500));
}

#[ctor]
fn setup_container() {
    use std::time::Duration;

    shutdown_hooks::add_shutdown_hook(cleanup_on_exit);

    let (ready_tx, ready_rx) = std::sync::mpsc::channel();

    // The container lives inside this thread, so it is dropped when the thread exits.
    let handle = thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let container: ContainerAsync<Mysql> = Mysql::default().start().await.unwrap();
            let port = container.get_host_port_ipv4(3306).await.unwrap();
            let url = format!("mysql://root@127.0.0.1:{}/test", port);

            let pool = MySqlPool::new(&url).unwrap();
            let schema = include_str!("schema.sql");
            for stmt in schema.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                Table::raw(&pool, stmt, &[]).exec().await.unwrap();
            }

            ready_tx.send(url).unwrap();

            while !SHUTDOWN.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });
    });

    let _ = CONTAINER_THREAD.set(handle);

    let url = ready_rx.recv().unwrap();
    DB_URL.set(url).unwrap();
}

fn get_db_url() -> &'static str {
    DB_URL.get().expect("Container not initialized")
}

const ALL_TABLES: &[&str] = &["t_man", "sys_user", "kv", "setting"];

async fn clean_all_tables(pool: &MySqlPool) {
    for table in ALL_TABLES {
        Table::raw(pool, &format!("TRUNCATE TABLE `{table}`"), &[])
            .exec()
            .await
            .unwrap();
    }
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Man {
    #[dbkit(json = "id")]
    pub id: i64,
    #[dbkit(json = "name")]
    pub name: String,
    #[dbkit(json = "addr")]
    pub addr: String,
    #[dbkit(json = "nick_name")]
    pub nick_name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct SysUser {
    #[dbkit(json = "id")]
    pub id: u32,
    #[dbkit(json = "u_name")]
    pub name: String,
    #[dbkit(json = "pwd")]
    pub pwd: String,
    #[dbkit(json = "age")]
    pub age: Option<i32>,
    #[dbkit(json = "score")]
    pub score: Option<Decimal>,
    #[dbkit(json = "active")]
    pub active: bool,
    #[dbkit(json = "born")]
    pub born: Option<NaiveDate>,
    #[dbkit(json = "profile")]
    pub profile: serde_json::Value,
    #[dbkit(json = "created_at")]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Kv {
    #[dbkit(json = "k")]
    pub k: String,
    #[dbkit(json = "v")]
    pub v: String,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Setting {
    #[dbkit(json = "id")]
    pub id: i64,
    #[dbkit(json = "value")]
    pub value: String,
    #[dbkit(json = "data")]
    pub data: Vec<u8>,
}

fn man(name: &str) -> Man {
    Man {
        name: name.to_string(),
        ..Default::default()
    }
}

// ============ Read/Write Round Trips ============

#[tokio::test]
#[serial]
async fn test_null_round_trip() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    let res = Table::new(&pool, "t_man").insert_one(&man("x")).await.unwrap();
    assert_eq!(res.rows_affected, 1);
    assert_eq!(res.last_insert_id, Some(1));

    Table::raw(
        &pool,
        "INSERT INTO t_man (name, addr, nick_name) VALUES (?, NULL, NULL)",
        params!["y"],
    )
    .exec()
    .await
    .unwrap();

    let found: Man = Table::new(&pool, "t_man")
        .set_where("name", "x")
        .find_one()
        .await
        .unwrap();
    assert_eq!(found.id, 1);
    assert_eq!(found.addr, "");
    assert_eq!(found.nick_name, "");

    let found: Man = Table::new(&pool, "t_man")
        .set_where("name", "y")
        .find_one()
        .await
        .unwrap();
    assert_eq!(found.addr, "");
    assert_eq!(found.nick_name, "");

    // Raw statements have no catalog; NULL still leaves zero values
    let raw: Man = Table::raw(&pool, "SELECT * FROM t_man WHERE name = ?", params!["y"])
        .find_one()
        .await
        .unwrap();
    assert_eq!(raw, found);

    pool.disconnect().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_empty_results() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    let err = Table::new(&pool, "t_man")
        .set_where("id", 42)
        .find_one::<Man>()
        .await
        .unwrap_err();
    assert!(dbkit::is_null_row(&err));

    let all: Vec<Man> = Table::new(&pool, "t_man").find_all().await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
#[serial]
async fn test_string_arguments_stay_literal() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    let nasty = r#"t" or 1=1# \ ' "#;
    Table::new(&pool, "t_man")
        .insert(&[man(nasty), man("plain")])
        .await
        .unwrap();

    let found: Vec<Man> = Table::new(&pool, "t_man")
        .set_where("name", nasty)
        .find_all()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, nasty);

    let liked: Vec<Man> = Table::new(&pool, "t_man")
        .set_like("name", LikeKind::All, r#"" or 1=1#"#)
        .find_all()
        .await
        .unwrap();
    assert_eq!(liked.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_count_and_paging() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    let men: Vec<Man> = (0..25).map(|i| man(&format!("m{i:02}"))).collect();
    Table::new(&pool, "t_man").insert(&men).await.unwrap();

    let n = Table::new(&pool, "t_man")
        .set_where_op("id", ">", 5)
        .set_order_by("id DESC")
        .set_limit(2, 3)
        .count()
        .await
        .unwrap();
    assert_eq!(n, 20);

    let page: Vec<Man> = Table::new(&pool, "t_man")
        .set_order_by("id")
        .set_limit(2, 10)
        .find_all()
        .await
        .unwrap();
    assert_eq!(page.first().map(|m| m.id), Some(11));
    assert_eq!(page.len(), 10);

    let capped: Vec<Man> = Table::new(&pool, "t_man")
        .size_on_missing_limit(true)
        .find_all()
        .await
        .unwrap();
    assert_eq!(capped.len(), 10);

    let names: Vec<String> = Table::new(&pool, "t_man")
        .select("name")
        .set_between("id", 1, 3)
        .set_order_by("id")
        .find_all()
        .await
        .unwrap();
    assert_eq!(names, ["m00", "m01", "m02"]);
}

#[tokio::test]
#[serial]
async fn test_update_and_delete() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    Table::new(&pool, "t_man")
        .insert(&[man("a"), man("b"), man("c")])
        .await
        .unwrap();

    let mut a: Man = Table::new(&pool, "t_man")
        .set_where("name", "a")
        .find_one()
        .await
        .unwrap();
    a.addr = "street".into();
    let res = Table::new(&pool, "t_man").update(&a).await.unwrap();
    assert_eq!(res.rows_affected, 1);

    let again: Man = helper::find_by_id(&pool, "t_man", a.id).await.unwrap();
    assert_eq!(again.addr, "street");

    let err = Table::new(&pool, "t_man")
        .update(&man("nobody"))
        .await
        .unwrap_err();
    assert!(matches!(err, dbkit::Error::UnboundedWrite(_)));

    let res = Table::new(&pool, "t_man").delete(&again).await.unwrap();
    assert_eq!(res.rows_affected, 1);

    let res = Table::new(&pool, "t_man")
        .set_where_in("name", vec!["b", "c"])
        .delete_where()
        .await
        .unwrap();
    assert_eq!(res.rows_affected, 2);
    assert_eq!(
        helper::count_where(&pool, "t_man", "1 = ?", params![1])
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
#[serial]
async fn test_defaults_types_and_hooks() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    let user = SysUser {
        name: "ann".into(),
        pwd: "secret".into(),
        score: Some(Decimal::new(1250, 2)),
        active: true,
        born: NaiveDate::from_ymd_opt(2001, 2, 3),
        profile: serde_json::json!({"langs": ["rust", "go"], "note": "a\"b\\c"}),
        ..Default::default()
    };
    Table::new(&pool, "sys_user")
        .hook("profile", Hook::json())
        .insert_one(&user)
        .await
        .unwrap();

    let found: SysUser = Table::new(&pool, "sys_user")
        .hook("profile", Hook::json())
        .set_where("u_name", "ann")
        .find_one()
        .await
        .unwrap();
    assert_eq!(found.id, 1);
    // age is NOT NULL with a default, so the missing value became DEFAULT
    assert_eq!(found.age, Some(18));
    assert_eq!(found.score, Some(Decimal::new(1250, 2)));
    assert!(found.active);
    assert_eq!(found.born, NaiveDate::from_ymd_opt(2001, 2, 3));
    assert_eq!(found.profile, user.profile);
    assert!(found.created_at.is_some());

    let as_map: HashMap<String, String> = Table::new(&pool, "sys_user")
        .select("u_name, score, born")
        .find_one()
        .await
        .unwrap();
    assert_eq!(as_map["u_name"], "ann");
    assert_eq!(as_map["score"], "12.50");
    assert_eq!(as_map["born"], "2001-02-03");

    let (mut name, mut age) = (String::new(), 0i64);
    Table::raw(&pool, "SELECT u_name, age FROM sys_user WHERE id = ?", params![1])
        .query_row_scan(&mut [&mut name as &mut dyn dbkit::ScanTarget, &mut age])
        .await
        .unwrap();
    assert_eq!((name.as_str(), age), ("ann", 18));
}

#[tokio::test]
#[serial]
async fn test_upsert() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    let kv = |k: &str, v: &str| Kv {
        k: k.into(),
        v: v.into(),
    };
    Table::new(&pool, "kv")
        .upsert(&[kv("a", "1"), kv("b", "2")])
        .await
        .unwrap();
    Table::new(&pool, "kv")
        .upsert(&[kv("a", "10")])
        .await
        .unwrap();

    let all: Vec<Kv> = Table::new(&pool, "kv")
        .set_order_by("k")
        .find_all()
        .await
        .unwrap();
    assert_eq!(all, [kv("a", "10"), kv("b", "2")]);
}

#[tokio::test]
#[serial]
async fn test_keyword_column_and_binary_round_trip() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    let binary = Setting {
        value: "blob".into(),
        data: vec![0xff, 0xfe, 0x00, 0x1a, b'\'', b'\\', 0x41],
        ..Default::default()
    };
    let text = Setting {
        value: "text".into(),
        data: b"plain".to_vec(),
        ..Default::default()
    };
    Table::new(&pool, "setting")
        .insert(&[binary.clone(), text.clone()])
        .await
        .unwrap();

    let all: Vec<Setting> = Table::new(&pool, "setting")
        .set_order_by("id")
        .find_all()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].value, "blob");
    assert_eq!(all[0].data, binary.data);
    assert_eq!(all[1].data, text.data);

    let mut renamed = all[0].clone();
    renamed.value = "renamed".into();
    Table::new(&pool, "setting").update(&renamed).await.unwrap();
    let found: Setting = Table::new(&pool, "setting")
        .set_where("data", binary.data.clone())
        .find_one()
        .await
        .unwrap();
    assert_eq!(found, renamed);
}

// ============ Transaction Tests ============

#[tokio::test]
#[serial]
async fn test_transaction_commit_and_rollback() {
    let pool = MySqlPool::new(get_db_url()).unwrap();
    clean_all_tables(&pool).await;

    let tx = pool.begin().await.unwrap();
    Table::new(&tx, "t_man").insert_one(&man("gone")).await.unwrap();
    tx.rollback().await.unwrap();

    let committed = pool
        .in_transaction_with(IsolationLevel::ReadCommitted, |tx| {
            Box::pin(async move {
                let res = Table::new(tx, "t_man").insert_one(&man("kept")).await?;
                Ok(res.last_insert_id)
            })
        })
        .await
        .unwrap();
    assert!(committed.is_some());

    let failed: dbkit::Result<()> = pool
        .in_transaction(|tx| {
            Box::pin(async move {
                Table::new(tx, "t_man").insert_one(&man("dropped")).await?;
                Err(dbkit::Error::custom("abort"))
            })
        })
        .await;
    assert!(failed.is_err());

    let names: Vec<String> = Table::new(&pool, "t_man")
        .select("name")
        .find_all()
        .await
        .unwrap();
    assert_eq!(names, ["kept"]);
}

#[tokio::test]
#[serial]
async fn test_callbacks() -> anyhow::Result<()> {
    let pool = MySqlPool::new(get_db_url())?;
    clean_all_tables(&pool).await;

    helper::insert_objs(&pool, "t_man", &[man("p"), man("q"), man("r")]).await?;

    let upper: Vec<Man> = Table::new(&pool, "t_man")
        .set_order_by("id")
        .find_all_fn(|m: &mut Man| {
            m.name = m.name.to_uppercase();
            Ok(())
        })
        .await?;
    assert_eq!(upper[2].name, "R");

    let mut seen = 0;
    Table::new(&pool, "t_man")
        .find_each(|_: Man| {
            seen += 1;
            Ok(())
        })
        .await?;
    assert_eq!(seen, 3);

    let err = Table::new(&pool, "t_man")
        .find_each(|m: Man| {
            if m.name == "q" {
                return Err(dbkit::Error::custom("stop at q"));
            }
            Ok(())
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "stop at q");
    Ok(())
}
