//! End-to-end coverage against the in-process SQLite adapter: the one backend
//! in this workspace that can exercise real persistence and real nested
//! transactions without an external server.

use aiodb::Value;
use futures::StreamExt;

async fn fresh_database() -> aiodb::Database {
    let db = aiodb::connect("sqlite://:memory:").await.unwrap();
    db.execute("create table greeting (id integer primary key, message text)", &[])
        .await
        .unwrap();
    db
}

#[tokio::test]
async fn execute_and_fetch_round_trip() {
    let db = fresh_database().await;
    db.execute("insert into greeting (message) values (%s)", &[Value::from("hello")])
        .await
        .unwrap();

    let rows = db.fetch_all("select id, message from greeting", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("message").unwrap().as_str(), Some("hello"));
    assert_eq!(rows[0].get(0).unwrap().as_i64(), Some(1));

    let value = db
        .fetch_val("select message from greeting where id = %s", &[Value::from(1)], "message")
        .await
        .unwrap();
    assert_eq!(value.unwrap().as_str(), Some("hello"));

    db.disconnect().await.unwrap();
}

#[tokio::test]
async fn committed_transaction_persists_rolled_back_one_does_not() {
    let db = fresh_database().await;

    db.with_transaction(false, false, None, |session| async move {
        session
            .execute("insert into greeting (message) values (%s)", &[Value::from("kept")])
            .await?;
        Ok::<_, aiodb::Error>(())
    })
    .await
    .unwrap();

    let result = db
        .with_transaction(false, false, None, |session| async move {
            session
                .execute("insert into greeting (message) values (%s)", &[Value::from("discarded")])
                .await?;
            Err::<(), aiodb::Error>(aiodb_core::state_error("force rollback"))
        })
        .await;
    assert!(result.is_err());

    let rows = db.fetch_all("select message from greeting order by id", &[]).await.unwrap();
    let messages: Vec<_> = rows.iter().map(|r| r.get(0).unwrap().as_str().unwrap().to_string()).collect();
    assert_eq!(messages, vec!["kept"]);
}

#[tokio::test]
async fn nested_transaction_rollback_only_undoes_the_inner_savepoint() {
    let db = fresh_database().await;

    db.with_transaction(false, false, None, |outer_session| async move {
        outer_session
            .execute("insert into greeting (message) values (%s)", &[Value::from("outer")])
            .await?;

        let inner = db
            .with_transaction(false, false, None, |inner_session| async move {
                inner_session
                    .execute("insert into greeting (message) values (%s)", &[Value::from("inner")])
                    .await?;
                Err::<(), aiodb::Error>(aiodb_core::state_error("force inner rollback"))
            })
            .await;
        assert!(inner.is_err());

        Ok::<_, aiodb::Error>(())
    })
    .await
    .unwrap();

    let rows = db.fetch_all("select message from greeting order by id", &[]).await.unwrap();
    let messages: Vec<_> = rows.iter().map(|r| r.get(0).unwrap().as_str().unwrap().to_string()).collect();
    assert_eq!(messages, vec!["outer"]);
}

#[tokio::test]
async fn iterate_streams_every_row_lazily() {
    let db = fresh_database().await;
    for message in ["a", "b", "c"] {
        db.execute("insert into greeting (message) values (%s)", &[Value::from(message)])
            .await
            .unwrap();
    }

    let mut stream = db.iterate("select message from greeting order by id", &[]);
    let mut seen = Vec::new();
    while let Some(row) = stream.next().await {
        seen.push(row.unwrap().get(0).unwrap().as_str().unwrap().to_string());
    }
    drop(stream);
    assert_eq!(seen, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn with_connection_reuses_the_same_session_for_nested_calls() {
    let db = fresh_database().await;

    db.with_connection(false, |session| async move {
        session
            .execute("insert into greeting (message) values (%s)", &[Value::from("first")])
            .await?;
        // A top-level call made from inside the scope must see the insert
        // above, proving it ran on the same task-current session.
        let rows = db.fetch_all("select message from greeting", &[]).await?;
        assert_eq!(rows.len(), 1);
        Ok::<_, aiodb::Error>(())
    })
    .await
    .unwrap();
}
