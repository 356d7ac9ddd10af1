use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use dispatch_core::{DispatchError, Job};
use dispatch_net::Master;

#[derive(Clone)]
struct Add {
    a: i64,
    b: i64,
}

impl Job for Add {
    type Output = i64;

    fn call(&self) -> Value {
        json!({"a": self.a, "b": self.b})
    }

    fn result(&self, response: Value) -> Self::Output {
        response["sum"].as_i64().expect("worker must return a sum")
    }
}

/// Connects to the master, answers exactly `count` jobs with `a + b`, then
/// closes the connection. `count = None` means answer forever.
async fn spawn_adder_worker(addr: std::net::SocketAddr, count: Option<usize>) {
    let stream = TcpStream::connect(addr).await.expect("connect");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut answered = 0;
    loop {
        if let Some(limit) = count {
            if answered >= limit {
                return;
            }
        }
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.expect("read call");
        if n == 0 {
            return;
        }
        let call: Value = serde_json::from_str(line.trim_end()).unwrap();
        let sum = call["a"].as_i64().unwrap() + call["b"].as_i64().unwrap();
        let response = json!({"sum": sum}).to_string() + "\n";
        write_half.write_all(response.as_bytes()).await.unwrap();
        answered += 1;
    }
}

async fn within(seconds: u64, fut: impl std::future::Future<Output = ()>) {
    timeout(Duration::from_secs(seconds), fut)
        .await
        .expect("scenario timed out");
}

#[tokio::test]
async fn single_worker_processes_a_job_set_in_order() {
    within(5, async {
        let master: Master<Add> = Master::bind("127.0.0.1:0").await.unwrap();
        let addr = master.local_addr();
        tokio::spawn(spawn_adder_worker(addr, None));

        let set_id = master
            .submit(vec![Add { a: 1, b: 2 }, Add { a: 10, b: 20 }])
            .await
            .unwrap();

        let mut results = master.results(set_id);
        assert_eq!(results.next().await, Some(3));
        assert_eq!(results.next().await, Some(30));
        assert_eq!(results.next().await, None);

        assert_eq!(master.is_done(set_id).await, Some(true));
        master.close().await;
    })
    .await;
}

#[tokio::test]
async fn multiple_workers_drain_one_job_set_between_them() {
    within(5, async {
        let master: Master<Add> = Master::bind("127.0.0.1:0").await.unwrap();
        let addr = master.local_addr();
        for _ in 0..4 {
            tokio::spawn(spawn_adder_worker(addr, None));
        }

        let jobs: Vec<Add> = (0..20).map(|i| Add { a: i, b: 1 }).collect();
        let expected: std::collections::HashSet<i64> = jobs.iter().map(|j| j.a + j.b).collect();
        let set_id = master.submit(jobs).await.unwrap();

        let mut results = master.results(set_id);
        let mut seen = std::collections::HashSet::new();
        while let Some(value) = results.next().await {
            seen.insert(value);
        }
        assert_eq!(seen, expected);
        master.close().await;
    })
    .await;
}

#[tokio::test]
async fn a_worker_that_disconnects_mid_job_gets_its_job_requeued() {
    within(5, async {
        let master: Master<Add> = Master::bind("127.0.0.1:0").await.unwrap();
        let addr = master.local_addr();
        let set_id = master.submit(vec![Add { a: 5, b: 6 }]).await.unwrap();

        // This worker takes the job and vanishes without answering.
        let flaky = TcpStream::connect(addr).await.unwrap();
        let (flaky_read, mut flaky_write) = flaky.into_split();
        let mut flaky_reader = BufReader::new(flaky_read);
        let mut flaky_line = String::new();
        flaky_reader.read_line(&mut flaky_line).await.unwrap();
        drop(flaky_write.shutdown().await);
        drop(flaky_reader);
        drop(flaky_write);

        // A reliable worker connects after, and should pick up the requeued job.
        tokio::spawn(spawn_adder_worker(addr, None));

        let mut results = master.results(set_id);
        assert_eq!(results.next().await, Some(11));
        master.close().await;
    })
    .await;
}

#[tokio::test]
async fn cancelling_a_job_set_ends_its_result_stream_immediately() {
    within(5, async {
        let master: Master<Add> = Master::bind("127.0.0.1:0").await.unwrap();
        let set_id = master
            .submit(vec![Add { a: 1, b: 1 }, Add { a: 2, b: 2 }])
            .await
            .unwrap();

        master.cancel(set_id).await;
        let mut results = master.results(set_id);
        assert_eq!(results.next().await, None);
        assert_eq!(master.is_done(set_id).await, Some(true));
        master.close().await;
    })
    .await;
}

#[tokio::test]
async fn independent_consumers_each_replay_the_full_history() {
    within(5, async {
        let master: Master<Add> = Master::bind("127.0.0.1:0").await.unwrap();
        let addr = master.local_addr();
        tokio::spawn(spawn_adder_worker(addr, None));

        let set_id = master
            .submit(vec![Add { a: 1, b: 1 }, Add { a: 2, b: 2 }])
            .await
            .unwrap();

        let mut first_reader = master.results(set_id);
        assert_eq!(first_reader.next().await, Some(2));
        assert_eq!(first_reader.next().await, Some(4));

        // A second, later subscriber still sees both results from the start.
        let mut second_reader = master.results(set_id);
        assert_eq!(second_reader.next().await, Some(2));
        assert_eq!(second_reader.next().await, Some(4));
        assert_eq!(second_reader.next().await, None);

        master.close().await;
    })
    .await;
}

#[tokio::test]
async fn a_second_job_set_waits_for_the_first_to_finish() {
    within(5, async {
        let master: Master<Add> = Master::bind("127.0.0.1:0").await.unwrap();
        let addr = master.local_addr();
        // Exactly one worker: if dispatch ever interleaved sets, this
        // worker could answer a B job before A has finished.
        tokio::spawn(spawn_adder_worker(addr, None));

        let set_a = master
            .submit(vec![Add { a: 1, b: 1 }, Add { a: 2, b: 2 }])
            .await
            .unwrap();
        let set_b = master
            .submit(vec![Add { a: 10, b: 10 }, Add { a: 20, b: 20 }])
            .await
            .unwrap();

        let mut results_a = master.results(set_a);
        assert_eq!(results_a.next().await, Some(2));
        assert_eq!(results_a.next().await, Some(4));
        assert_eq!(results_a.next().await, None);
        assert_eq!(master.is_done(set_a).await, Some(true));
        // Only now is B's work reachable.
        assert_eq!(master.is_done(set_b).await, Some(false));

        let mut results_b = master.results(set_b);
        assert_eq!(results_b.next().await, Some(20));
        assert_eq!(results_b.next().await, Some(40));

        master.close().await;
    })
    .await;
}

#[tokio::test]
async fn submit_after_close_is_rejected() {
    within(5, async {
        let master: Master<Add> = Master::bind("127.0.0.1:0").await.unwrap();
        let handle = master.handle();
        master.close().await;

        match handle.submit(vec![Add { a: 1, b: 1 }]).await {
            Err(DispatchError::PreconditionViolation(_)) => {}
            other => panic!("expected PreconditionViolation, got {other:?}"),
        }
    })
    .await;
}

#[tokio::test]
async fn closing_the_master_stops_accepting_new_connections() {
    within(5, async {
        let master: Master<Add> = Master::bind("127.0.0.1:0").await.unwrap();
        let addr = master.local_addr();
        master.close().await;

        let result = timeout(Duration::from_millis(500), TcpStream::connect(addr)).await;
        match result {
            Ok(Ok(_)) => panic!("connection should not have been accepted after close"),
            _ => {}
        }
    })
    .await;
}
