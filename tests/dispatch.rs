use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pingcheck::{
    DispatchFault, Dispatcher, HostResolver, ProbeConfig, ProbeOutcome, Prober, Reachability,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

struct NeverReachable;

#[async_trait]
impl Reachability for NeverReachable {
    async fn is_reachable(&self, _ip: IpAddr, _limit: Duration) -> io::Result<bool> {
        Ok(false)
    }
}

fn dispatcher() -> Dispatcher {
    let prober = Prober::new(HostResolver::from_system_conf(), Arc::new(NeverReachable));
    Dispatcher::current(prober).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_dispatches_deliver_to_their_own_callback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let open = Arc::new(ProbeConfig::new("127.0.0.1", port, 2000).unwrap());
    let dispatcher = dispatcher();

    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Result<ProbeOutcome, DispatchFault>)>();
    let n = 8;
    for i in 0..n {
        // Even slots hit the open loopback port, odd slots a host that can't resolve.
        let host = if i % 2 == 0 {
            "127.0.0.1".to_string()
        } else {
            format!("probe-{}.invalid", i)
        };
        let result_tx = tx.clone();
        let fault_tx = tx.clone();
        dispatcher.dispatch(
            host,
            open.clone(),
            move |outcome| result_tx.send((i, Ok(outcome))).unwrap(),
            move |fault| fault_tx.send((i, Err(fault))).unwrap(),
        );
    }
    drop(tx);

    let mut seen = vec![0usize; n];
    while let Some((i, delivered)) = rx.recv().await {
        seen[i] += 1;
        let outcome = delivered.unwrap();
        if i % 2 == 0 {
            assert!(outcome.is_success(), "slot {} failed: {:?}", i, outcome);
        } else {
            assert_eq!(
                outcome.error_message(),
                Some(format!("host not found: probe-{}.invalid", i))
            );
        }
    }
    assert_eq!(seen, vec![1; n]);
}

#[tokio::test]
async fn test_dispatch_returns_before_probe_finishes() {
    let dispatcher = dispatcher();
    // Unroutable on most networks; bounded by the timeout either way.
    let config = Arc::new(ProbeConfig::new("10.255.255.1", 9, 1000).unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let fault_tx = tx.clone();

    let started = Instant::now();
    dispatcher.dispatch(
        "10.255.255.1",
        config,
        move |outcome: ProbeOutcome| tx.send(Ok(outcome)).unwrap(),
        move |fault| fault_tx.send(Err(fault)).unwrap(),
    );
    assert!(started.elapsed() < Duration::from_millis(100));

    let delivered = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert!(delivered.is_ok());
    assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn test_probe_async_defaults_to_configured_host() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = Arc::new(ProbeConfig::new("127.0.0.1", port, 1000).unwrap());

    let outcome = dispatcher().probe_async(None, config).await.unwrap().unwrap();

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_probe_async_uses_override_host() {
    let config = Arc::new(ProbeConfig::new("127.0.0.1", 80, 1000).unwrap());

    let outcome = dispatcher()
        .probe_async(Some("override.invalid"), config)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.error_message().as_deref(), Some("host not found: override.invalid"));
}
