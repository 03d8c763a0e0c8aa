// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{
    AsyncBatchHandler, BatchDispatcher, DispatchError, DispatchMode, DispatcherConfig, Lifecycle,
};
use tokio::sync::{mpsc, Semaphore};

const DEADLINE: Duration = Duration::from_secs(10);

/// Forwards each batch to a channel after yielding to the scheduler once.
struct Forward {
    out: mpsc::UnboundedSender<Vec<u32>>,
}

#[async_trait]
impl AsyncBatchHandler<u32> for Forward {
    async fn handle(&mut self, batch: &[u32]) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.out.send(batch.to_vec())?;
        Ok(())
    }
}

fn forwarding() -> (BatchDispatcher<u32>, mpsc::UnboundedReceiver<Vec<u32>>) {
    let (out, rx) = mpsc::unbounded_channel();
    let dispatcher = BatchDispatcher::new_async(Forward { out }).expect("inside a runtime");
    (dispatcher, rx)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Vec<u32>>) -> Vec<u32> {
    tokio::time::timeout(DEADLINE, rx.recv())
        .await
        .expect("batch should arrive")
        .expect("channel open")
}

// `#[tokio::test]` runs on a single-threaded runtime: if the idle loop held on
// to the only worker, none of these tests could make progress.
#[tokio::test]
async fn test_idle_loop_does_not_occupy_the_runtime() {
    let (dispatcher, mut rx) = forwarding();
    assert_eq!(dispatcher.mode(), DispatchMode::Suspending);

    // Give the loop plenty of chances to run while there is nothing to do.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;

    dispatcher.add(1).unwrap();
    assert_eq!(recv(&mut rx).await, vec![1]);

    dispatcher.shutdown_async().await;
}

#[tokio::test]
async fn test_async_order_and_non_empty_batches() {
    let (dispatcher, mut rx) = forwarding();

    for i in 0..1_000 {
        dispatcher.add(i).unwrap();
        if i % 100 == 0 {
            tokio::task::yield_now().await;
        }
    }
    dispatcher.dispose();
    tokio::time::timeout(DEADLINE, dispatcher.terminated())
        .await
        .expect("dispatcher should terminate");

    let mut delivered = Vec::new();
    while let Ok(batch) = rx.try_recv() {
        assert!(!batch.is_empty());
        delivered.extend(batch);
    }
    assert_eq!(delivered, (0..1_000).collect::<Vec<_>>());
}

/// Parks on a semaphore during its first call.
struct Gated {
    gate: Arc<Semaphore>,
    started: Arc<Semaphore>,
    first: bool,
    out: mpsc::UnboundedSender<Vec<u32>>,
}

#[async_trait]
impl AsyncBatchHandler<u32> for Gated {
    async fn handle(&mut self, batch: &[u32]) -> anyhow::Result<()> {
        if self.first {
            self.first = false;
            self.started.add_permits(1);
            self.gate.acquire().await?.forget();
        }
        self.out.send(batch.to_vec())?;
        Ok(())
    }
}

#[tokio::test]
async fn test_async_items_queued_during_a_batch_coalesce() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(Semaphore::new(0));
    let (out, mut rx) = mpsc::unbounded_channel();
    let dispatcher = BatchDispatcher::new_async(Gated {
        gate: Arc::clone(&gate),
        started: Arc::clone(&started),
        first: true,
        out,
    })
    .unwrap();

    dispatcher.add(0).unwrap();
    started.acquire().await.unwrap().forget();

    dispatcher.add_all([1, 2, 3]).unwrap();
    gate.add_permits(1);

    assert_eq!(recv(&mut rx).await, vec![0]);
    assert_eq!(recv(&mut rx).await, vec![1, 2, 3]);
    dispatcher.shutdown_async().await;
}

struct Flaky {
    calls: Arc<AtomicUsize>,
    out: mpsc::UnboundedSender<Vec<u32>>,
}

#[async_trait]
impl AsyncBatchHandler<u32> for Flaky {
    async fn handle(&mut self, batch: &[u32]) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.out.send(batch.to_vec())?;
        match call {
            0 => anyhow::bail!("transient failure"),
            1 => panic!("handler bug"),
            _ => Ok(()),
        }
    }
}

#[tokio::test]
async fn test_async_failures_do_not_stop_the_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (out, mut rx) = mpsc::unbounded_channel();
    let config = DispatcherConfig::named("flaky").with_failure_hook(|_| {});
    let dispatcher = BatchDispatcher::with_config_async(
        config,
        Flaky {
            calls: Arc::clone(&calls),
            out,
        },
    )
    .unwrap();

    for item in [1, 2, 3] {
        dispatcher.add(item).unwrap();
        assert_eq!(recv(&mut rx).await, vec![item]);
    }

    dispatcher.shutdown_async().await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_async_dispose_flushes_then_rejects() {
    let (dispatcher, mut rx) = forwarding();

    dispatcher.add(5).unwrap();
    assert!(dispatcher.dispose());
    assert!(matches!(dispatcher.add(6), Err(DispatchError::Disposed)));

    tokio::time::timeout(DEADLINE, dispatcher.terminated())
        .await
        .expect("dispatcher should terminate");
    assert_eq!(dispatcher.lifecycle(), Lifecycle::Terminated);
    assert_eq!(rx.try_recv().unwrap(), vec![5]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_async_dispose_without_items_never_invokes_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (out, mut rx) = mpsc::unbounded_channel();
    let dispatcher = BatchDispatcher::new_async(Flaky {
        calls: Arc::clone(&calls),
        out,
    })
    .unwrap();

    assert!(dispatcher.dispose());
    tokio::time::timeout(DEADLINE, dispatcher.terminated())
        .await
        .expect("dispatcher should terminate");

    assert!(dispatcher.is_terminated());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(rx.try_recv().is_err());
    assert_eq!(dispatcher.stats().batches_dispatched, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_concurrent_producers() {
    let (dispatcher, mut rx) = forwarding();
    let dispatcher = Arc::new(dispatcher);

    let producers: Vec<_> = (0..4u32)
        .map(|p| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                for seq in 0..500u32 {
                    dispatcher.add(p * 1_000 + seq).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    dispatcher.dispose();
    tokio::time::timeout(DEADLINE, dispatcher.terminated())
        .await
        .expect("dispatcher should terminate");

    let mut delivered = Vec::new();
    while let Ok(batch) = rx.try_recv() {
        delivered.extend(batch);
    }
    assert_eq!(delivered.len(), 2_000);
    for p in 0..4u32 {
        let mine: Vec<u32> = delivered
            .iter()
            .copied()
            .filter(|v| v / 1_000 == p)
            .collect();
        assert_eq!(mine, (0..500).map(|s| p * 1_000 + s).collect::<Vec<_>>());
    }
}
