//! Integration Tests for the Invalidation Engine
//!
//! These tests drive the public API: registration, build, reads from many
//! threads and change batches delivered through a source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use docgraph_core::{
    ChangeOp, DocChange, DocEngine, DocError, DocKey, DocName, Docs, EngineState, GraphBuilder,
    GraphError, MemorySource,
};

/// Keys of a small game-data table set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    A,
    B,
    C,
}

impl DocKey for Table {
    fn index(&self) -> usize {
        *self as usize
    }

    fn name(&self) -> &str {
        match self {
            Table::A => "a",
            Table::B => "b",
            Table::C => "c",
        }
    }
}

fn write(name: &str) -> DocChange {
    DocChange::new(name, "tables", ChangeOp::Write)
}

/// A, B depends on A, C depends on B. Every parser uppercases its raw
/// content; derived ones append their dependency's value.
fn chain_engine(source: Arc<MemorySource>) -> DocEngine<MemorySource> {
    let mut builder = GraphBuilder::with_capacity(3);
    builder
        .register(&Table::A, |raw: &str| Ok::<_, String>(raw.to_uppercase()), &[])
        .unwrap();
    builder
        .register_derived(
            &Table::B,
            |docs: &Docs<'_>, raw: &str| -> Result<String, DocError> {
                let a = docs.get::<String, _>(&Table::A)?;
                Ok(format!("{}+{}", raw.to_uppercase(), a))
            },
            &[Table::A],
        )
        .unwrap();
    builder
        .register_derived(
            &Table::C,
            |docs: &Docs<'_>, raw: &str| -> Result<String, DocError> {
                let b = docs.get::<String, _>(&Table::B)?;
                Ok(format!("{}+{}", raw.to_uppercase(), b))
            },
            &[Table::B],
        )
        .unwrap();
    DocEngine::new(builder.build().unwrap(), source)
}

/// Change a then read everything again: values follow the new content.
#[tokio::test]
async fn change_batch_invalidates_chain() {
    let source = Arc::new(MemorySource::with_docs(
        4,
        [("a", "a"), ("b", "b"), ("c", "c")],
    ));
    let engine = Arc::new(chain_engine(Arc::clone(&source)));
    let mut reports = engine.subscribe();
    let consumer = engine.start().unwrap();

    assert_eq!(*engine.read::<String, _>(&Table::A).unwrap(), "A");
    assert_eq!(*engine.read::<String, _>(&Table::C).unwrap(), "C+B+A");

    source.set_doc("a", "a2");

    // Content changed but nothing was announced yet: still cached.
    assert_eq!(*engine.read::<String, _>(&Table::C).unwrap(), "C+B+A");

    assert!(source.publish(vec![write("a")]).await);
    let report = reports.recv().await.unwrap();
    assert_eq!(report.invalidated, vec![0, 1, 2]);

    // Nothing is recomputed until it is read.
    assert!(!engine.is_cached(&Table::B));
    assert!(!engine.is_cached(&Table::C));

    assert_eq!(*engine.read::<String, _>(&Table::A).unwrap(), "A2");
    assert_eq!(*engine.read::<String, _>(&Table::C).unwrap(), "C+B+A2");

    engine.close();
    consumer.await.unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);
}

/// A batch naming only the leaf leaves the rest of the chain cached.
#[test]
fn leaf_change_keeps_upstream_cached() {
    let source = Arc::new(MemorySource::with_docs(
        1,
        [("a", "a"), ("b", "b"), ("c", "c")],
    ));
    let engine = chain_engine(source);
    engine.read::<String, _>(&Table::C).unwrap();

    let report = engine.on_batch(&[write("c")]);
    assert_eq!(report.invalidated, vec![2]);
    assert!(engine.is_cached(&Table::A));
    assert!(engine.is_cached(&Table::B));
}

/// Many threads reading the same document in one epoch share one parse.
#[test]
fn concurrent_reads_parse_once() {
    const READERS: usize = 12;

    let parses = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&parses);

    let mut builder = GraphBuilder::with_capacity(1);
    builder
        .register(
            &Table::A,
            move |raw: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(30));
                Ok::<_, String>(raw.to_string())
            },
            &[],
        )
        .unwrap();
    let source = Arc::new(MemorySource::with_docs(1, [("a", "payload")]));
    let engine = Arc::new(DocEngine::new(builder.build().unwrap(), source));
    let barrier = Arc::new(Barrier::new(READERS));

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.read::<String, _>(&Table::A).unwrap()
            })
        })
        .collect();

    let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(parses.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
}

/// An invalidation that lands while a parse is running wins: the next
/// reader gets a fresh parse, and the superseded result is never cached.
#[test]
fn invalidation_during_parse_is_not_lost() {
    let parses = Arc::new(AtomicUsize::new(0));
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let gate = Arc::new(Mutex::new((Some(started_tx), Some(release_rx))));

    let counter = Arc::clone(&parses);
    let mut builder = GraphBuilder::with_capacity(1);
    builder
        .register(
            &Table::A,
            move |raw: &str| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 1 {
                    let (started, release) = {
                        let mut gate = gate.lock().unwrap();
                        (gate.0.take().unwrap(), gate.1.take().unwrap())
                    };
                    started.send(()).unwrap();
                    release.recv().unwrap();
                }
                Ok::<_, String>(format!("{raw}-{n}"))
            },
            &[],
        )
        .unwrap();

    let source = Arc::new(MemorySource::with_docs(1, [("a", "v1")]));
    let engine = Arc::new(DocEngine::new(builder.build().unwrap(), Arc::clone(&source)));

    let slow = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.read::<String, _>(&Table::A).unwrap())
    };
    started_rx.recv().unwrap();

    source.set_doc("a", "v2");
    engine.on_batch(&[write("a")]);

    assert_eq!(*engine.read::<String, _>(&Table::A).unwrap(), "v2-2");
    release_tx.send(()).unwrap();
    assert_eq!(*slow.join().unwrap(), "v1-1");

    assert_eq!(*engine.read::<String, _>(&Table::A).unwrap(), "v2-2");
    assert_eq!(parses.load(Ordering::SeqCst), 2);
}

/// Declaring A -> B -> A fails the build instead of hanging.
#[test]
fn cyclic_declarations_fail_build() {
    let mut builder = GraphBuilder::with_capacity(2);
    builder
        .register(&Table::A, |raw: &str| Ok::<_, String>(raw.to_string()), &[Table::B])
        .unwrap();
    builder
        .register(&Table::B, |raw: &str| Ok::<_, String>(raw.to_string()), &[Table::A])
        .unwrap();

    match builder.build() {
        Err(GraphError::Cycle { path }) => assert_eq!(path, vec!["a", "b", "a"]),
        other => panic!("expected cycle error, got {other:?}"),
    }
}

/// Dependencies rank below their dependents for a spread of generated DAGs.
#[test]
fn ranks_respect_dependencies_in_generated_graphs() {
    // Small LCG so the graphs are reproducible without extra crates.
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |bound: usize| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((seed >> 33) as usize) % bound.max(1)
    };

    for size in [1usize, 2, 5, 17, 40] {
        // Topological position p lives at a scrambled index. 7 is coprime
        // with every size below, so this is a permutation.
        let slot_of: Vec<usize> = (0..size).map(|p| (p * 7 + 3) % size).collect();

        let keys: Vec<DocName> = (0..size)
            .map(|slot| DocName::new(slot, format!("doc{slot}")))
            .collect();

        let mut builder = GraphBuilder::with_capacity(size);
        for p in 0..size {
            let deps: Vec<_> = (0..next(4))
                .filter(|_| p > 0)
                .map(|_| keys[slot_of[next(p)]].clone())
                .collect();
            builder
                .register(&keys[slot_of[p]], |raw: &str| Ok::<_, String>(raw.len()), &deps)
                .unwrap();
        }

        let graph = builder.build().unwrap();
        let mut seen: Vec<usize> = graph.nodes().iter().map(|n| n.rank()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..size).collect::<Vec<_>>());

        for node in graph.nodes() {
            for &dep in node.dependencies() {
                assert!(graph.rank(dep) < Some(node.rank()));
            }
        }
    }
}

/// Unknown names and duplicate events never widen the impact set.
#[test]
fn noisy_batches_are_absorbed() {
    let source = Arc::new(MemorySource::with_docs(
        1,
        [("a", "a"), ("b", "b"), ("c", "c")],
    ));
    let engine = chain_engine(source);
    for table in [Table::A, Table::B, Table::C] {
        engine.read::<String, _>(&table).unwrap();
    }

    let report = engine.on_batch(&[
        write("b"),
        DocChange::new("readme", "tables", ChangeOp::Create),
        write("b"),
        DocChange::new("b", "tables", ChangeOp::Remove),
    ]);

    assert_eq!(report.seeds, vec![1]);
    assert_eq!(report.invalidated, vec![1, 2]);
    assert_eq!(report.ignored, vec!["readme".to_string()]);
    assert_eq!(engine.epoch(&Table::B), Some(1));
    assert_eq!(engine.epoch(&Table::A), Some(0));
}

/// A removed document fails to load until it comes back.
#[test]
fn removed_document_reports_fetch_error() {
    let source = Arc::new(MemorySource::with_docs(
        1,
        [("a", "a"), ("b", "b"), ("c", "c")],
    ));
    let engine = chain_engine(Arc::clone(&source));
    engine.read::<String, _>(&Table::C).unwrap();

    source.remove_doc("a");
    engine.on_batch(&[DocChange::new("a", "tables", ChangeOp::Remove)]);

    let err = engine.read::<String, _>(&Table::C).unwrap_err();
    assert!(matches!(err, DocError::Fetch { ref name, .. } if name == "a"));

    source.set_doc("a", "back");
    engine.on_batch(&[DocChange::new("a", "tables", ChangeOp::Create)]);
    assert_eq!(*engine.read::<String, _>(&Table::C).unwrap(), "C+B+BACK");
}
