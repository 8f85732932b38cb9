use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use online_tuner::{
    TunerErr,
    corpus::{Sequence, TuningSet, tokenize},
    decoding::{Candidate, Decoder, DecoderFactory},
    error::Result,
    metrics::{SentenceBleu, SentenceMetric, Smoothing},
    optimization::{GradientDescent, OnlineOptimizer},
    training::{OnlineTuner, RunContext, TuningOptions},
    weights::{Gradient, WeightVector, read_weights},
};

const ITEMS: usize = 8;

/// Always proposes the reference, records the `g` weight of every snapshot it receives.
#[derive(Clone, Default)]
struct EchoDecoders {
    fail_on: Option<usize>,
    snapshots: Arc<Mutex<Vec<f64>>>,
}

struct EchoDecoder {
    slot: usize,
    fail_on: Option<usize>,
    snapshots: Arc<Mutex<Vec<f64>>>,
}

impl DecoderFactory for EchoDecoders {
    type Decoder = EchoDecoder;

    fn replica(&self, slot: usize) -> Result<EchoDecoder> {
        Ok(EchoDecoder {
            slot,
            fail_on: self.fail_on,
            snapshots: Arc::clone(&self.snapshots),
        })
    }
}

impl Decoder for EchoDecoder {
    fn update_weights(&mut self, weights: &WeightVector) {
        self.snapshots.lock().unwrap().push(weights.get("g"));
    }

    fn decode(&mut self, _: &Sequence, translation_id: usize) -> Result<Vec<Candidate>> {
        if self.fail_on == Some(translation_id) {
            return Err(TunerErr::Worker {
                slot: self.slot,
                msg: format!("cannot decode {translation_id}"),
            });
        }

        Ok(vec![Candidate {
            translation: reference(translation_id),
            features: Gradient::new(),
            score: 0.,
        }])
    }
}

/// Every job pushes `g` up by one, whatever its size.
struct ConstantOptimizer;

impl ConstantOptimizer {
    fn unit() -> Gradient {
        let mut grad = Gradient::new();
        grad.set("g", -1.);
        grad
    }
}

impl OnlineOptimizer for ConstantOptimizer {
    type Rule = GradientDescent;

    fn replica(&self, _: usize) -> Self {
        Self
    }

    fn gradient<L: SentenceMetric>(
        &mut self,
        _: &WeightVector,
        _: &Sequence,
        _: usize,
        _: &[Candidate],
        _: &[Sequence],
        _: &L,
    ) -> Result<Gradient> {
        Ok(Self::unit())
    }

    fn batch_gradient<L: SentenceMetric>(
        &mut self,
        _: &WeightVector,
        _: &[Sequence],
        _: &[usize],
        _: &[Vec<Candidate>],
        _: &[Vec<Sequence>],
        _: &L,
    ) -> Result<Gradient> {
        Ok(Self::unit())
    }

    fn new_updater(&self) -> GradientDescent {
        GradientDescent::new(1.)
    }
}

fn reference(id: usize) -> Sequence {
    tokenize(&format!("r{id} x y z"))
}

fn tuning_set() -> Arc<TuningSet> {
    let sources = (0..ITEMS).map(|id| tokenize(&format!("s{id}"))).collect();
    let references = (0..ITEMS).map(|id| vec![reference(id)]).collect();
    Arc::new(TuningSet::new(sources, references).unwrap())
}

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn options(epochs: usize, batch_size: usize, threads: usize) -> TuningOptions {
    TuningOptions {
        epochs: nz(epochs),
        batch_size: nz(batch_size),
        threads: nz(threads),
        seed: Some(11),
        ..TuningOptions::default()
    }
}

fn tuner(
    decoders: EchoDecoders,
    options: TuningOptions,
    context: RunContext,
) -> OnlineTuner<EchoDecoders, ConstantOptimizer, SentenceBleu> {
    OnlineTuner::new(
        tuning_set(),
        decoders,
        ConstantOptimizer,
        Arc::new(SentenceBleu::new(4, Smoothing::AddOne)),
        options,
        context,
    )
}

fn context(dir: &tempfile::TempDir) -> RunContext {
    RunContext::new(dir.path().join("test.online"))
}

#[tokio::test]
async fn one_update_per_batch() {
    for (batch_size, expected) in [(1, 8), (3, 3), (4, 2)] {
        let dir = tempfile::tempdir().unwrap();
        let tuner = tuner(EchoDecoders::default(), options(1, batch_size, 2), context(&dir));

        let report = tuner.run(WeightVector::new()).await.unwrap();

        assert_eq!(report.epochs.len(), 1);
        assert_eq!(report.epochs[0].batches, expected);
        assert_eq!(report.epochs[0].updates, expected);
        assert_eq!(report.selected.weights.get("g"), expected as f64);
    }
}

#[tokio::test]
async fn weights_carry_over_between_epochs() {
    let dir = tempfile::tempdir().unwrap();
    let context = context(&dir);
    let tuner = tuner(EchoDecoders::default(), options(3, 2, 3), context.clone());

    let report = tuner.run(WeightVector::new()).await.unwrap();

    let updates: Vec<usize> = report.epochs.iter().map(|e| e.updates).collect();
    assert_eq!(updates, vec![4, 4, 4]);
    assert_eq!(report.selected.epoch, 2);
    assert_eq!(report.selected.weights.get("g"), 12.);

    for epoch in 0..3 {
        let weights = read_weights(context.epoch_weights(epoch)).unwrap();
        assert_eq!(weights.get("g"), 4. * (epoch + 1) as f64);
    }

    let written = read_weights(context.final_weights()).unwrap();
    assert_eq!(written, report.selected.weights);
}

#[tokio::test]
async fn averaging_returns_the_epoch_mean() {
    let dir = tempfile::tempdir().unwrap();
    let options = TuningOptions {
        parameter_averaging: true,
        ..options(2, 2, 2)
    };
    let tuner = tuner(EchoDecoders::default(), options, context(&dir));

    let report = tuner.run(WeightVector::new()).await.unwrap();

    // Epoch 0 visits 1, 2, 3, 4 and averages to 2.5.
    // Epoch 1 restarts from 2.5, visits 3.5 ... 6.5 and averages to 5.
    assert_eq!(report.epochs[0].updates, 4);
    assert_eq!(report.selected.epoch, 1);
    assert!((report.selected.weights.get("g") - 5.).abs() < 1e-12);
}

#[tokio::test]
async fn jobs_only_see_their_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let decoders = EchoDecoders::default();
    let tuner = tuner(decoders.clone(), options(1, 1, 1), context(&dir));

    tuner.run(WeightVector::new()).await.unwrap();

    let snapshots = decoders.snapshots.lock().unwrap().clone();
    assert_eq!(snapshots.len(), ITEMS);
    for (t, &seen) in snapshots.iter().enumerate() {
        // A job can't observe updates of jobs submitted after it.
        assert!(seen <= t as f64, "job {t} saw g = {seen}");
    }
    assert!(snapshots.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn objective_scores_every_item_once() {
    let dir = tempfile::tempdir().unwrap();
    let options = TuningOptions {
        best_epoch: true,
        ..options(3, 3, 2)
    };
    let tuner = tuner(EchoDecoders::default(), options, context(&dir));

    let report = tuner.run(WeightVector::new()).await.unwrap();

    for summary in &report.epochs {
        assert!((summary.objective - 100.).abs() < 1e-9);
    }
    // All epochs tie, the later one wins.
    assert_eq!(report.selected.epoch, 2);
}

#[tokio::test]
async fn objective_is_zero_when_not_collected() {
    let dir = tempfile::tempdir().unwrap();
    let options = TuningOptions {
        expected_bleu: false,
        ..options(1, 2, 2)
    };
    let tuner = tuner(EchoDecoders::default(), options, context(&dir));

    let report = tuner.run(WeightVector::new()).await.unwrap();
    assert_eq!(report.selected.objective, 0.);
}

#[tokio::test]
async fn intermediate_weights_follow_the_interval() {
    let dir = tempfile::tempdir().unwrap();
    let context = context(&dir);
    let options = TuningOptions {
        weight_write_interval: nz(3),
        ..options(1, 1, 2)
    };
    let tuner = tuner(EchoDecoders::default(), options, context.clone());

    tuner.run(WeightVector::new()).await.unwrap();

    for t in 0..ITEMS {
        let written = context.batch_weights(0, t).exists();
        assert_eq!(written, (t + 1) % 3 == 0, "batch {t}");
    }
}

#[tokio::test]
async fn worker_failure_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let context = context(&dir);
    let decoders = EchoDecoders {
        fail_on: Some(5),
        ..EchoDecoders::default()
    };
    let tuner = tuner(decoders, options(2, 2, 2), context.clone());

    match tuner.run(WeightVector::new()).await {
        Err(TunerErr::Worker { msg, .. }) => assert_eq!(msg, "cannot decode 5"),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("expected the run to fail"),
    }

    assert!(!context.final_weights().exists());
}
