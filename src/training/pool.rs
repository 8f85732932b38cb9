use std::fmt;

use tokio::{
    sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender},
    task::JoinSet,
};

use super::processor::{Processor, ProcessorInput, ProcessorOutput};
use crate::error::{Result, TunerErr};

/// Somewhere completed minibatch results can be polled from without blocking.
pub trait ResultSource {
    /// Takes the next completed result if there is one.
    ///
    /// # Returns
    /// `Ok(None)` when nothing is ready, the first worker failure otherwise.
    fn try_drain(&mut self) -> Result<Option<ProcessorOutput>>;

    /// Whether a result is ready to be drained.
    fn has_ready(&self) -> bool;
}

/// A fixed set of processors running minibatch jobs on the blocking thread pool.
///
/// Every processor is bound to one slot and handles one job at a time. `submit` waits
/// for an idle processor, so there are never more than `threads` jobs in flight.
pub struct WorkerPool<P: Processor> {
    threads: usize,
    idle_tx: Sender<P>,
    idle_rx: Receiver<P>,
    results_tx: UnboundedSender<ProcessorOutput>,
    results_rx: UnboundedReceiver<ProcessorOutput>,
    tasks: JoinSet<Result<()>>,
    outstanding: usize,
}

impl<P: Processor> WorkerPool<P> {
    /// Creates a new `WorkerPool`.
    ///
    /// # Arguments
    /// * `processors` - One processor per worker slot.
    ///
    /// # Returns
    /// An `InvalidConfig` error if `processors` is empty.
    pub fn new(processors: Vec<P>) -> Result<Self> {
        let threads = processors.len();
        if threads == 0 {
            return Err(TunerErr::InvalidConfig(
                "a worker pool needs at least one processor".into(),
            ));
        }

        let (idle_tx, idle_rx) = mpsc::channel(threads);
        for processor in processors {
            idle_tx
                .try_send(processor)
                .map_err(|_| TunerErr::Consistency("idle queue rejected a processor".into()))?;
        }

        let (results_tx, results_rx) = mpsc::unbounded_channel();

        Ok(Self {
            threads,
            idle_tx,
            idle_rx,
            results_tx,
            results_rx,
            tasks: JoinSet::new(),
            outstanding: 0,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The amount of submitted jobs whose results weren't drained yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Submits a job, waiting for an idle processor when all of them are busy.
    ///
    /// While waiting, finished tasks are reaped so a failed or panicked job surfaces here
    /// instead of stalling the submission forever.
    pub async fn submit(&mut self, input: ProcessorInput) -> Result<()> {
        let mut processor = loop {
            tokio::select! {
                processor = self.idle_rx.recv() => {
                    break processor.ok_or_else(|| {
                        TunerErr::Consistency("idle queue closed".into())
                    })?;
                }
                Some(res) = self.tasks.join_next(), if !self.tasks.is_empty() => res??,
            }
        };

        let idle_tx = self.idle_tx.clone();
        let results_tx = self.results_tx.clone();

        self.tasks.spawn_blocking(move || {
            let slot = processor.slot();
            let result = processor.process(input);

            // Capacity equals the amount of processors, so this never fails while the pool lives.
            let _ = idle_tx.try_send(processor);

            let output = result?;
            results_tx.send(output).map_err(|_| TunerErr::Worker {
                slot,
                msg: "result queue closed".into(),
            })
        });

        self.outstanding += 1;
        Ok(())
    }

    /// Waits until every submitted job has finished.
    ///
    /// # Returns
    /// The first worker failure, if any. Results stay queued until drained.
    pub async fn await_all(&mut self) -> Result<()> {
        while let Some(res) = self.tasks.join_next().await {
            res??;
        }

        Ok(())
    }

    /// Tears down a quiescent pool and hands back its processors.
    ///
    /// # Returns
    /// A `Consistency` error if jobs are still running or results weren't drained.
    pub fn into_processors(mut self) -> Result<Vec<P>> {
        if !self.tasks.is_empty() || self.outstanding > 0 {
            return Err(TunerErr::Consistency(format!(
                "worker pool shut down with {} outstanding jobs",
                self.outstanding
            )));
        }

        let mut processors = Vec::with_capacity(self.threads);
        while let Ok(processor) = self.idle_rx.try_recv() {
            processors.push(processor);
        }

        if processors.len() != self.threads {
            return Err(TunerErr::Consistency(format!(
                "{} of {} processors came back",
                processors.len(),
                self.threads
            )));
        }

        processors.sort_by_key(|p| p.slot());
        Ok(processors)
    }
}

impl<P: Processor> ResultSource for WorkerPool<P> {
    fn try_drain(&mut self) -> Result<Option<ProcessorOutput>> {
        while let Some(res) = self.tasks.try_join_next() {
            res??;
        }

        match self.results_rx.try_recv() {
            Ok(output) => {
                self.outstanding -= 1;
                Ok(Some(output))
            }
            Err(_) => Ok(None),
        }
    }

    fn has_ready(&self) -> bool {
        !self.results_rx.is_empty()
    }
}

impl<P: Processor> fmt::Display for WorkerPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker pool: {} threads, {} idle, {} outstanding, {} ready",
            self.threads,
            self.idle_rx.len(),
            self.outstanding,
            self.results_rx.len()
        )
    }
}
