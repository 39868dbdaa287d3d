//! Markov Chain Scheduler

use super::*;
use crate::renderer::RenderContext;
use crate::report_stats;
use crate::rng::derive_seed;
use crossbeam_channel::unbounded;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// A Markov chain that splats one weighted sample per step.
pub trait MarkovChain: Send {
    /// Make one mutation and splat its contribution.
    ///
    /// * `film` - Receives contributions.
    fn step(&mut self, film: &mut dyn FilmSink);

    /// Add chain statistics, e.g. the acceptance ratio, to a payload that is
    /// published after every block.
    ///
    /// * `_payload` - The payload.
    fn report(&self, _payload: &mut Payload) {}
}

/// Message sent by a chain after each block.
#[derive(Copy, Clone, Debug)]
struct BlockFinished {
    /// Mutations made in the block.
    samples: u64,
}

/// Run one Markov chain per worker. Chain `k` is created inside its worker
/// with `create_chain(k, seed_k)` and splats into a cleared replica of
/// `film`, layers included. Replicas are added to `film` in chain order.
///
/// In `TerminationMode::Samples` the budget of `num_samples` mutations per
/// pixel is split evenly between chains, so the result only depends on the
/// seed and the thread count. In `TerminationMode::Time` chains run blocks of
/// `samples_per_block` mutations until the deadline.
///
/// Returns the total number of mutations. The film is not rescaled. If a
/// chain fails, the replicas of every chain, the failed one included, are
/// still added to `film` before the error is returned.
///
/// * `ctx`          - Render context.
/// * `film`         - Receives the merged replicas.
/// * `create_chain` - Creates a chain from its index and seed.
pub fn render_chains<C, F>(ctx: &RenderContext, film: &mut Film, create_chain: F) -> Result<u64>
where
    C: MarkovChain,
    F: Fn(usize, u32) -> Result<C> + Sync,
{
    let config = ctx.config;
    let num_chains = max(config.num_threads, 1) as u64;
    let total = config.num_samples * (film.width() * film.height()) as u64;
    let block_size = config.samples_per_block;

    info!(
        "Running {} Markov chains ({} mode, {} mutations per block)",
        num_chains, config.mode, block_size
    );

    let start = Instant::now();
    let deadline = config.deadline(start);
    let progress = match config.mode {
        TerminationMode::Samples => create_progress_bar(total, "mutations", config.quiet),
        TerminationMode::Time => create_progress_bar(100, "%", config.quiet),
    };
    ctx.experiments.notify(ExperimentEvent::RenderStarted, &Payload::new());

    let mut replica = film.clone();
    replica.clear();

    let cancel = AtomicBool::new(false);
    let (block_tx, block_rx) = unbounded::<BlockFinished>();

    let results: Vec<(Option<Film>, Result<u64>)> = std::thread::scope(|scope| {
        let cancel = &cancel;
        let handles: Vec<_> = (0..num_chains)
            .map(|k| {
                let block_tx = block_tx.clone();
                let create_chain = &create_chain;
                let mut film = replica.clone();
                scope.spawn(move || -> (Film, Result<u64>) {
                    let budget = match config.mode {
                        TerminationMode::Samples => total * (k + 1) / num_chains - total * k / num_chains,
                        TerminationMode::Time => u64::MAX,
                    };
                    let seed = derive_seed(config.seed, k);
                    let what = format!("chain {}", k);

                    let mut done = 0_u64;
                    let run = catch_unwind(AssertUnwindSafe(|| -> Result<()> {
                        let mut chain = create_chain(k as usize, seed)?;
                        while done < budget && !cancel.load(Ordering::Relaxed) {
                            if deadline.map_or(false, |d| Instant::now() >= d) {
                                break;
                            }
                            let n = min(block_size, budget - done);
                            {
                                let mut sink = CheckedSink::new(&mut film);
                                for _ in 0..n {
                                    chain.step(&mut sink);
                                }
                                sink.finish(&what);
                            }
                            done += n;

                            if !ctx.experiments.is_empty() {
                                let mut payload = Payload::from([("thread", k as Float), ("sample", done as Float)]);
                                chain.report(&mut payload);
                                ctx.experiments.notify(ExperimentEvent::SampleFinished, &payload);
                            }
                            if block_tx.send(BlockFinished { samples: n }).is_err() {
                                break;
                            }
                        }
                        Ok(())
                    }));

                    report_stats!();
                    let result = match run {
                        Ok(Ok(())) => Ok(done),
                        Ok(Err(e)) => Err(e),
                        Err(panic) => Err(panic_error(&what, panic)),
                    };
                    if result.is_err() {
                        cancel.store(true, Ordering::Relaxed);
                    }
                    debug!("Chain {} finished after {} mutations", k, done);
                    (film, result)
                })
            })
            .collect();
        drop(block_tx);

        let mut blocks = 0_u64;
        let mut samples = 0_u64;
        for block in block_rx.iter() {
            blocks += 1;
            samples += block.samples;
            let fraction = match config.mode {
                TerminationMode::Samples => {
                    progress.set_position(samples);
                    samples as Float / max(total, 1) as Float
                }
                TerminationMode::Time => {
                    let p = config.time_progress(start);
                    progress.set_position((p * 100.0) as u64);
                    p
                }
            };
            if !ctx.experiments.is_empty() {
                let payload = Payload::from([("block", blocks as Float), ("progress", fraction)]);
                ctx.experiments.notify(ExperimentEvent::ProgressUpdated, &payload);
            }
        }

        handles
            .into_iter()
            .enumerate()
            .map(|(k, h)| {
                match h.join() {
                    Ok((film, result)) => (Some(film), result),
                    Err(panic) => (None, Err(panic_error(&format!("chain {}", k), panic))),
                }
            })
            .collect()
    });

    progress.finish_and_clear();
    ctx.experiments.notify(ExperimentEvent::RenderFinished, &Payload::new());

    // Merge whatever the chains produced, even after a failure.
    let mut num_samples = 0_u64;
    let mut failure = None;
    for (replica, result) in results {
        if let Some(replica) = replica {
            film.merge(&replica)?;
        }
        match result {
            Ok(n) => num_samples += n,
            Err(e) => {
                error!("{}", e);
                failure.get_or_insert(e);
            }
        }
    }
    if let Some(e) = failure {
        error!("Render operation has been canceled");
        return Err(e);
    }

    info!(
        "Rendering completed in {:.3} seconds ({} mutations)",
        start.elapsed().as_secs_f64(),
        num_samples
    );
    Ok(num_samples)
}
