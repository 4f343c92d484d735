//! Concurrent execution of whole batches.

use crate::{client::Client, exchange::ExchangeResult, payload::Batch};
use tracing_futures::Instrument;

/// The order in which results of a batch are handed out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Order {
    /// As soon as each exchange completes. This is the default.
    Completion,

    /// In the order of the batch, once every exchange has completed.
    Submission,
}

impl Default for Order {
    fn default() -> Self {
        Self::Completion
    }
}

/// Summary of a completed batch.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchReport {
    dispatched: usize,
    completed: usize,
    failed: usize,
}

impl BatchReport {
    /// Number of exchanges started.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Number of exchanges that reached a terminal state. Equal to
    /// [`BatchReport::dispatched`] once a dispatch returns.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Number of exchanges that ended with an error.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Number of exchanges that completed without error.
    pub fn succeeded(&self) -> usize {
        self.completed - self.failed
    }

    fn record(&mut self, result: &ExchangeResult) {
        self.completed += 1;

        if !result.is_ok() {
            self.failed += 1;
        }
    }

    fn is_done(&self) -> bool {
        self.completed >= self.dispatched
    }
}

impl Client {
    /// Execute every request of a batch concurrently and block until all of
    /// them have completed.
    ///
    /// `emit` is called once per request, in completion order, as soon as its
    /// exchange is done. A failing exchange does not affect any other.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// let batch = volley::Batch::parse(r#"[{"method":"GET","url":"http://example.org"}]"#)?;
    /// let client = volley::Client::new()?;
    ///
    /// let report = client.dispatch(batch, |result| {
    ///     println!("#{}: {:?}", result.index(), result.status());
    /// });
    ///
    /// assert_eq!(report.completed(), 1);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn dispatch<F>(&self, batch: Batch, emit: F) -> BatchReport
    where
        F: FnMut(ExchangeResult),
    {
        futures_lite::future::block_on(self.dispatch_async(batch, Order::Completion, emit))
    }

    /// Like [`Client::dispatch`], but hands out results in the order of the
    /// batch once every exchange has completed.
    pub fn dispatch_ordered<F>(&self, batch: Batch, emit: F) -> BatchReport
    where
        F: FnMut(ExchangeResult),
    {
        futures_lite::future::block_on(self.dispatch_async(batch, Order::Submission, emit))
    }

    /// Execute every request of a batch concurrently. The returned future
    /// completes once every exchange has completed.
    pub async fn dispatch_async<F>(&self, batch: Batch, order: Order, mut emit: F) -> BatchReport
    where
        F: FnMut(ExchangeResult),
    {
        let span = tracing::debug_span!("dispatch", requests = batch.len(), ?order);

        async move {
            let mut report = BatchReport {
                dispatched: batch.len(),
                ..BatchReport::default()
            };

            let (tx, rx) = async_channel::unbounded();

            for (index, request) in batch.into_iter().enumerate() {
                self.submit(index, request, tx.clone());
            }

            // Only the handlers hold senders from here on, so the channel
            // closes once every one of them has published its result.
            drop(tx);

            let mut pending = match order {
                Order::Completion => Vec::new(),
                Order::Submission => Vec::with_capacity(report.dispatched),
            };

            while !report.is_done() {
                let result = match rx.recv().await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!(
                            completed = report.completed,
                            "completion channel closed before every exchange reported"
                        );
                        break;
                    }
                };

                report.record(&result);
                tracing::trace!(index = result.index(), completed = report.completed, "exchange done");

                match order {
                    Order::Completion => emit(result),
                    Order::Submission => pending.push(result),
                }
            }

            pending.sort_by_key(ExchangeResult::index);
            pending.into_iter().for_each(&mut emit);

            tracing::debug!(
                completed = report.completed,
                failed = report.failed,
                "batch complete"
            );

            report
        }
        .instrument(span)
        .await
    }
}
