use std::time::Duration;
use tokio::sync::mpsc;

/// Splits a channel of items into batches of at most `max_items`, or whatever
/// has accumulated when `max_timeout` elapses. The timeout window restarts
/// with each new batch, not on a global clock.
///
/// Order is preserved within and across batches; nothing is duplicated or
/// dropped. When the input channel closes, a non-empty pending batch is
/// flushed once and the output channel closes. The operator buffers a single
/// in-flight batch and nothing more.
pub fn split_by_batch<T: Send + 'static>(
    values: mpsc::Receiver<T>,
    max_items: usize,
    max_timeout: Duration,
) -> mpsc::Receiver<Vec<T>> {
    let (batches_tx, batches_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut values = values;
        let mut keep_going = true;

        while keep_going {
            let (batch, more) = next_batch(&mut values, max_items, max_timeout).await;
            keep_going = more;

            if !batch.is_empty() && batches_tx.send(batch).await.is_err() {
                break;
            }
        }
    });

    batches_rx
}

/// Collects one batch: races the next input item against the batch timer,
/// re-armed fresh for this batch. Returns the batch and whether the input
/// channel is still open.
async fn next_batch<T>(
    values: &mut mpsc::Receiver<T>,
    max_items: usize,
    max_timeout: Duration,
) -> (Vec<T>, bool) {
    let mut batch = Vec::new();
    let expire = tokio::time::sleep(max_timeout);
    tokio::pin!(expire);

    loop {
        tokio::select! {
            value = values.recv() => match value {
                Some(value) => {
                    batch.push(value);
                    if batch.len() >= max_items {
                        return (batch, true);
                    }
                }
                None => return (batch, false),
            },
            _ = &mut expire => return (batch, true),
        }
    }
}
