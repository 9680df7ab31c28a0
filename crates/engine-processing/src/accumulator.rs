use engine_config::settings::InputKind;
use futures::{
    Stream, StreamExt,
    stream::{self, BoxStream},
};
use std::fmt;
use tokio::sync::{Mutex, mpsc};

/// Application-supplied source of job items.
///
/// Pull-based: waiting on the stream is the backpressure signal and `None`
/// marks the end of input.
pub enum Input<T> {
    /// Every read is one item.
    Items(BoxStream<'static, T>),
    /// Every read is one whole batch.
    Arrays(BoxStream<'static, Vec<T>>),
}

impl<T: Send + 'static> Input<T> {
    pub fn items<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Input::Items(stream.boxed())
    }

    pub fn arrays<S>(stream: S) -> Self
    where
        S: Stream<Item = Vec<T>> + Send + 'static,
    {
        Input::Arrays(stream.boxed())
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self::items(stream::iter(items))
    }

    /// Items arrive as the sender produces them; dropping the sender ends the input.
    pub fn from_receiver(rx: mpsc::Receiver<T>) -> Self {
        Self::items(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }

    pub fn from_batch_receiver(rx: mpsc::Receiver<Vec<T>>) -> Self {
        Self::arrays(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|batch| (batch, rx))
        }))
    }

    pub fn kind(&self) -> InputKind {
        match self {
            Input::Items(_) => InputKind::Items,
            Input::Arrays(_) => InputKind::Arrays,
        }
    }
}

impl<T> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Items(_) => f.write_str("Input::Items(..)"),
            Input::Arrays(_) => f.write_str("Input::Arrays(..)"),
        }
    }
}

/// Result of one accumulation.
#[derive(Debug, PartialEq, Eq)]
pub enum Accumulated<T> {
    /// A batch was cut; more input may follow.
    Full(Vec<T>),
    /// Input ended after these items were collected.
    Last(Vec<T>),
    /// Input ended with nothing collected.
    Exhausted,
}

struct InputState<T> {
    input: Input<T>,
    ended: bool,
}

/// Cuts the shared input into batches for the workers of one job.
///
/// One worker reads at a time, so every batch is a contiguous run of input.
pub struct BatchAccumulator<T> {
    state: Mutex<InputState<T>>,
    batch_size: usize,
}

impl<T: Send + 'static> BatchAccumulator<T> {
    /// `batch_size` only applies to [`Input::Items`].
    pub fn new(input: Input<T>, batch_size: usize) -> Self {
        Self {
            state: Mutex::new(InputState { input, ended: false }),
            batch_size: batch_size.max(1),
        }
    }

    pub async fn next_batch(&self) -> Accumulated<T> {
        let mut guard = self.state.lock().await;
        let InputState { input, ended } = &mut *guard;
        if *ended {
            return Accumulated::Exhausted;
        }

        match input {
            Input::Items(stream) => {
                let mut items = Vec::with_capacity(self.batch_size);
                while items.len() < self.batch_size {
                    match stream.next().await {
                        Some(item) => items.push(item),
                        None => {
                            *ended = true;
                            break;
                        }
                    }
                }

                match (*ended, items.is_empty()) {
                    (false, _) => Accumulated::Full(items),
                    (true, true) => Accumulated::Exhausted,
                    (true, false) => Accumulated::Last(items),
                }
            }
            Input::Arrays(stream) => loop {
                match stream.next().await {
                    Some(batch) if batch.is_empty() => continue,
                    Some(batch) => return Accumulated::Full(batch),
                    None => {
                        *ended = true;
                        return Accumulated::Exhausted;
                    }
                }
            },
        }
    }
}
