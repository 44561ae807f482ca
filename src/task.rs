use std::{
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc, Mutex,
    },
    thread,
};

use crate::{
    encoder::{EncodedImage, Encoder},
    error::{EncodeError, EncodeResult},
    PixelBuffer,
};

/// Handle to an encode running on a worker thread. The result can be taken once.
#[derive(Debug)]
pub struct EncodeTask {
    receiver: Option<Receiver<EncodeResult<EncodedImage>>>,
}
impl EncodeTask {
    fn finished(result: EncodeResult<EncodedImage>) -> Self {
        let (sender, receiver) = mpsc::sync_channel(1);
        let _ = sender.send(result);
        Self {
            receiver: Some(receiver),
        }
    }

    /// Blocks until the worker reports. Errors with `WorkerLost` if the result
    /// was already taken by [`EncodeTask::try_wait`].
    pub fn wait(self) -> EncodeResult<EncodedImage> {
        self.receiver
            .ok_or(EncodeError::WorkerLost)?
            .recv()
            .unwrap_or(Err(EncodeError::WorkerLost))
    }

    /// Returns the result if the worker has finished, `None` while it is still
    /// running. Once a result has been returned, later calls return `None`.
    pub fn try_wait(&mut self) -> Option<EncodeResult<EncodedImage>> {
        let result = match self.receiver.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(EncodeError::WorkerLost),
        };
        self.receiver = None;
        Some(result)
    }
}

impl Encoder {
    /// Moves `buffer` to a new worker thread and encodes it there.
    pub fn encode_async(&self, buffer: PixelBuffer) -> EncodeTask {
        let (sender, receiver) = mpsc::sync_channel(1);
        let spawned = self.spawn_worker(buffer, move |result| {
            let _ = sender.send(result);
        });
        match spawned {
            Ok(()) => EncodeTask {
                receiver: Some(receiver),
            },
            Err(e) => EncodeTask::finished(Err(e)),
        }
    }

    /// Encodes on a worker thread and hands the result to `callback` there,
    /// exactly once. If no thread can be started, `callback` runs on the
    /// caller's thread with [`EncodeError::WorkerLost`].
    pub fn encode_with<F>(&self, buffer: PixelBuffer, callback: F)
    where
        F: FnOnce(EncodeResult<EncodedImage>) + Send + 'static,
    {
        let callback = Arc::new(Mutex::new(Some(callback)));
        let worker_callback = Arc::clone(&callback);
        let spawned = self.spawn_worker(buffer, move |result| {
            if let Some(callback) = take_callback(&worker_callback) {
                callback(result);
            }
        });
        if let Err(e) = spawned {
            if let Some(callback) = take_callback(&callback) {
                callback(Err(e));
            }
        }
    }

    fn spawn_worker<F>(&self, buffer: PixelBuffer, report: F) -> EncodeResult<()>
    where
        F: FnOnce(EncodeResult<EncodedImage>) + Send + 'static,
    {
        let encoder = self.clone();
        thread::Builder::new()
            .name("png-encode".into())
            .spawn(move || {
                let result = encoder.encode(&buffer);
                if let Err(e) = &result {
                    log::error!("background encode failed: {e}");
                }
                report(result);
            })
            .map(|_| ())
            .map_err(|e| {
                log::error!("failed to start encode worker: {e}");
                EncodeError::WorkerLost
            })
    }
}

fn take_callback<F>(slot: &Mutex<Option<F>>) -> Option<F> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}
