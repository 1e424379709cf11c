//! Background decoding.
//!
//! Each request decodes on its own thread and reports back through one
//! channel. Nothing here touches viewer state: the owner polls the channel
//! from its own thread once per frame and applies the events there.

use super::{AssetError, DecodedScene, LoadProgress, ModelSource, SceneDecoder};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub generation: u64,
    pub source: ModelSource,
}

#[derive(Debug)]
pub enum LoadEventKind {
    Progress(LoadProgress),
    Finished(Result<Option<DecodedScene>, AssetError>),
}

#[derive(Debug)]
pub struct LoadEvent {
    /// Generation of the request this event belongs to.
    pub generation: u64,
    pub kind: LoadEventKind,
}

/// Asynchronous decode service used by the viewer.
pub trait LoadBackend {
    /// Start decoding. Must not block on the decode itself.
    fn dispatch(&mut self, request: LoadRequest);
    /// Events that arrived since the last poll, in arrival order.
    fn poll(&mut self) -> Vec<LoadEvent>;
}

/// Called from the decode thread whenever an event is queued, so a host
/// event loop can wake up and poll.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

pub struct DecodeWorker {
    decoder: Arc<dyn SceneDecoder>,
    sender: Sender<LoadEvent>,
    receiver: Receiver<LoadEvent>,
    waker: Option<Waker>,
    in_flight: usize,
}

impl DecodeWorker {
    pub fn new(decoder: Arc<dyn SceneDecoder>) -> Self {
        let (sender, receiver) = channel();
        Self {
            decoder,
            sender,
            receiver,
            waker: None,
            in_flight: 0,
        }
    }

    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    /// Decodes dispatched but not yet reported finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

/// Sends `WorkerDisconnected` if the decode thread unwinds before finishing.
struct FinishGuard {
    sender: Sender<LoadEvent>,
    waker: Option<Waker>,
    generation: u64,
    finished: bool,
}

impl FinishGuard {
    fn send(&self, kind: LoadEventKind) {
        let _ = self.sender.send(LoadEvent {
            generation: self.generation,
            kind,
        });
        if let Some(waker) = &self.waker {
            waker();
        }
    }

    fn finish(mut self, result: Result<Option<DecodedScene>, AssetError>) {
        self.finished = true;
        self.send(LoadEventKind::Finished(result));
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.send(LoadEventKind::Finished(Err(AssetError::WorkerDisconnected)));
        }
    }
}

impl LoadBackend for DecodeWorker {
    fn dispatch(&mut self, request: LoadRequest) {
        let LoadRequest { generation, source } = request;
        log::info!("Decoding {} ({}) as generation {}", source, source.kind(), generation);

        let decoder = Arc::clone(&self.decoder);
        let guard = FinishGuard {
            sender: self.sender.clone(),
            waker: self.waker.clone(),
            generation,
            finished: false,
        };
        self.in_flight += 1;

        let spawned = thread::Builder::new()
            .name(format!("model-decode-{generation}"))
            .spawn(move || {
                let result =
                    decoder.decode(&source, &mut |progress| guard.send(LoadEventKind::Progress(progress)));
                guard.finish(result);
            });
        if let Err(err) = spawned {
            // the closure (and its guard) was dropped, which already queued a failure
            log::warn!("Failed to spawn decode thread: {}", err);
        }
    }

    fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if matches!(event.kind, LoadEventKind::Finished(_)) {
                        self.in_flight = self.in_flight.saturating_sub(1);
                    }
                    events.push(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::DecodedNode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct FakeDecoder;

    impl SceneDecoder for FakeDecoder {
        fn decode(
            &self,
            source: &ModelSource,
            progress: &mut dyn FnMut(LoadProgress),
        ) -> Result<Option<DecodedScene>, AssetError> {
            match source {
                ModelSource::Url(url) if url.ends_with("panic") => panic!("decoder blew up"),
                ModelSource::Url(url) => {
                    progress(LoadProgress {
                        loaded: 50,
                        total: Some(100),
                    });
                    Ok(Some(DecodedScene::new(DecodedNode::group(url.clone()))))
                }
                _ => Ok(None),
            }
        }
    }

    fn drain(worker: &mut DecodeWorker, expected_finished: usize) -> Vec<LoadEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        loop {
            events.extend(worker.poll());
            let finished = events
                .iter()
                .filter(|e| matches!(e.kind, LoadEventKind::Finished(_)))
                .count();
            if finished >= expected_finished || Instant::now() > deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn delivers_progress_then_result_tagged_with_generation() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let mut worker = DecodeWorker::new(Arc::new(FakeDecoder)).with_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        worker.dispatch(LoadRequest {
            generation: 7,
            source: ModelSource::Url("house".into()),
        });
        assert_eq!(worker.in_flight(), 1);

        let events = drain(&mut worker, 1);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.generation == 7));
        assert!(matches!(events[0].kind, LoadEventKind::Progress(p) if p.percent() == Some(50)));
        match &events[1].kind {
            LoadEventKind::Finished(Ok(Some(scene))) => assert_eq!(scene.root.name, "house"),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(worker.in_flight(), 0);
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_decoder_reports_disconnect() {
        let mut worker = DecodeWorker::new(Arc::new(FakeDecoder));
        worker.dispatch(LoadRequest {
            generation: 1,
            source: ModelSource::Url("panic".into()),
        });
        let events = drain(&mut worker, 1);
        assert!(matches!(
            events.last().map(|e| &e.kind),
            Some(LoadEventKind::Finished(Err(AssetError::WorkerDisconnected)))
        ));
    }
}
