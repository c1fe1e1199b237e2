//! Scripted cluster used by unit tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::cluster::{Cluster, LogReader};
use crate::errors::{AppError, AppResult};
use crate::types::{
    ContainerDescriptor, LogOptions, PodDescriptor, PodEvent, PodPhase, StreamKey,
};

/// What a log stream of one container yields.
#[derive(Clone)]
pub enum Logs {
    /// Emit these lines, then end.
    Lines(Vec<String>),
    /// Never yield anything; only ends when dropped.
    Blocked,
    /// Opening the stream fails.
    Fail,
}

pub struct FakeCluster {
    namespaces: Vec<String>,
    lists: Mutex<VecDeque<AppResult<Vec<PodDescriptor>>>>,
    pods: Mutex<HashMap<String, VecDeque<PodDescriptor>>>,
    logs: Mutex<HashMap<StreamKey, Logs>>,
    watch: Mutex<Option<mpsc::UnboundedReceiver<AppResult<PodEvent>>>>,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub opened: Mutex<Vec<StreamKey>>,
}

impl FakeCluster {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespaces: vec![namespace.to_string()],
            lists: Mutex::new(VecDeque::new()),
            pods: Mutex::new(HashMap::new()),
            logs: Mutex::new(HashMap::new()),
            watch: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_namespaces(mut self, names: &[&str]) -> Self {
        self.namespaces = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Queue the result of the next `list_pods` call. The last one repeats.
    pub fn push_list(&self, result: AppResult<Vec<PodDescriptor>>) {
        self.lists.lock().push_back(result);
    }

    /// Queue successive `get_pod` answers for a pod. The last one repeats.
    pub fn script_pod(&self, states: Vec<PodDescriptor>) {
        if let Some(first) = states.first() {
            self.pods
                .lock()
                .insert(first.name.clone(), states.into_iter().collect());
        }
    }

    pub fn set_logs(&self, key: StreamKey, logs: Logs) {
        self.logs.lock().insert(key, logs);
    }

    /// Returns the sender feeding the next `watch_pods` stream.
    pub fn watch_feed(&self) -> mpsc::UnboundedSender<AppResult<PodEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.watch.lock() = Some(rx);
        tx
    }

    pub fn opened(&self) -> Vec<StreamKey> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn list_namespaces(&self) -> AppResult<Vec<String>> {
        Ok(self.namespaces.clone())
    }

    async fn list_pods(&self, _namespace: &str, _selector: &str) -> AppResult<Vec<PodDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut lists = self.lists.lock();
        let next = if lists.len() > 1 { lists.pop_front() } else { None };
        match next {
            Some(result) => result,
            None => match lists.front() {
                Some(Ok(pods)) => Ok(pods.clone()),
                Some(Err(e)) => Err(AppError::Other(e.to_string())),
                None => Ok(Vec::new()),
            },
        }
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> AppResult<PodDescriptor> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let mut pods = self.pods.lock();
        let states = pods.get_mut(name).ok_or_else(|| AppError::PodNotFound {
            namespace: namespace.to_string(),
            pod: name.to_string(),
        })?;
        if states.len() > 1 {
            if let Some(pod) = states.pop_front() {
                return Ok(pod);
            }
        }
        states.front().cloned().ok_or_else(|| AppError::PodNotFound {
            namespace: namespace.to_string(),
            pod: name.to_string(),
        })
    }

    fn watch_pods(&self, _namespace: &str, _selector: &str) -> BoxStream<'static, AppResult<PodEvent>> {
        match self.watch.lock().take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|ev| (ev, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }

    async fn stream_logs(
        &self,
        _namespace: &str,
        key: &StreamKey,
        _options: &LogOptions,
    ) -> AppResult<LogReader> {
        self.opened.lock().push(key.clone());
        let logs = self.logs.lock().get(key).cloned().unwrap_or(Logs::Blocked);
        match logs {
            Logs::Lines(lines) => {
                let chunks = lines
                    .into_iter()
                    .map(|l| Ok::<_, io::Error>(format!("{l}\n").into_bytes()));
                Ok(Box::pin(stream::iter(chunks).into_async_read()))
            }
            Logs::Blocked => Ok(Box::pin(
                stream::pending::<io::Result<Vec<u8>>>()
                    .boxed()
                    .into_async_read(),
            )),
            Logs::Fail => Err(AppError::Other(format!("cannot open logs of {key}"))),
        }
    }
}

pub fn at(secs: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(1_700_000_000 + secs).ok()
}

pub fn pod(name: &str, phase: PodPhase, containers: &[(&str, Option<OffsetDateTime>)]) -> PodDescriptor {
    PodDescriptor {
        namespace: "default".to_string(),
        name: name.to_string(),
        phase,
        labels: BTreeMap::from([("app".to_string(), name.to_string())]),
        containers: containers
            .iter()
            .map(|(c, started_at)| ContainerDescriptor {
                name: c.to_string(),
                running: phase == PodPhase::Running,
                started_at: *started_at,
            })
            .collect(),
    }
}
