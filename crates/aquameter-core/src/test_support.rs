// Scripted connector for unit tests: replays canned bridge outcomes and
// counts how often clients are built and queried.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aquameter_api::{Error, StatusPayload};
use secrecy::SecretString;
use serde_json::Value;

use crate::config::{
    ConnectionParameters, ConnectionProfile, DEFAULT_SCAN_INTERVAL, DeviceEntry, ProtocolVersion,
};
use crate::device::{Connector, DeviceClient};

pub(crate) const DEVICE_ID: &str = "bf70d7388a31ac0421bfyi";

pub(crate) fn params_for(device_id: &str, address: &str) -> ConnectionParameters {
    ConnectionParameters::new(
        device_id,
        SecretString::from("0123456789abcdef".to_owned()),
        address,
        ProtocolVersion::V3_5,
    )
    .unwrap_or_else(|e| panic!("test parameters are valid: {e}"))
}

pub(crate) fn entry(name: &str) -> DeviceEntry {
    DeviceEntry::new(name, params_for(DEVICE_ID, "192.168.20.161"), DEFAULT_SCAN_INTERVAL)
        .unwrap_or_else(|e| panic!("test entry is valid: {e}"))
}

/// One canned outcome of a status round trip.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Status(Value),
    Empty,
    Unavailable,
    Timeout,
    Undecodable,
    /// Wait, then answer.
    Slow(Duration, Box<Reply>),
}

impl Reply {
    pub(crate) fn status(value: Value) -> Self {
        Self::Status(value)
    }

    fn resolve(self) -> (Option<Duration>, Result<StatusPayload, Error>) {
        match self {
            Self::Status(value) => (None, Ok(StatusPayload::classify(value))),
            Self::Empty => (None, Ok(StatusPayload::Empty)),
            Self::Unavailable => (
                None,
                Err(Error::Unavailable {
                    url: "http://127.0.0.1:8888/".into(),
                    reason: "connection refused".into(),
                }),
            ),
            Self::Timeout => (None, Err(Error::Timeout { timeout_secs: 20 })),
            Self::Undecodable => (
                None,
                Err(Error::Deserialization {
                    message: "expected value at line 1 column 1".into(),
                    body: "<html>".into(),
                }),
            ),
            Self::Slow(delay, inner) => (Some(delay), inner.resolve().1),
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    connects: AtomicUsize,
    fetches: AtomicUsize,
    profiles: Mutex<Vec<ConnectionProfile>>,
    addresses: Mutex<Vec<String>>,
}

/// Connector whose clients answer from a shared script.
///
/// Replies are consumed in order; once the queue is empty the fallback
/// (if any) repeats, otherwise the client reports no response.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedConnector {
    script: Arc<Script>,
}

impl ScriptedConnector {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        let connector = Self::default();
        lock(&connector.script.replies).extend(replies);
        connector
    }

    pub(crate) fn repeating(reply: Reply) -> Self {
        let connector = Self::default();
        *lock(&connector.script.fallback) = Some(reply);
        connector
    }

    pub(crate) fn then_repeat(self, reply: Reply) -> Self {
        *lock(&self.script.fallback) = Some(reply);
        self
    }

    pub(crate) fn connects(&self) -> usize {
        self.script.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> usize {
        self.script.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn profiles(&self) -> Vec<ConnectionProfile> {
        lock(&self.script.profiles).clone()
    }

    pub(crate) fn addresses(&self) -> Vec<String> {
        lock(&self.script.addresses).clone()
    }
}

impl Connector for ScriptedConnector {
    type Client = ScriptedClient;

    fn connect(&self, params: &ConnectionParameters) -> ScriptedClient {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        lock(&self.script.profiles).push(params.profile());
        lock(&self.script.addresses).push(params.address().to_owned());
        ScriptedClient {
            script: Arc::clone(&self.script),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedClient {
    script: Arc<Script>,
}

impl DeviceClient for ScriptedClient {
    async fn fetch_status(&self) -> Result<StatusPayload, Error> {
        self.script.fetches.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.script.replies)
            .pop_front()
            .or_else(|| lock(&self.script.fallback).clone())
            .unwrap_or(Reply::Empty);

        let (delay, outcome) = next.resolve();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
