//! Scripted in-memory EIP-1193 provider for tests and demos.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::provider::{Eip1193Provider, ProviderEvent};

type Reply = Result<Value, ProviderError>;

#[derive(Debug)]
enum Script {
    Fixed(Reply),
    /// Replies in order; the last one repeats once the queue is drained.
    Queue(VecDeque<Reply>),
}

/// A provider whose replies are set per method.
///
/// `eth_call` replies can additionally be keyed by the 4-byte selector at the
/// start of the calldata. Unscripted methods fail with code 4200.
#[derive(Debug, Default)]
pub struct MockProvider {
    scripts: Mutex<HashMap<String, Script>>,
    call_scripts: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, Value)>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<ProviderEvent>>>,
    not_metamask: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that does not identify as MetaMask.
    pub fn foreign() -> Self {
        Self {
            not_metamask: true,
            ..Self::default()
        }
    }

    /// Always answer `method` with `value`.
    pub fn respond(&self, method: &str, value: Value) {
        self.set(method, Script::Fixed(Ok(value)));
    }

    /// Always fail `method` with `err`.
    pub fn fail(&self, method: &str, err: ProviderError) {
        self.set(method, Script::Fixed(Err(err)));
    }

    /// Answer `method` with `replies` in order.
    pub fn respond_queue(&self, method: &str, replies: Vec<Reply>) {
        self.set(method, Script::Queue(replies.into()));
    }

    /// Answer `eth_call` whose calldata starts with `selector` (hex, no `0x`).
    pub fn respond_call(&self, selector: &str, reply: Reply) {
        lock(&self.call_scripts).insert(selector.to_lowercase(), reply);
    }

    /// Push an event to every live listener, dropping closed ones.
    pub fn emit(&self, event: ProviderEvent) {
        lock(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|(m, _)| m == method).count()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        lock(&self.calls)
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn set(&self, method: &str, script: Script) {
        lock(&self.scripts).insert(method.to_string(), script);
    }

    fn reply_for_call(&self, params: &Value) -> Option<Reply> {
        let data = params.get(0)?.get("data")?.as_str()?;
        let selector = data.strip_prefix("0x").unwrap_or(data).get(..8)?.to_lowercase();
        lock(&self.call_scripts).get(&selector).cloned()
    }
}

#[async_trait]
impl Eip1193Provider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        lock(&self.calls).push((method.to_string(), params.clone()));

        if method == "eth_call" {
            if let Some(reply) = self.reply_for_call(&params) {
                return reply;
            }
        }

        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(method) {
            Some(Script::Fixed(reply)) => reply.clone(),
            Some(Script::Queue(queue)) => {
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or(Ok(Value::Null))
                } else {
                    queue.front().cloned().unwrap_or(Ok(Value::Null))
                }
            }
            None => Err(ProviderError::new(
                ProviderError::UNSUPPORTED_METHOD,
                format!("The requested method is not supported: {method}"),
            )),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.listeners).push(tx);
        rx
    }

    fn is_metamask(&self) -> bool {
        !self.not_metamask
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
