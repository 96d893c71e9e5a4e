use crate::management::comm::ProcessHelper;
use satisfactory_protocol::management::instance::ConsoleLine;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Receives server output, one call per line.
pub trait ConsoleSink: Send + Sync {
    fn add_output(&self, line: ConsoleLine);
}

/// Sends text or signals into a running server's console.
pub trait ConsoleInjector: Send + Sync {
    /// Asks the process to shut down as if Ctrl+C was pressed in its window.
    fn send_interrupt(&self, pid: u32) -> std::io::Result<()>;
}

/// Interrupts through OS signals / console control events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalInjector;

impl ConsoleInjector for SignalInjector {
    fn send_interrupt(&self, pid: u32) -> std::io::Result<()> {
        ProcessHelper::interrupt(pid)
    }
}

struct ConsoleBuffer {
    lines: VecDeque<ConsoleLine>,
    tx: broadcast::Sender<ConsoleLine>,
}

impl ConsoleBuffer {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            tx,
        }
    }
}

/// Per-instance console buffers, with live subscriptions.
pub struct ConsoleHub {
    // use ahash to speed up ops
    buffers: scc::HashMap<Uuid, ConsoleBuffer, ahash::RandomState>,
    capacity: usize,
}

impl ConsoleHub {
    /// `capacity` lines are kept per instance, older ones are dropped.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: scc::HashMap::default(),
            capacity,
        }
    }

    pub fn subscribe(&self, instance: Uuid) -> broadcast::Receiver<ConsoleLine> {
        self.buffers
            .entry(instance)
            .or_insert_with(|| ConsoleBuffer::new(self.capacity))
            .get()
            .tx
            .subscribe()
    }

    pub fn snapshot(&self, instance: Uuid) -> Vec<ConsoleLine> {
        self.buffers
            .read(&instance, |_, buffer| buffer.lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl ConsoleSink for ConsoleHub {
    fn add_output(&self, line: ConsoleLine) {
        let mut entry = self
            .buffers
            .entry(line.instance)
            .or_insert_with(|| ConsoleBuffer::new(self.capacity));
        let buffer = entry.get_mut();
        // no subscribers is fine
        let _ = buffer.tx.send(line.clone());
        if self.capacity == 0 {
            return;
        }
        while buffer.lines.len() >= self.capacity {
            buffer.lines.pop_front();
        }
        buffer.lines.push_back(line);
    }
}
