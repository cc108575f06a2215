use bytes::Bytes;
use log::{debug, trace, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::actors::Renderer;
use crate::reorder_buffer::ReorderBuffer;

type Sender = tokio::sync::mpsc::UnboundedSender<Message>;
type Receiver = tokio::sync::mpsc::UnboundedReceiver<Message>;
type Sink = Box<dyn AsyncWrite + Send + Unpin>;

pub enum Message {
    Queue(Bytes, u32),
}

struct RendererActor {
    receiver: Receiver,
    reorder_buffer: ReorderBuffer,
    sink: Sink,
}

impl RendererActor {
    async fn handle_message(&mut self, message: Message) {
        match message {
            Message::Queue(payload, extended_seq) => {
                let ready = self.reorder_buffer.push(extended_seq, payload);
                trace!(
                    target: "Renderer Actor",
                    "Queued seq:{}, {} ready, {} pending",
                    extended_seq,
                    ready.len(),
                    self.reorder_buffer.len()
                );
                self.write(ready).await;
            }
        }
    }

    async fn write(&mut self, payloads: Vec<Bytes>) {
        for payload in payloads {
            if let Err(err) = self.sink.write_all(&payload).await {
                warn!(target: "Renderer Actor", "Error writing payload: {}", err);
                return;
            }
        }
    }
}

/// Renderer writing payloads, in extended-sequence order, to a byte sink.
#[derive(Debug, Clone)]
pub struct RendererActorHandle {
    pub sender: Sender,
}

impl RendererActorHandle {
    pub fn new<W>(sink: W, reorder_depth: usize) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::spawn(sink, reorder_depth).0
    }

    /// Like `new`, also returning the actor task. The task ends once every
    /// handle is dropped and the sink has been flushed.
    pub fn spawn<W>(sink: W, reorder_depth: usize) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel::<Message>();
        let actor = RendererActor {
            receiver,
            reorder_buffer: ReorderBuffer::new(reorder_depth),
            sink: Box::new(sink),
        };

        let task = tokio::spawn(run(actor));

        (Self { sender }, task)
    }
}

impl Renderer for RendererActorHandle {
    fn queue(&mut self, payload: Bytes, extended_seq: u32) {
        if self.sender.send(Message::Queue(payload, extended_seq)).is_err() {
            debug!(target: "Renderer Actor", "Renderer gone, dropping seq:{}", extended_seq);
        }
    }
}

async fn run(mut actor: RendererActor) {
    while let Some(msg) = actor.receiver.recv().await {
        actor.handle_message(msg).await;
    }

    let remaining = actor.reorder_buffer.drain();
    actor.write(remaining).await;
    if let Err(err) = actor.sink.flush().await {
        warn!(target: "Renderer Actor", "Error flushing sink: {}", err);
    }

    debug!(target: "Renderer Actor", "Dropping Actor");
}
