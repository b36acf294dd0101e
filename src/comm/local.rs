//! In-process group runtime: one thread per rank.
//!
//! Point-to-point links form an N x N matrix of FIFO channels, so messages
//! between a pair of ranks never overtake each other. Collectives are built on
//! those links; a message of the wrong kind means the ranks disagree on the
//! order of collective calls and is reported as a protocol error.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier};
use std::thread;

use tracing::trace;

use super::{CommError, Communicator, ReduceOp, check_rank};

#[derive(Debug)]
enum Message {
    Data(Vec<u8>),
    Reduce(f64),
    Broadcast(f64),
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Reduce(_) => "reduce",
            Self::Broadcast(_) => "broadcast",
        }
    }
}

/// Builder for a group of in-process ranks.
pub struct LocalGroup {
    members: Vec<LocalComm>,
}

impl LocalGroup {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        // links[src][dst]
        let mut senders: Vec<Vec<Sender<Message>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Vec<Option<Receiver<Message>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for src in 0..size {
            let mut row = Vec::with_capacity(size);
            for dst_inbox in receivers.iter_mut() {
                let (tx, rx) = mpsc::channel();
                row.push(tx);
                dst_inbox[src] = Some(rx);
            }
            senders.push(row);
        }

        let barrier = Arc::new(Barrier::new(size));
        let members = senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outbox, inbox))| LocalComm {
                rank,
                size,
                outbox,
                inbox: inbox.into_iter().flatten().collect(),
                barrier: Arc::clone(&barrier),
            })
            .collect();
        Self { members }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn into_members(self) -> Vec<LocalComm> {
        self.members
    }

    /// Run `f` once per rank, each on its own thread, and collect the results
    /// in rank order.
    pub fn run<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(LocalComm) -> T + Sync,
    {
        let members = Self::new(size).into_members();
        let f = &f;
        thread::scope(|s| {
            let handles: Vec<_> = members
                .into_iter()
                .map(|comm| {
                    let name = format!("rank-{}", comm.rank);
                    thread::Builder::new()
                        .name(name)
                        .spawn_scoped(s, move || f(comm))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h {
                    Ok(h) => match h.join() {
                        Ok(v) => v,
                        Err(panic) => std::panic::resume_unwind(panic),
                    },
                    Err(e) => panic!("failed to spawn rank thread: {e}"),
                })
                .collect()
        })
    }
}

/// One member of a [`LocalGroup`].
pub struct LocalComm {
    rank: usize,
    size: usize,
    outbox: Vec<Sender<Message>>,
    inbox: Vec<Receiver<Message>>,
    barrier: Arc<Barrier>,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    fn post(&self, dest: usize, msg: Message) -> Result<(), CommError> {
        self.outbox[dest]
            .send(msg)
            .map_err(|_| CommError::Disconnected { peer: dest })
    }

    fn take(&self, source: usize) -> Result<Message, CommError> {
        self.inbox[source]
            .recv()
            .map_err(|_| CommError::Disconnected { peer: source })
    }

    fn take_scalar(&self, source: usize, expected: &'static str) -> Result<f64, CommError> {
        match (self.take(source)?, expected) {
            (Message::Reduce(v), "reduce") | (Message::Broadcast(v), "broadcast") => Ok(v),
            (other, _) => Err(CommError::Protocol {
                peer: source,
                expected,
                got: other.kind(),
            }),
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn node_local(&self) -> (usize, usize) {
        (self.rank, self.size)
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.barrier.wait();
        Ok(())
    }

    fn sendrecv(
        &self,
        send: &[u8],
        dest: usize,
        recv: &mut [u8],
        source: usize,
    ) -> Result<(), CommError> {
        check_rank(dest, self.size)?;
        check_rank(source, self.size)?;
        self.post(dest, Message::Data(send.to_vec()))?;
        match self.take(source)? {
            Message::Data(payload) => {
                if payload.len() != recv.len() {
                    return Err(CommError::Truncated {
                        peer: source,
                        expected: recv.len(),
                        actual: payload.len(),
                    });
                }
                recv.copy_from_slice(&payload);
                trace!(rank = self.rank, dest, source, bytes = payload.len(), "sendrecv done");
                Ok(())
            }
            other => Err(CommError::Protocol {
                peer: source,
                expected: "data",
                got: other.kind(),
            }),
        }
    }

    fn reduce(&self, value: f64, op: ReduceOp, root: usize) -> Result<Option<f64>, CommError> {
        check_rank(root, self.size)?;
        if self.rank != root {
            self.post(root, Message::Reduce(value))?;
            return Ok(None);
        }
        // Fold in rank order so sums are reproducible for identical inputs.
        let mut acc: Option<f64> = None;
        for src in 0..self.size {
            let v = if src == root {
                value
            } else {
                self.take_scalar(src, "reduce")?
            };
            acc = Some(match acc {
                Some(a) => op.apply(a, v),
                None => v,
            });
        }
        Ok(acc)
    }

    fn broadcast(&self, value: f64, root: usize) -> Result<f64, CommError> {
        check_rank(root, self.size)?;
        if self.rank == root {
            for dst in (0..self.size).filter(|&d| d != root) {
                self.post(dst, Message::Broadcast(value))?;
            }
            Ok(value)
        } else {
            self.take_scalar(root, "broadcast")
        }
    }

    fn abort(&self, code: i32) -> ! {
        // All ranks share this process, so exiting it takes the whole group down.
        std::process::exit(code)
    }
}
