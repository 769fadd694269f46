//! Per-stream bookkeeping for one direction of an HTTP/2 connection.

use std::collections::VecDeque;

use crate::content::BodyPipeline;
use crate::message::Http2Message;

/// Lifecycle of one stream half as seen by a single direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Opened but no final header block yet (only after a 1xx response).
    Idle,
    /// A HEADERS frame arrived without END_HEADERS.
    HeadersInProgress,
    /// Headers delivered, DATA may follow.
    Body,
    /// END_STREAM seen.
    HalfClosed,
    Closed,
    Reset,
}

#[derive(Debug)]
pub(crate) struct H2Stream {
    pub(crate) message: Http2Message,
    pub(crate) state: StreamState,
    pub(crate) pipeline: BodyPipeline,
    /// A headers callback has seen this stream.
    pub(crate) delivered: bool,
    pub(crate) data_started: bool,
    pub(crate) aborted: bool,
    /// DATA bytes consumed and not yet acknowledged with WINDOW_UPDATE.
    pub(crate) unacked: u32,
}

impl H2Stream {
    pub(crate) fn new(stream_id: u32) -> Self {
        Self {
            message: Http2Message::new(stream_id),
            state: StreamState::Idle,
            pipeline: BodyPipeline::Identity,
            delivered: false,
            data_started: false,
            aborted: false,
            unacked: 0,
        }
    }

    /// Whether embedder events are still owed for this stream.
    pub(crate) fn is_reported(&self) -> bool {
        self.delivered && !self.aborted
    }
}

/// Bounded memory of recently closed stream ids.
///
/// Ids initiated by the local watermark side never need this; it covers
/// the parity whose ordering the leg cannot infer.
#[derive(Debug)]
pub(crate) struct RecentlyClosed {
    ids: VecDeque<u32>,
    capacity: usize,
}

impl RecentlyClosed {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn insert(&mut self, stream_id: u32) {
        if self.capacity == 0 || self.ids.contains(&stream_id) {
            return;
        }
        if self.ids.len() == self.capacity {
            self.ids.pop_front();
        }
        self.ids.push_back(stream_id);
    }

    pub(crate) fn contains(&self, stream_id: u32) -> bool {
        self.ids.contains(&stream_id)
    }
}
