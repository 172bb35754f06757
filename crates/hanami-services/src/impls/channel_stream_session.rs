// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::traits::StreamSession;
use crate::types::{ServiceError, ServiceResult};
use crossbeam::channel::{unbounded, Receiver, Sender};

/// Stream session over a pair of crossbeam channels
#[derive(Debug)]
pub struct ChannelStreamSession {
    outbound: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
}

/// The far end of a [`ChannelStreamSession`]
#[derive(Debug, Clone)]
pub struct StreamPeer {
    /// Frames the cluster sent
    pub outbound: Receiver<Vec<u8>>,
    /// Frames for the cluster
    pub inbound: Sender<Vec<u8>>,
}

impl ChannelStreamSession {
    pub fn pair() -> (Self, StreamPeer) {
        let (out_tx, out_rx) = unbounded();
        let (in_tx, in_rx) = unbounded();
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            StreamPeer {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }
}

impl StreamSession for ChannelStreamSession {
    fn send_stream_message(&self, bytes: &[u8]) -> ServiceResult<()> {
        self.outbound
            .send(bytes.to_vec())
            .map_err(|_| ServiceError::InvalidState("stream peer disconnected".to_string()))
    }

    fn try_receive(&self) -> Option<Vec<u8>> {
        self.inbound.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_cross_both_ways() {
        let (session, peer) = ChannelStreamSession::pair();
        peer.inbound.send(vec![1, 2]).unwrap();
        assert_eq!(session.try_receive(), Some(vec![1, 2]));
        assert_eq!(session.try_receive(), None);

        session.send_stream_message(&[9]).unwrap();
        assert_eq!(peer.outbound.try_recv().unwrap(), vec![9]);

        drop(peer);
        assert!(session.send_stream_message(&[1]).is_err());
    }
}
