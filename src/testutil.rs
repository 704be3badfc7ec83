// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! In-memory `Transport` double used by the inline unit test suites,
//! so area/multi-var/SZL/control-op logic can be exercised without a
//! live PLC.

use super::error::Error;
use super::transport::{Connection, Transport};
use std::collections::VecDeque;

/// Replays a queue of canned responses and records every request it
/// was sent, one per `send` call.
pub(crate) struct MockTransport {
    responses: VecDeque<Vec<u8>>,
    pub(crate) sent: Vec<Vec<u8>>,
    pdu_length: i32,
}

impl MockTransport {
    pub(crate) fn new(pdu_length: i32) -> MockTransport {
        MockTransport {
            responses: VecDeque::new(),
            sent: Vec::new(),
            pdu_length,
        }
    }

    pub(crate) fn push_response(&mut self, response: Vec<u8>) {
        self.responses.push_back(response);
    }
}

impl Transport for MockTransport {
    fn send(&mut self, request: &[u8]) -> Result<Vec<u8>, Error> {
        self.sent.push(request.to_vec());
        self.responses.pop_front().ok_or(Error::Send)
    }

    fn pdu_length(&self) -> i32 {
        self.pdu_length
    }

    fn negotiate(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn connection_type(&self) -> Connection {
        Connection::PG
    }
}
