use s7::client::Client;
use s7::transport::{Connection, Transport};
use s7::error::Error;
use std::collections::VecDeque;

/// Minimal canned-response `Transport`, mirroring `src/testutil.rs`'s
/// internal mock but defined here since that module is not part of
/// the crate's public, non-test surface.
struct MockTransport {
    responses: VecDeque<Vec<u8>>,
    pdu_length: i32,
}

impl MockTransport {
    fn new(pdu_length: i32) -> MockTransport {
        MockTransport {
            responses: VecDeque::new(),
            pdu_length,
        }
    }

    fn push_response(&mut self, response: Vec<u8>) {
        self.responses.push_back(response);
    }
}

impl Transport for MockTransport {
    fn send(&mut self, _request: &[u8]) -> Result<Vec<u8>, Error> {
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

#[test]
fn test_client_db_read() {
    let mut transport = MockTransport::new(480);
    let mut response = vec![0u8; 28];
    response[21] = 0xFF;
    response[25] = 10;
    response[26] = 20;
    response[27] = 30;
    transport.push_response(response);

    let mut client = Client::new(transport).unwrap();
    let buffer = &mut vec![0u8; 3];

    client.db_read(1, 1, 3, buffer).unwrap();
    assert_eq!(*buffer, vec![10, 20, 30]);
}

#[test]
fn test_client_db_read_cpu_error() {
    let mut transport = MockTransport::new(480);
    let mut response = vec![0u8; 25];
    response[21] = 0x05; // not 0xFF -> CPU error
    transport.push_response(response);

    let mut client = Client::new(transport).unwrap();
    let buffer = &mut vec![0u8; 1];

    match client.db_read(1, 1, 1, buffer) {
        Err(Error::CPU { code }) => assert_eq!(code, 5),
        other => panic!("expected CPU error, got {:?}", other),
    }
}

#[test]
fn test_client_db_write() {
    let mut transport = MockTransport::new(480);
    let mut response = vec![0u8; 22];
    response[21] = 0xFF;
    transport.push_response(response);

    let mut client = Client::new(transport).unwrap();
    let buffer = &mut vec![9u8; 2];

    client.db_write(1, 0, 2, buffer).unwrap();
}
