//! Inputs shared by the decoder benchmarks.

use std::fmt::Write as _;

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    input: Vec<u8>,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, input: Vec<u8>) -> Self {
        Self { name, group, input }
    }

    pub fn small(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Small, input)
    }

    pub fn normal(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Normal, input)
    }

    pub fn large(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Large, input)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    pub fn len(&self) -> u64 {
        self.input.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

/// A chunked body of `chunks` chunks of `chunk_size` bytes each, last chunk included.
pub fn chunked_body(chunk_size: usize, chunks: usize) -> Vec<u8> {
    let mut body = String::new();
    let data = "x".repeat(chunk_size);
    for _ in 0..chunks {
        let _ = write!(body, "{chunk_size:x}\r\n{data}\r\n");
    }
    body.push_str("0\r\n\r\n");
    body.into_bytes()
}

/// A request head with `headers` header lines and the terminating empty line.
pub fn request_head(headers: usize) -> Vec<u8> {
    let mut head = String::from("GET /index.html HTTP/1.1\r\nHost: 127.0.0.1:8080\r\n");
    for i in 0..headers {
        let _ = write!(head, "X-Bench-{i}: value-{i}-abcdefghijklmnopqrstuvwxyz\r\n");
    }
    head.push_str("\r\n");
    head.into_bytes()
}
