//! `text/event-stream` framing.
//!
//! Buffers incoming bytes, splits on `\n` (a trailing `\r` is stripped) and
//! dispatches one [`RawFrame`] per blank-line-terminated message:
//! - `event:` sets the frame tag
//! - `data:` lines accumulate, joined by `\n`
//! - `id:` / `retry:` are accepted and ignored; this client never reconnects
//! - lines starting with `:` are comments (keep-alives)
//!
//! Messages that carried neither a tag nor a data field are dropped.

use bytes::BytesMut;

use crate::RawFrame;

#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: BytesMut,
    event: Option<String>,
    data: Option<String>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            event: None,
            data: None,
        }
    }

    /// Feed one chunk; returns every frame completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line_bytes = self.buffer.split_to(newline_pos + 1);
            line_bytes.truncate(line_bytes.len() - 1);
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.truncate(line_bytes.len() - 1);
            }
            let line = String::from_utf8_lossy(&line_bytes);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// End of input: flush an unterminated last line and any pending message.
    pub fn finish(&mut self) -> Option<RawFrame> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r');
            if let Some(frame) = self.process_line(line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<RawFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => match self.data.as_mut() {
                Some(buf) => {
                    buf.push('\n');
                    buf.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            // id / retry / unknown fields
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawFrame> {
        let event = self.event.take();
        let data = self.data.take();
        if event.is_none() && data.is_none() {
            return None;
        }
        Some(RawFrame {
            event,
            data: data.unwrap_or_default(),
        })
    }
}
