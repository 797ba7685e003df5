//! Line demultiplexing for raw output chunks
//!
//! Transports hand us output in arbitrary chunks. [`LineDemux`] turns one
//! channel's chunks back into whole lines, carrying any unterminated tail
//! over to the next chunk.

/// Accumulates chunks for a single output channel and splits them into lines
#[derive(Debug, Default)]
pub struct LineDemux {
    pending: Vec<u8>,
}

impl LineDemux {
    /// Create an empty demultiplexer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed in arrival order
    ///
    /// The `\n` terminator is stripped. Bytes after the last terminator are
    /// held back and prefixed onto the next chunk. A tail that is never
    /// terminated is never emitted.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..complete.len() - 1]
            .split(|b| *b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// The buffered partial line, if any
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut demux = LineDemux::new();
        assert_eq!(demux.push(b"hello\n"), vec!["hello"]);
        assert!(demux.pending().is_empty());
    }

    #[test]
    fn test_partial_line_carried_over() {
        let mut demux = LineDemux::new();
        assert!(demux.push(b"hel").is_empty());
        assert!(demux.push(b"lo wo").is_empty());
        assert_eq!(demux.push(b"rld\n"), vec!["hello world"]);
    }

    #[test]
    fn test_complete_lines_before_partial_tail() {
        let mut demux = LineDemux::new();
        assert_eq!(demux.push(b"a\nb\nc"), vec!["a", "b"]);
        assert_eq!(demux.pending(), b"c");
        assert_eq!(demux.push(b"d\n"), vec!["cd"]);
    }

    #[test]
    fn test_empty_lines_preserved() {
        let mut demux = LineDemux::new();
        assert_eq!(demux.push(b"\n\nx\n"), vec!["", "", "x"]);
    }

    #[test]
    fn test_unterminated_tail_never_emitted() {
        let mut demux = LineDemux::new();
        assert_eq!(demux.push(b"done\ntrailing"), vec!["done"]);
        assert!(demux.push(b"").is_empty());
        assert_eq!(demux.pending(), b"trailing");
    }

    #[test]
    fn test_rejoined_lines_reproduce_text() {
        let text = "first line\nsecond\n\n{\"a\": 1}\nlast\n";
        let bytes = text.as_bytes();

        for chunk_size in [1, 2, 3, 7, bytes.len()] {
            let mut demux = LineDemux::new();
            let mut lines = Vec::new();
            for chunk in bytes.chunks(chunk_size) {
                lines.extend(demux.push(chunk));
            }
            assert_eq!(lines.join("\n"), &text[..text.len() - 1]);
        }
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut demux = LineDemux::new();
        let bytes = "héllo\n".as_bytes();
        assert!(demux.push(&bytes[..2]).is_empty());
        assert_eq!(demux.push(&bytes[2..]), vec!["héllo"]);
    }
}
