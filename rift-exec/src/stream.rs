use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Result of a bounded line read.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadLineResult {
    Line(Vec<u8>),
    /// The line exceeded the limit; only its first `max_len` bytes are kept.
    Truncated(Vec<u8>),
    Eof,
}

/// Read one line (including its `\n`) without buffering more than `max_len` bytes.
///
/// The rest of an over-long line is consumed and discarded. A final line with
/// no trailing newline is returned as a regular line before `Eof`.
pub async fn read_line_with_limit<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_len: usize,
) -> io::Result<ReadLineResult> {
    buf.clear();
    let mut truncated = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if buf.is_empty() && !truncated {
                return Ok(ReadLineResult::Eof);
            }
            return Ok(finish(buf, truncated));
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let take = newline.map_or(available.len(), |pos| pos + 1);
        let room = max_len.saturating_sub(buf.len());
        let keep = take.min(room);
        if keep < take {
            truncated = true;
        }
        if let Some(kept) = available.get(..keep) {
            buf.extend_from_slice(kept);
        }
        reader.consume(take);

        if newline.is_some() {
            return Ok(finish(buf, truncated));
        }
    }
}

fn finish(buf: &[u8], truncated: bool) -> ReadLineResult {
    if truncated {
        ReadLineResult::Truncated(buf.to_vec())
    } else {
        ReadLineResult::Line(buf.to_vec())
    }
}

/// Decode a raw line into an output chunk that always ends with `\n`.
pub fn chunk_from_line(bytes: &[u8]) -> String {
    let mut chunk = String::from_utf8_lossy(bytes).into_owned();
    if !chunk.ends_with('\n') {
        chunk.push('\n');
    }
    chunk
}

#[cfg(test)]
mod tests {
    use super::{ReadLineResult, chunk_from_line, read_line_with_limit};
    use tokio::io::BufReader;

    #[tokio::test]
    async fn read_line_with_limit_truncates() -> std::io::Result<()> {
        let data = "hello world\nnext\n";
        let mut reader = BufReader::new(data.as_bytes());
        let mut buf = Vec::new();

        let result = read_line_with_limit(&mut reader, &mut buf, 5).await?;
        assert_eq!(result, ReadLineResult::Truncated(b"hello".to_vec()));

        let result = read_line_with_limit(&mut reader, &mut buf, 5).await?;
        assert_eq!(result, ReadLineResult::Line(b"next\n".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn lines_survive_small_buffers() -> std::io::Result<()> {
        let data = "alpha\nbeta\ngamma";
        let mut reader = BufReader::with_capacity(2, data.as_bytes());
        let mut buf = Vec::new();

        let mut lines = Vec::new();
        loop {
            match read_line_with_limit(&mut reader, &mut buf, 64).await? {
                ReadLineResult::Line(line) | ReadLineResult::Truncated(line) => lines.push(line),
                ReadLineResult::Eof => break,
            }
        }
        assert_eq!(
            lines,
            vec![b"alpha\n".to_vec(), b"beta\n".to_vec(), b"gamma".to_vec()]
        );
        Ok(())
    }

    #[test]
    fn chunks_end_with_newline() {
        assert_eq!(chunk_from_line(b"done"), "done\n");
        assert_eq!(chunk_from_line(b"done\n"), "done\n");
        assert_eq!(chunk_from_line(&[0x66, 0xff, b'\n']), "f\u{fffd}\n");
    }
}
