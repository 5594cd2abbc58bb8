use std::io::{self, ErrorKind, Read, Write};

use crate::progress::ProgressSink;

pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Copies `reader` into `writer` one buffer at a time, reporting every chunk
/// to `progress`. Returns the total byte count.
pub fn copy_with_progress<R, W>(
    reader: &mut R,
    writer: &mut W,
    progress: &mut dyn ProgressSink,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        writer.write_all(&buf[..n])?;
        progress.on_bytes_transferred(n);
        total += n as u64;
    }

    writer.flush()?;

    Ok(total)
}
