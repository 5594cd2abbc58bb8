use std::{fs::File, future::Future, io};

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::io::ReaderStream;

use crate::{progress::ProgressSink, util::copy::COPY_BUFFER_SIZE};

/// Streams `source` in `COPY_BUFFER_SIZE` chunks. The length of every chunk
/// handed to the consumer is sent on the returned receiver.
pub fn counted_file_stream(
    source: File,
) -> (
    impl Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    UnboundedReceiver<usize>,
) {
    let (sent, counts) = mpsc::unbounded_channel();
    let file = tokio::fs::File::from_std(source);

    let stream = ReaderStream::with_capacity(file, COPY_BUFFER_SIZE).inspect_ok(move |chunk| {
        // the receiver is gone only once the upload has finished
        let _ = sent.send(chunk.len());
    });

    (stream, counts)
}

/// Polls `upload` to completion, forwarding chunk counts to `progress` as the
/// upload body consumes them.
pub async fn drive_with_progress<Fut, T>(
    upload: Fut,
    mut counts: UnboundedReceiver<usize>,
    progress: &mut dyn ProgressSink,
) -> T
where
    Fut: Future<Output = T>,
{
    tokio::pin!(upload);

    loop {
        tokio::select! {
            biased;
            Some(n) = counts.recv() => progress.on_bytes_transferred(n),
            result = &mut upload => {
                while let Ok(n) = counts.try_recv() {
                    progress.on_bytes_transferred(n);
                }
                return result;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::Write,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use crate::util::poll::Poller;

    fn source_file(len: usize) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&vec![5u8; len]).unwrap();
        std::io::Seek::rewind(&mut file).unwrap();
        file
    }

    #[test]
    fn test_progress_follows_consumed_chunks() {
        let cases = vec![0, 1, COPY_BUFFER_SIZE, COPY_BUFFER_SIZE * 2 + 9];

        for len in cases {
            let poller = Poller::new().unwrap();
            let (stream, counts) = counted_file_stream(source_file(len));
            let consumed = Arc::new(AtomicUsize::new(0));

            // (chunk, bytes the consumer had taken when the sink was called)
            let mut seen = Vec::new();
            let mut sink = |n: usize| seen.push((n, consumed.load(Ordering::SeqCst)));

            let upload = {
                let consumed = consumed.clone();
                async move {
                    stream
                        .try_fold(0usize, |acc, chunk| {
                            consumed.fetch_add(chunk.len(), Ordering::SeqCst);
                            async move { Ok::<_, io::Error>(acc + chunk.len()) }
                        })
                        .await
                }
            };

            let total = poller
                .poll_until_ready(drive_with_progress(upload, counts, &mut sink))
                .unwrap();

            assert_eq!(total, len, "failed on `total` for case: {}", len);
            assert_eq!(
                seen.iter().map(|(n, _)| n).sum::<usize>(),
                len,
                "failed on progress sum for case: {}",
                len
            );

            let mut running = 0;
            for (n, consumed_at_call) in seen {
                running += n;
                assert!(
                    consumed_at_call >= running,
                    "progress ran ahead of the upload for case: {}",
                    len
                );
            }
        }
    }

    #[test]
    fn test_failed_upload_result_is_returned() {
        let poller = Poller::new().unwrap();
        let (stream, counts) = counted_file_stream(source_file(COPY_BUFFER_SIZE * 2));

        let upload = async move {
            let mut stream = Box::pin(stream);
            stream.try_next().await?;
            Err::<(), io::Error>(io::Error::new(io::ErrorKind::BrokenPipe, "connection reset"))
        };

        let mut counter = crate::progress::ByteCounter::default();
        let err = poller
            .poll_until_ready(drive_with_progress(upload, counts, &mut counter))
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(counter.total(), COPY_BUFFER_SIZE as u64);
    }
}
