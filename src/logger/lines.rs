use super::DriverLogger;
use crate::domain::Labels;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

impl DriverLogger {
    /// Emits every non-empty line read from `reader`, e.g. the piped output of a build tool.
    ///
    /// Lines are decoded lossily, so invalid UTF-8 becomes U+FFFD instead of ending the
    /// stream. Returns the number of lines emitted. Read errors are returned; publish
    /// failures are swallowed exactly as in [`emit`](Self::emit).
    pub async fn forward_lines<R>(
        &self,
        reader: R,
        pipeline: Option<&str>,
        labels: &Labels,
    ) -> std::io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut segments = reader.split(b'\n');
        let mut forwarded = 0;
        while let Some(segment) = segments.next_segment().await? {
            let line = String::from_utf8_lossy(&segment);
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            self.emit(line, pipeline, labels.clone()).await;
            forwarded += 1;
        }
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::LogRecord;
    use crate::labels;
    use crate::logger::DriverLogger;
    use crate::test_support::{ChannelKind, RecordingConnection};

    #[tokio::test]
    async fn test_forward_lines_skips_blank_lines() {
        let connection = RecordingConnection::new();
        let logger = DriverLogger::new("r1", "buildpacks", Some(&connection));
        let output: &[u8] = b"Step 1/3\r\n\n   \nStep 2/3\nStep 3/3";

        let forwarded = logger
            .forward_lines(output, Some("deploy"), &labels! { "stream" => "stdout" })
            .await
            .unwrap();

        assert_eq!(forwarded, 3);
        let messages: Vec<_> = connection
            .calls_on(ChannelKind::Durable)
            .iter()
            .map(|call| LogRecord::decode(&call.payload).unwrap())
            .map(|record| {
                assert_eq!(record.pipeline.as_deref(), Some("deploy"));
                assert_eq!(record.labels["stream"], "stdout");
                record.message
            })
            .collect();
        assert_eq!(messages, ["Step 1/3", "Step 2/3", "Step 3/3"]);
    }

    #[tokio::test]
    async fn test_forward_lines_survives_invalid_utf8() {
        let connection = RecordingConnection::new();
        let logger = DriverLogger::new("r1", "buildpacks", Some(&connection));
        let output: &[u8] = b"Step 1/3\nbad \xff byte\r\nStep 3/3\n";

        let forwarded = logger
            .forward_lines(output, None, &labels! {})
            .await
            .unwrap();

        assert_eq!(forwarded, 3);
        let messages: Vec<_> = connection
            .calls_on(ChannelKind::Durable)
            .iter()
            .map(|call| LogRecord::decode(&call.payload).unwrap().message)
            .collect();
        assert_eq!(messages, ["Step 1/3", "bad \u{FFFD} byte", "Step 3/3"]);
    }

    #[tokio::test]
    async fn test_forward_lines_without_connection_still_counts() {
        let logger = DriverLogger::new("r1", "buildpacks", None);
        let output: &[u8] = b"one\ntwo\n";

        let forwarded = logger
            .forward_lines(output, None, &labels! {})
            .await
            .unwrap();

        assert_eq!(forwarded, 2);
    }
}
