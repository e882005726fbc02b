//! Local socket adapter
//!
//! Unix domain socket or Windows named pipe carrying newline-delimited JSON,
//! one envelope per line.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use interprocess::local_socket::tokio::{prelude::*, Stream};
use interprocess::local_socket::GenericFilePath;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use super::{Connector, FrameSink, FrameStream, TransportError};

/// Frames larger than this are treated as a broken stream
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

pub struct LocalSocketConnector {
    path: String,
}

impl LocalSocketConnector {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Connector for LocalSocketConnector {
    async fn connect(&self) -> Result<(FrameSink, FrameStream), TransportError> {
        let name = self
            .path
            .as_str()
            .to_fs_name::<GenericFilePath>()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let conn = Stream::connect(name)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (recver, sender) = conn.split();

        let sink = SinkExt::<String>::sink_map_err(
            FramedWrite::new(sender, LinesCodec::new()),
            |e| TransportError::Io(e.to_string()),
        );
        let stream = FramedRead::new(recver, LinesCodec::new_with_max_length(MAX_FRAME_BYTES))
            .map(|line| line.map_err(|e| TransportError::Io(e.to_string())));

        Ok((Box::pin(sink), Box::pin(stream)))
    }

    fn describe(&self) -> String {
        format!("local:{}", self.path)
    }
}
