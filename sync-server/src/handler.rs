//! Request handler: one accepted channel, one exchange.
//!
//! ```text
//! list  ──► scan root ───────────────────────────────► list_response
//! push  ──► resolve ─► temp file ◄── size raw bytes ──► ack | error
//! pull  ──► resolve ─► open ─────────────────────────► pull_response + size raw bytes | error
//! other ─────────────────────────────────────────────► ack
//! ```
//!
//! `error` replies carry fixed reasons from [`reasons`]; local paths and OS
//! errors stay in the server's log.
//!
//! The handler owns nothing shared except the read-only [`ServerContext`].
//! Pushes to the same path from concurrent connections each land in their
//! own temp file; whichever rename happens last wins.

use std::path::{Path, PathBuf};

use sync_content::{resolve_path, scan_dir, ContentError, PartialFile, SourceFile};
use sync_core::Settings;
use sync_types::{
    reasons, FrameConfig, FramedStream, ListResponse, Message, PullRequest, PullResponse,
    PushRequest, SyncError,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Result, ServerError};
use crate::metrics::ServerMetrics;

/// Read-only state shared by every connection.
#[derive(Debug)]
pub struct ServerContext {
    root: PathBuf,
    frame: FrameConfig,
    metrics: ServerMetrics,
}

impl ServerContext {
    /// Serve files below `root` with the given stream limits.
    pub fn new(root: impl Into<PathBuf>, frame: FrameConfig) -> Self {
        Self {
            root: root.into(),
            frame,
            metrics: ServerMetrics::default(),
        }
    }

    /// Serve `settings.local_dir`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.local_dir.clone(), settings.frame_config())
    }

    /// Synchronization root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Limits applied to every connection.
    pub fn frame_config(&self) -> FrameConfig {
        self.frame
    }

    /// Operational counters.
    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }
}

/// Answer the single request arriving on `stream`, then close it.
pub async fn handle_connection<S>(ctx: &ServerContext, stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = FramedStream::new(stream, ctx.frame);

    let result = match framed.recv().await {
        Ok(request) => {
            tracing::debug!("{} request", request.type_name());
            dispatch(ctx, &mut framed, request).await
        }
        Err(e) => Err(e.into()),
    };
    framed.shutdown().await;

    if result.is_err() {
        ServerMetrics::incr(&ctx.metrics.errors_total);
    }
    result
}

async fn dispatch<S>(
    ctx: &ServerContext,
    framed: &mut FramedStream<S>,
    request: Message,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match request {
        Message::ListRequest => handle_list(ctx, framed).await,
        Message::PushRequest(req) => handle_push(ctx, framed, req).await,
        Message::PullRequest(req) => handle_pull(ctx, framed, req).await,
        other => {
            tracing::debug!("acknowledging {} without action", other.type_name());
            framed.send(&Message::ack_ok()).await?;
            Ok(())
        }
    }
}

async fn handle_list<S>(ctx: &ServerContext, framed: &mut FramedStream<S>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let root = ctx.root.clone();
    let inventory = match tokio::task::spawn_blocking(move || scan_dir(&root)).await? {
        Ok(inventory) => inventory,
        Err(e) => {
            reply_error(framed, reasons::LIST_FAILED).await;
            return Err(e.into());
        }
    };

    let files = inventory.into_entries();
    tracing::debug!("listing {} files", files.len());
    match framed
        .send(&Message::ListResponse(ListResponse { files }))
        .await
    {
        Ok(()) => {}
        // Nothing was written yet, so the stream can still carry a reason.
        Err(e @ SyncError::MessageTooLarge { .. }) => {
            reply_error(framed, reasons::INVENTORY_TOO_LARGE).await;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    }
    ServerMetrics::incr(&ctx.metrics.lists_total);
    Ok(())
}

async fn handle_push<S>(
    ctx: &ServerContext,
    framed: &mut FramedStream<S>,
    req: PushRequest,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let dest = match resolve_path(&ctx.root, &req.path) {
        Ok(dest) => dest,
        Err(e) => {
            tracing::warn!("refusing push: {}", e);
            reply_error(framed, reasons::PATH_ESCAPE).await;
            return Err(e.into());
        }
    };

    let mut partial = match PartialFile::create(&dest).await {
        Ok(partial) => partial,
        Err(e) => {
            reply_error(framed, reasons::STORE_FAILED).await;
            return Err(e.into());
        }
    };

    let received = match framed.read_payload(&mut partial, req.size).await {
        Ok(received) => received,
        Err(e) => {
            partial.discard().await;
            return Err(e.into());
        }
    };
    if received < req.size {
        partial.discard().await;
        reply_error(framed, reasons::SIZE_MISMATCH).await;
        return Err(ServerError::TransferIncomplete {
            path: req.path,
            received,
            expected: req.size,
        });
    }

    if let Err(e) = partial.commit(req.mtime).await {
        reply_error(framed, reasons::STORE_FAILED).await;
        return Err(e.into());
    }
    ServerMetrics::incr(&ctx.metrics.pushes_total);
    ServerMetrics::add(&ctx.metrics.bytes_received, received);
    tracing::info!("received {} ({} bytes)", req.path, received);

    framed.send(&Message::ack_ok()).await?;
    Ok(())
}

async fn handle_pull<S>(
    ctx: &ServerContext,
    framed: &mut FramedStream<S>,
    req: PullRequest,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let path = match resolve_path(&ctx.root, &req.path) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("refusing pull: {}", e);
            reply_error(framed, reasons::PATH_ESCAPE).await;
            return Err(e.into());
        }
    };

    let mut source = match SourceFile::open(&path).await {
        Ok(source) => source,
        Err(ContentError::NotFound(_)) => {
            tracing::debug!("pull of missing {}", req.path);
            framed.send(&Message::error(reasons::FILE_NOT_FOUND)).await?;
            return Ok(());
        }
        Err(e) => {
            reply_error(framed, reasons::READ_FAILED).await;
            return Err(e.into());
        }
    };

    framed
        .send(&Message::PullResponse(PullResponse {
            path: req.path.clone(),
            size: source.size,
            mtime: source.mtime,
        }))
        .await?;
    let sent = framed.write_payload(&mut source.file, source.size).await?;
    if sent < source.size {
        // The header is already out; closing early is the only signal left.
        return Err(ServerError::TransferIncomplete {
            path: req.path,
            received: sent,
            expected: source.size,
        });
    }

    ServerMetrics::incr(&ctx.metrics.pulls_total);
    ServerMetrics::add(&ctx.metrics.bytes_sent, sent);
    tracing::info!("sent {} ({} bytes)", req.path, sent);
    Ok(())
}

/// Best-effort `error` reply; the connection is closing either way.
async fn reply_error<S>(framed: &mut FramedStream<S>, message: &str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = framed.send(&Message::error(message)).await {
        tracing::debug!("could not deliver error reply: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sync_types::{ErrorKind, ErrorMessage, FileEntry};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn frame() -> FrameConfig {
        FrameConfig {
            io_timeout: Duration::from_secs(5),
            ..FrameConfig::default()
        }
    }

    /// Run the handler on one end of a pipe and return the other end.
    fn start(
        ctx: std::sync::Arc<ServerContext>,
    ) -> (FramedStream<DuplexStream>, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let handle = tokio::spawn(async move { handle_connection(&ctx, server).await });
        (FramedStream::new(client, frame()), handle)
    }

    fn context(root: &Path) -> std::sync::Arc<ServerContext> {
        std::sync::Arc::new(ServerContext::new(root, frame()))
    }

    fn temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(sync_content::TEMP_SUFFIX)
            })
            .count()
    }

    // ===========================================
    // list
    // ===========================================

    #[tokio::test]
    async fn list_returns_inventory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), b"abc").unwrap();
        let ctx = context(dir.path());

        let (mut client, handle) = start(ctx.clone());
        client.send(&Message::ListRequest).await.unwrap();
        let reply = client.recv().await.unwrap();
        handle.await.unwrap().unwrap();

        match reply {
            Message::ListResponse(list) => {
                assert_eq!(list.files.len(), 1);
                assert_eq!(list.files[0].path, "sub/a.txt");
                assert_eq!(list.files[0].size, 3);
            }
            other => panic!("expected list_response, got {:?}", other),
        }
        assert_eq!(ctx.metrics().snapshot().lists_total, 1);
    }

    #[tokio::test]
    async fn unreadable_root_reply_hides_local_path() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("not-created");
        let (mut client, handle) = start(context(&root));

        client.send(&Message::ListRequest).await.unwrap();
        let reply = client.recv().await.unwrap();
        let err = handle.await.unwrap().unwrap_err();

        assert_eq!(reply, Message::error(reasons::LIST_FAILED));
        // The server's own log keeps the detail.
        assert!(err.to_string().contains("not-created"));
    }

    #[tokio::test]
    async fn oversized_inventory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            let name = format!("file-with-a-long-name-{:02}.txt", i);
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let ctx = std::sync::Arc::new(ServerContext::new(
            dir.path(),
            FrameConfig {
                max_message_size: 256,
                ..frame()
            },
        ));

        let (mut client, handle) = start(ctx.clone());
        client.send(&Message::ListRequest).await.unwrap();
        let reply = client.recv().await.unwrap();
        let err = handle.await.unwrap().unwrap_err();

        assert_eq!(reply, Message::error(reasons::INVENTORY_TOO_LARGE));
        assert_eq!(err.kind(), ErrorKind::Framing);
        assert_eq!(ctx.metrics().snapshot().lists_total, 0);
    }

    // ===========================================
    // push
    // ===========================================

    #[tokio::test]
    async fn push_commits_bytes_and_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let (mut client, handle) = start(ctx.clone());
        client
            .send(&Message::PushRequest(PushRequest {
                path: "new/dir/a.txt".into(),
                size: 5,
                mtime: 1_650_000_000.5,
            }))
            .await
            .unwrap();
        client.write_payload(&mut &b"hello"[..], 5).await.unwrap();
        let reply = client.recv().await.unwrap();
        handle.await.unwrap().unwrap();

        assert!(matches!(reply, Message::Ack(ref ack) if ack.is_ok()));
        let dest = dir.path().join("new/dir/a.txt");
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        let mtime = sync_content::file_mtime(&dest).unwrap();
        assert!((mtime - 1_650_000_000.5).abs() < 1e-3);

        let snap = ctx.metrics().snapshot();
        assert_eq!(snap.pushes_total, 1);
        assert_eq!(snap.bytes_received, 5);
    }

    #[tokio::test]
    async fn zero_byte_push_is_acked() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, handle) = start(context(dir.path()));

        client
            .send(&Message::PushRequest(PushRequest {
                path: "empty".into(),
                size: 0,
                mtime: 10.0,
            }))
            .await
            .unwrap();
        let reply = client.recv().await.unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(reply, Message::ack_ok());
        assert_eq!(std::fs::read(dir.path().join("empty")).unwrap(), b"");
    }

    #[tokio::test]
    async fn truncated_push_reports_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"original").unwrap();
        let (client, handle) = start(context(dir.path()));

        let mut raw = client.into_inner();
        let header = sync_types::Codec::encode(
            &Message::PushRequest(PushRequest {
                path: "a.txt".into(),
                size: 100,
                mtime: 0.0,
            }),
            1024,
        )
        .unwrap();
        raw.write_all(&header).await.unwrap();
        raw.write_all(b"partial").await.unwrap();
        raw.shutdown().await.unwrap();

        let mut framed = FramedStream::new(raw, frame());
        let reply = framed.recv().await.unwrap();
        let err = handle.await.unwrap().unwrap_err();

        assert_eq!(reply, Message::error(reasons::SIZE_MISMATCH));
        assert_eq!(err.kind(), ErrorKind::TransferIncomplete);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"original");
        assert_eq!(temp_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn escaping_push_is_refused() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let (mut client, handle) = start(context(&root));

        client
            .send(&Message::PushRequest(PushRequest {
                path: "../escaped.txt".into(),
                size: 0,
                mtime: 0.0,
            }))
            .await
            .unwrap();
        let reply = client.recv().await.unwrap();
        let err = handle.await.unwrap().unwrap_err();

        assert_eq!(
            reply,
            Message::Error(ErrorMessage {
                message: reasons::PATH_ESCAPE.into()
            })
        );
        assert_eq!(err.kind(), ErrorKind::PathEscape);
        assert!(!outer.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn failed_store_reply_hides_local_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), b"a file, not a directory").unwrap();
        let (mut client, handle) = start(context(dir.path()));

        client
            .send(&Message::PushRequest(PushRequest {
                path: "blocker/a.txt".into(),
                size: 0,
                mtime: 0.0,
            }))
            .await
            .unwrap();
        let reply = client.recv().await.unwrap();
        let err = handle.await.unwrap().unwrap_err();

        assert_eq!(reply, Message::error(reasons::STORE_FAILED));
        let Message::Error(ErrorMessage { message }) = reply else {
            unreachable!()
        };
        assert!(!message.contains(&*dir.path().to_string_lossy()));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    // ===========================================
    // pull
    // ===========================================

    #[tokio::test]
    async fn pull_streams_header_then_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bin");
        std::fs::write(&path, vec![7u8; 70_000]).unwrap();
        sync_content::set_file_mtime(&path, 1_234.5).unwrap();
        let ctx = context(dir.path());

        let (mut client, handle) = start(ctx.clone());
        client
            .send(&Message::PullRequest(PullRequest {
                path: "b.bin".into(),
            }))
            .await
            .unwrap();

        let header = match client.recv().await.unwrap() {
            Message::PullResponse(h) => h,
            other => panic!("expected pull_response, got {:?}", other),
        };
        assert_eq!(header.size, 70_000);
        assert!((header.mtime - 1_234.5).abs() < 1e-3);

        let mut body = Vec::new();
        let got = client.read_payload(&mut body, header.size).await.unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(got, 70_000);
        assert!(body.iter().all(|b| *b == 7));
        assert_eq!(ctx.metrics().snapshot().bytes_sent, 70_000);
    }

    #[tokio::test]
    async fn pull_missing_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, handle) = start(context(dir.path()));

        client
            .send(&Message::PullRequest(PullRequest {
                path: "missing.txt".into(),
            }))
            .await
            .unwrap();
        let reply = client.recv().await.unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(reply, Message::error(reasons::FILE_NOT_FOUND));
    }

    #[tokio::test]
    async fn pull_directory_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        let (mut client, handle) = start(context(dir.path()));

        client
            .send(&Message::PullRequest(PullRequest {
                path: "folder".into(),
            }))
            .await
            .unwrap();
        let reply = client.recv().await.unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(reply, Message::error(reasons::FILE_NOT_FOUND));
    }

    // ===========================================
    // other
    // ===========================================

    #[tokio::test]
    async fn unknown_type_is_acked() {
        let dir = tempfile::tempdir().unwrap();
        let (client, handle) = start(context(dir.path()));

        let mut map = std::collections::BTreeMap::new();
        map.insert("type", "echo");
        map.insert("content", "hello from client");
        let body = rmp_serde::to_vec_named(&map).unwrap();
        let mut raw = client.into_inner();
        raw.write_all(&(body.len() as u32).to_be_bytes()).await.unwrap();
        raw.write_all(&body).await.unwrap();

        let mut framed = FramedStream::new(raw, frame());
        let reply = framed.recv().await.unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(reply, Message::ack_ok());
    }

    #[tokio::test]
    async fn stray_response_type_is_acked() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, handle) = start(context(dir.path()));

        client
            .send(&Message::ListResponse(ListResponse {
                files: vec![FileEntry::new("x", 1, 1.0)],
            }))
            .await
            .unwrap();
        assert_eq!(client.recv().await.unwrap(), Message::ack_ok());
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = std::sync::Arc::new(ServerContext::new(
            dir.path(),
            FrameConfig {
                max_message_size: 16,
                io_timeout: Duration::from_secs(5),
            },
        ));
        let (client, handle) = start(ctx.clone());

        let mut raw = client.into_inner();
        raw.write_all(&1_000_000u32.to_be_bytes()).await.unwrap();
        let err = handle.await.unwrap().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Framing);
        assert_eq!(ctx.metrics().snapshot().errors_total, 1);
        let mut rest = Vec::new();
        raw.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn silent_client_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = std::sync::Arc::new(ServerContext::new(
            dir.path(),
            FrameConfig {
                io_timeout: Duration::from_millis(50),
                ..FrameConfig::default()
            },
        ));
        let (_client, handle) = start(ctx);

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
