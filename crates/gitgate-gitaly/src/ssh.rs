//! SSH service exchange
//!
//! Drives one bidirectional streaming RPC: the first request message
//! carries the repository and identity, stdin follows in chunks, and the
//! response stream is demultiplexed onto stdout/stderr until the backend
//! reports an exit status.

use http::uri::PathAndQuery;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::transport::Channel;
use tonic::{Request, Status};

use crate::dispatcher::CallContext;
use crate::proto::{
    ExitStatus, SshReceivePackRequest, SshReceivePackResponse, SshUploadArchiveRequest,
    SshUploadArchiveResponse, SshUploadPackRequest, SshUploadPackResponse,
};

/// 32 KiB, matching the backend's own streaming chunk size.
const STREAM_CHUNK_SIZE: usize = 32 * 1024;

/// Response half shared by the three SSH RPCs.
trait SshResponse {
    fn into_parts(self) -> (Vec<u8>, Vec<u8>, Option<ExitStatus>);
}

impl SshResponse for SshUploadPackResponse {
    fn into_parts(self) -> (Vec<u8>, Vec<u8>, Option<ExitStatus>) {
        (self.stdout, self.stderr, self.exit_status)
    }
}

impl SshResponse for SshReceivePackResponse {
    fn into_parts(self) -> (Vec<u8>, Vec<u8>, Option<ExitStatus>) {
        (self.stdout, self.stderr, self.exit_status)
    }
}

impl SshResponse for SshUploadArchiveResponse {
    fn into_parts(self) -> (Vec<u8>, Vec<u8>, Option<ExitStatus>) {
        (self.stdout, self.stderr, self.exit_status)
    }
}

pub async fn upload_pack<R, W, E>(
    ctx: CallContext,
    channel: Channel,
    first: SshUploadPackRequest,
    stdin: R,
    stdout: W,
    stderr: E,
) -> Result<i32, Status>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    exchange::<SshUploadPackRequest, SshUploadPackResponse, _, _, _>(
        ctx,
        channel,
        "/gitaly.SSHService/SSHUploadPack",
        first,
        |chunk| SshUploadPackRequest {
            stdin: chunk,
            ..Default::default()
        },
        stdin,
        stdout,
        stderr,
    )
    .await
}

pub async fn receive_pack<R, W, E>(
    ctx: CallContext,
    channel: Channel,
    first: SshReceivePackRequest,
    stdin: R,
    stdout: W,
    stderr: E,
) -> Result<i32, Status>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    exchange::<SshReceivePackRequest, SshReceivePackResponse, _, _, _>(
        ctx,
        channel,
        "/gitaly.SSHService/SSHReceivePack",
        first,
        |chunk| SshReceivePackRequest {
            stdin: chunk,
            ..Default::default()
        },
        stdin,
        stdout,
        stderr,
    )
    .await
}

pub async fn upload_archive<R, W, E>(
    ctx: CallContext,
    channel: Channel,
    first: SshUploadArchiveRequest,
    stdin: R,
    stdout: W,
    stderr: E,
) -> Result<i32, Status>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    exchange::<SshUploadArchiveRequest, SshUploadArchiveResponse, _, _, _>(
        ctx,
        channel,
        "/gitaly.SSHService/SSHUploadArchive",
        first,
        |chunk| SshUploadArchiveRequest {
            stdin: chunk,
            ..Default::default()
        },
        stdin,
        stdout,
        stderr,
    )
    .await
}

/// Common pump for the three RPCs. The inbound context's cancellation
/// unwinds the call at the next await point; the stdin reader stops with it.
#[allow(clippy::too_many_arguments)]
async fn exchange<Req, Resp, R, W, E>(
    ctx: CallContext,
    channel: Channel,
    path: &'static str,
    first: Req,
    stdin_message: fn(Vec<u8>) -> Req,
    stdin: R,
    mut stdout: W,
    mut stderr: E,
) -> Result<i32, Status>
where
    Req: prost::Message + Default + 'static,
    Resp: prost::Message + Default + SshResponse + 'static,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let (tx, rx) = mpsc::channel::<Req>(4);
    tx.send(first)
        .await
        .map_err(|_| Status::internal("request stream closed before the first message"))?;

    let reader = tokio::spawn(pump_stdin(stdin, tx, stdin_message, ctx.cancel.clone()));

    let mut grpc = Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|err| Status::unknown(format!("backend not ready: {err}")))?;

    let mut request = Request::new(ReceiverStream::new(rx));
    *request.metadata_mut() = ctx.metadata.clone();
    if let Some(authorization) = &ctx.authorization {
        request
            .metadata_mut()
            .insert("authorization", authorization.clone());
    }

    let codec: ProstCodec<Req, Resp> = ProstCodec::default();
    let response = tokio::select! {
        _ = ctx.cancel.cancelled() => return Err(Status::cancelled("request cancelled")),
        response = grpc.streaming(request, PathAndQuery::from_static(path), codec) => response?,
    };

    let mut stream = response.into_inner();
    let mut exit_code = 0;
    loop {
        let message = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(Status::cancelled("request cancelled")),
            message = stream.message() => message?,
        };
        let Some(message) = message else { break };

        let (out, err, exit_status) = message.into_parts();
        if !out.is_empty() {
            stdout.write_all(&out).await.map_err(write_failed)?;
        }
        if !err.is_empty() {
            stderr.write_all(&err).await.map_err(write_failed)?;
        }
        if let Some(exit_status) = exit_status {
            exit_code = exit_status.value;
        }
    }
    stdout.flush().await.map_err(write_failed)?;

    // The RPC is over; stdin may still be open (e.g. an idle upload-pack
    // client), so the pump does not get to finish on its own.
    reader.abort();

    Ok(exit_code)
}

/// Copy stdin into the request stream in bounded chunks until EOF, the RPC
/// finishes, or the call is cancelled.
async fn pump_stdin<R, Req>(
    mut stdin: R,
    tx: mpsc::Sender<Req>,
    stdin_message: fn(Vec<u8>) -> Req,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => return,
            read = stdin.read(&mut buf) => match read {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            },
        };
        if tx.send(stdin_message(buf[..n].to_vec())).await.is_err() {
            return;
        }
    }
}

fn write_failed(err: std::io::Error) -> Status {
    Status::internal(format!("writing backend response: {err}"))
}
