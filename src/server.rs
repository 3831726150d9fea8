// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Serve 9P2000 sessions over TCP and dispatch frames onto sessions.
// Author: Lukas Bower

//! TCP transport.
//!
//! [`serve`] accepts connections until shutdown and runs one task per
//! connection. Each task waits for the cache sync barrier, then reads
//! frames sequentially and answers each through a [`Connection`]. Failed
//! operations become `Rerror` replies; only I/O errors and undecodable
//! frames end a connection.

use std::net::SocketAddr;
use std::sync::Arc;

use k9p_codec::{
    frame_len, Codec, CodecError, RequestBody, Response, ResponseBody, RREAD_OVERHEAD,
    VERSION_UNKNOWN,
};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::cache::ResourceCache;
use crate::service::{Service, Traced};
use crate::session::Session;
use crate::shutdown::Shutdown;
use crate::K9pError;

/// Error string for message types the server does not implement.
const UNKNOWN_MESSAGE: &str = "unknown message";

/// Smallest message size a client may negotiate; below it a stat reply
/// cannot fit.
pub const MIN_MSIZE: u32 = 256;

/// Errors that end a connection or the accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A frame could not be decoded or a response encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Frame-level protocol state for one connection.
#[derive(Debug)]
pub struct Connection<S> {
    service: S,
    codec: Codec,
    msize: u32,
}

impl<S: Service> Connection<S> {
    /// Wrap `service`; the message size starts at the service's offer.
    pub fn new(service: S) -> Self {
        let (msize, _) = service.version();
        Self {
            service,
            codec: Codec,
            msize,
        }
    }

    /// Negotiated maximum message size.
    #[must_use]
    pub fn msize(&self) -> u32 {
        self.msize
    }

    /// Borrow the wrapped service.
    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Decode one request frame and encode its response.
    pub fn handle_frame(&mut self, bytes: &[u8]) -> Result<Vec<u8>, ServerError> {
        let request = match self.codec.decode_request(bytes) {
            Ok(request) => request,
            Err(CodecError::Unsupported(ty)) if bytes.len() >= 7 => {
                debug!("[k9p][transport] unsupported message type {ty}");
                let tag = u16::from_le_bytes([bytes[5], bytes[6]]);
                return Ok(self.codec.encode_response(&Response {
                    tag,
                    body: ResponseBody::Error {
                        ename: UNKNOWN_MESSAGE.to_owned(),
                    },
                })?);
            }
            Err(err) => return Err(err.into()),
        };
        let body = self
            .dispatch(request.body)
            .unwrap_or_else(|err| ResponseBody::Error {
                ename: err.to_string(),
            });
        Ok(self.codec.encode_response(&Response {
            tag: request.tag,
            body,
        })?)
    }

    fn dispatch(&mut self, body: RequestBody) -> Result<ResponseBody, K9pError> {
        match body {
            RequestBody::Version { msize, version } => Ok(self.negotiate(msize, &version)),
            RequestBody::Auth { afid, uname, aname } => Ok(ResponseBody::Auth {
                aqid: self.service.auth(afid, &uname, &aname)?,
            }),
            RequestBody::Attach {
                fid,
                afid,
                uname,
                aname,
            } => Ok(ResponseBody::Attach {
                qid: self.service.attach(fid, afid, &uname, &aname)?,
            }),
            // Requests are answered in order, so nothing is ever outstanding.
            RequestBody::Flush { .. } => Ok(ResponseBody::Flush),
            RequestBody::Walk {
                fid,
                newfid,
                wnames,
            } => Ok(ResponseBody::Walk {
                qids: self.service.walk(fid, newfid, &wnames)?,
            }),
            RequestBody::Open { fid, mode } => {
                let (qid, iounit) = self.service.open(fid, mode)?;
                Ok(ResponseBody::Open { qid, iounit })
            }
            RequestBody::Create {
                fid,
                name,
                perm,
                mode,
            } => {
                let (qid, iounit) = self.service.create(fid, &name, perm, mode)?;
                Ok(ResponseBody::Create { qid, iounit })
            }
            RequestBody::Read { fid, offset, count } => {
                let count = count.min(self.msize.saturating_sub(RREAD_OVERHEAD));
                Ok(ResponseBody::Read {
                    data: self.service.read(fid, offset, count)?,
                })
            }
            RequestBody::Write { fid, offset, data } => Ok(ResponseBody::Write {
                count: self.service.write(fid, offset, &data)?,
            }),
            RequestBody::Clunk { fid } => {
                self.service.clunk(fid)?;
                Ok(ResponseBody::Clunk)
            }
            RequestBody::Remove { fid } => {
                self.service.remove(fid)?;
                Ok(ResponseBody::Remove)
            }
            RequestBody::Stat { fid } => Ok(ResponseBody::Stat {
                stat: self.service.stat(fid)?,
            }),
            RequestBody::Wstat { fid, stat } => {
                self.service.wstat(fid, &stat)?;
                Ok(ResponseBody::Wstat)
            }
        }
    }

    fn negotiate(&mut self, requested: u32, version: &str) -> ResponseBody {
        let (offered, ours) = self.service.version();
        let msize = requested.min(offered);
        // "9P2000.u" and friends are answered with the base dialect.
        if !version.starts_with(ours.as_str()) || msize < MIN_MSIZE {
            debug!("[k9p][transport] rejecting version {version:?} msize={requested}");
            return ResponseBody::Version {
                msize,
                version: VERSION_UNKNOWN.to_owned(),
            };
        }
        self.msize = msize;
        ResponseBody::Version {
            msize,
            version: ours,
        }
    }
}

/// Read one frame, or `None` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R, msize: u32) -> Result<Option<Vec<u8>>, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = frame_len(prefix, Some(msize))?;
    let mut frame = vec![0u8; len];
    frame[..4].copy_from_slice(&prefix);
    reader.read_exact(&mut frame[4..]).await?;
    Ok(Some(frame))
}

/// Accept connections on `listener` until `shutdown` fires, then wait for
/// the open connections to finish.
pub async fn serve(
    listener: TcpListener,
    cache: Arc<dyn ResourceCache>,
    shutdown: Shutdown,
) -> Result<(), ServerError> {
    info!("[k9p][transport] listening on {}", listener.local_addr()?);
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            () = shutdown.wait() => break,
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(err) = finished {
                    error!("[k9p][transport] connection task failed: {err}");
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let cache = Arc::clone(&cache);
                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        match serve_conn(stream, peer, cache, shutdown).await {
                            Ok(()) => debug!("[k9p][transport] {peer} disconnected"),
                            Err(err) => warn!("[k9p][transport] {peer} dropped: {err}"),
                        }
                    });
                }
                Err(err) => warn!("[k9p][transport] accept failed: {err}"),
            },
        }
    }
    drop(listener);
    info!(
        "[k9p][transport] shutting down, draining {} connections",
        connections.len()
    );
    while let Some(finished) = connections.join_next().await {
        if let Err(err) = finished {
            error!("[k9p][transport] connection task failed: {err}");
        }
    }
    Ok(())
}

/// Serve one client connection until it closes or `shutdown` fires.
pub async fn serve_conn(
    mut stream: TcpStream,
    peer: SocketAddr,
    cache: Arc<dyn ResourceCache>,
    shutdown: Shutdown,
) -> Result<(), ServerError> {
    debug!("[k9p][transport] accepted {peer}");
    let session = Session::new(cache);
    if !session.wait_for_cache_sync(&shutdown).await {
        debug!("[k9p][transport] {peer} closed before cache sync");
        return Ok(());
    }
    let mut conn = Connection::new(Traced::new(session, peer.to_string()));
    let (mut reader, mut writer) = stream.split();
    loop {
        let frame = tokio::select! {
            () = shutdown.wait() => break,
            frame = read_frame(&mut reader, conn.msize()) => frame?,
        };
        let Some(frame) = frame else {
            break;
        };
        let response = conn.handle_frame(&frame)?;
        writer.write_all(&response).await?;
    }
    Ok(())
}
