use std::mem::replace;
use std::net::SocketAddr;
use std::sync::Arc;

// for boxed()
use futures::future::FutureExt;
use futures::{Future, SinkExt, StreamExt};
use slog::{debug, info, o, warn, Logger};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::oneshot::Sender;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use smr::{ClientProposal, ProposeReply};
use wire::ProposeCodec;

use crate::conf::ReplicaConf;
use crate::replica::{Proposal, Replica};
use crate::server::ServerError;

/// Server serves the client api of one replica and runs the replica's batch
/// and exec loops.
pub struct Server {
    conf: ReplicaConf,
    replica: Arc<Replica>,
    proposals: Option<UnboundedReceiver<Proposal>>,
    stop_txs: Vec<(&'static str, Sender<()>)>,
    join_handle: Option<JoinHandle<()>>,
    logger: Logger,
}

impl Server {
    pub fn new(conf: ReplicaConf, logger: &Logger) -> Server {
        let (replica, proposals) = Replica::new(&conf, logger);
        Server {
            conf,
            replica: Arc::new(replica),
            proposals: Some(proposals),
            stop_txs: Vec::new(),
            join_handle: None,
            logger: logger.new(o!("module" => "server")),
        }
    }

    pub fn replica(&self) -> &Arc<Replica> {
        &self.replica
    }

    /// start binds the client api address and spawns the accept loop, the
    /// batch loop and the exec loop on the current runtime.
    ///
    /// It returns the bound address, which differs from the configured one if
    /// that has port 0.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        let proposals = self.proposals.take().ok_or(ServerError::AlreadyStarted)?;

        let lis = TcpListener::bind(self.conf.listen).await?;
        let addr = lis.local_addr()?;

        let (tx_api, rx_api) = tokio::sync::oneshot::channel::<()>();
        let (tx_batch, rx_batch) = tokio::sync::oneshot::channel::<()>();
        let (tx_exec, rx_exec) = tokio::sync::oneshot::channel::<()>();

        let jb = tokio::spawn(self.replica.clone().batch_loop(proposals, rx_batch));
        let je = tokio::spawn(self.replica.clone().exec_loop(rx_exec));
        let ja = tokio::spawn(serve_with_shutdown(
            self.replica.clone(),
            lis,
            rx_api,
            self.logger.clone(),
        ));

        let logger = self.logger.clone();
        let j = tokio::spawn(async move {
            for (name, j) in vec![("api", ja), ("batch", jb), ("exec", je)] {
                if let Err(e) = j.await {
                    warn!(logger, "task quit abnormally"; "task" => name, "error" => %e);
                }
            }
        });
        self.join_handle = Some(j);

        self.stop_txs.push(("api", tx_api));
        self.stop_txs.push(("batch", tx_batch));
        self.stop_txs.push(("exec", tx_exec));

        info!(self.logger, "serving"; "addr" => %addr, "workload" => ?self.conf.workload);
        Ok(addr)
    }

    pub fn stop(&mut self) -> Result<(), ServerError> {
        while let Some((name, tx)) = self.stop_txs.pop() {
            tx.send(()).or(Err(ServerError::RxClosed))?;
            info!(self.logger, "stop signal sent"; "task" => name);
        }
        Ok(())
    }

    pub async fn join(&mut self) -> Result<(), ServerError> {
        let j = replace(&mut self.join_handle, None);
        j.ok_or(ServerError::NotStarted)?.await?;
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

async fn serve_with_shutdown<F>(replica: Arc<Replica>, lis: TcpListener, signal: F, logger: Logger)
where
    F: Future + Send,
{
    // impl Unpin
    let mut sig = signal.boxed();

    loop {
        tokio::select! {
            _v = (&mut sig) => {
                break;
            },
            inc = lis.accept() => {
                let (sock, peer) = match inc {
                    Ok(x) => x,
                    Err(e) => {
                        warn!(logger, "accept"; "error" => %e);
                        continue;
                    }
                };

                let replica = replica.clone();
                let logger = logger.new(o!("peer" => peer.to_string()));
                tokio::spawn(async move {
                    handle_conn(replica, sock, logger).await;
                });
            }
        }
    }

    info!(logger, "api stopped");
}

/// handle_conn reads proposals until the client closes or sends a bad frame.
/// Replies are written by a separate task, in the order commands are executed.
async fn handle_conn(replica: Arc<Replica>, sock: TcpStream, logger: Logger) {
    debug!(logger, "new connection");

    let (r, w) = sock.into_split();
    let mut reader = FramedRead::new(r, ProposeCodec);
    let mut writer = FramedWrite::new(w, ProposeCodec);

    let (tx, mut rx) = unbounded_channel::<ProposeReply>();

    let wlogger = logger.clone();
    tokio::spawn(async move {
        while let Some(rep) = rx.recv().await {
            if let Err(e) = writer.send(rep).await {
                debug!(wlogger, "write reply"; "error" => %e);
                break;
            }
        }
    });

    while let Some(frame) = reader.next().await {
        let p = match frame {
            Ok(p) => p,
            Err(e) => {
                warn!(logger, "bad frame, close connection"; "error" => %e);
                break;
            }
        };

        let client = ClientProposal::new(p.command_id, tx.clone());
        if let Err(e) = replica.propose(Proposal::new(client, p.command)) {
            warn!(logger, "propose"; "error" => %e);
            break;
        }
    }

    // the writer ends once every pending proposal is answered.
    debug!(logger, "client closed");
}
